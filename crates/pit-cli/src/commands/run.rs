use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use pit_broker_paper::PaperBroker;
use pit_engine::{run_engine, Clock, EngineControl, SystemClock};
use pit_schemas::{EngineExit, MICROS_SCALE};
use pit_strategy::builtin_registry;

/// Foreground dry run: one engine over the paper broker, status lines to
/// stdout, Ctrl-C for a graceful stop.
pub async fn execute(file: &Path, paper_balance: i64) -> Result<()> {
    let config = pit_config::load_account_config(file)?;
    let account = config.account.clone();

    // Synthetic flat market so the session exercises the risk/cooldown and
    // status paths without a live feed.
    let mut broker = PaperBroker::new(paper_balance * MICROS_SCALE);
    let now = SystemClock.now();
    for pair in &config.pairs {
        broker.set_quote(&pair.symbol, 1_100_000, 1_100_100, now);
        broker.set_bars(&pair.symbol, pair.timeframe, Vec::new());
    }

    let (control, stop_rx, status_tx) = EngineControl::wiring();
    let task = tokio::spawn(run_engine(
        config,
        Box::new(broker),
        Arc::new(builtin_registry()),
        Arc::new(SystemClock),
        status_tx,
        stop_rx,
    ));

    println!("running account {account} (paper); Ctrl-C to stop");

    let mut feed = control.subscribe();
    let mut last_seq = 0;
    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break; // engine finished
                }
                let latest = feed.borrow().clone();
                if let Some(status) = latest {
                    if status.seq > last_seq {
                        last_seq = status.seq;
                        println!(
                            "[{}] {} equity ${:.2} pnl ${:.2} | {}",
                            status.ts_utc.format("%H:%M:%S"),
                            status.mode,
                            status.equity_micros as f64 / MICROS_SCALE as f64,
                            status.session_pnl_micros as f64 / MICROS_SCALE as f64,
                            status.status_line
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("stopping {account}...");
                control.request_stop();
            }
        }
    }

    match task.await {
        Ok(EngineExit::Normal) => {
            println!("engine for {account} exited normally");
            Ok(())
        }
        Ok(EngineExit::Failed { reason }) => anyhow::bail!("engine failed: {reason}"),
        Err(e) => anyhow::bail!("engine task died: {e}"),
    }
}

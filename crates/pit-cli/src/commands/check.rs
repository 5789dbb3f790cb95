use std::path::Path;

use anyhow::Result;
use pit_config::load_account_config;
use pit_risk::Threshold;
use pit_schemas::MICROS_SCALE;

fn fmt_threshold(t: &Threshold) -> String {
    match t {
        Threshold::Amount(v) => format!("${:.2}", *v as f64 / MICROS_SCALE as f64),
        Threshold::Percent(p) => format!("{:.2}%", *p as f64 / MICROS_SCALE as f64 * 100.0),
    }
}

pub fn execute(file: &Path) -> Result<()> {
    let config = load_account_config(file)?;

    println!("account        {}", config.account);
    println!("timezone       {}", config.timezone);
    println!("config hash    {}", config.config_hash);
    println!("profit target  {}", fmt_threshold(&config.limits.profit_target));
    println!("loss limit     {}", fmt_threshold(&config.limits.loss_limit));
    println!(
        "order control  max {} concurrent, {}s between orders",
        config.order_control.max_concurrent_trades, config.order_control.order_cooldown_secs
    );
    println!("pairs          {}", config.pairs.len());
    for pair in &config.pairs {
        let exit = pair
            .exit
            .as_ref()
            .map(|e| e.id.as_str())
            .unwrap_or("(none)");
        println!(
            "  {} {} entry={} exit={} magic={}",
            pair.symbol,
            pair.timeframe.as_str(),
            pair.entry.id,
            exit,
            pair.magic
        );
    }
    println!("OK");
    Ok(())
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use pit_broker::{AccountSnapshot, BrokerError, BrokerGateway, OrderRequest};
use pit_config::AccountConfig;
use pit_risk::{evaluate, size_position, RiskInput, RiskTrigger, SessionStats, Threshold};
use pit_schemas::{EngineMode, EngineStatus, PairStatus, Position, Side};
use pit_strategy::{CloseDecision, MarketState, RecentBars, StrategyRegistry};

use crate::machine::{apply, EngineEvent};
use crate::pairs::{activate_pairs, PairRuntime};
use crate::{EngineError, OrderGate, Session};

/// Candles handed to strategies each tick.
const BARS_WINDOW: usize = 64;

/// The per-account session controller.
///
/// Owns the broker connection, the pair runtimes, the Risk Governor inputs
/// and the order gates. Clock-free: every public method takes `now`, so a
/// full session can be driven tick by tick in tests. The async runner wraps
/// this with a real interval and stop signal.
pub struct TradingEngine {
    config: AccountConfig,
    broker: Box<dyn BrokerGateway>,
    pairs: Vec<PairRuntime>,
    mode: EngineMode,
    session: Session,
    gate: OrderGate,
    cooldown_until: Option<DateTime<Utc>>,
    last_trigger: Option<RiskTrigger>,
    last_account: AccountSnapshot,
    status_line: String,
    seq: u64,
    started_at: DateTime<Utc>,
}

impl TradingEngine {
    /// Connect, validate balance-dependent limits, activate pairs.
    ///
    /// Fails fast while still OFFLINE: broker unreachable, no usable pair
    /// strategy, or an amount loss limit at/above the current balance. A
    /// start attempt while the market is closed succeeds but begins in
    /// COOLDOWN until the next market open (overriding the configured
    /// policy for that one occurrence).
    pub fn start(
        config: AccountConfig,
        broker: Box<dyn BrokerGateway>,
        registry: &StrategyRegistry,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let snapshot = broker.account()?;

        if let Threshold::Amount(v) = config.limits.loss_limit {
            if v >= snapshot.balance_micros {
                return Err(EngineError::Config(format!(
                    "amount loss limit ({v} micros) is at or above the account balance ({} micros)",
                    snapshot.balance_micros
                )));
            }
        }

        let pairs = activate_pairs(registry, &config.pairs);
        if !pairs.iter().any(|p| p.is_active()) {
            return Err(EngineError::NoStrategies);
        }

        let gate = OrderGate::new(
            config.order_control.order_cooldown_secs,
            config.order_control.max_concurrent_trades,
        );

        let (event, cooldown_until, status_line) =
            if pit_cooldown::market_closed(now) {
                let open = pit_cooldown::next_market_open(now, config.timezone, &config.cooldown);
                tracing::warn!(
                    account = %config.account,
                    resume = %open,
                    "start attempted while the market is closed; waiting in cooldown"
                );
                (
                    EngineEvent::MarketClosed,
                    Some(open),
                    format!("Market closed. Waiting for open at {open}."),
                )
            } else {
                (
                    EngineEvent::Started,
                    None,
                    "Session started. Monitoring normal.".to_string(),
                )
            };
        let mode = apply(EngineMode::Offline, event)
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        tracing::info!(
            account = %config.account,
            mode = %mode,
            config_hash = %config.config_hash,
            pairs = pairs.iter().filter(|p| p.is_active()).count(),
            "engine started"
        );

        Ok(Self {
            session: Session::fresh(now, snapshot),
            config,
            broker,
            pairs,
            mode,
            gate,
            cooldown_until,
            last_trigger: None,
            last_account: snapshot,
            status_line,
            seq: 0,
            started_at: now,
        })
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn account_id(&self) -> &pit_schemas::AccountId {
        &self.config.account
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    pub fn last_trigger(&self) -> Option<&RiskTrigger> {
        self.last_trigger.as_ref()
    }

    pub fn session_stats(&self) -> &SessionStats {
        &self.session.stats
    }

    /// One tick: fetch state, risk check, signal/order pipeline, status.
    /// Ticks never overlap for an account; the caller serializes them.
    pub fn tick(&mut self, now: DateTime<Utc>) -> EngineStatus {
        match self.mode {
            EngineMode::Running => self.tick_running(now),
            EngineMode::Cooldown => self.tick_cooldown(now),
            // Stopping and Offline tick only to keep status flowing.
            EngineMode::Stopping | EngineMode::Offline => {}
        }
        self.make_status(now)
    }

    /// Cooperative stop. Idempotent: repeating the request while already
    /// STOPPING (or OFFLINE) changes nothing.
    pub fn request_stop(&mut self, now: DateTime<Utc>) -> EngineStatus {
        if self.mode != EngineMode::Stopping && self.mode != EngineMode::Offline {
            self.transition(EngineEvent::StopRequested);
            self.status_line = "Stop requested. Closing open positions...".to_string();
        }
        self.make_status(now)
    }

    /// One close-all pass. Returns how many positions remain open after it;
    /// individual failures are logged and left for the next pass.
    pub fn close_open_positions(&mut self) -> Result<usize, BrokerError> {
        let positions = self.broker.open_positions(None)?;
        if positions.is_empty() {
            return Ok(0);
        }
        let mut remaining = 0usize;
        for pos in &positions {
            match self.broker.close_position(pos.ticket) {
                Ok(pnl) => {
                    self.session.stats.record_trade_result(pnl);
                    tracing::info!(
                        account = %self.config.account,
                        ticket = pos.ticket,
                        pnl_micros = pnl,
                        "position closed"
                    );
                }
                Err(e) => {
                    remaining += 1;
                    tracing::warn!(
                        account = %self.config.account,
                        ticket = pos.ticket,
                        error = %e,
                        "close failed; will retry until the shutdown timeout"
                    );
                }
            }
        }
        Ok(remaining)
    }

    /// Terminal cleanup: STOPPING → OFFLINE. Never skipped; close failures
    /// were already logged by [`Self::close_open_positions`].
    pub fn finalize_shutdown(&mut self, now: DateTime<Utc>) -> EngineStatus {
        self.transition(EngineEvent::ShutdownComplete);
        self.status_line = "Engine offline.".to_string();
        self.make_status(now)
    }

    // -- tick branches ------------------------------------------------------

    fn tick_running(&mut self, now: DateTime<Utc>) {
        let snapshot = match self.broker.account() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(account = %self.config.account, error = %e, "account fetch failed; skipping tick");
                self.status_line = format!("Broker error: {e}");
                return;
            }
        };
        self.last_account = snapshot;

        self.session.stats.observe_equity(snapshot.equity_micros);
        let inp = RiskInput {
            balance_micros: snapshot.balance_micros,
            equity_micros: snapshot.equity_micros,
        };
        if let Some(trigger) = evaluate(&self.config.limits, &self.session.stats, &inp) {
            self.enter_cooldown(now, trigger);
            return;
        }

        self.status_line = "Monitoring normal.".to_string();

        let Self {
            pairs,
            broker,
            gate,
            session,
            config,
            ..
        } = self;
        for pair in pairs.iter_mut() {
            pair_tick(
                pair,
                broker.as_mut(),
                gate,
                &mut session.stats,
                &snapshot,
                now,
                &config.account,
            );
        }
    }

    fn tick_cooldown(&mut self, now: DateTime<Utc>) {
        let resume = match self.cooldown_until {
            Some(r) => r,
            // Defensive: cooldown without a resume time resumes immediately.
            None => now,
        };
        if now < resume {
            self.refresh_account_quietly();
            return;
        }

        // Resume is due, but never resume into a closed market.
        if pit_cooldown::market_closed(now) {
            let open = pit_cooldown::next_market_open(now, self.config.timezone, &self.config.cooldown);
            if Some(open) != self.cooldown_until {
                tracing::info!(account = %self.config.account, resume = %open, "market closed at resume; extending cooldown");
                self.cooldown_until = Some(open);
                self.status_line = format!("Market closed. Cooldown extended to {open}.");
            }
            return;
        }

        match self.broker.account() {
            Ok(snapshot) => {
                self.last_account = snapshot;
                self.session = Session::fresh(now, snapshot);
                self.gate.reset();
                self.cooldown_until = None;
                self.last_trigger = None;
                self.transition(EngineEvent::CooldownElapsed);
                self.status_line = "Cooldown finished. New session started.".to_string();
                tracing::info!(
                    account = %self.config.account,
                    balance_micros = snapshot.balance_micros,
                    "cooldown finished; session re-baselined"
                );
            }
            Err(e) => {
                tracing::warn!(account = %self.config.account, error = %e, "account fetch failed at resume; staying in cooldown");
                self.status_line = format!("Broker error at resume: {e}");
            }
        }
    }

    fn enter_cooldown(&mut self, now: DateTime<Utc>, trigger: RiskTrigger) {
        let resume = pit_cooldown::resume_at(&self.config.cooldown, now, self.config.timezone);
        tracing::warn!(
            account = %self.config.account,
            reason = %trigger,
            resume = %resume,
            "risk trigger; entering cooldown"
        );

        // Close everything immediately; leftovers are logged, not retried
        // beyond the next tick's view of the world.
        match self.close_open_positions() {
            Ok(0) => {}
            Ok(remaining) => {
                tracing::warn!(account = %self.config.account, remaining, "positions left open entering cooldown");
            }
            Err(e) => {
                tracing::warn!(account = %self.config.account, error = %e, "close-all failed entering cooldown");
            }
        }

        self.status_line = format!("{} triggered. Cooldown until {resume}.", trigger.rule.code());
        self.cooldown_until = Some(resume);
        self.last_trigger = Some(trigger);
        self.transition(EngineEvent::RiskTriggered);
    }

    /// Keep balance/equity fresh for status while idle in cooldown.
    fn refresh_account_quietly(&mut self) {
        match self.broker.account() {
            Ok(snapshot) => self.last_account = snapshot,
            Err(e) => tracing::debug!(account = %self.config.account, error = %e, "account refresh failed in cooldown"),
        }
    }

    fn transition(&mut self, event: EngineEvent) {
        match apply(self.mode, event) {
            Ok(next) => {
                if next != self.mode {
                    tracing::info!(
                        account = %self.config.account,
                        from = %self.mode,
                        to = %next,
                        "engine mode changed"
                    );
                    self.mode = next;
                }
            }
            Err(e) => {
                tracing::error!(account = %self.config.account, error = %e, "illegal transition refused");
            }
        }
    }

    fn make_status(&mut self, now: DateTime<Utc>) -> EngineStatus {
        self.seq += 1;
        EngineStatus {
            account: self.config.account.clone(),
            session_id: self.session.id,
            seq: self.seq,
            ts_utc: now,
            mode: self.mode,
            status_line: self.status_line.clone(),
            uptime_secs: (now - self.started_at).num_seconds().max(0) as u64,
            balance_micros: self.last_account.balance_micros,
            equity_micros: self.last_account.equity_micros,
            session_pnl_micros: self.last_account.equity_micros
                - self.session.stats.initial_balance_micros,
            cooldown_until_utc: self.cooldown_until,
            config_hash: self.config.config_hash.clone(),
            pairs: self
                .pairs
                .iter()
                .map(|p| PairStatus {
                    symbol: p.config.symbol.clone(),
                    timeframe: p.config.timeframe,
                    entry_strategy: p.config.entry.id.clone(),
                    exit_strategy: p.config.exit.as_ref().map(|e| e.id.clone()),
                    bid_micros: p.last_bid_micros,
                    spread_micros: p.last_spread_micros,
                    open_positions: p.last_open_positions,
                    disabled_reason: p.disabled_reason.clone(),
                })
                .collect(),
        }
    }
}

// -- per-pair pipeline ------------------------------------------------------

/// Quote fetch, exit pass, entry signal, gates, sizing, placement, for one
/// pair. Errors here affect this pair and this tick only.
#[allow(clippy::too_many_arguments)]
fn pair_tick(
    pair: &mut PairRuntime,
    broker: &mut dyn BrokerGateway,
    gate: &mut OrderGate,
    stats: &mut SessionStats,
    account: &AccountSnapshot,
    now: DateTime<Utc>,
    account_id: &pit_schemas::AccountId,
) {
    if !pair.is_active() {
        return;
    }
    let symbol = pair.config.symbol.clone();

    let quote = match broker.quote(&symbol) {
        Ok(q) => q,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "quote fetch failed; skipping pair this tick");
            return;
        }
    };
    pair.last_bid_micros = quote.bid_micros;
    pair.last_spread_micros = quote.spread_micros();

    let bars = match broker.recent_bars(&symbol, pair.config.timeframe, BARS_WINDOW) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "bar fetch failed; skipping pair this tick");
            return;
        }
    };
    let positions = match broker.open_positions(Some(pair.config.magic)) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "position fetch failed; skipping pair this tick");
            return;
        }
    };
    pair.last_open_positions = positions.len() as u32;

    let market = MarketState {
        symbol: symbol.clone(),
        timeframe: pair.config.timeframe,
        quote: quote.clone(),
        bars: RecentBars::new(BARS_WINDOW, bars),
        open_position_count: positions.len() as u32,
    };

    if let Some(exit) = pair.exit.as_mut() {
        if let Some(decision) = exit.evaluate_exit(&positions, &market) {
            apply_close_decision(&symbol, decision, &positions, broker, stats);
        }
    }

    let Some(entry) = pair.entry.as_mut() else {
        return;
    };
    let Some(signal) = entry.evaluate_entry(&market) else {
        return;
    };
    tracing::info!(%symbol, side = ?signal.side, comment = %signal.comment, "entry signal");

    // Gates are account-wide: total open positions, time since last order.
    let total_open = match broker.open_positions(None) {
        Ok(p) => p.len() as u32,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "position count failed; signal dropped");
            return;
        }
    };
    if let Err(refusal) = gate.check(now.timestamp(), total_open) {
        tracing::info!(%symbol, %refusal, "signal ignored");
        return;
    }

    let entry_price = match signal.side {
        Side::Buy => quote.ask_micros,
        Side::Sell => quote.bid_micros,
    };
    let volume = match size_position(
        pair.config.sizing,
        account.balance_micros,
        entry_price,
        signal.sl_micros,
        pair.config.contract_size,
    ) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "sizing failed; order not placed");
            return;
        }
    };

    let req = OrderRequest {
        symbol: symbol.clone(),
        side: signal.side,
        volume_micros: volume,
        sl_micros: signal.sl_micros,
        tp_micros: signal.tp_micros,
        magic: pair.config.magic,
    };
    match broker.place_order(&req) {
        Ok(placed) => {
            gate.record_placement(now.timestamp());
            tracing::info!(
                account = %account_id,
                %symbol,
                ticket = placed.ticket,
                fill_micros = placed.fill_price_micros,
                "order placed"
            );
        }
        // No retry: the next signal gets a fresh attempt.
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "order placement failed");
        }
    }
}

/// Close/modify per an exit strategy's decision. Tickets the pair does not
/// own are logged and ignored rather than treated as fatal.
fn apply_close_decision(
    symbol: &str,
    decision: CloseDecision,
    positions: &[Position],
    broker: &mut dyn BrokerGateway,
    stats: &mut SessionStats,
) {
    let owned: BTreeSet<u64> = positions.iter().map(|p| p.ticket).collect();

    for ticket in decision.close_tickets {
        if !owned.contains(&ticket) {
            tracing::warn!(%symbol, ticket, "exit strategy referenced an unowned ticket; ignoring");
            continue;
        }
        match broker.close_position(ticket) {
            Ok(pnl) => {
                stats.record_trade_result(pnl);
                tracing::info!(%symbol, ticket, pnl_micros = pnl, "smart exit closed position");
            }
            Err(e) => {
                tracing::warn!(%symbol, ticket, error = %e, "smart exit close failed; position left open");
            }
        }
    }

    for (ticket, sl) in decision.sl_updates {
        if !owned.contains(&ticket) {
            tracing::warn!(%symbol, ticket, "exit strategy modified an unowned ticket; ignoring");
            continue;
        }
        if let Err(e) = broker.modify_stop_loss(ticket, sl) {
            tracing::warn!(%symbol, ticket, error = %e, "stop-loss modification failed");
        }
    }
}

//! Decision Engine: the single-threaded signal-to-execution loop
//!
//! The engine owns every piece of mutating state (position, PnL, signal,
//! gear and execution snapshots) and runs two cadences inside one
//! `tokio::select!` loop:
//!   - bar tick: detect a newly closed hourly bar, evaluate the signal, the
//!     gear and the guard chain, and enter when everything passes
//!   - position tick: while a position is open, mark it, run the risk and
//!     signal exit routes, and close it when either fires
//!
//! Every tick appends exactly one event to the journal. Broker reads happen
//! before any write, so a failed read skips the tick with nothing persisted.
//! The bar that fires an entry is marked consumed before the position is
//! opened, and an exit carries its realized result in the FLAT write, so a
//! failed write can skip an action but never repeat or lose one.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapters::{normalize_candles, notify_detached, BrokerGateway, NotificationSink};
use crate::config::AppConfig;
use crate::coordination::{QuoteCache, QuoteSlot};
use crate::domain::{
    CandleMeta, EntryContext, ExecutionIntent, ExecutionSnapshot, ExitRoute, Gear, InstrumentRef,
    OrderBasket, PositionSide, Quote, SignalStateSnapshot, SpotSignal, VixGearState,
};
use crate::error::{GearError, Result};
use crate::persistence::{EventKind, EventLog, Storage};
use crate::strategy::indicators::closed_hourly_bars;
use crate::strategy::{
    compute_snapshot, evaluate_exit, realized_delta, signal_exit_flag, BasketBuilder,
    ExecutionGate, GateInputs, IndicatorParams, PendingEntryTracker, PnLEngine,
    PositionLifecycle, RiskGovernor, SpotSignalGenerator, VixGearSelector,
};
use crate::supervisor::IssueTracker;

/// Collaborators handed to the engine at startup
pub struct EngineDeps {
    pub gateway: Arc<dyn BrokerGateway>,
    pub storage: Storage,
    pub notifier: Arc<dyn NotificationSink>,
    pub quotes: Arc<QuoteCache>,
    /// Resolved near-month future used for the basis guard
    pub future: InstrumentRef,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No new closed bar, or a position check that held
    Heartbeat,
    /// New bar evaluated while a position is open
    SignalUpdated { bar_epoch: i64 },
    /// New bar evaluated while flat; the gate decided to wait
    Decision(ExecutionIntent),
    Entered(OrderBasket),
    Exited { route: ExitRoute, realized: Decimal },
    /// The tick failed and was skipped; carries the error code
    Failed { code: &'static str },
}

/// Event kind and payload produced by a successful tick
struct TickReport {
    kind: EventKind,
    data: Value,
    outcome: TickOutcome,
}

impl TickReport {
    fn new(kind: EventKind, data: Value, outcome: TickOutcome) -> Self {
        Self {
            kind,
            data,
            outcome,
        }
    }
}

pub struct DecisionEngine {
    config: AppConfig,
    gateway: Arc<dyn BrokerGateway>,
    notifier: Arc<dyn NotificationSink>,
    quotes: Arc<QuoteCache>,
    future: InstrumentRef,

    events: EventLog,
    storage: Storage,
    issues: IssueTracker,

    params: IndicatorParams,
    signals: SpotSignalGenerator,
    gears: VixGearSelector,
    gate: ExecutionGate,
    basket: BasketBuilder,
    risk: RiskGovernor,

    lifecycle: PositionLifecycle,
    pnl: PnLEngine,
    signal_state: SignalStateSnapshot,
}

impl DecisionEngine {
    /// Load every persisted snapshot and record the boot event
    pub async fn start(config: AppConfig, deps: EngineDeps) -> Result<Self> {
        let storage = deps.storage;
        let lifecycle = PositionLifecycle::load(storage.clone()).await?;
        let pnl = PnLEngine::load(storage.clone()).await?;
        let signal_state: SignalStateSnapshot = storage.load().await?.unwrap_or_default();

        let mut engine = Self {
            params: IndicatorParams::from(&config.strategy),
            signals: SpotSignalGenerator::new(config.strategy.entry_rsi_max),
            gears: VixGearSelector::new(&config.gear),
            gate: ExecutionGate::new(config.gate.max_basis),
            basket: BasketBuilder::new(&config.basket),
            risk: RiskGovernor::new(&config.risk),
            issues: IssueTracker::new(storage.clone(), config.storage.issue_close_after_ok),
            events: EventLog::new(storage.clone()),
            gateway: deps.gateway,
            notifier: deps.notifier,
            quotes: deps.quotes,
            future: deps.future,
            storage,
            lifecycle,
            pnl,
            signal_state,
            config,
        };
        let settled = engine.settle_recorded_exit().await?;

        let boot = json!({
            "position": engine.lifecycle.state(),
            "pnl": engine.pnl.state(),
            "settled_exit": settled,
            "last_bar_epoch": engine.signal_state.last_bar_epoch,
            "pending": engine.signal_state.pending.is_some(),
            "future": engine.future.to_string(),
        });
        engine
            .events
            .append(EventKind::Boot, &Uuid::new_v4().to_string(), boot)
            .await?;
        info!(
            state = %engine.lifecycle.state().state,
            trade_count = engine.lifecycle.state().trade_count,
            last_bar_epoch = ?engine.signal_state.last_bar_epoch,
            "decision engine started"
        );
        Ok(engine)
    }

    pub fn lifecycle(&self) -> &PositionLifecycle {
        &self.lifecycle
    }

    pub fn pnl(&self) -> &PnLEngine {
        &self.pnl
    }

    pub fn signal_state(&self) -> &SignalStateSnapshot {
        &self.signal_state
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn open_issues(&self) -> usize {
        self.issues.open_issues()
    }

    /// Coarse cadence: evaluate the newest closed hourly bar once
    pub async fn bar_tick(&mut self) -> TickOutcome {
        let trace_id = Uuid::new_v4().to_string();
        let span = info_span!("bar_tick", %trace_id);
        let result = self.evaluate_bar().instrument(span).await;
        self.finish_tick("bar", &trace_id, result).await
    }

    /// Tight cadence: mark and risk-check the open position
    pub async fn position_tick(&mut self) -> TickOutcome {
        let trace_id = Uuid::new_v4().to_string();
        let span = info_span!("position_tick", %trace_id);
        let result = self.monitor_position().instrument(span).await;
        self.finish_tick("position", &trace_id, result).await
    }

    /// Main loop, returns once shutdown is signalled and the current tick
    /// has finished writing.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let mut bar_tick =
            tokio::time::interval(Duration::from_secs(self.config.engine.bar_poll_secs));
        let mut risk_tick =
            tokio::time::interval(Duration::from_secs(self.config.engine.risk_poll_secs));
        bar_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        risk_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            bar_poll_secs = self.config.engine.bar_poll_secs,
            risk_poll_secs = self.config.engine.risk_poll_secs,
            "decision loop running"
        );

        loop {
            tokio::select! {
                _ = bar_tick.tick() => {
                    let outcome = self.bar_tick().await;
                    debug!(?outcome, "bar tick done");
                }

                _ = risk_tick.tick() => {
                    if self.lifecycle.state().state.is_open() {
                        let outcome = self.position_tick().await;
                        debug!(?outcome, "position tick done");
                    }
                }

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        let state = self.lifecycle.state();
        self.events
            .append(
                EventKind::Shutdown,
                &Uuid::new_v4().to_string(),
                json!({ "state": state.state, "trade_count": state.trade_count }),
            )
            .await?;
        info!("decision loop stopped");
        Ok(())
    }

    async fn finish_tick(
        &mut self,
        tick: &str,
        trace_id: &str,
        result: Result<TickReport>,
    ) -> TickOutcome {
        let (kind, data, outcome) = match result {
            Ok(report) => {
                if let Err(e) = self.issues.mark_healthy().await {
                    warn!(error = %e, "failed to update issue journal");
                }
                (report.kind, report.data, report.outcome)
            }
            Err(e) => {
                let code = e.code();
                error!(tick, code, error = %e, "tick skipped");
                let details = json!({ "tick": tick, "trace_id": trace_id, "error": e.to_string() });
                if let Err(track_err) = self.issues.track(code, &e.to_string(), details).await {
                    warn!(error = %track_err, "failed to update issue journal");
                }
                (
                    EventKind::Error,
                    json!({ "tick": tick, "code": code, "error": e.to_string() }),
                    TickOutcome::Failed { code },
                )
            }
        };

        if let Err(e) = self.events.append(kind, trace_id, data).await {
            error!(tick, error = %e, "failed to append event");
        }
        outcome
    }

    /// Book an exit whose PnL write did not land when it happened
    async fn settle_recorded_exit(&mut self) -> Result<Option<Decimal>> {
        let Some(booking) = self
            .lifecycle
            .state()
            .unbooked_exit(self.pnl.state())
            .cloned()
        else {
            return Ok(None);
        };
        self.pnl.book_exit(&booking).await?;
        warn!(
            trade_count = booking.trade_count,
            realized_delta = %booking.realized_delta,
            "booked exit recorded by an earlier tick"
        );
        Ok(Some(booking.realized_delta))
    }

    /// Fresh quote or an adapter error naming the slot
    fn quote(&self, slot: QuoteSlot) -> Result<Quote> {
        self.quotes
            .get(slot, self.max_quote_age())
            .ok_or_else(|| {
                GearError::adapter("quote", format!("{} quote missing or stale", slot.as_str()))
            })
    }

    fn max_quote_age(&self) -> Duration {
        Duration::from_secs(self.config.engine.max_quote_age_secs)
    }

    async fn evaluate_bar(&mut self) -> Result<TickReport> {
        self.settle_recorded_exit().await?;

        let broker = &self.config.broker;
        let interval_mins = broker.candle_interval_mins;
        let end = Utc::now().timestamp();
        let start = end - i64::from(broker.lookback_hours) * 3600;

        let raw = self
            .gateway
            .get_candles(&broker.spot_exchange, &broker.spot_token, interval_mins, start, end)
            .await?;
        let meta = CandleMeta {
            exchange: broker.spot_exchange.clone(),
            token: broker.spot_token.clone(),
            interval: format!("{interval_mins}m"),
            ..CandleMeta::default()
        };
        let pack = normalize_candles(&raw, meta)?;

        let bars = closed_hourly_bars(
            &pack.rows,
            self.config.strategy.session_offset_secs,
            i64::from(interval_mins) * 60,
        );
        let Some(bar_epoch) = bars.last().map(|b| b.epoch) else {
            return Err(GearError::contract(format!(
                "no closed hourly bar in {} candles",
                pack.len()
            )));
        };

        if self
            .signal_state
            .last_bar_epoch
            .is_some_and(|last| bar_epoch <= last)
        {
            debug!(bar_epoch, "no new closed bar");
            return Ok(TickReport::new(
                EventKind::Heartbeat,
                json!({ "bar_epoch": bar_epoch, "state": self.lifecycle.state().state }),
                TickOutcome::Heartbeat,
            ));
        }

        let snapshot = compute_snapshot(&bars, &self.params)?;
        let signal = self.signals.evaluate(&snapshot);
        info!(
            bar_epoch,
            close = snapshot.close,
            rsi = snapshot.rsi,
            direction = snapshot.direction.as_str(),
            signal = signal.state.as_str(),
            reason = %signal.reason,
            "closed bar evaluated"
        );

        if self.lifecycle.state().state.is_open() {
            return self.record_open_bar(bar_epoch, signal).await;
        }
        self.route_flat_bar(bar_epoch, signal).await
    }

    /// A new bar while a position is open only refreshes the signal that the
    /// position tick's exit route reads. Nothing stays pending across an open
    /// position.
    async fn record_open_bar(&mut self, bar_epoch: i64, signal: SpotSignal) -> Result<TickReport> {
        if self.signal_state.pending.is_some() {
            warn!(bar_epoch, "dropping pending entry while a position is open");
        }
        let next = SignalStateSnapshot {
            last_signal: Some(signal),
            last_bar_epoch: Some(bar_epoch),
            pending: None,
        };
        self.storage.save(&next).await?;
        self.signal_state = next;

        Ok(TickReport::new(
            EventKind::SignalSnapshot,
            json!({ "bar_epoch": bar_epoch, "signal": self.signal_state.last_signal }),
            TickOutcome::SignalUpdated { bar_epoch },
        ))
    }

    async fn route_flat_bar(&mut self, bar_epoch: i64, signal: SpotSignal) -> Result<TickReport> {
        let view = PendingEntryTracker::observe(self.signal_state.pending.as_ref(), bar_epoch, &signal);

        // Quotes only matter once the guard chain can get past the pending
        // guard; on the confirming bar a missing quote skips the tick.
        let (spot, future, vix) = if view.pending_ok {
            (
                Some(self.quote(QuoteSlot::Spot)?),
                Some(self.quote(QuoteSlot::Future)?),
                Some(self.quote(QuoteSlot::Vix)?),
            )
        } else {
            let age = self.max_quote_age();
            (
                self.quotes.get(QuoteSlot::Spot, age),
                self.quotes.get(QuoteSlot::Future, age),
                self.quotes.get(QuoteSlot::Vix, age),
            )
        };
        let prev_close = match (&spot, view.pending_ok) {
            (Some(q), _) if q.close.is_some() => q.close,
            (_, true) => {
                return Err(GearError::adapter(
                    "quote",
                    "spot quote carries no previous close",
                ))
            }
            _ => None,
        };

        let capital = self.config.risk.capital;
        let gear_state = vix.map(|q| {
            let context = self.gears.select(q.last_price);
            let lots = self.gears.size_lots(context.gear, capital);
            VixGearState {
                context,
                lots,
                capital,
            }
        });
        let (gear, lots) = gear_state
            .as_ref()
            .map_or((Gear::NoTrade, 0), |g| (g.context.gear, g.lots));

        let spot_price = spot.map_or(f64::NAN, |q| q.last_price);
        let intent = self.gate.route(&GateInputs {
            signal: &view.gate_signal,
            pending_ok: view.pending_ok,
            close: signal.snapshot.close,
            prev_close: prev_close.unwrap_or(f64::NAN),
            spot: spot_price,
            future: future.map_or(f64::NAN, |q| q.last_price),
            gear,
            lots,
        });

        let entry = if intent.is_execute() {
            let basket = self.basket.build(gear, spot_price, lots)?;
            let entry = EntryContext {
                gear,
                lots,
                quantity: self.basket.position_quantity(lots)?,
                kind: basket.position_kind(),
                atr_at_entry: view.gate_signal.snapshot.atr,
            };
            Some((basket, entry))
        } else {
            None
        };
        let basket = entry.as_ref().map(|(basket, _)| basket.clone());

        // Bar marked consumed before the position opens
        let next = SignalStateSnapshot {
            last_signal: Some(signal),
            last_bar_epoch: Some(bar_epoch),
            pending: view.next.clone(),
        };
        self.storage.save(&next).await?;
        self.signal_state = next;
        if let Some(state) = &gear_state {
            self.storage.save(state).await?;
        }
        self.storage
            .save(&ExecutionSnapshot {
                last_intent: Some(intent.clone()),
                basket: basket.clone(),
            })
            .await?;

        if let Some((_, context)) = entry {
            self.lifecycle
                .on_entry(PositionSide::Long, spot_price, context)
                .await?;
        }

        let data = json!({
            "bar_epoch": bar_epoch,
            "pending": view.status.as_str(),
            "signal": self.signal_state.last_signal,
            "gear": gear_state,
            "intent": intent,
            "basket": basket,
        });

        match basket {
            Some(basket) => {
                info!(
                    gear = %gear,
                    lots,
                    spot = spot_price,
                    trade_count = self.lifecycle.state().trade_count,
                    "entry executed"
                );
                notify_detached(
                    &self.notifier,
                    format!(
                        "ENTRY {gear} lots={lots} spot={spot_price:.2} legs={}",
                        basket.legs.len()
                    ),
                );
                Ok(TickReport::new(EventKind::Entry, data, TickOutcome::Entered(basket)))
            }
            None => {
                info!(pending = view.status.as_str(), reason = %intent.reason, "gate decided to wait");
                Ok(TickReport::new(EventKind::Decision, data, TickOutcome::Decision(intent)))
            }
        }
    }

    async fn monitor_position(&mut self) -> Result<TickReport> {
        self.settle_recorded_exit().await?;

        let position = self.lifecycle.state().clone();
        let (Some(entry_price), Some(entry)) = (position.entry_price, position.entry.clone()) else {
            return Ok(TickReport::new(
                EventKind::Heartbeat,
                json!({ "state": position.state }),
                TickOutcome::Heartbeat,
            ));
        };

        let price = self.quote(QuoteSlot::Spot)?.last_price;
        self.lifecycle.on_hold().await?;

        let unrealized = self
            .pnl
            .on_tick(entry_price, price, entry.quantity)
            .await?
            .unrealized;
        let risk = self.risk.evaluate(&position, price, unrealized);
        let signal_flag = self
            .signal_state
            .last_signal
            .as_ref()
            .is_some_and(|s| signal_exit_flag(&s.snapshot, self.config.strategy.exit_rsi_mid));
        let decision = evaluate_exit(risk.exit_now, signal_flag);

        let Some(route) = decision.route.filter(|_| decision.exit_now) else {
            return Ok(TickReport::new(
                EventKind::Heartbeat,
                json!({
                    "state": self.lifecycle.state().state,
                    "price": price,
                    "unrealized": unrealized,
                    "risk": risk.reason,
                }),
                TickOutcome::Heartbeat,
            ));
        };

        let friction = self.config.risk.friction_points_per_lot * Decimal::from(entry.lots);
        let realized = realized_delta(entry_price, price, entry.quantity, friction)?;

        self.lifecycle.on_exit(price, realized).await?;
        if let Some(booking) = self.lifecycle.state().last_exit.clone() {
            self.pnl.book_exit(&booking).await?;
        }
        let pnl = self.pnl.state().clone();
        warn!(
            route = route.as_str(),
            reason = %decision.reason,
            price,
            %realized,
            equity = %pnl.equity,
            "position exited"
        );
        notify_detached(
            &self.notifier,
            format!(
                "EXIT {} price={price:.2} realized={realized} equity={}",
                route.as_str(),
                pnl.equity
            ),
        );

        Ok(TickReport::new(
            EventKind::Exit,
            json!({
                "route": route.as_str(),
                "reason": decision.reason,
                "risk": risk.reason,
                "entry_price": entry_price,
                "exit_price": price,
                "quantity": entry.quantity,
                "realized_delta": realized,
                "pnl": pnl,
            }),
            TickOutcome::Exited { route, realized },
        ))
    }
}

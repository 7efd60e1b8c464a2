//! Exposure ledger: daily trade count and open positions
//!
//! The ledger is the single source of truth the gate measures limits
//! against. Submission follows a reserve/commit protocol: [`begin_trade`]
//! atomically re-checks the daily and exposure ceilings and reserves the
//! notional, [`PendingTrade::commit`] turns the reservation into a recorded
//! fill once the exchange acknowledges, and dropping an uncommitted
//! reservation releases it. A burst of concurrent submissions can therefore
//! never overshoot the ceilings, no matter how the gate calls interleave.
//!
//! [`begin_trade`]: ExposureLedger::begin_trade

use agent_core::Side;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// An open position in a single outcome token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    /// Catalog id of the market
    pub market_id: String,

    /// Outcome token id the position is held in
    pub token_id: String,

    /// Shares held
    pub quantity: Decimal,

    /// Volume-weighted average entry price
    pub entry_price: Decimal,

    /// When the position was first opened
    pub opened_at: DateTime<Utc>,
}

impl OpenPosition {
    /// Collateral tied up in this position.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.entry_price
    }
}

/// A fill to record against the ledger
#[derive(Debug, Clone)]
pub struct Fill {
    pub market_id: String,
    pub token_id: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Why a reservation was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReserveError {
    #[error("daily trade limit reached ({used}/{limit})")]
    DailyLimitReached { used: u32, limit: u32 },

    #[error("exposure limit exceeded (open {open} + pending {pending} + requested {requested} > {limit})")]
    ExposureExceeded {
        open: Decimal,
        pending: Decimal,
        requested: Decimal,
        limit: Decimal,
    },
}

#[derive(Debug)]
struct LedgerState {
    day: NaiveDate,
    trades_today: u32,
    pending_trades: u32,
    pending_exposure: Decimal,
    positions: HashMap<String, OpenPosition>,
}

impl LedgerState {
    fn roll(&mut self, today: NaiveDate) {
        if self.day != today {
            debug!(
                "Rolling ledger day {} -> {} (resetting daily count)",
                self.day, today
            );
            self.day = today;
            self.trades_today = 0;
        }
    }

    fn open_exposure(&self) -> Decimal {
        self.positions.values().map(OpenPosition::notional).sum()
    }
}

/// Thread-safe exposure ledger
#[derive(Debug)]
pub struct ExposureLedger {
    state: RwLock<LedgerState>,
}

impl ExposureLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState {
                day: Utc::now().date_naive(),
                trades_today: 0,
                pending_trades: 0,
                pending_exposure: Decimal::ZERO,
                positions: HashMap::new(),
            }),
        }
    }

    /// Trades recorded so far today (rolls the day over if needed).
    pub fn trades_today(&self) -> u32 {
        let mut state = self.state.write();
        state.roll(Utc::now().date_naive());
        state.trades_today
    }

    /// Total collateral tied up in open positions.
    pub fn open_exposure(&self) -> Decimal {
        self.state.read().open_exposure()
    }

    /// Collateral reserved by in-flight submissions.
    pub fn pending_exposure(&self) -> Decimal {
        self.state.read().pending_exposure
    }

    /// Current position in a token, if any.
    pub fn position(&self, token_id: &str) -> Option<OpenPosition> {
        self.state.read().positions.get(token_id).cloned()
    }

    /// All open positions.
    pub fn positions(&self) -> Vec<OpenPosition> {
        self.state.read().positions.values().cloned().collect()
    }

    /// Atomically re-check the ceilings and reserve `notional` for a trade
    /// about to be submitted.
    ///
    /// This is the last line of defense between the gate's earlier check and
    /// the actual submission; both the daily count and the exposure ceiling
    /// include reservations other tasks hold right now.
    pub fn begin_trade(
        self: &Arc<Self>,
        notional: Decimal,
        max_trades_per_day: u32,
        max_exposure_total: Decimal,
    ) -> Result<PendingTrade, ReserveError> {
        let mut state = self.state.write();
        state.roll(Utc::now().date_naive());

        let used = state.trades_today + state.pending_trades;
        if used >= max_trades_per_day {
            return Err(ReserveError::DailyLimitReached {
                used,
                limit: max_trades_per_day,
            });
        }

        let open = state.open_exposure();
        if open + state.pending_exposure + notional > max_exposure_total {
            return Err(ReserveError::ExposureExceeded {
                open,
                pending: state.pending_exposure,
                requested: notional,
                limit: max_exposure_total,
            });
        }

        state.pending_trades += 1;
        state.pending_exposure += notional;

        Ok(PendingTrade {
            ledger: Arc::clone(self),
            notional,
            settled: false,
        })
    }

    /// Serializable view of the durable ledger state.
    ///
    /// In-flight reservations are deliberately excluded; they belong to the
    /// process that holds them.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read();
        LedgerSnapshot {
            day: state.day,
            trades_today: state.trades_today,
            positions: state.positions.values().cloned().collect(),
        }
    }

    /// Replace the durable state with a previously taken snapshot.
    pub fn restore(&self, snapshot: LedgerSnapshot) {
        let mut state = self.state.write();
        state.day = snapshot.day;
        state.trades_today = snapshot.trades_today;
        state.positions = snapshot
            .positions
            .into_iter()
            .map(|p| (p.token_id.clone(), p))
            .collect();
    }

    fn settle(&self, notional: Decimal, fill: Option<Fill>) {
        let mut state = self.state.write();
        state.pending_trades = state.pending_trades.saturating_sub(1);
        state.pending_exposure -= notional;
        if state.pending_exposure < Decimal::ZERO {
            warn!("Pending exposure went negative; clamping to zero");
            state.pending_exposure = Decimal::ZERO;
        }

        let Some(fill) = fill else {
            return;
        };

        state.roll(Utc::now().date_naive());
        state.trades_today += 1;

        match fill.side {
            Side::Buy => match state.positions.get_mut(&fill.token_id) {
                Some(position) => {
                    let old_notional = position.notional();
                    position.quantity += fill.quantity;
                    if position.quantity > Decimal::ZERO {
                        position.entry_price =
                            (old_notional + fill.quantity * fill.price) / position.quantity;
                    }
                }
                None => {
                    state.positions.insert(
                        fill.token_id.clone(),
                        OpenPosition {
                            market_id: fill.market_id,
                            token_id: fill.token_id,
                            quantity: fill.quantity,
                            entry_price: fill.price,
                            opened_at: Utc::now(),
                        },
                    );
                }
            },
            Side::Sell => {
                if let Some(position) = state.positions.get_mut(&fill.token_id) {
                    position.quantity -= fill.quantity;
                    if position.quantity <= Decimal::ZERO {
                        state.positions.remove(&fill.token_id);
                    }
                }
            }
        }
    }
}

impl Default for ExposureLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// A held reservation for one trade about to be submitted.
///
/// Dropped without [`commit`], the reservation is released and the ledger is
/// unchanged, which is exactly what a failed or rejected submission needs.
///
/// [`commit`]: PendingTrade::commit
#[derive(Debug)]
pub struct PendingTrade {
    ledger: Arc<ExposureLedger>,
    notional: Decimal,
    settled: bool,
}

impl PendingTrade {
    /// Record the acknowledged fill and release the reservation.
    pub fn commit(mut self, fill: Fill) {
        self.settled = true;
        self.ledger.settle(self.notional, Some(fill));
    }
}

impl Drop for PendingTrade {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.settle(self.notional, None);
        }
    }
}

/// Durable ledger state for persistence across restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub day: NaiveDate,
    pub trades_today: u32,
    pub positions: Vec<OpenPosition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy(token: &str, quantity: Decimal, price: Decimal) -> Fill {
        Fill {
            market_id: "m1".to_string(),
            token_id: token.to_string(),
            side: Side::Buy,
            quantity,
            price,
        }
    }

    #[test]
    fn commit_records_trade_and_position() {
        let ledger = Arc::new(ExposureLedger::new());

        let pending = ledger.begin_trade(dec!(4.5), 10, dec!(500)).unwrap();
        pending.commit(buy("111", dec!(10), dec!(0.45)));

        assert_eq!(ledger.trades_today(), 1);
        assert_eq!(ledger.open_exposure(), dec!(4.5));
        assert_eq!(ledger.pending_exposure(), dec!(0));

        let position = ledger.position("111").unwrap();
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.entry_price, dec!(0.45));
    }

    #[test]
    fn dropped_reservation_releases_exposure() {
        let ledger = Arc::new(ExposureLedger::new());

        {
            let _pending = ledger.begin_trade(dec!(100), 10, dec!(500)).unwrap();
            assert_eq!(ledger.pending_exposure(), dec!(100));
        }

        assert_eq!(ledger.pending_exposure(), dec!(0));
        assert_eq!(ledger.trades_today(), 0);
    }

    #[test]
    fn reservations_count_against_the_ceiling() {
        let ledger = Arc::new(ExposureLedger::new());

        let _held = ledger.begin_trade(dec!(400), 10, dec!(500)).unwrap();
        let refused = ledger.begin_trade(dec!(200), 10, dec!(500));

        assert!(matches!(
            refused,
            Err(ReserveError::ExposureExceeded { .. })
        ));
    }

    #[test]
    fn daily_limit_includes_pending_trades() {
        let ledger = Arc::new(ExposureLedger::new());

        let _a = ledger.begin_trade(dec!(1), 2, dec!(500)).unwrap();
        let _b = ledger.begin_trade(dec!(1), 2, dec!(500)).unwrap();

        assert!(matches!(
            ledger.begin_trade(dec!(1), 2, dec!(500)),
            Err(ReserveError::DailyLimitReached { used: 2, limit: 2 })
        ));
    }

    #[test]
    fn buys_merge_into_volume_weighted_entry() {
        let ledger = Arc::new(ExposureLedger::new());

        ledger
            .begin_trade(dec!(4), 10, dec!(500))
            .unwrap()
            .commit(buy("111", dec!(10), dec!(0.40)));
        ledger
            .begin_trade(dec!(6), 10, dec!(500))
            .unwrap()
            .commit(buy("111", dec!(10), dec!(0.60)));

        let position = ledger.position("111").unwrap();
        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.entry_price, dec!(0.50));
    }

    #[test]
    fn sells_reduce_and_close_positions() {
        let ledger = Arc::new(ExposureLedger::new());

        ledger
            .begin_trade(dec!(4), 10, dec!(500))
            .unwrap()
            .commit(buy("111", dec!(10), dec!(0.40)));

        ledger.begin_trade(dec!(2), 10, dec!(500)).unwrap().commit(Fill {
            market_id: "m1".to_string(),
            token_id: "111".to_string(),
            side: Side::Sell,
            quantity: dec!(4),
            price: dec!(0.50),
        });
        assert_eq!(ledger.position("111").unwrap().quantity, dec!(6));

        ledger.begin_trade(dec!(3), 10, dec!(500)).unwrap().commit(Fill {
            market_id: "m1".to_string(),
            token_id: "111".to_string(),
            side: Side::Sell,
            quantity: dec!(6),
            price: dec!(0.50),
        });
        assert!(ledger.position("111").is_none());
    }

    #[test]
    fn restore_with_stale_day_resets_count_on_read() {
        let ledger = Arc::new(ExposureLedger::new());
        ledger.restore(LedgerSnapshot {
            day: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            trades_today: 7,
            positions: vec![],
        });

        // The persisted day is long gone, so the daily count starts fresh
        assert_eq!(ledger.trades_today(), 0);
    }

    #[test]
    fn snapshot_round_trips_positions() {
        let ledger = Arc::new(ExposureLedger::new());
        ledger
            .begin_trade(dec!(4), 10, dec!(500))
            .unwrap()
            .commit(buy("111", dec!(10), dec!(0.40)));

        let snapshot = ledger.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: LedgerSnapshot = serde_json::from_str(&json).unwrap();

        let restored = Arc::new(ExposureLedger::new());
        restored.restore(parsed);
        assert_eq!(restored.open_exposure(), dec!(4));
        assert_eq!(restored.trades_today(), 1);
    }

    #[test]
    fn concurrent_reservations_never_exceed_ceiling() {
        let ledger = Arc::new(ExposureLedger::new());
        let mut handles = Vec::new();

        // 20 threads each try to commit a 100-notional trade under a 500 cap
        for i in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                if let Ok(pending) = ledger.begin_trade(dec!(100), 100, dec!(500)) {
                    pending.commit(buy(&format!("token-{i}"), dec!(100), dec!(1)));
                    true
                } else {
                    false
                }
            }));
        }

        let committed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(committed, 5);
        assert_eq!(ledger.open_exposure(), dec!(500));
        assert_eq!(ledger.pending_exposure(), dec!(0));
    }
}

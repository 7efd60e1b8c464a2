//! The risk gate: a fixed battery of guardrails every trade passes through
//!
//! Checks run in a deterministic order and short-circuit on the first
//! violation, so a trade that trips several limits always reports the same
//! rule. Cheap ledger checks come first, market-quality checks second,
//! list-based filters third, and price sanity last.

use agent_core::{MarketSnapshot, TradeIntent};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::controls::TradingControls;
use crate::ledger::ExposureLedger;

/// The guardrails, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskRule {
    MaxTradesPerDay,
    MaxAmountPerTrade,
    MaxExposureTotal,
    MinLiquidity,
    MinVolume24h,
    MinMarketAge,
    MaxSpread,
    AssetNotAllowed,
    AssetBlocked,
    CategoryNotAllowed,
    CategoryBlocked,
    MinProbability,
    MaxProbability,
}

impl RiskRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskRule::MaxTradesPerDay => "max_trades_per_day",
            RiskRule::MaxAmountPerTrade => "max_amount_per_trade",
            RiskRule::MaxExposureTotal => "max_exposure_total",
            RiskRule::MinLiquidity => "min_liquidity",
            RiskRule::MinVolume24h => "min_volume_24h",
            RiskRule::MinMarketAge => "min_market_age",
            RiskRule::MaxSpread => "max_spread",
            RiskRule::AssetNotAllowed => "asset_not_allowed",
            RiskRule::AssetBlocked => "asset_blocked",
            RiskRule::CategoryNotAllowed => "category_not_allowed",
            RiskRule::CategoryBlocked => "category_blocked",
            RiskRule::MinProbability => "min_probability",
            RiskRule::MaxProbability => "max_probability",
        }
    }
}

impl std::fmt::Display for RiskRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one intent
#[derive(Debug, Clone, Serialize)]
pub struct RiskDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<RiskRule>,
    pub reason: String,
}

impl RiskDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            rule: None,
            reason: "all checks passed".to_string(),
        }
    }

    fn reject(rule: RiskRule, reason: String) -> Self {
        Self {
            allowed: false,
            rule: Some(rule),
            reason,
        }
    }
}

/// Point-in-time view of how much headroom remains under the limits
#[derive(Debug, Clone, Serialize)]
pub struct LimitsStatus {
    pub trades_used: u32,
    pub trades_limit: u32,
    pub open_exposure: Decimal,
    pub pending_exposure: Decimal,
    pub exposure_limit: Decimal,
}

impl LimitsStatus {
    pub fn trades_remaining(&self) -> u32 {
        self.trades_limit.saturating_sub(self.trades_used)
    }

    pub fn exposure_remaining(&self) -> Decimal {
        let used = self.open_exposure + self.pending_exposure;
        if used >= self.exposure_limit {
            Decimal::ZERO
        } else {
            self.exposure_limit - used
        }
    }
}

/// Evaluates trade intents against the configured controls
#[derive(Debug, Clone)]
pub struct RiskGate {
    controls: TradingControls,
}

impl RiskGate {
    pub fn new(controls: TradingControls) -> Self {
        Self { controls }
    }

    pub fn controls(&self) -> &TradingControls {
        &self.controls
    }

    /// Run the full battery against one intent.
    ///
    /// A missing market-quality figure (liquidity, volume, spread) rejects
    /// rather than passes; an unmeasurable market is an untradeable one.
    /// Only the creation time is exempt, since the catalog omits it for
    /// plenty of long-established markets.
    pub fn evaluate(
        &self,
        intent: &TradeIntent,
        snapshot: &MarketSnapshot,
        ledger: &ExposureLedger,
    ) -> RiskDecision {
        let c = &self.controls;

        // 1. Daily trade count
        let trades_today = ledger.trades_today();
        if trades_today >= c.max_trades_per_day {
            return rejected(
                RiskRule::MaxTradesPerDay,
                format!(
                    "daily trade count {} has reached the limit of {}",
                    trades_today, c.max_trades_per_day
                ),
            );
        }

        // 2. Per-trade notional
        let notional = intent.notional();
        if notional > c.max_amount_per_trade {
            return rejected(
                RiskRule::MaxAmountPerTrade,
                format!(
                    "trade notional {} exceeds per-trade limit {}",
                    notional, c.max_amount_per_trade
                ),
            );
        }

        // 3. Total exposure, counting in-flight reservations
        let exposure = ledger.open_exposure() + ledger.pending_exposure();
        if exposure + notional > c.max_exposure_total {
            return rejected(
                RiskRule::MaxExposureTotal,
                format!(
                    "exposure {} + trade {} exceeds total limit {}",
                    exposure, notional, c.max_exposure_total
                ),
            );
        }

        // 4. Liquidity floor
        let liquidity = snapshot.liquidity.unwrap_or(Decimal::ZERO);
        if liquidity < c.min_liquidity {
            return rejected(
                RiskRule::MinLiquidity,
                format!(
                    "liquidity {} below minimum {}",
                    liquidity, c.min_liquidity
                ),
            );
        }

        // 5. Volume floor
        let volume = snapshot.volume_24h.unwrap_or(Decimal::ZERO);
        if volume < c.min_volume_24h {
            return rejected(
                RiskRule::MinVolume24h,
                format!("24h volume {} below minimum {}", volume, c.min_volume_24h),
            );
        }

        // 6. Market age (skipped when the catalog omits the creation time)
        if let Some(age_hours) = snapshot.age_hours(Utc::now()) {
            if age_hours < c.min_market_age_hours {
                return rejected(
                    RiskRule::MinMarketAge,
                    format!(
                        "market age {}h below minimum {}h",
                        age_hours, c.min_market_age_hours
                    ),
                );
            }
        }

        // 7. Spread tolerance
        match snapshot.spread() {
            Some(spread) if spread <= c.max_spread => {}
            Some(spread) => {
                return rejected(
                    RiskRule::MaxSpread,
                    format!("spread {} exceeds tolerance {}", spread, c.max_spread),
                );
            }
            None => {
                return rejected(
                    RiskRule::MaxSpread,
                    "order book is one-sided; spread cannot be measured".to_string(),
                );
            }
        }

        // 8-9. Asset allow/block lists, keyed by the traded outcome token
        let asset = snapshot.token_id_for(intent.outcome);
        if !c.allowed_assets.is_empty() && !c.allowed_assets.iter().any(|a| a == asset) {
            return rejected(
                RiskRule::AssetNotAllowed,
                format!("asset {} is not on the allow list", asset),
            );
        }
        if c.blocked_assets.iter().any(|a| a == asset) {
            return rejected(
                RiskRule::AssetBlocked,
                format!("asset {} is on the block list", asset),
            );
        }

        // 10-11. Category allow/block lists (missing category only passes an
        // empty allow list)
        let category = snapshot.category.as_deref().unwrap_or("");
        if !c.allowed_categories.is_empty()
            && !c
                .allowed_categories
                .iter()
                .any(|cat| cat.eq_ignore_ascii_case(category))
        {
            return rejected(
                RiskRule::CategoryNotAllowed,
                format!("category '{}' is not on the allow list", category),
            );
        }
        if c.blocked_categories
            .iter()
            .any(|cat| cat.eq_ignore_ascii_case(category))
        {
            return rejected(
                RiskRule::CategoryBlocked,
                format!("category '{}' is on the block list", category),
            );
        }

        // 12-13. Implied probability band
        let price = intent.limit_price();
        if price < c.min_probability {
            return rejected(
                RiskRule::MinProbability,
                format!(
                    "implied probability {} below minimum {}",
                    price, c.min_probability
                ),
            );
        }
        if price > c.max_probability {
            return rejected(
                RiskRule::MaxProbability,
                format!(
                    "implied probability {} above maximum {}",
                    price, c.max_probability
                ),
            );
        }

        debug!(
            "Intent for market {} passed all risk checks (notional {})",
            snapshot.id, notional
        );
        RiskDecision::allow()
    }

    /// Remaining headroom under the daily and exposure limits.
    pub fn limits_status(&self, ledger: &ExposureLedger) -> LimitsStatus {
        LimitsStatus {
            trades_used: ledger.trades_today(),
            trades_limit: self.controls.max_trades_per_day,
            open_exposure: ledger.open_exposure(),
            pending_exposure: ledger.pending_exposure(),
            exposure_limit: self.controls.max_exposure_total,
        }
    }
}

fn rejected(rule: RiskRule, reason: String) -> RiskDecision {
    info!("Risk gate rejected trade: {} ({})", rule, reason);
    RiskDecision::reject(rule, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{MarketRef, Outcome, Side};
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            id: "512329".to_string(),
            title: "Will BTC close above 100k?".to_string(),
            condition_id: Some("0xabc".to_string()),
            yes_token_id: "111".to_string(),
            no_token_id: "222".to_string(),
            liquidity: Some(dec!(25000)),
            volume_24h: Some(dec!(4000)),
            best_bid: Some(dec!(0.44)),
            best_ask: Some(dec!(0.46)),
            created_at: Some(Utc::now() - Duration::days(30)),
            active: true,
            closed: false,
            category: Some("Crypto".to_string()),
            neg_risk: false,
        }
    }

    fn intent() -> TradeIntent {
        TradeIntent::new(
            MarketRef::Id("512329".to_string()),
            Side::Buy,
            Outcome::Yes,
            dec!(10),
            dec!(0.45),
        )
    }

    fn gate() -> RiskGate {
        RiskGate::new(TradingControls::default())
    }

    #[test]
    fn clean_intent_passes() {
        let ledger = Arc::new(ExposureLedger::new());
        let decision = gate().evaluate(&intent(), &snapshot(), &ledger);
        assert!(decision.allowed, "{}", decision.reason);
    }

    #[test]
    fn eleventh_trade_of_the_day_is_rejected() {
        let ledger = Arc::new(ExposureLedger::new());
        let g = gate();
        assert_eq!(g.controls().max_trades_per_day, 10);

        for i in 0..10 {
            let decision = g.evaluate(&intent(), &snapshot(), &ledger);
            assert!(decision.allowed, "trade {} should pass", i);
            ledger
                .begin_trade(dec!(4.5), 10, dec!(500))
                .unwrap()
                .commit(crate::ledger::Fill {
                    market_id: "512329".to_string(),
                    token_id: "111".to_string(),
                    side: Side::Buy,
                    quantity: dec!(10),
                    price: dec!(0.45),
                });
        }

        let decision = g.evaluate(&intent(), &snapshot(), &ledger);
        assert!(!decision.allowed);
        assert_eq!(decision.rule, Some(RiskRule::MaxTradesPerDay));
    }

    #[test]
    fn thin_market_is_rejected_for_liquidity() {
        let ledger = Arc::new(ExposureLedger::new());
        let mut snap = snapshot();
        snap.liquidity = Some(dec!(500));

        let decision = gate().evaluate(&intent(), &snap, &ledger);
        assert!(!decision.allowed);
        assert_eq!(decision.rule, Some(RiskRule::MinLiquidity));
        assert!(decision.reason.contains("500"));
        assert!(decision.reason.contains("10000"));
    }

    #[test]
    fn oversized_notional_is_rejected() {
        let ledger = Arc::new(ExposureLedger::new());
        let mut big = intent();
        big.quantity = dec!(1000); // 1000 * 0.45 = 450 > 100

        let decision = gate().evaluate(&big, &snapshot(), &ledger);
        assert!(!decision.allowed);
        assert_eq!(decision.rule, Some(RiskRule::MaxAmountPerTrade));
    }

    #[test]
    fn exposure_counts_pending_reservations() {
        let ledger = Arc::new(ExposureLedger::new());
        let _held = ledger.begin_trade(dec!(498), 10, dec!(500)).unwrap();

        let decision = gate().evaluate(&intent(), &snapshot(), &ledger);
        assert!(!decision.allowed);
        assert_eq!(decision.rule, Some(RiskRule::MaxExposureTotal));
    }

    #[test]
    fn one_sided_book_is_rejected_on_spread() {
        let ledger = Arc::new(ExposureLedger::new());
        let mut snap = snapshot();
        snap.best_ask = None;

        let decision = gate().evaluate(&intent(), &snap, &ledger);
        assert!(!decision.allowed);
        assert_eq!(decision.rule, Some(RiskRule::MaxSpread));
    }

    #[test]
    fn young_market_is_rejected_but_unknown_age_passes() {
        let ledger = Arc::new(ExposureLedger::new());

        let mut snap = snapshot();
        snap.created_at = Some(Utc::now() - Duration::hours(2));
        let decision = gate().evaluate(&intent(), &snap, &ledger);
        assert_eq!(decision.rule, Some(RiskRule::MinMarketAge));

        snap.created_at = None;
        let decision = gate().evaluate(&intent(), &snap, &ledger);
        assert!(decision.allowed, "{}", decision.reason);
    }

    #[test]
    fn asset_lists_match_the_traded_token() {
        let ledger = Arc::new(ExposureLedger::new());
        let mut controls = TradingControls::default();
        controls.allowed_assets = vec!["222".to_string()];
        let g = RiskGate::new(controls);

        // Intent trades the YES token ("111"), which is not on the allow list
        let decision = g.evaluate(&intent(), &snapshot(), &ledger);
        assert_eq!(decision.rule, Some(RiskRule::AssetNotAllowed));

        let mut no_side = intent();
        no_side.outcome = Outcome::No;
        let decision = g.evaluate(&no_side, &snapshot(), &ledger);
        assert!(decision.allowed, "{}", decision.reason);
    }

    #[test]
    fn blocked_category_is_rejected() {
        let ledger = Arc::new(ExposureLedger::new());
        let mut controls = TradingControls::default();
        controls.blocked_categories = vec!["crypto".to_string()];
        let g = RiskGate::new(controls);

        let decision = g.evaluate(&intent(), &snapshot(), &ledger);
        assert_eq!(decision.rule, Some(RiskRule::CategoryBlocked));
    }

    #[test]
    fn probability_band_applies_to_the_limit_price() {
        let ledger = Arc::new(ExposureLedger::new());
        let g = gate();

        let mut longshot = intent();
        longshot.price = dec!(0.02);
        let decision = g.evaluate(&longshot, &snapshot(), &ledger);
        assert_eq!(decision.rule, Some(RiskRule::MinProbability));

        let mut near_certain = intent();
        near_certain.price = dec!(0.98);
        let decision = g.evaluate(&near_certain, &snapshot(), &ledger);
        assert_eq!(decision.rule, Some(RiskRule::MaxProbability));
    }

    #[test]
    fn first_violation_wins() {
        // An intent that trips both the notional and liquidity rules reports
        // the notional rule, which runs earlier
        let ledger = Arc::new(ExposureLedger::new());
        let mut snap = snapshot();
        snap.liquidity = Some(dec!(1));
        let mut big = intent();
        big.quantity = dec!(1000);

        let decision = gate().evaluate(&big, &snap, &ledger);
        assert_eq!(decision.rule, Some(RiskRule::MaxAmountPerTrade));
    }

    #[test]
    fn limits_status_reports_headroom() {
        let ledger = Arc::new(ExposureLedger::new());
        ledger
            .begin_trade(dec!(100), 10, dec!(500))
            .unwrap()
            .commit(crate::ledger::Fill {
                market_id: "m".to_string(),
                token_id: "111".to_string(),
                side: Side::Buy,
                quantity: dec!(200),
                price: dec!(0.5),
            });

        let status = gate().limits_status(&ledger);
        assert_eq!(status.trades_used, 1);
        assert_eq!(status.trades_remaining(), 9);
        assert_eq!(status.exposure_remaining(), dec!(400));
    }
}

//! Reconciliation of a new signal against the currently open position.
//!
//! `decide` is a pure function; the engine performs the close/open calls the
//! decision implies.

use crate::events::{Position, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do with an existing position when a new signal arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePolicy {
    #[default]
    None,
    CloseOnProfitThreshold,
    CloseOnOppositeSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyDecision {
    /// No position: open as requested.
    Proceed,
    /// Profit target reached: close, do not reopen in this pass.
    CloseThenSkip,
    /// Already open on the requested side.
    SkipAlreadyOpen,
    /// Close the opposite position, then open the requested side.
    CloseThenProceed,
    /// Close the opposite position and stop.
    CloseOnly,
    /// Leave the opposite position untouched and do not open.
    SkipConflicting,
    /// Open the requested side alongside the opposite one (hedge).
    ProceedOppositeWithoutClosing,
}

impl PolicyDecision {
    /// The existing position must be closed first.
    #[must_use]
    pub const fn closes_existing(self) -> bool {
        matches!(self, Self::CloseThenSkip | Self::CloseThenProceed | Self::CloseOnly)
    }

    /// A new order is placed after any close.
    #[must_use]
    pub const fn opens_new(self) -> bool {
        matches!(
            self,
            Self::Proceed | Self::CloseThenProceed | Self::ProceedOppositeWithoutClosing
        )
    }

    /// Neither closes nor opens.
    #[must_use]
    pub const fn is_skip(self) -> bool {
        matches!(self, Self::SkipAlreadyOpen | Self::SkipConflicting)
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Proceed => "no open position, proceeding",
            Self::CloseThenSkip => "profit threshold reached, closing without reopening",
            Self::SkipAlreadyOpen => "position already open on the requested side",
            Self::CloseThenProceed => "closing opposite position before opening",
            Self::CloseOnly => "closing opposite position, reopening disabled",
            Self::SkipConflicting => "opposite position open, opening disabled",
            Self::ProceedOppositeWithoutClosing => "opening alongside opposite position",
        };
        f.write_str(text)
    }
}

/// Per-symbol policy inputs taken from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyParams {
    pub close_policy: ClosePolicy,
    pub open_policy: bool,
    pub target_profit_threshold: Decimal,
}

/// Evaluates the decision table, first match wins.
///
/// An opposite-side position under `CloseOnProfitThreshold` whose PnL is not
/// above the threshold falls through to the `None` rows.
#[must_use]
pub fn decide(position: Option<&Position>, requested: Side, params: &PolicyParams) -> PolicyDecision {
    let Some(position) = position.filter(|p| p.is_open()) else {
        return PolicyDecision::Proceed;
    };

    if params.close_policy == ClosePolicy::CloseOnProfitThreshold
        && position.unrealized_pnl > params.target_profit_threshold
    {
        return PolicyDecision::CloseThenSkip;
    }

    if position.side == requested {
        return PolicyDecision::SkipAlreadyOpen;
    }

    match (params.close_policy, params.open_policy) {
        (ClosePolicy::CloseOnOppositeSignal, true) => PolicyDecision::CloseThenProceed,
        (ClosePolicy::CloseOnOppositeSignal, false) => PolicyDecision::CloseOnly,
        (_, false) => PolicyDecision::SkipConflicting,
        (_, true) => PolicyDecision::ProceedOppositeWithoutClosing,
    }
}

/// Picks the position a signal must be reconciled against.
///
/// With hedge-mode venues a symbol may carry both sides; the requested side
/// wins so that an already-open leg is never doubled.
#[must_use]
pub fn relevant_position<'a>(
    positions: &'a [Position],
    symbol: &str,
    requested: Side,
) -> Option<&'a Position> {
    let mut open = positions
        .iter()
        .filter(|p| p.symbol == symbol && p.is_open());
    let first = open.next()?;
    if first.side == requested {
        return Some(first);
    }
    Some(open.find(|p| p.side == requested).unwrap_or(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(side: Side, pnl: Decimal) -> Position {
        Position {
            symbol: "ETHUSDT".to_string(),
            side,
            size: dec!(0.5),
            unrealized_pnl: pnl,
        }
    }

    fn params(close_policy: ClosePolicy, open_policy: bool) -> PolicyParams {
        PolicyParams {
            close_policy,
            open_policy,
            target_profit_threshold: dec!(0.2),
        }
    }

    #[test]
    fn test_no_position_proceeds() {
        for close in [
            ClosePolicy::None,
            ClosePolicy::CloseOnProfitThreshold,
            ClosePolicy::CloseOnOppositeSignal,
        ] {
            assert_eq!(decide(None, Side::Buy, &params(close, false)), PolicyDecision::Proceed);
        }
    }

    #[test]
    fn test_zero_size_position_counts_as_none() {
        let mut flat = position(Side::Buy, dec!(0));
        flat.size = dec!(0);
        let decision = decide(Some(&flat), Side::Buy, &params(ClosePolicy::None, false));
        assert_eq!(decision, PolicyDecision::Proceed);
    }

    #[test]
    fn test_profit_threshold_closes_regardless_of_side() {
        let pos = position(Side::Buy, dec!(0.5));
        let p = params(ClosePolicy::CloseOnProfitThreshold, true);
        assert_eq!(decide(Some(&pos), Side::Buy, &p), PolicyDecision::CloseThenSkip);
        assert_eq!(decide(Some(&pos), Side::Sell, &p), PolicyDecision::CloseThenSkip);
    }

    #[test]
    fn test_profit_equal_to_threshold_does_not_close() {
        let pos = position(Side::Buy, dec!(0.2));
        let p = params(ClosePolicy::CloseOnProfitThreshold, false);
        assert_eq!(decide(Some(&pos), Side::Buy, &p), PolicyDecision::SkipAlreadyOpen);
    }

    #[test]
    fn test_same_side_skips() {
        let pos = position(Side::Sell, dec!(-3));
        let p = params(ClosePolicy::CloseOnOppositeSignal, true);
        assert_eq!(decide(Some(&pos), Side::Sell, &p), PolicyDecision::SkipAlreadyOpen);
    }

    #[test]
    fn test_opposite_signal_close_policies() {
        let pos = position(Side::Buy, dec!(0));
        assert_eq!(
            decide(Some(&pos), Side::Sell, &params(ClosePolicy::CloseOnOppositeSignal, true)),
            PolicyDecision::CloseThenProceed
        );
        assert_eq!(
            decide(Some(&pos), Side::Sell, &params(ClosePolicy::CloseOnOppositeSignal, false)),
            PolicyDecision::CloseOnly
        );
    }

    #[test]
    fn test_opposite_without_close_policy() {
        let pos = position(Side::Buy, dec!(0));
        assert_eq!(
            decide(Some(&pos), Side::Sell, &params(ClosePolicy::None, false)),
            PolicyDecision::SkipConflicting
        );
        assert_eq!(
            decide(Some(&pos), Side::Sell, &params(ClosePolicy::None, true)),
            PolicyDecision::ProceedOppositeWithoutClosing
        );
    }

    #[test]
    fn test_profit_policy_below_threshold_falls_through() {
        let pos = position(Side::Buy, dec!(0.1));
        assert_eq!(
            decide(Some(&pos), Side::Sell, &params(ClosePolicy::CloseOnProfitThreshold, false)),
            PolicyDecision::SkipConflicting
        );
        assert_eq!(
            decide(Some(&pos), Side::Sell, &params(ClosePolicy::CloseOnProfitThreshold, true)),
            PolicyDecision::ProceedOppositeWithoutClosing
        );
    }

    #[test]
    fn test_decision_flags() {
        assert!(PolicyDecision::CloseOnly.closes_existing());
        assert!(!PolicyDecision::CloseOnly.opens_new());
        assert!(PolicyDecision::CloseThenProceed.closes_existing());
        assert!(PolicyDecision::CloseThenProceed.opens_new());
        assert!(PolicyDecision::SkipConflicting.is_skip());
        assert!(!PolicyDecision::Proceed.is_skip());
    }

    #[test]
    fn test_relevant_position_prefers_requested_side() {
        let positions = vec![
            Position {
                symbol: "BTCUSDT".to_string(),
                side: Side::Buy,
                size: dec!(0.01),
                unrealized_pnl: dec!(0),
            },
            Position {
                symbol: "ETHUSDT".to_string(),
                side: Side::Buy,
                size: dec!(1),
                unrealized_pnl: dec!(0),
            },
            Position {
                symbol: "ETHUSDT".to_string(),
                side: Side::Sell,
                size: dec!(1),
                unrealized_pnl: dec!(0),
            },
        ];
        let found = relevant_position(&positions, "ETHUSDT", Side::Sell).unwrap();
        assert_eq!(found.side, Side::Sell);
        let found = relevant_position(&positions, "BTCUSDT", Side::Sell).unwrap();
        assert_eq!(found.side, Side::Buy);
        assert!(relevant_position(&positions, "XRPUSDT", Side::Buy).is_none());
    }
}

//! Price and quantity discretization to exchange tick/lot constraints.
//!
//! All rounding decisions are taken on integer step counts; `Decimal` values
//! only appear at the edges (inputs and the values sent to the gateway).

use crate::events::{Side, SymbolMetadata};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// An integer number of price ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub i64);

/// An integer number of quantity steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lots(pub i64);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("increment must be positive, got {0}")]
    InvalidIncrement(Decimal),

    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("percentage must not be negative, got {0}")]
    InvalidPercentage(Decimal),

    #[error("value {0} does not fit in an integer step count")]
    OutOfRange(Decimal),

    #[error("{0} percentage moves the level to or below zero")]
    NonPositiveLevel(&'static str),
}

/// Tick/lot arithmetic for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    tick_size: Decimal,
    qty_step: Decimal,
}

impl Quantizer {
    /// # Errors
    /// Returns error if either increment is not positive.
    pub fn new(tick_size: Decimal, qty_step: Decimal) -> Result<Self, QuantizeError> {
        if tick_size <= Decimal::ZERO {
            return Err(QuantizeError::InvalidIncrement(tick_size));
        }
        if qty_step <= Decimal::ZERO {
            return Err(QuantizeError::InvalidIncrement(qty_step));
        }
        Ok(Self { tick_size, qty_step })
    }

    /// # Errors
    /// Returns error if the venue reported a non-positive increment.
    pub fn from_metadata(metadata: &SymbolMetadata) -> Result<Self, QuantizeError> {
        Self::new(metadata.tick_size, metadata.qty_step)
    }

    #[must_use]
    pub const fn tick_size(&self) -> Decimal {
        self.tick_size
    }

    #[must_use]
    pub const fn qty_step(&self) -> Decimal {
        self.qty_step
    }

    /// Whole ticks contained in `price`, rounded down.
    ///
    /// # Errors
    /// Returns error if the tick count overflows `i64`.
    pub fn to_ticks(&self, price: Decimal) -> Result<Ticks, QuantizeError> {
        floor_steps(price, self.tick_size).map(Ticks)
    }

    #[must_use]
    pub fn from_ticks(&self, ticks: Ticks) -> Decimal {
        (Decimal::from(ticks.0) * self.tick_size).normalize()
    }

    /// Whole lots contained in `quantity`, rounded down.
    ///
    /// # Errors
    /// Returns error if the lot count overflows `i64`.
    pub fn to_lots(&self, quantity: Decimal) -> Result<Lots, QuantizeError> {
        floor_steps(quantity, self.qty_step).map(Lots)
    }

    #[must_use]
    pub fn from_lots(&self, lots: Lots) -> Decimal {
        (Decimal::from(lots.0) * self.qty_step).normalize()
    }

    /// Snaps a raw price down onto the tick grid. Idempotent.
    ///
    /// # Errors
    /// Returns error if the price is not positive or rounds to zero ticks.
    pub fn quantize_price(&self, raw_price: Decimal) -> Result<Decimal, QuantizeError> {
        if raw_price <= Decimal::ZERO {
            return Err(QuantizeError::InvalidPrice(raw_price));
        }
        let ticks = self.to_ticks(raw_price)?;
        if ticks.0 <= 0 {
            return Err(QuantizeError::InvalidPrice(raw_price));
        }
        Ok(self.from_ticks(ticks))
    }

    /// Discretizes a quantity: at least one lot, never rounded up.
    ///
    /// # Errors
    /// Returns error if the lot count overflows `i64`.
    pub fn quantize_quantity(&self, raw_qty: Decimal) -> Result<Decimal, QuantizeError> {
        let lots = self.to_lots(raw_qty)?;
        Ok(self.from_lots(Lots(lots.0.max(1))))
    }

    /// Quantity for a notional amount at `price`, scaled by `multiplier`.
    ///
    /// # Errors
    /// Returns error if the price is not positive.
    pub fn quantity_for_notional(
        &self,
        notional: Decimal,
        multiplier: Decimal,
        price: Decimal,
    ) -> Result<Decimal, QuantizeError> {
        if price <= Decimal::ZERO {
            return Err(QuantizeError::InvalidPrice(price));
        }
        self.quantize_quantity(notional * multiplier / price)
    }

    /// Stop-loss level for an entry at `price`, biased one tick away from it.
    ///
    /// `None` when the percentage is absent or zero: the leg stays unset.
    ///
    /// # Errors
    /// Returns error on a negative percentage or a level at or below zero.
    pub fn stop_loss(
        &self,
        price: Decimal,
        side: Side,
        sl_pct: Option<Decimal>,
    ) -> Result<Option<Decimal>, QuantizeError> {
        let Some(pct) = active_pct(sl_pct)? else {
            return Ok(None);
        };
        let (requested, bias) = match side {
            Side::Buy => (price * (Decimal::ONE - pct / HUNDRED), -1),
            Side::Sell => (price * (Decimal::ONE + pct / HUNDRED), 1),
        };
        self.biased_level(requested, bias, "stop loss").map(Some)
    }

    /// Take-profit level for an entry at `price`, biased one tick away from it.
    ///
    /// # Errors
    /// Returns error on a negative percentage or a level at or below zero.
    pub fn take_profit(
        &self,
        price: Decimal,
        side: Side,
        tp_pct: Option<Decimal>,
    ) -> Result<Option<Decimal>, QuantizeError> {
        let Some(pct) = active_pct(tp_pct)? else {
            return Ok(None);
        };
        let (requested, bias) = match side {
            Side::Buy => (price * (Decimal::ONE + pct / HUNDRED), 1),
            Side::Sell => (price * (Decimal::ONE - pct / HUNDRED), -1),
        };
        self.biased_level(requested, bias, "take profit").map(Some)
    }

    fn biased_level(
        &self,
        requested: Decimal,
        bias: i64,
        leg: &'static str,
    ) -> Result<Decimal, QuantizeError> {
        let ticks = self.to_ticks(requested)?;
        let biased = ticks
            .0
            .checked_add(bias)
            .ok_or(QuantizeError::OutOfRange(requested))?;
        if biased <= 0 {
            return Err(QuantizeError::NonPositiveLevel(leg));
        }
        Ok(self.from_ticks(Ticks(biased)))
    }
}

fn active_pct(pct: Option<Decimal>) -> Result<Option<Decimal>, QuantizeError> {
    match pct {
        None => Ok(None),
        Some(p) if p.is_zero() => Ok(None),
        Some(p) if p < Decimal::ZERO => Err(QuantizeError::InvalidPercentage(p)),
        Some(p) => Ok(Some(p)),
    }
}

fn floor_steps(value: Decimal, step: Decimal) -> Result<i64, QuantizeError> {
    let steps = value
        .checked_div(step)
        .ok_or(QuantizeError::OutOfRange(value))?
        .floor();
    steps.to_i64().ok_or(QuantizeError::OutOfRange(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Quantizer {
        Quantizer::new(dec!(0.5), dec!(0.001)).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_increments() {
        assert!(Quantizer::new(dec!(0), dec!(0.001)).is_err());
        assert!(Quantizer::new(dec!(0.5), dec!(-1)).is_err());
    }

    #[test]
    fn test_reference_quantity() {
        // 100 USDT at 50000 -> 0.002 BTC, already on the 0.001 grid
        let qty = btc()
            .quantity_for_notional(dec!(100), dec!(1), dec!(50000))
            .unwrap();
        assert_eq!(qty, dec!(0.002));
    }

    #[test]
    fn test_quantity_rounds_down() {
        // 100 / 30000 = 0.00333.. -> 0.003
        let qty = btc()
            .quantity_for_notional(dec!(100), dec!(1), dec!(30000))
            .unwrap();
        assert_eq!(qty, dec!(0.003));
    }

    #[test]
    fn test_quantity_minimum_one_lot() {
        assert_eq!(btc().quantize_quantity(dec!(0.0004)).unwrap(), dec!(0.001));
        assert_eq!(btc().quantize_quantity(dec!(0)).unwrap(), dec!(0.001));
    }

    #[test]
    fn test_multiplier_scales_quantity() {
        let qty = btc()
            .quantity_for_notional(dec!(100), dec!(2.5), dec!(50000))
            .unwrap();
        assert_eq!(qty, dec!(0.005));
    }

    #[test]
    fn test_price_snaps_down_to_tick() {
        let q = btc();
        assert_eq!(q.quantize_price(dec!(50000.7)).unwrap(), dec!(50000.5));
        assert_eq!(q.quantize_price(dec!(50000.5)).unwrap(), dec!(50000.5));
    }

    #[test]
    fn test_price_snap_is_idempotent() {
        let q = Quantizer::new(dec!(0.0001), dec!(1)).unwrap();
        let once = q.quantize_price(dec!(0.123456)).unwrap();
        assert_eq!(once, dec!(0.1234));
        assert_eq!(q.quantize_price(once).unwrap(), once);
    }

    #[test]
    fn test_non_positive_price_rejected() {
        assert!(btc().quantize_price(dec!(0)).is_err());
        assert!(btc().quantize_price(dec!(0.2)).is_err());
    }

    #[test]
    fn test_buy_levels_widen_by_one_tick() {
        let q = btc();
        // 4% of 50000 = 2000: stop 48000 -> 47999.5, target 52000 -> 52000.5
        let sl = q.stop_loss(dec!(50000), Side::Buy, Some(dec!(4))).unwrap();
        let tp = q.take_profit(dec!(50000), Side::Buy, Some(dec!(4))).unwrap();
        assert_eq!(sl, Some(dec!(47999.5)));
        assert_eq!(tp, Some(dec!(52000.5)));
    }

    #[test]
    fn test_sell_levels_widen_by_one_tick() {
        let q = btc();
        let sl = q.stop_loss(dec!(50000), Side::Sell, Some(dec!(4))).unwrap();
        let tp = q.take_profit(dec!(50000), Side::Sell, Some(dec!(4))).unwrap();
        assert_eq!(sl, Some(dec!(52000.5)));
        assert_eq!(tp, Some(dec!(47999.5)));
    }

    #[test]
    fn test_fractional_level_floors_then_biases() {
        let q = Quantizer::new(dec!(0.01), dec!(1)).unwrap();
        // 1.2345 * 0.97 = 1.197465 -> floor 1.19 -> minus one tick 1.18
        let sl = q.stop_loss(dec!(1.2345), Side::Buy, Some(dec!(3))).unwrap();
        assert_eq!(sl, Some(dec!(1.18)));
        // 1.2345 * 1.03 = 1.271535 -> floor 1.27 -> plus one tick 1.28
        let tp = q.take_profit(dec!(1.2345), Side::Buy, Some(dec!(3))).unwrap();
        assert_eq!(tp, Some(dec!(1.28)));
    }

    #[test]
    fn test_zero_or_absent_percentage_leaves_leg_unset() {
        let q = btc();
        assert_eq!(q.stop_loss(dec!(50000), Side::Buy, None).unwrap(), None);
        assert_eq!(q.take_profit(dec!(50000), Side::Sell, Some(dec!(0))).unwrap(), None);
    }

    #[test]
    fn test_negative_percentage_rejected() {
        let err = btc().stop_loss(dec!(50000), Side::Buy, Some(dec!(-1))).unwrap_err();
        assert_eq!(err, QuantizeError::InvalidPercentage(dec!(-1)));
    }

    #[test]
    fn test_level_at_or_below_zero_rejected() {
        let err = btc().stop_loss(dec!(50000), Side::Buy, Some(dec!(100))).unwrap_err();
        assert!(matches!(err, QuantizeError::NonPositiveLevel(_)));
    }

    #[test]
    fn test_tick_round_trip() {
        let q = btc();
        let ticks = q.to_ticks(dec!(123.5)).unwrap();
        assert_eq!(ticks, Ticks(247));
        assert_eq!(q.from_ticks(ticks), dec!(123.5));
    }
}

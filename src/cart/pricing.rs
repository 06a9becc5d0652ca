use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;

const BPS_DENOMINATOR: i64 = 10_000;

/// Bill shown under the cart and frozen into the order at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub delivery_fee: i64,
    pub total: i64,
}

impl Bill {
    /// `total = subtotal - discount + tax + delivery_fee`, tax rounded half-up
    /// to a whole currency unit. Saturates instead of overflowing.
    pub fn compute(subtotal: i64, pricing: &PricingConfig) -> Self {
        let tax = tax_on(subtotal, pricing.tax_rate_bps);
        Self {
            subtotal,
            discount: pricing.offer_discount,
            tax,
            delivery_fee: pricing.delivery_fee,
            total: subtotal
                .saturating_sub(pricing.offer_discount)
                .saturating_add(tax)
                .saturating_add(pricing.delivery_fee),
        }
    }
}

fn tax_on(amount: i64, rate_bps: i64) -> i64 {
    let raw = i128::from(amount) * i128::from(rate_bps);
    let half = i128::from(BPS_DENOMINATOR / 2);
    let rounded = if raw >= 0 {
        (raw + half) / i128::from(BPS_DENOMINATOR)
    } else {
        (raw - half) / i128::from(BPS_DENOMINATOR)
    };
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

/// Sum of `price * quantity` over `(price, quantity)` pairs.
pub fn subtotal<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (i64, i64)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| price.saturating_mul(qty))
        .fold(0i64, i64::saturating_add)
}

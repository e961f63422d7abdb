use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::{Listing, Period, Quote};

/// Flat platform markup applied to every subtotal: 10%.
fn service_fee_rate() -> Decimal {
    Decimal::new(10, 2)
}

/// Price a stay against a listing's flat per-day rate.
///
/// Deterministic: same listing and period always produce the same quote,
/// and `total_amount == subtotal + service_fee` holds exactly. The fee is
/// rounded to the currency's minor unit (2 decimal places), half-up.
pub fn quote(listing: &Listing, period: &Period) -> Quote {
    let days = Decimal::from(period.duration_days());
    let subtotal = listing.base_price * days;
    let service_fee = (subtotal * service_fee_rate())
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Quote {
        subtotal,
        service_fee,
        total_amount: subtotal + service_fee,
        currency: listing.currency.clone(),
    }
}

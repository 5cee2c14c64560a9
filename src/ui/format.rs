//! Text formatting for ladder cells

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Cells in a size bar
pub const BAR_WIDTH: usize = 18;

/// `0.45` → `45¢`, `0.455` → `45.5¢`. Values above 1 are taken as cents
/// already.
pub fn fmt_price_cents(price: Decimal) -> String {
    let cents = if price <= Decimal::ONE {
        price.checked_mul(Decimal::ONE_HUNDRED).unwrap_or(price)
    } else {
        price
    };
    let cents = cents.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    if cents.fract().is_zero() {
        format!("{}¢", cents.trunc().normalize())
    } else {
        format!("{}¢", cents.normalize())
    }
}

/// Price difference or midpoint in cents, one decimal: `2.0¢`.
/// `-` when the value has no cent representation.
pub fn fmt_cents_1dp(value: Decimal) -> String {
    match value.checked_mul(Decimal::ONE_HUNDRED) {
        Some(cents) => format!("{:.1}¢", cents.round_dp(1)),
        None => "-".to_string(),
    }
}

/// `1234.4` → `1,234 contracts`
pub fn fmt_size(size: Decimal) -> String {
    let whole = size
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i128()
        .unwrap_or_default();
    format!("{} contracts", group_thousands(whole))
}

fn group_thousands(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Filled cells of a `width`-cell bar for `size` relative to `max_size`.
/// Any positive size fills at least one cell.
pub fn bar_fill(size: Decimal, max_size: Decimal, width: usize) -> usize {
    if size <= Decimal::ZERO || max_size <= Decimal::ZERO {
        return 0;
    }
    let filled = size
        .checked_div(max_size)
        .and_then(|ratio| ratio.checked_mul(Decimal::from(width)))
        .and_then(|cells| {
            cells
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_usize()
        })
        .unwrap_or(width);
    filled.clamp(1, width)
}

// Fixed-precision integer amounts.
//
// Every balance, share count and fee figure is an unsigned integer in token
// base units. Ratios are computed with 512-bit intermediates so that
// `a * b / c` never overflows for any pair of U256 operands.

use primitive_types::U512;
use thiserror::Error;

pub use primitive_types::U256;

use crate::config::MAX_BPS;

/// Token amount in base units
pub type Amount = U256;

pub const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Empty amount string")]
    Empty,
    #[error("Invalid amount '{0}': expected a decimal integer")]
    Invalid(String),
    #[error("Amount '{0}' does not fit in 256 bits")]
    Overflow(String),
}

/// Parse a decimal amount.
///
/// Accepts a plain integer (`"1000000"`) or an integer followed by the
/// `ether` unit (`"1000 ether"`), which scales by 10^18.
pub fn parse_amount(value: &str) -> Result<Amount, AmountError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AmountError::Empty);
    }

    let (digits, scale) = match value.strip_suffix("ether") {
        Some(rest) => (rest.trim(), Some(DEFAULT_DECIMALS)),
        None => (value, None),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Invalid(value.to_string()));
    }

    let base = U256::from_dec_str(digits).map_err(|_| AmountError::Overflow(value.to_string()))?;
    match scale {
        Some(decimals) => base
            .checked_mul(U256::exp10(decimals as usize))
            .ok_or_else(|| AmountError::Overflow(value.to_string())),
        None => Ok(base),
    }
}

/// `a * b / c` rounded down, `None` on division by zero or if the result
/// exceeds 256 bits
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Option<Amount> {
    if c.is_zero() {
        return None;
    }
    let wide = a.full_mul(b) / U512::from(c);
    U256::try_from(wide).ok()
}

/// Portion of `amount` represented by `bps` basis points
pub fn bps_of(amount: Amount, bps: Amount) -> Amount {
    mul_div(amount, bps, U256::from(MAX_BPS)).unwrap_or_default()
}

/// Render an amount with a decimal point, trimming trailing zeros
/// (`1500000000000000000` with 18 decimals renders as `1.5`)
pub fn format_units(amount: Amount, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let unit = U256::exp10(decimals as usize);
    let whole = amount / unit;
    let fraction = amount % unit;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, padded.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_ether() {
        assert_eq!(parse_amount("800").unwrap(), U256::from(800));
        assert_eq!(
            parse_amount("1000 ether").unwrap(),
            U256::from(1000) * U256::exp10(18)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_amount("  "), Err(AmountError::Empty));
        assert!(matches!(parse_amount("1_000"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount("-5"), Err(AmountError::Invalid(_))));
    }

    #[test]
    fn test_mul_div_uses_wide_intermediate() {
        let big = U256::MAX / 2;
        assert_eq!(mul_div(big, U256::from(4), U256::from(4)), Some(big));
        assert_eq!(mul_div(U256::one(), U256::one(), U256::zero()), None);
    }

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(U256::from(10_000), U256::from(1_000)), U256::from(1_000));
        assert_eq!(bps_of(U256::from(999), U256::from(1)), U256::zero());
    }

    #[test]
    fn test_format_units() {
        let one_and_half = U256::from(15) * U256::exp10(17);
        assert_eq!(format_units(one_and_half, 18), "1.5");
        assert_eq!(format_units(U256::from(42), 0), "42");
        assert_eq!(format_units(U256::from(1), 3), "0.001");
        assert_eq!(format_units(U256::from(2000), 3), "2");
    }
}

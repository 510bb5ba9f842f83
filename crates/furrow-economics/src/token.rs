// crates/furrow-economics/src/token.rs
//
// Reward token units and payout rounding.
//
// The reward token has 18 decimals. All internal accounting uses base units
// (`u128`) to avoid floating-point precision issues. Payouts are floored to
// `DUST_UNIT` so results do not depend on accumulator scale internals.

use furrow_core::FurrowError;

/// Number of decimals of the reward token.
pub const TOKEN_DECIMALS: u32 = 18;

/// Base units in one whole token. 1 token = 10^18 base units.
pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Payout granularity: every harvested amount is a multiple of 10^12 base units.
pub const DUST_UNIT: u128 = 1_000_000_000_000;

/// Type alias for an amount of reward token in base units.
pub type Amount = u128;

/// Round an amount down to a whole number of dust units.
pub fn floor_to_dust(amount: Amount) -> Amount {
    amount - amount % DUST_UNIT
}

/// Convert a whole-token count into base units.
pub fn tokens(whole: u64) -> Amount {
    whole as u128 * UNITS_PER_TOKEN
}

/// Parse a decimal token amount ("300000", "0.5") into base units.
///
/// Parsing is exact: more than 18 fractional digits is rejected rather than
/// rounded.
///
/// # Errors
/// Returns `FurrowError::Config` for malformed input or an amount that does
/// not fit in `u128`.
pub fn parse_token_amount(input: &str) -> Result<Amount, FurrowError> {
    let trimmed = input.trim().replace('_', "");
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed.as_str(), ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(FurrowError::Config(format!("Empty token amount: {:?}", input)));
    }
    if frac.len() > TOKEN_DECIMALS as usize {
        return Err(FurrowError::Config(format!(
            "Token amount {:?} has more than {} decimals",
            input, TOKEN_DECIMALS
        )));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(FurrowError::Config(format!("Malformed token amount: {:?}", input)));
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|e| FurrowError::Config(format!("Malformed token amount {:?}: {}", input, e)))?
    };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = TOKEN_DECIMALS as usize);
        padded
            .parse::<u128>()
            .map_err(|e| FurrowError::Config(format!("Malformed token amount {:?}: {}", input, e)))?
    };

    whole_units
        .checked_mul(UNITS_PER_TOKEN)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| FurrowError::Config(format!("Token amount {:?} is too large", input)))
}

/// Format base units as a decimal token amount, trimming trailing zeros.
pub fn format_token_amount(amount: Amount) -> String {
    let whole = amount / UNITS_PER_TOKEN;
    let frac = amount % UNITS_PER_TOKEN;
    if frac == 0 {
        whole.to_string()
    } else {
        let frac_str = format!("{:018}", frac);
        let trimmed = frac_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

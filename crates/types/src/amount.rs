//! Ether/wei conversions for fee amounts.
//!
//! Every amount the ledger stores is a `U256` in wei. Configuration files and
//! operators speak in ether (`"0.001"`), so the conversion lives next to the
//! integer type.

use crate::{Result, TypesError, U256};

pub const ETHER_DECIMALS: usize = 18;

pub const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

/// Parse a decimal ether amount into wei.
pub fn parse_ether(s: &str) -> Result<U256> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(TypesError::InvalidAmount(s.to_string()));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(TypesError::InvalidAmount(s.to_string()));
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(TypesError::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            s, ETHER_DECIMALS
        )));
    }

    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| TypesError::Overflow)?
    };
    let frac_padded = format!("{:0<width$}", frac, width = ETHER_DECIMALS);
    let frac = U256::from_dec_str(&frac_padded).map_err(|_| TypesError::Overflow)?;

    whole
        .checked_mul(U256::from(WEI_PER_ETHER))
        .and_then(|w| w.checked_add(frac))
        .ok_or(TypesError::Overflow)
}

/// Render wei as a decimal ether string without trailing zeros.
pub fn format_ether(wei: U256) -> String {
    let unit = U256::from(WEI_PER_ETHER);
    let whole = wei / unit;
    let frac = (wei % unit).as_u64();

    if frac == 0 {
        return whole.to_string();
    }

    let frac = format!("{:0>width$}", frac, width = ETHER_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

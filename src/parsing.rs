use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use eip55::checksum;
use serde_json::Value;
use web3::types::{H160, H256, U256};

/// Decimal places of native token and stable token amounts.
pub const TOKEN_DECIMALS: usize = 18;
/// Decimal places of on-chain fixed point fractions.
pub const FIXIDITY_DECIMALS: usize = 24;

/// 1.0 in on-chain fixed point fraction units.
pub fn fixed_one() -> U256 {
    U256::exp10(FIXIDITY_DECIMALS)
}

/// Extracts the ABI from Sourcify contract metadata.
///
/// Parses a JSON value representing contract metadata and returns the `output.abi`
/// array as a JSON string ready for `ethabi::Contract::load`.
pub fn abi_from_metadata(metadata: &Value) -> Result<String> {
    let abi = metadata
        .pointer("/output/abi")
        .ok_or_else(|| anyhow!("Could not read abi from json at loc: /output/abi"))?;
    if !abi.is_array() {
        return Err(anyhow!("Contract metadata abi is not an array"));
    }
    Ok(abi.to_string())
}

/// Takes a web3.rs address and returns checksummed String.
///
/// E.g., "0xabCd...1234"
pub fn as_checksummed(address: &H160) -> String {
    let s = h160_to_string(address);
    checksum(&s)
}

/// Converts H160 to String.
pub fn h160_to_string(address: &H160) -> String {
    hex::encode(address)
}

/// Converts H256 to a 0x prefixed String.
pub fn h256_to_string(hash: &H256) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Reads a token shaped like a raw address: "0x" followed by 40 hex digits.
pub fn parse_address(token: &str) -> Option<H160> {
    let digits = token.strip_prefix("0x")?;
    if digits.len() != 40 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(H160::from_slice(&bytes))
}

/// Renders a fixed point integer with `decimals` implied places, truncated to
/// `precision` places.
///
/// E.g., (1_234_500_000_000_000_000, 18, 2) -> "1.23"
pub fn format_units(value: U256, decimals: usize, precision: usize) -> String {
    let precision = precision.min(decimals);
    let unit = U256::exp10(decimals);
    let whole = value / unit;
    if precision == 0 {
        return whole.to_string();
    }
    let fraction = (value % unit) / U256::exp10(decimals - precision);
    format!("{}.{:0>width$}", whole, fraction.to_string(), width = precision)
}

/// A token amount in whole units with two decimals.
pub fn format_amount(value: U256) -> String {
    format_units(value, TOKEN_DECIMALS, 2)
}

/// `part` as a percentage of `whole` with two decimals. Zero when `whole` is zero.
pub fn percent(part: U256, whole: U256) -> String {
    if whole.is_zero() {
        return String::from("0.00");
    }
    let basis_points = part.saturating_mul(U256::from(10_000u64)) / whole;
    format_units(basis_points, 2, 2)
}

/// A fixed point fraction as a percentage with two decimals.
pub fn fraction_percent(fraction: U256) -> String {
    percent(fraction, fixed_one())
}

/// Multiplies an integer by a fixed point fraction.
pub fn apply_fraction(value: U256, fraction: U256) -> U256 {
    value.saturating_mul(fraction) / fixed_one()
}

/// Renders unix seconds as a UTC date.
pub fn format_timestamp(seconds: u64) -> String {
    match i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
    {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{} (unix seconds)", seconds),
    }
}

//! Currency formatting utilities for Bitcoin and satoshi values
//!
//! Values are formatted from integer satoshis so rendered amounts are exact.

/// Satoshis per Bitcoin
const SATS_PER_BTC: u64 = 100_000_000;

/// Format a satoshi amount as BTC with eight decimals
///
/// # Examples
/// ```
/// use block_fee_analyser::utils::currency::format_btc;
///
/// assert_eq!(format_btc(28125351850), "281.25351850");
/// assert_eq!(format_btc(5471), "0.00005471");
/// ```
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

/// Format a signed satoshi amount (fees can be negative for invalid data)
pub fn format_signed_btc(sats: i64) -> String {
    let magnitude = format_btc(sats.unsigned_abs());
    if sats < 0 {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}

/// Format a satoshi amount as dual BTC + sats display
///
/// # Examples
/// ```
/// use block_fee_analyser::utils::currency::format_sats_as_btc;
///
/// assert_eq!(
///     format_sats_as_btc(28125351850),
///     "281.25351850 BTC (28125351850 sats)"
/// );
/// ```
pub fn format_sats_as_btc(sats: i64) -> String {
    format!("{} BTC ({} sats)", format_signed_btc(sats), sats)
}

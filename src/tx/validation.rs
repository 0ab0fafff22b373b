//! Local Transfer Validation
//!
//! Checks that need no network round trip: currency support, destination
//! format per chain family, memo length, amount sanity and the balance hint.
//! The backend re-validates everything; these checks only fail early.

use bech32::Variant;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use super::builder::TransferIntent;
use crate::config::ClientConfig;
use crate::error::{CustodyError, CustodyResult};
use crate::types::{MinorAmount, TransactionType};

/// Address family a currency's destinations belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Utxo,
    Evm,
    Other,
}

const UTXO_TICKERS: &[&str] = &["BTC", "BCH", "LTC", "DOGE", "DASH", "RVN", "ZEC"];

const EVM_TICKERS: &[&str] = &[
    "ETH", "MATIC", "POL", "BNB", "BSC", "AVAX", "ARB", "OP", "BASE", "CELO", "FTM", "GNO",
    // ERC-20 tokens on Ethereum mainnet
    "USDT", "USDC", "DAI", "PAX", "WBTC", "LINK", "AAVE", "UNI", "SHIB",
];

const MAX_GENERIC_DESTINATION_LEN: usize = 128;
const STX_MAX_MEMO_LEN: usize = 34;
const DEFAULT_MAX_MEMO_LEN: usize = 28;

/// Classify a ticker; `TOKEN.NETWORK` tickers take their network's family
pub fn chain_family(currency: &str) -> ChainFamily {
    let upper = currency.trim().to_ascii_uppercase();
    let network = upper.rsplit('.').next().unwrap_or(&upper);

    if UTXO_TICKERS.contains(&network) {
        ChainFamily::Utxo
    } else if EVM_TICKERS.contains(&network) {
        ChainFamily::Evm
    } else {
        ChainFamily::Other
    }
}

/// Run every local check on a transfer intent
pub fn validate_intent(intent: &TransferIntent, config: &ClientConfig) -> CustodyResult<()> {
    validate_currency(&intent.currency, config)?;
    let family = chain_family(&intent.currency);

    validate_destination(&intent.currency, &intent.destination)?;
    validate_memo(&intent.currency, &intent.memo)?;
    validate_amount(intent.amount.as_ref())?;

    if let Some(hint) = &intent.balance_hint {
        check_balance(intent.amount.as_ref(), &hint.available, &hint.fee_estimate)?;
    }

    if let Some(swap) = &intent.swap_tx {
        if family != ChainFamily::Evm {
            return Err(CustodyError::unsupported_currency(format!(
                "Contract call data is only supported for EVM currencies, not {}",
                intent.currency
            )));
        }
        if !is_hex_data(&swap.data) {
            return Err(CustodyError::invalid_destination("Contract call data must be 0x-prefixed hex"));
        }
        if swap.gas_limit.parse::<MinorAmount>().map_or(true, |g| g.is_zero()) {
            return Err(CustodyError::invalid_amount("Gas limit must be a positive decimal"));
        }
    }

    if intent.tx_type == TransactionType::TokenApproval {
        let spender = intent
            .spender
            .as_deref()
            .ok_or_else(|| CustodyError::invalid_destination("Token approval requires a spender"))?;
        validate_evm_address(spender)?;
    }

    Ok(())
}

pub fn validate_currency(currency: &str, config: &ClientConfig) -> CustodyResult<()> {
    if currency.trim().is_empty() {
        return Err(CustodyError::unsupported_currency("Currency is required"));
    }
    if !config.supports(currency) {
        return Err(CustodyError::unsupported_currency(format!(
            "{} is not supported",
            currency
        )));
    }
    Ok(())
}

pub fn validate_destination(currency: &str, destination: &str) -> CustodyResult<()> {
    if destination.is_empty() || destination.trim() != destination {
        return Err(CustodyError::invalid_destination("Destination is empty or padded"));
    }
    match chain_family(currency) {
        ChainFamily::Utxo => validate_utxo_address(currency, destination),
        ChainFamily::Evm => validate_evm_address(destination),
        ChainFamily::Other => {
            if destination.len() > MAX_GENERIC_DESTINATION_LEN
                || destination.chars().any(char::is_whitespace)
            {
                return Err(CustodyError::invalid_destination(format!(
                    "Malformed {} destination",
                    currency
                )));
            }
            Ok(())
        }
    }
}

fn validate_utxo_address(currency: &str, address: &str) -> CustodyResult<()> {
    let lower = address.to_ascii_lowercase();

    if let Some(payload) = lower.strip_prefix("bitcoincash:") {
        return validate_cashaddr_payload(payload);
    }
    if currency.eq_ignore_ascii_case("BCH") && is_cashaddr_payload(&lower) {
        return Ok(());
    }

    if let Ok((_hrp, data, variant)) = bech32::decode(&lower) {
        let version = data.first().map(|v| v.to_u8());
        return match (version, variant) {
            (Some(0), Variant::Bech32) | (Some(1..=16), Variant::Bech32m) => Ok(()),
            _ => Err(CustodyError::invalid_destination(
                "Bech32 variant does not match witness version",
            )),
        };
    }

    match bs58::decode(address).into_vec() {
        Ok(decoded) if decoded.len() == 25 || decoded.len() == 26 => {
            let (payload, checksum) = decoded.split_at(decoded.len() - 4);
            let hash = Sha256::digest(Sha256::digest(payload));
            if &hash[..4] == checksum {
                Ok(())
            } else {
                Err(CustodyError::invalid_destination("Invalid Base58Check checksum"))
            }
        }
        _ => Err(CustodyError::invalid_destination(format!(
            "Not a valid {} address",
            currency
        ))),
    }
}

const CASHADDR_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn is_cashaddr_payload(payload: &str) -> bool {
    payload.len() == 42
        && (payload.starts_with('q') || payload.starts_with('p'))
        && payload.chars().all(|c| CASHADDR_CHARSET.contains(c))
}

fn validate_cashaddr_payload(payload: &str) -> CustodyResult<()> {
    if is_cashaddr_payload(payload) {
        Ok(())
    } else {
        Err(CustodyError::invalid_destination("Malformed CashAddr destination"))
    }
}

/// `0x` + 40 hex; mixed-case input must carry a valid EIP-55 checksum
pub fn validate_evm_address(address: &str) -> CustodyResult<()> {
    let body = address
        .strip_prefix("0x")
        .ok_or_else(|| CustodyError::invalid_destination("EVM address must start with 0x"))?;
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CustodyError::invalid_destination("EVM address must be 40 hex characters"));
    }

    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower && eip55_checksum(body) != address {
        return Err(CustodyError::invalid_destination("Invalid EIP-55 checksum"));
    }
    Ok(())
}

fn eip55_checksum(body: &str) -> String {
    let lower = body.to_ascii_lowercase();
    let mut hasher = Keccak::v256();
    hasher.update(lower.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    let mut out = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Blank memos are omitted; otherwise STX allows 34 characters, everything else 28.
/// Counted after trimming, as the memo is sent trimmed.
pub fn validate_memo(currency: &str, memo: &str) -> CustodyResult<()> {
    let memo = memo.trim();
    if memo.is_empty() {
        return Ok(());
    }
    let max = if currency.eq_ignore_ascii_case("STX") {
        STX_MAX_MEMO_LEN
    } else {
        DEFAULT_MAX_MEMO_LEN
    };
    let len = memo.chars().count();
    if len > max {
        return Err(CustodyError::invalid_memo(format!(
            "Memo is {} characters, {} allows at most {}",
            len, currency, max
        )));
    }
    Ok(())
}

pub fn validate_amount(amount: Option<&MinorAmount>) -> CustodyResult<()> {
    match amount {
        Some(value) if value.is_zero() => Err(CustodyError::invalid_amount("Amount must be greater than zero")),
        _ => Ok(()),
    }
}

/// `amount + fee` must fit in the available balance; a sweep needs more than the fee
pub fn check_balance(
    amount: Option<&MinorAmount>,
    available: &MinorAmount,
    fee_estimate: &MinorAmount,
) -> CustodyResult<()> {
    let required = match amount {
        Some(value) => value
            .checked_add(fee_estimate)
            .ok_or_else(|| CustodyError::invalid_amount("Amount plus fee overflows"))?,
        None => fee_estimate.checked_add(&MinorAmount::from_u64(1)).unwrap_or(*fee_estimate),
    };
    if &required > available {
        return Err(CustodyError::insufficient_funds("Balance does not cover amount and fee")
            .with_details(format!("required: {}, available: {}", required, available)));
    }
    Ok(())
}

fn is_hex_data(data: &str) -> bool {
    data.strip_prefix("0x")
        .map(|body| body.len() % 2 == 0 && body.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

//! Wire types for the self-custody backend
//!
//! Every request and response body exchanged with the backend is defined
//! here. Field names follow the backend's camelCase JSON; numeric amounts
//! travel as decimal strings.

use ethers_core::types::U256;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;

use crate::error::{CustodyError, ErrorCode};

// =============================================================================
// Amounts
// =============================================================================

/// Errors produced while parsing a minor-unit amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount is not a decimal integer: {0}")]
    NotDecimal(String),

    #[error("amount does not fit in 256 bits: {0}")]
    Overflow(String),
}

/// Non-negative amount in the asset's smallest unit (satoshi, wei, ...)
///
/// Serialized as a decimal string, never as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MinorAmount(U256);

impl MinorAmount {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &MinorAmount) -> Option<MinorAmount> {
        self.0.checked_add(other.0).map(MinorAmount)
    }

    pub fn checked_sub(&self, other: &MinorAmount) -> Option<MinorAmount> {
        self.0.checked_sub(other.0).map(MinorAmount)
    }

    pub fn saturating_sub(&self, other: &MinorAmount) -> MinorAmount {
        MinorAmount(self.0.saturating_sub(other.0))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl FromStr for MinorAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::NotDecimal(s.to_string()));
        }
        U256::from_dec_str(s)
            .map(MinorAmount)
            .map_err(|_| AmountError::Overflow(s.to_string()))
    }
}

impl fmt::Display for MinorAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MinorAmount {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Serialize for MinorAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MinorAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Auth and accounts
// =============================================================================

/// Hashed wallet identity sent with every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    pub guid_hash: String,
    pub shared_key_hash: String,
}

/// Derivation-path account within a currency's HD tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub index: u32,
    pub name: String,
}

impl AccountInfo {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// Index correlating a subscribed public key with a later signature slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(pub u32);

impl FromStr for Descriptor {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Descriptor)
            .map_err(|_| CustodyError::key_resolution_failed(format!("Malformed descriptor '{}'", s)))
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output/address style a public key is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PubKeyStyle {
    Single,
    Extended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubKeyInfo {
    pub pub_key: String,
    pub style: PubKeyStyle,
    pub descriptor: Descriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub currency: String,
    pub account: AccountInfo,
    pub pubkeys: Vec<PubKeyInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyInfo {
    pub ticker: String,
    #[serde(default)]
    pub accounts: Vec<u32>,
}

// =============================================================================
// Subscription requests
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest<'a> {
    pub auth: &'a AuthInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest<'a> {
    pub auth: &'a AuthInfo,
    pub data: &'a [SubscriptionInfo],
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest<'a> {
    pub auth: &'a AuthInfo,
    pub currency: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionsResponse {
    #[serde(default)]
    pub currencies: Vec<CurrencyInfo>,
}

/// Empty success payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {}

// =============================================================================
// Transaction build
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Swap,
    TokenApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeLevel {
    Low,
    Normal,
    High,
}

/// EVM call data for contract-interacting transfers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTx {
    pub data: String,
    pub gas_limit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraData {
    pub memo: String,
    pub fee_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_tx: Option<SwapTx>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spender: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTxRequest<'a> {
    pub auth: &'a AuthInfo,
    pub currency: &'a str,
    pub account_index: u32,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub destination: &'a str,
    /// `None` is a sweep and serializes as JSON `null`
    pub amount: Option<MinorAmount>,
    pub fee: FeeLevel,
    pub extra_data: &'a ExtraData,
    pub max_verification_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub relative_fee: MinorAmount,
    pub absolute_fee_maximum: MinorAmount,
    pub absolute_fee_estimate: MinorAmount,
    pub amount: MinorAmount,
    pub balance: MinorAmount,
}

/// Signature scheme a pre-image must be signed with
///
/// Unknown wire values are kept verbatim so they can be echoed back, but
/// they are never signed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Secp256k1,
    Unrecognized(String),
}

impl SignatureAlgorithm {
    pub fn as_wire(&self) -> &str {
        match self {
            SignatureAlgorithm::Secp256k1 => "SECP256K1",
            SignatureAlgorithm::Unrecognized(raw) => raw,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SignatureAlgorithm::Unrecognized(_))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for SignatureAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for SignatureAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "SECP256K1" => SignatureAlgorithm::Secp256k1,
            _ => SignatureAlgorithm::Unrecognized(raw),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreImage {
    pub raw_pre_image: String,
    pub signing_key: String,
    pub signature_algorithm: SignatureAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

impl PreImage {
    /// Decoded bytes of `raw_pre_image`, accepting an optional `0x` prefix
    pub fn bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        let raw = self.raw_pre_image.as_str();
        hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
    }

    pub fn descriptor(&self) -> Result<Option<Descriptor>, CustodyError> {
        self.descriptor.as_deref().map(str::parse).transpose()
    }
}

/// Unsigned transaction as returned by `buildTx`
///
/// `raw_tx` keeps the exact bytes received; it is never re-parsed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTxResponse {
    pub summary: TransactionSummary,
    pub raw_tx: Box<RawValue>,
    pub pre_images: Vec<PreImage>,
    #[serde(default)]
    pub verification_version: Option<u32>,
}

// =============================================================================
// Push
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub pre_image: String,
    pub signing_key: String,
    pub signature_algorithm: SignatureAlgorithm,
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTxRequest<'a> {
    pub auth: &'a AuthInfo,
    pub currency: &'a str,
    pub raw_tx: &'a RawValue,
    pub signatures: &'a [Signature],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTxResponse {
    pub tx_id: String,
    #[serde(default)]
    pub already_broadcast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Accepted,
    AlreadyBroadcast,
}

/// Outcome of a successful push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    pub tx_id: String,
    pub status: PushStatus,
}

impl From<PushTxResponse> for PushResult {
    fn from(response: PushTxResponse) -> Self {
        Self {
            tx_id: response.tx_id,
            status: if response.already_broadcast {
                PushStatus::AlreadyBroadcast
            } else {
                PushStatus::Accepted
            },
        }
    }
}

// =============================================================================
// Read services
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRef {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrenciesRequest<'a> {
    pub auth: &'a AuthInfo,
    pub currencies: &'a [CurrencyRef],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub ticker: String,
    pub account: AccountInfo,
    pub amount: MinorAmount,
    #[serde(default)]
    pub pending: Option<MinorAmount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    #[serde(default)]
    pub currencies: Vec<BalanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedAddress {
    pub pub_key: String,
    pub address: String,
    pub format: String,
    #[serde(default)]
    pub includes_memo: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressEntry {
    pub ticker: String,
    pub account: AccountInfo,
    #[serde(default)]
    pub addresses: Vec<DerivedAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressesResponse {
    #[serde(default)]
    pub results: Vec<AddressEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest<'a> {
    pub auth: &'a AuthInfo,
    pub currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    #[serde(rename = "type")]
    pub direction: MovementDirection,
    pub address: String,
    pub amount: MinorAmount,
    #[serde(default)]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub tx_id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub fee: Option<MinorAmount>,
    #[serde(default)]
    pub movements: Vec<Movement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest<'a> {
    pub auth: &'a AuthInfo,
    pub currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub tx_id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub direction: MovementDirection,
    pub amount: MinorAmount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPage {
    #[serde(default)]
    pub activity: Vec<ActivityItem>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

// =============================================================================
// Outcome envelope
// =============================================================================

/// Structured error carried in a failed envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<BackendError> for CustodyError {
    fn from(e: BackendError) -> Self {
        let code = ErrorCode::from_wire(&e.code);
        CustodyError::new(code, e.message).with_details(format!("backend code: {}", e.code))
    }
}

/// Success/failure wrapper around every backend response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<BackendError>,
}

impl<T> ApiResponse<T> {
    /// Collapse the envelope into a tagged result
    pub fn into_result(self) -> Result<T, CustodyError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (true, None, _) => Err(CustodyError::invalid_response("Success envelope without data")),
            (false, _, Some(error)) => Err(error.into()),
            (false, _, None) => Err(CustodyError::invalid_response("Failure envelope without error")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_amount_parsing() {
        let amount: MinorAmount = "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            .parse()
            .unwrap();
        assert_eq!(amount.as_u256(), U256::MAX);

        assert_eq!("".parse::<MinorAmount>(), Err(AmountError::Empty));
        assert!(matches!("-5".parse::<MinorAmount>(), Err(AmountError::NotDecimal(_))));
        assert!(matches!("1.5".parse::<MinorAmount>(), Err(AmountError::NotDecimal(_))));
        assert!(matches!(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936".parse::<MinorAmount>(),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_minor_amount_rejects_json_numbers() {
        let ok: MinorAmount = serde_json::from_str("\"1000\"").unwrap();
        assert_eq!(ok, MinorAmount::from_u64(1000));
        assert!(serde_json::from_str::<MinorAmount>("1000").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"1000\"");
    }

    #[test]
    fn test_signature_algorithm_keeps_unknown_values() {
        let known: SignatureAlgorithm = serde_json::from_str("\"SECP256K1\"").unwrap();
        assert_eq!(known, SignatureAlgorithm::Secp256k1);

        let unknown: SignatureAlgorithm = serde_json::from_str("\"ED25519\"").unwrap();
        assert_eq!(unknown, SignatureAlgorithm::Unrecognized("ED25519".to_string()));
        assert!(!unknown.is_supported());
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"ED25519\"");
    }

    #[test]
    fn test_sweep_amount_serializes_as_null() {
        let auth = AuthInfo {
            guid_hash: "g".into(),
            shared_key_hash: "s".into(),
        };
        let extra = ExtraData {
            memo: String::new(),
            fee_currency: "BTC".into(),
            swap_tx: None,
            spender: None,
        };
        let request = BuildTxRequest {
            auth: &auth,
            currency: "BTC",
            account_index: 0,
            tx_type: TransactionType::Payment,
            destination: "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
            amount: None,
            fee: FeeLevel::Normal,
            extra_data: &extra,
            max_verification_version: 1,
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert!(json["amount"].is_null());
        assert_eq!(json["type"], "PAYMENT");
        assert_eq!(json["fee"], "NORMAL");
        assert_eq!(json["extraData"]["feeCurrency"], "BTC");
        assert!(json["extraData"].get("swapTx").is_none());
        assert_eq!(json["maxVerificationVersion"], 1);
        assert_eq!(json["auth"]["guidHash"], "g");
    }

    #[test]
    fn test_raw_tx_bytes_survive_decoding() {
        let body = r#"{"summary":{"relativeFee":"1","absoluteFeeMaximum":"300","absoluteFeeEstimate":"250","amount":"1000","balance":"5000"},"rawTx":{"b": 1.10, "a":[3,2,1]},"preImages":[]}"#;
        let response: BuildTxResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.raw_tx.get(), r#"{"b": 1.10, "a":[3,2,1]}"#);
        assert_eq!(response.verification_version, None);
    }

    #[test]
    fn test_pre_image_descriptor_parsing() {
        let mut pre_image = PreImage {
            raw_pre_image: "0xabcd".into(),
            signing_key: "02aa".into(),
            signature_algorithm: SignatureAlgorithm::Secp256k1,
            descriptor: Some("7".into()),
        };
        assert_eq!(pre_image.descriptor().unwrap(), Some(Descriptor(7)));
        assert_eq!(pre_image.bytes().unwrap(), vec![0xab, 0xcd]);
        pre_image.raw_pre_image = "0x0xabcd".into();
        assert!(pre_image.bytes().is_err());

        pre_image.descriptor = Some("seven".into());
        let err = pre_image.descriptor().unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyResolutionFailed);
    }

    #[test]
    fn test_envelope_into_result() {
        let ok: ApiResponse<Ack> = serde_json::from_str(r#"{"success":true,"data":{}}"#).unwrap();
        assert!(ok.into_result().is_ok());

        let failed: ApiResponse<Ack> = serde_json::from_str(
            r#"{"success":false,"error":{"code":"INSUFFICIENT_FUNDS","message":"balance too low"}}"#,
        )
        .unwrap();
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);
        assert_eq!(err.message, "balance too low");

        let empty: ApiResponse<Ack> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(empty.into_result().unwrap_err().code, ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_push_result_from_response() {
        let response: PushTxResponse =
            serde_json::from_str(r#"{"txId":"abc","alreadyBroadcast":true}"#).unwrap();
        let result = PushResult::from(response);
        assert_eq!(result.status, PushStatus::AlreadyBroadcast);

        let response: PushTxResponse = serde_json::from_str(r#"{"txId":"abc"}"#).unwrap();
        assert_eq!(PushResult::from(response).status, PushStatus::Accepted);
    }
}

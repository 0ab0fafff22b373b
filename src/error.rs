//! Unified error types for the self-custody pipeline
//!
//! Every stage returns a tagged `CustodyError` instead of panicking, so the
//! UI layer can tell user-actionable failures (insufficient funds, bad
//! destination) apart from transient ones (network).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all pipeline operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl CustodyError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn credentials_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CredentialsUnavailable, msg)
    }

    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationFailed, msg)
    }

    pub fn subscription_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SubscriptionFailed, msg)
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientFunds, msg)
    }

    pub fn invalid_destination(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDestination, msg)
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAmount, msg)
    }

    pub fn invalid_memo(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidMemo, msg)
    }

    pub fn unsupported_currency(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedCurrency, msg)
    }

    pub fn key_resolution_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyResolutionFailed, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningFailed, msg)
    }

    pub fn stale_transaction(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StaleTransaction, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkFailure, msg)
    }

    pub fn version_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProtocolVersionMismatch, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Only transport-level failures may be retried with the same request.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// The unsigned transaction must be discarded and built again.
    pub fn requires_rebuild(&self) -> bool {
        self.code.requires_rebuild()
    }
}

impl fmt::Display for CustodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for CustodyError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Credentials and auth
    CredentialsUnavailable,
    AuthenticationFailed,
    SubscriptionFailed,

    // User-actionable transaction errors
    InsufficientFunds,
    InvalidDestination,
    InvalidAmount,
    InvalidMemo,
    FeeBelowMinimum,
    UnsupportedCurrency,

    // Signing
    KeyResolutionFailed,
    SigningFailed,
    SignatureRejected,

    // Push
    StaleTransaction,

    // Transport and protocol
    NetworkFailure,
    ProtocolVersionMismatch,
    InvalidResponse,

    // Local
    Cancelled,
    InvalidConfig,
    Internal,
}

impl ErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::NetworkFailure)
    }

    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            ErrorCode::StaleTransaction
                | ErrorCode::SignatureRejected
                | ErrorCode::KeyResolutionFailed
                | ErrorCode::SigningFailed
        )
    }

    /// Map a backend error code string onto the local taxonomy.
    ///
    /// Unknown codes become `InvalidResponse` so nothing is silently dropped.
    pub fn from_wire(code: &str) -> Self {
        match code.to_ascii_lowercase().replace('-', "_").as_str() {
            "authentication_failed" | "unauthorized" | "auth_error" => ErrorCode::AuthenticationFailed,
            "subscription_failed" => ErrorCode::SubscriptionFailed,
            "insufficient_funds" | "insufficient_balance" => ErrorCode::InsufficientFunds,
            "invalid_destination" | "invalid_address" => ErrorCode::InvalidDestination,
            "invalid_amount" => ErrorCode::InvalidAmount,
            "invalid_memo" => ErrorCode::InvalidMemo,
            "fee_below_minimum" | "fee_too_low" => ErrorCode::FeeBelowMinimum,
            "unsupported_currency" => ErrorCode::UnsupportedCurrency,
            "invalid_signature" | "signature_rejected" => ErrorCode::SignatureRejected,
            "stale_transaction" | "expired_pre_image" | "expired_preimage" => ErrorCode::StaleTransaction,
            "protocol_version_mismatch" | "unsupported_verification_version" => {
                ErrorCode::ProtocolVersionMismatch
            }
            "network_failure" | "service_unavailable" => ErrorCode::NetworkFailure,
            _ => ErrorCode::InvalidResponse,
        }
    }
}

/// Result type alias for pipeline operations
pub type CustodyResult<T> = Result<T, CustodyError>;

// Conversions from common error types

impl From<serde_json::Error> for CustodyError {
    fn from(e: serde_json::Error) -> Self {
        CustodyError::new(ErrorCode::InvalidResponse, format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for CustodyError {
    fn from(e: hex::FromHexError) -> Self {
        CustodyError::new(ErrorCode::InvalidResponse, format!("Hex error: {}", e))
    }
}

impl From<reqwest::Error> for CustodyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CustodyError::network("Request timed out")
        } else if e.is_connect() {
            CustodyError::network("Connection failed")
        } else if e.is_decode() {
            CustodyError::invalid_response(e.to_string())
        } else {
            CustodyError::network(e.to_string())
        }
    }
}

impl From<secp256k1::Error> for CustodyError {
    fn from(e: secp256k1::Error) -> Self {
        CustodyError::signing_failed(format!("Secp256k1 error: {}", e))
    }
}

impl From<bitcoin::bip32::Error> for CustodyError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        CustodyError::key_resolution_failed(format!("BIP32 error: {}", e))
    }
}

impl From<tokio::task::JoinError> for CustodyError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            CustodyError::cancelled("Signing task cancelled")
        } else {
            CustodyError::internal(format!("Signing task panicked: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = CustodyError::insufficient_funds("Not enough BTC")
            .with_details("Required: 1000000, Available: 500000");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("insufficient_funds"));
        assert!(json.contains("Not enough BTC"));
    }

    #[test]
    fn test_only_network_failures_retry() {
        assert!(CustodyError::network("timeout").is_retryable());
        assert!(!CustodyError::stale_transaction("expired").is_retryable());
        assert!(!CustodyError::insufficient_funds("low").is_retryable());
        assert!(!CustodyError::signing_failed("bad").is_retryable());
    }

    #[test]
    fn test_rebuild_classification() {
        assert!(ErrorCode::StaleTransaction.requires_rebuild());
        assert!(ErrorCode::SignatureRejected.requires_rebuild());
        assert!(!ErrorCode::NetworkFailure.requires_rebuild());
        assert!(!ErrorCode::InsufficientFunds.requires_rebuild());
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(ErrorCode::from_wire("INSUFFICIENT_FUNDS"), ErrorCode::InsufficientFunds);
        assert_eq!(ErrorCode::from_wire("fee-too-low"), ErrorCode::FeeBelowMinimum);
        assert_eq!(ErrorCode::from_wire("expired_pre_image"), ErrorCode::StaleTransaction);
        assert_eq!(
            ErrorCode::from_wire("protocol_version_mismatch"),
            ErrorCode::ProtocolVersionMismatch
        );
        assert_eq!(ErrorCode::from_wire("something_new"), ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_display_includes_details() {
        let err = CustodyError::network("down").with_details("HTTP 503");
        assert_eq!(err.to_string(), "[NetworkFailure] down (HTTP 503)");
    }
}

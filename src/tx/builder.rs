//! Transaction Builder
//!
//! Validates a transfer intent locally, asks the backend to build the
//! unsigned transaction and checks the returned pre-images before they are
//! handed to the signer.

use serde_json::value::RawValue;

use super::validation::validate_intent;
use crate::api::{ApiClient, Transport};
use crate::error::{CustodyError, CustodyResult};
use crate::types::*;
use crate::{log_debug, log_info, log_warn};

/// Known balance used to fail early on insufficient funds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceHint {
    pub available: MinorAmount,
    pub fee_estimate: MinorAmount,
}

/// What the user wants to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub currency: String,
    pub account_index: u32,
    pub tx_type: TransactionType,
    pub destination: String,
    /// `None` sends the whole balance minus fees
    pub amount: Option<MinorAmount>,
    pub fee: FeeLevel,
    pub memo: String,
    /// Defaults to `currency`
    pub fee_currency: Option<String>,
    pub swap_tx: Option<SwapTx>,
    pub spender: Option<String>,
    pub balance_hint: Option<BalanceHint>,
}

impl TransferIntent {
    pub fn payment(currency: impl Into<String>, destination: impl Into<String>, amount: Option<MinorAmount>) -> Self {
        Self {
            currency: currency.into(),
            account_index: 0,
            tx_type: TransactionType::Payment,
            destination: destination.into(),
            amount,
            fee: FeeLevel::Normal,
            memo: String::new(),
            fee_currency: None,
            swap_tx: None,
            spender: None,
            balance_hint: None,
        }
    }

    pub fn with_account(mut self, account_index: u32) -> Self {
        self.account_index = account_index;
        self
    }

    pub fn with_fee(mut self, fee: FeeLevel) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_fee_currency(mut self, fee_currency: impl Into<String>) -> Self {
        self.fee_currency = Some(fee_currency.into());
        self
    }

    pub fn with_swap_tx(mut self, swap_tx: SwapTx) -> Self {
        self.swap_tx = Some(swap_tx);
        self
    }

    pub fn with_balance_hint(mut self, available: MinorAmount, fee_estimate: MinorAmount) -> Self {
        self.balance_hint = Some(BalanceHint {
            available,
            fee_estimate,
        });
        self
    }

    fn extra_data(&self) -> ExtraData {
        ExtraData {
            memo: self.memo.trim().to_string(),
            fee_currency: self.fee_currency.clone().unwrap_or_else(|| self.currency.clone()),
            swap_tx: self.swap_tx.clone(),
            spender: self.spender.clone(),
        }
    }
}

/// Unsigned transaction awaiting signatures
///
/// Single use: signing consumes it, and it is deliberately not `Clone`.
#[derive(Debug)]
pub struct BuiltTransaction {
    currency: String,
    summary: TransactionSummary,
    raw_tx: Box<RawValue>,
    pre_images: Vec<PreImage>,
    verification_version: Option<u32>,
}

impl BuiltTransaction {
    /// Accept a backend response after checking its pre-images
    pub fn from_response(
        currency: impl Into<String>,
        response: BuildTxResponse,
        max_verification_version: u32,
    ) -> CustodyResult<Self> {
        if let Some(version) = response.verification_version {
            if version > max_verification_version {
                return Err(CustodyError::version_mismatch(format!(
                    "Backend requires verification version {}, client supports up to {}",
                    version, max_verification_version
                )));
            }
        }
        if response.pre_images.is_empty() {
            return Err(CustodyError::invalid_response("Built transaction has no pre-images"));
        }
        for (index, pre_image) in response.pre_images.iter().enumerate() {
            let bytes = pre_image.bytes().map_err(|e| {
                CustodyError::invalid_response(format!("Pre-image {} is not valid hex", index))
                    .with_details(e.to_string())
            })?;
            if bytes.is_empty() {
                return Err(CustodyError::invalid_response(format!("Pre-image {} is empty", index)));
            }
        }

        Ok(Self {
            currency: currency.into(),
            summary: response.summary,
            raw_tx: response.raw_tx,
            pre_images: response.pre_images,
            verification_version: response.verification_version,
        })
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn summary(&self) -> &TransactionSummary {
        &self.summary
    }

    pub fn raw_tx(&self) -> &RawValue {
        &self.raw_tx
    }

    pub fn pre_images(&self) -> &[PreImage] {
        &self.pre_images
    }

    pub fn verification_version(&self) -> Option<u32> {
        self.verification_version
    }

    pub(crate) fn into_parts(self) -> (String, Box<RawValue>, Vec<PreImage>) {
        (self.currency, self.raw_tx, self.pre_images)
    }
}

/// Validate `intent` and request the unsigned transaction
pub async fn build_transaction<T: Transport>(
    client: &ApiClient<T>,
    auth: &AuthInfo,
    intent: &TransferIntent,
) -> CustodyResult<BuiltTransaction> {
    validate_intent(intent, client.config())?;

    let max_verification_version = client.config().max_verification_version;
    let extra_data = intent.extra_data();
    let request = BuildTxRequest {
        auth,
        currency: &intent.currency,
        account_index: intent.account_index,
        tx_type: intent.tx_type,
        destination: &intent.destination,
        amount: intent.amount,
        fee: intent.fee,
        extra_data: &extra_data,
        max_verification_version,
    };

    log_debug!(
        "builder",
        "Requesting unsigned transaction",
        currency = intent.currency,
        destination = intent.destination,
        sweep = intent.amount.is_none(),
    );

    let response = client.build_tx(&request).await?;
    let built = BuiltTransaction::from_response(intent.currency.clone(), response, max_verification_version)
        .inspect_err(|e| log_warn!("builder", "Rejected build response", error = e))?;

    log_info!(
        "builder",
        "Built transaction",
        currency = built.currency(),
        amount = built.summary().amount,
        fee_estimate = built.summary().absolute_fee_estimate,
        pre_images = built.pre_images().len(),
    );
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn response(verification_version: Option<u32>, pre_images: Vec<PreImage>) -> BuildTxResponse {
        let summary = TransactionSummary {
            relative_fee: MinorAmount::from_u64(1),
            absolute_fee_maximum: MinorAmount::from_u64(300),
            absolute_fee_estimate: MinorAmount::from_u64(250),
            amount: MinorAmount::from_u64(1_000),
            balance: MinorAmount::from_u64(5_000),
        };
        BuildTxResponse {
            summary,
            raw_tx: RawValue::from_string(r#"{"inputs":[]}"#.to_string()).unwrap(),
            pre_images,
            verification_version,
        }
    }

    fn pre_image(raw: &str) -> PreImage {
        PreImage {
            raw_pre_image: raw.to_string(),
            signing_key: String::new(),
            signature_algorithm: SignatureAlgorithm::Secp256k1,
            descriptor: Some("0".into()),
        }
    }

    #[test]
    fn test_rejects_newer_verification_version() {
        let err = BuiltTransaction::from_response("BTC", response(Some(2), vec![pre_image("00")]), 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProtocolVersionMismatch);

        assert!(BuiltTransaction::from_response("BTC", response(Some(1), vec![pre_image("00")]), 1).is_ok());
        assert!(BuiltTransaction::from_response("BTC", response(None, vec![pre_image("00")]), 1).is_ok());
    }

    #[test]
    fn test_rejects_missing_or_malformed_pre_images() {
        let err = BuiltTransaction::from_response("BTC", response(None, vec![]), 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);

        let err = BuiltTransaction::from_response("BTC", response(None, vec![pre_image("zz")]), 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);

        let err = BuiltTransaction::from_response("BTC", response(None, vec![pre_image("")]), 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_extra_data_defaults_fee_currency() {
        let intent = TransferIntent::payment("USDC.MATIC", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", None)
            .with_memo("  note ");
        let extra = intent.extra_data();
        assert_eq!(extra.fee_currency, "USDC.MATIC");
        assert_eq!(extra.memo, "note");

        let extra = intent.with_fee_currency("MATIC").extra_data();
        assert_eq!(extra.fee_currency, "MATIC");
    }

    #[test]
    fn test_raw_tx_preserved() {
        let built = BuiltTransaction::from_response("BTC", response(None, vec![pre_image("0xab")]), 1).unwrap();
        assert_eq!(built.raw_tx().get(), r#"{"inputs":[]}"#);
        assert_eq!(built.summary().amount, MinorAmount::from_u64(1_000));
    }
}

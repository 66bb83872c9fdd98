//! Pre-submission payment confirmation.
//!
//! Checkout obtains a [`PaymentReceipt`] before the order-create request is
//! sent. Settlement is simulated: the confirmer validates what the customer
//! entered, optionally waits out a processing delay, and mints or forwards a
//! transaction reference.
//!
//! Supported methods:
//! - QR scan: the customer pays via a UPI deep link and types back the
//!   transaction id their app showed
//! - Pay ID: the customer's UPI address is "charged" directly
//! - Cash on delivery: acknowledged immediately

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use forkful_core::format_amount;
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::PaymentConfig;

static PAY_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@[\w.-]+$").expect("pay-id pattern is valid"));

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "QR")]
    QrScan,
    #[serde(rename = "UPI")]
    PayId,
    #[serde(rename = "COD")]
    CashOnDelivery,
}

impl PaymentMethod {
    /// Label forwarded as the order's `paymentMethod`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::QrScan => "QR",
            Self::PayId => "UPI",
            Self::CashOnDelivery => "COD",
        }
    }

    /// Settled with the driver at the door, so confirming takes no money.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::CashOnDelivery)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the customer supplied in the payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentIntent {
    /// Paid by scanning the QR code; carries the id shown by their app.
    QrScan { transaction_id: String },
    /// Authorize a direct debit from this UPI address.
    PayId { vpa: String },
    /// Pay the driver in cash.
    CashOnDelivery,
}

impl PaymentIntent {
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::QrScan { .. } => PaymentMethod::QrScan,
            Self::PayId { .. } => PaymentMethod::PayId,
            Self::CashOnDelivery => PaymentMethod::CashOnDelivery,
        }
    }
}

/// Proof that the payment step completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub amount: Decimal,
}

/// Why the payment step did not produce a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("enter the transaction id from your payment app")]
    MissingTransactionId,

    #[error("enter a valid UPI ID (e.g. yourname@bank), got {0:?}")]
    InvalidPayId(String),

    #[error("payment cancelled")]
    Cancelled,
}

/// Runs the payment step for a given amount.
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    /// Confirm payment of `amount` as described by `intent`.
    async fn confirm(
        &self,
        amount: Decimal,
        intent: &PaymentIntent,
    ) -> Result<PaymentReceipt, PaymentError>;
}

/// Simulated payment confirmation.
#[derive(Debug, Clone)]
pub struct SimulatedPayments {
    config: PaymentConfig,
}

impl SimulatedPayments {
    #[must_use]
    pub const fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    /// UPI deep link the QR code encodes for `amount`.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the base scheme cannot be built (never in
    /// practice, the base is a constant).
    pub fn qr_payload(&self, amount: Decimal) -> Result<Url, url::ParseError> {
        let mut url = Url::parse("upi://pay")?;
        url.query_pairs_mut()
            .append_pair("pa", &self.config.payee_vpa)
            .append_pair("pn", &self.config.payee_name)
            .append_pair("am", &format_amount(amount))
            .append_pair("cu", "INR")
            .append_pair("tn", "Food Order Payment");
        Ok(url)
    }

    async fn processing(&self) {
        if !self.config.processing_delay.is_zero() {
            tokio::time::sleep(self.config.processing_delay).await;
        }
    }
}

/// `TXN<millis><9 random uppercase alphanumerics>`.
fn mint_transaction_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("TXN{}{suffix}", Utc::now().timestamp_millis())
}

#[async_trait]
impl PaymentConfirmer for SimulatedPayments {
    #[instrument(skip(self, intent), fields(method = %intent.method(), amount = %amount))]
    async fn confirm(
        &self,
        amount: Decimal,
        intent: &PaymentIntent,
    ) -> Result<PaymentReceipt, PaymentError> {
        let transaction_id = match intent {
            PaymentIntent::QrScan { transaction_id } => {
                let transaction_id = transaction_id.trim();
                if transaction_id.is_empty() {
                    return Err(PaymentError::MissingTransactionId);
                }
                self.processing().await;
                transaction_id.to_string()
            }
            PaymentIntent::PayId { vpa } => {
                let vpa = vpa.trim();
                if !PAY_ID_PATTERN.is_match(vpa) {
                    return Err(PaymentError::InvalidPayId(vpa.to_string()));
                }
                self.processing().await;
                mint_transaction_id()
            }
            PaymentIntent::CashOnDelivery => format!("COD{}", Utc::now().timestamp_millis()),
        };

        debug!(transaction_id = %transaction_id, "Payment confirmed");
        Ok(PaymentReceipt {
            method: intent.method(),
            transaction_id,
            amount,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payments() -> SimulatedPayments {
        SimulatedPayments::new(PaymentConfig::default())
    }

    #[tokio::test]
    async fn test_qr_requires_transaction_id() {
        let err = payments()
            .confirm(
                Decimal::ONE,
                &PaymentIntent::QrScan {
                    transaction_id: "  ".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::MissingTransactionId);

        let receipt = payments()
            .confirm(
                Decimal::ONE,
                &PaymentIntent::QrScan {
                    transaction_id: " 123456789012 ".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.transaction_id, "123456789012");
        assert_eq!(receipt.method, PaymentMethod::QrScan);
    }

    #[tokio::test]
    async fn test_pay_id_is_validated() {
        let err = payments()
            .confirm(
                Decimal::ONE,
                &PaymentIntent::PayId {
                    vpa: "not an id".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPayId(_)));

        let receipt = payments()
            .confirm(
                Decimal::ONE,
                &PaymentIntent::PayId {
                    vpa: "9876543210@ybl".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(receipt.transaction_id.starts_with("TXN"));
        assert_eq!(receipt.method.label(), "UPI");
    }

    #[tokio::test]
    async fn test_cash_on_delivery_is_acknowledged() {
        let receipt = payments()
            .confirm(Decimal::new(1900, 2), &PaymentIntent::CashOnDelivery)
            .await
            .unwrap();
        assert!(receipt.transaction_id.starts_with("COD"));
        assert_eq!(receipt.amount, Decimal::new(1900, 2));
    }

    #[test]
    fn test_minted_ids_have_expected_shape() {
        let id = mint_transaction_id();
        let suffix = &id[id.len() - 9..];
        assert!(id.starts_with("TXN"));
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_qr_payload_encodes_amount_and_payee() {
        let url = payments().qr_payload(Decimal::new(1900, 2)).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(url.scheme(), "upi");
        assert!(pairs.contains(&("am".to_string(), "19.00".to_string())));
        assert!(pairs.contains(&("pa".to_string(), "orders@forkful".to_string())));
        assert!(pairs.contains(&("tn".to_string(), "Food Order Payment".to_string())));
    }
}

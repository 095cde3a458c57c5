pub mod chapa;
pub mod period;
pub mod webhook;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use period::{format_amount, generate_tx_ref, parse_amount, period_end};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("transaction not found")]
    NotFound,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Everything the gateway needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub tx_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub callback_url: String,
    pub return_url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Success,
    Pending,
    Failed,
}

impl TransactionStatus {
    /// Chapa reports `success`, `pending`, and a handful of failure words.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "success" | "successful" | "completed" => Self::Success,
            "pending" => Self::Pending,
            _ => Self::Failed,
        }
    }
}

/// The gateway's view of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionVerification {
    pub status: TransactionStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub reference: Option<String>,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self, req: CheckoutRequest) -> Result<CheckoutSession, BillingError>;

    async fn verify(&self, tx_ref: &str) -> Result<TransactionVerification, BillingError>;

    /// Check a webhook signature against the raw request body.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_words() {
        assert_eq!(TransactionStatus::parse("success"), TransactionStatus::Success);
        assert_eq!(TransactionStatus::parse("Pending"), TransactionStatus::Pending);
        assert_eq!(TransactionStatus::parse("failed/cancelled"), TransactionStatus::Failed);
    }
}

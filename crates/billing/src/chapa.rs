//! Chapa payment gateway client.
//!
//! Hosted checkout: https://developer.chapa.co/integrations/accept-payments

use serde_json::{Value, json};
use tracing::debug;

use crate::{
    BillingError, CheckoutRequest, CheckoutSession, PaymentGateway, TransactionStatus,
    TransactionVerification, format_amount, parse_amount, webhook,
};

pub const DEFAULT_BASE_URL: &str = "https://api.chapa.co";

pub struct ChapaClient {
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    client: reqwest::Client,
}

impl ChapaClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self::with_base_url(secret_key, webhook_secret, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(secret_key: String, webhook_secret: String, base_url: &str) -> Self {
        Self {
            secret_key,
            webhook_secret,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, BillingError> {
        let resp = req
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| BillingError::Network(e.to_string()))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| BillingError::Gateway(format!("parse JSON: {e}")))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BillingError::NotFound);
        }
        if !status.is_success() || body["status"].as_str() != Some("success") {
            return Err(BillingError::Gateway(message_of(&body, status)));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for ChapaClient {
    fn name(&self) -> &str {
        "chapa"
    }

    async fn initialize(&self, req: CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let url = format!("{}/v1/transaction/initialize", self.base_url);
        debug!(tx_ref = %req.tx_ref, "Chapa initialize");

        let body = self
            .send(self.client.post(&url).json(&initialize_body(&req)))
            .await?;

        body["data"]["checkout_url"]
            .as_str()
            .map(|u| CheckoutSession {
                checkout_url: u.to_string(),
            })
            .ok_or_else(|| BillingError::Gateway("response missing checkout_url".into()))
    }

    async fn verify(&self, tx_ref: &str) -> Result<TransactionVerification, BillingError> {
        let url = format!("{}/v1/transaction/verify/{tx_ref}", self.base_url);
        debug!(tx_ref = %tx_ref, "Chapa verify");

        let body = self.send(self.client.get(&url)).await?;
        parse_verification(&body["data"])
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        webhook::verify(self.webhook_secret.as_bytes(), payload, signature)
    }
}

fn initialize_body(req: &CheckoutRequest) -> Value {
    json!({
        "amount": format_amount(req.amount_cents),
        "currency": req.currency,
        "email": req.email,
        "first_name": req.first_name,
        "last_name": req.last_name,
        "tx_ref": req.tx_ref,
        "callback_url": req.callback_url,
        "return_url": req.return_url,
        "customization": {
            "title": req.title,
            "description": req.description,
        },
    })
}

/// Parse the `data` object of a verify response (or a webhook event, which has the same shape).
pub fn parse_verification(data: &Value) -> Result<TransactionVerification, BillingError> {
    let status = data["status"]
        .as_str()
        .map(TransactionStatus::parse)
        .ok_or_else(|| BillingError::Gateway("response missing status".into()))?;

    Ok(TransactionVerification {
        status,
        amount_cents: parse_amount(&data["amount"])?,
        currency: data["currency"].as_str().unwrap_or_default().to_string(),
        reference: data["reference"].as_str().map(String::from),
    })
}

/// Chapa puts the human-readable error in `message`, which is sometimes an object of field errors.
fn message_of(body: &Value, status: reqwest::StatusCode) -> String {
    match &body["message"] {
        Value::String(s) => s.clone(),
        Value::Null => format!("Chapa returned {status}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_body_uses_decimal_amount_and_customization() {
        let req = CheckoutRequest {
            tx_ref: "mq-abc".into(),
            amount_cents: 29900,
            currency: "ETB".into(),
            email: "viewer@example.com".into(),
            first_name: Some("Abebe".into()),
            last_name: None,
            callback_url: "http://api/webhook".into(),
            return_url: "http://web/success?tx_ref=mq-abc".into(),
            title: "Premium".into(),
            description: "Monthly subscription".into(),
        };

        let body = initialize_body(&req);
        assert_eq!(body["amount"], "299.00");
        assert_eq!(body["tx_ref"], "mq-abc");
        assert_eq!(body["last_name"], Value::Null);
        assert_eq!(body["customization"]["title"], "Premium");
    }

    #[test]
    fn parse_verify_data() {
        let data = json!({
            "status": "success",
            "amount": "299.00",
            "currency": "ETB",
            "reference": "APfxX1",
            "tx_ref": "mq-abc"
        });

        let v = parse_verification(&data).unwrap();
        assert_eq!(v.status, TransactionStatus::Success);
        assert_eq!(v.amount_cents, 29900);
        assert_eq!(v.reference.as_deref(), Some("APfxX1"));
    }

    #[test]
    fn parse_verify_rejects_missing_status() {
        assert!(parse_verification(&json!({ "amount": 10 })).is_err());
    }

    #[test]
    fn error_message_from_field_map() {
        let body = json!({ "message": { "email": ["invalid"] }, "status": "failed" });
        let msg = message_of(&body, reqwest::StatusCode::BAD_REQUEST);
        assert!(msg.contains("email"));
    }
}

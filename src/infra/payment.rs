//! Payment gateway client.
//!
//! The gateway captures a payment after the buyer authorises it in the
//! storefront widget and reverses all or part of it on cancellation. Only the
//! confirm and cancel endpoints are used.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors from payment gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("gateway rejected the request: {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedPayment {
    pub payment_key: String,
    pub order_id: String,
    #[serde(default)]
    pub method: Option<String>,
    pub total_amount: i64,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledPayment {
    pub payment_key: String,
    #[serde(default)]
    pub transaction_key: Option<String>,
    pub cancel_amount: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures an authorised payment.
    async fn confirm(&self, payment_key: &str, order_number: &str, amount: i64) -> Result<ApprovedPayment, PaymentError>;

    /// Reverses `amount` of a captured payment.
    async fn cancel(&self, payment_key: &str, reason: &str, amount: i64) -> Result<CancelledPayment, PaymentError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest<'a> {
    payment_key: &'a str,
    order_id: &'a str,
    amount: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest<'a> {
    cancel_reason: &'a str,
    cancel_amount: i64,
}

#[derive(Deserialize)]
struct GatewayFailure {
    code: String,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelResponse {
    payment_key: String,
    #[serde(default)]
    cancels: Vec<CancelEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelEntry {
    transaction_key: Option<String>,
    cancel_amount: i64,
}

/// HTTP client for the payment gateway's REST API.
pub struct HttpPaymentGateway {
    client: Client,
    base_url: Url,
    secret_key: String,
}

impl HttpPaymentGateway {
    /// # Arguments
    /// * `base_url` - Gateway root, e.g. "https://api.payments.example"
    /// * `secret_key` - Sent as the basic-auth username with an empty password
    pub fn new(base_url: &str, secret_key: &str) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| PaymentError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(PaymentError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url, secret_key: secret_key.to_string() })
    }

    /// Appends `segments` to the base url, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PaymentError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<reqwest::Response, PaymentError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.secret_key, Some(""))
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        match response.json::<GatewayFailure>().await {
            Ok(failure) => Err(PaymentError::Rejected { code: failure.code, message: failure.message }),
            Err(_) => Err(PaymentError::Rejected { code: status.as_u16().to_string(), message: status.to_string() }),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, payment_key))]
    async fn confirm(&self, payment_key: &str, order_number: &str, amount: i64) -> Result<ApprovedPayment, PaymentError> {
        let url = self.endpoint(&["v1", "payments", "confirm"])?;
        let response = self.post(url, &ConfirmRequest { payment_key, order_id: order_number, amount }).await?;
        response.json::<ApprovedPayment>().await.map_err(|e| PaymentError::Parse(e.to_string()))
    }

    #[tracing::instrument(skip(self, payment_key, reason))]
    async fn cancel(&self, payment_key: &str, reason: &str, amount: i64) -> Result<CancelledPayment, PaymentError> {
        let url = self.endpoint(&["v1", "payments", payment_key, "cancel"])?;
        let response = self.post(url, &CancelRequest { cancel_reason: reason, cancel_amount: amount }).await?;
        let body = response.json::<CancelResponse>().await.map_err(|e| PaymentError::Parse(e.to_string()))?;
        let latest = body.cancels.last();
        Ok(CancelledPayment {
            payment_key: body.payment_key,
            transaction_key: latest.and_then(|c| c.transaction_key.clone()),
            cancel_amount: latest.map_or(amount, |c| c.cancel_amount),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_confirm_posts_payment_and_parses_approval() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/payments/confirm")
                .header_exists("authorization")
                .json_body(json!({"paymentKey": "pk_1", "orderId": "ORD-20240101-0000ABCD", "amount": 15000}));
            then.status(200).json_body(json!({
                "paymentKey": "pk_1",
                "orderId": "ORD-20240101-0000ABCD",
                "method": "card",
                "totalAmount": 15000,
                "approvedAt": "2024-01-01T10:00:00Z"
            }));
        });

        let gateway = HttpPaymentGateway::new(&server.base_url(), "sk_test").unwrap();
        let approved = gateway.confirm("pk_1", "ORD-20240101-0000ABCD", 15000).await.unwrap();

        assert_eq!(approved.total_amount, 15000);
        assert_eq!(approved.method.as_deref(), Some("card"));
        assert!(approved.approved_at.is_some());
        mock.assert();
    }

    #[tokio::test]
    async fn test_cancel_reports_latest_cancellation() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/payments/pk_9/cancel")
                .json_body(json!({"cancelReason": "customer request", "cancelAmount": 4000}));
            then.status(200).json_body(json!({
                "paymentKey": "pk_9",
                "cancels": [
                    {"transactionKey": "tx_a", "cancelAmount": 1000},
                    {"transactionKey": "tx_b", "cancelAmount": 4000}
                ]
            }));
        });

        let gateway = HttpPaymentGateway::new(&server.base_url(), "sk_test").unwrap();
        let cancelled = gateway.cancel("pk_9", "customer request", 4000).await.unwrap();

        assert_eq!(cancelled.transaction_key.as_deref(), Some("tx_b"));
        assert_eq!(cancelled.cancel_amount, 4000);
        mock.assert();
    }

    #[tokio::test]
    async fn test_gateway_failure_body_becomes_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/payments/pk_2/cancel");
            then.status(400).json_body(json!({"code": "ALREADY_CANCELED_PAYMENT", "message": "already cancelled"}));
        });

        let gateway = HttpPaymentGateway::new(&server.base_url(), "sk_test").unwrap();
        let err = gateway.cancel("pk_2", "dup", 100).await.unwrap_err();

        match err {
            PaymentError::Rejected { code, .. } => assert_eq!(code, "ALREADY_CANCELED_PAYMENT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_failure_uses_status_code() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/payments/confirm");
            then.status(503).body("upstream down");
        });

        let gateway = HttpPaymentGateway::new(&server.base_url(), "sk_test").unwrap();
        let err = gateway.confirm("pk", "ORD", 1).await.unwrap_err();

        assert!(matches!(err, PaymentError::Rejected { ref code, .. } if code == "503"));
    }

    #[test]
    fn test_payment_key_is_a_single_path_segment() {
        let gateway = HttpPaymentGateway::new("https://pay.test/api/", "sk_test").unwrap();
        let url = gateway.endpoint(&["v1", "payments", "pk/9?x y", "cancel"]).unwrap();
        assert_eq!(url.as_str(), "https://pay.test/api/v1/payments/pk%2F9%3Fx%20y/cancel");

        let gateway = HttpPaymentGateway::new("http://127.0.0.1:1", "sk_test").unwrap();
        let url = gateway.endpoint(&["v1", "payments", "confirm"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:1/v1/payments/confirm");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(HttpPaymentGateway::new("not a url", "sk"), Err(PaymentError::InvalidUrl(_))));
        assert!(matches!(HttpPaymentGateway::new("mailto:ops@pay.test", "sk"), Err(PaymentError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let gateway = HttpPaymentGateway::new("http://127.0.0.1:1", "sk_test").unwrap();
        let err = gateway.confirm("pk", "ORD", 1).await.unwrap_err();
        assert!(matches!(err, PaymentError::Transport(_)));
    }
}

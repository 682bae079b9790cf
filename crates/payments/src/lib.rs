//! Client for the upstream payment gateway, plus verification of the
//! signatures it attaches to status notifications.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Outcome of a payment attempt as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Settlement,
    Capture,
    Pending,
    Deny,
    Cancel,
    Expire,
    Refund,
    Unknown(String),
}

impl From<&str> for GatewayStatus {
    fn from(s: &str) -> Self {
        match s {
            "settlement" => Self::Settlement,
            "capture" => Self::Capture,
            "pending" => Self::Pending,
            "deny" => Self::Deny,
            "cancel" => Self::Cancel,
            "expire" => Self::Expire,
            "refund" => Self::Refund,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl GatewayStatus {
    /// The registration payment status implied by this gateway outcome.
    /// Unrecognised statuses are treated as still-pending so that the next
    /// reconciliation pass looks at them again.
    pub fn registration_status(&self) -> &'static str {
        match self {
            Self::Settlement | Self::Capture => "verified",
            Self::Pending | Self::Unknown(_) => "pending",
            Self::Deny | Self::Cancel | Self::Refund => "failed",
            Self::Expire => "expired",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::Unknown(_))
    }
}

#[derive(Debug)]
pub enum GatewayError {
    Http(reqwest::Error),
    UnexpectedStatus(u16),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "gateway request failed: {e}"),
            Self::UnexpectedStatus(code) => {
                write!(f, "gateway returned HTTP {code}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

/// The subset of the gateway's status response that reconciliation needs.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub gross_amount: Option<String>,
}

pub struct PaymentGateway {
    base_url: String,
    server_key: String,
    client: reqwest::Client,
}

impl PaymentGateway {
    pub fn new(base_url: String, server_key: String) -> Self {
        Self {
            base_url,
            server_key,
            client: reqwest::Client::new(),
        }
    }

    /// Reads `GATEWAY_BASE_URL` and `GATEWAY_SERVER_KEY` from the
    /// environment.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.sandbox.invalid".to_string()),
            std::env::var("GATEWAY_SERVER_KEY").unwrap_or_default(),
        )
    }

    /// Re-queries the gateway for the current status of `order_id`.
    #[tracing::instrument(skip(self))]
    pub async fn transaction_status(
        &self,
        order_id: &str,
    ) -> Result<StatusResponse, GatewayError> {
        let url = format!("{}/v2/{}/status", self.base_url, order_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(
                "status query for order {order_id} returned {}",
                response.status()
            );
            return Err(GatewayError::UnexpectedStatus(
                response.status().as_u16(),
            ));
        }

        Ok(response.json::<StatusResponse>().await?)
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Computes the signature the gateway attaches to notifications:
/// hex(HMAC-SHA256(server_key, "order_id:gross_amount")).
pub fn notification_signature(
    order_id: &str,
    gross_amount: i64,
    server_key: &str,
) -> String {
    let mut mac = HmacSha256::new_from_slice(server_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b":");
    mac.update(gross_amount.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a notification signature in constant time.
pub fn verify_notification(
    order_id: &str,
    gross_amount: i64,
    signature: &str,
    server_key: &str,
) -> bool {
    let expected = notification_signature(order_id, gross_amount, server_key);
    let (sig, exp) = (signature.as_bytes(), expected.as_bytes());
    sig.len() == exp.len()
        && sig
            .iter()
            .zip(exp.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_statuses_map_to_verified() {
        assert_eq!(
            GatewayStatus::from("settlement").registration_status(),
            "verified"
        );
        assert_eq!(
            GatewayStatus::from("capture").registration_status(),
            "verified"
        );
    }

    #[test]
    fn failure_statuses_map_to_failed_or_expired() {
        assert_eq!(GatewayStatus::from("deny").registration_status(), "failed");
        assert_eq!(
            GatewayStatus::from("cancel").registration_status(),
            "failed"
        );
        assert_eq!(
            GatewayStatus::from("expire").registration_status(),
            "expired"
        );
    }

    #[test]
    fn unknown_status_stays_pending() {
        let status = GatewayStatus::from("challenge");
        assert_eq!(status.registration_status(), "pending");
        assert!(!status.is_settled());
    }

    #[test]
    fn signature_round_trip() {
        let sig = notification_signature("MCVU25-ABC123", 750_000, "key");
        assert!(verify_notification("MCVU25-ABC123", 750_000, &sig, "key"));
    }

    #[test]
    fn tampered_signature_rejected() {
        let sig = notification_signature("MCVU25-ABC123", 750_000, "key");
        assert!(!verify_notification("MCVU25-ABC123", 750_001, &sig, "key"));
        assert!(!verify_notification("MCVU25-ABC123", 750_000, &sig, "other"));
        assert!(!verify_notification("MCVU25-ABC123", 750_000, "bad", "key"));
    }
}

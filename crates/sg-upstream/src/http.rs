//! reqwest-based upstream client.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use sg_common::UpstreamTxStatus;

use crate::{
    CreateTransactionRequest, CreatedTransaction, ExchangeClient, Result, TransactionStatus,
    UpstreamError,
};

/// API key header expected by the upstream service
const API_KEY_HEADER: &str = "x-api-key";
/// Exchange flow requested on every create
const EXCHANGE_FLOW: &str = "standard";

/// Configuration for the HTTP exchange client
#[derive(Debug, Clone)]
pub struct HttpExchangeConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchange.example/v2".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP implementation of [`ExchangeClient`].
pub struct HttpExchangeClient {
    client: Client,
    config: HttpExchangeConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    from_currency: &'a str,
    to_currency: &'a str,
    from_network: &'a str,
    to_network: &'a str,
    from_amount: &'a str,
    address: &'a str,
    flow: &'a str,
}

/// Raw create response; every field is optional so that absence is detected
/// here rather than surfacing as a deserialization error with no context.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCreateResponse {
    id: Option<String>,
    payin_address: Option<String>,
    payout_address: Option<String>,
    from_amount: Option<Value>,
    to_amount: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatusResponse {
    status: Option<String>,
    from_amount: Option<Value>,
    to_amount: Option<Value>,
    payout_hash: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl HttpExchangeClient {
    pub fn new(config: HttpExchangeConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Map a reqwest transport error into the taxonomy.
    fn transport_error(err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Connection(err.to_string())
        }
    }

    /// Classify a non-success HTTP response.
    async fn classify_failure(response: Response) -> UpstreamError {
        let status = response.status();
        let status_code = status.as_u16();

        if status == StatusCode::NOT_FOUND {
            return UpstreamError::NotFound;
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(30);
            return UpstreamError::RateLimited {
                retry_after_seconds: retry_after,
            };
        }

        if status.is_server_error() {
            return UpstreamError::Server {
                status: status_code,
            };
        }

        let message = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect::<String>();
        UpstreamError::Rejected {
            status: status_code,
            message,
        }
    }
}

#[async_trait::async_trait]
impl ExchangeClient for HttpExchangeClient {
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreatedTransaction> {
        let body = CreateBody {
            from_currency: &request.from_currency,
            to_currency: &request.to_currency,
            from_network: &request.from_network,
            to_network: &request.to_network,
            from_amount: &request.from_amount,
            address: &request.address,
            flow: EXCHANGE_FLOW,
        };

        debug!(
            from_currency = %request.from_currency,
            from_network = %request.from_network,
            "Creating upstream transaction"
        );

        let response = self
            .client
            .post(self.url("/exchange"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            let err = Self::classify_failure(response).await;
            warn!(error = %err, "Upstream create failed");
            return Err(err);
        }

        let raw: RawCreateResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        Ok(CreatedTransaction {
            id: require_string("id", raw.id)?,
            payin_address: require_string("payinAddress", raw.payin_address)?,
            payout_address: require_string("payoutAddress", raw.payout_address)?,
            from_amount: require_amount("fromAmount", raw.from_amount)?,
            to_amount: require_amount("toAmount", raw.to_amount)?,
        })
    }

    async fn transaction_status(&self, upstream_id: &str) -> Result<TransactionStatus> {
        let response = self
            .client
            .get(self.url("/exchange/by-id"))
            .query(&[("id", upstream_id)])
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let raw: RawStatusResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        let status_str = require_string("status", raw.status)?;
        let status = UpstreamTxStatus::from_str(&status_str).ok_or_else(|| {
            UpstreamError::Malformed(format!("unknown status value: {status_str}"))
        })?;

        Ok(TransactionStatus {
            status,
            from_amount: optional_amount(raw.from_amount),
            to_amount: optional_amount(raw.to_amount),
            payout_hash: raw.payout_hash,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

fn require_string(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(UpstreamError::Malformed(format!("missing field: {field}"))),
    }
}

/// Amount fields arrive as either JSON numbers or strings.
fn amount_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn require_amount(field: &str, value: Option<Value>) -> Result<String> {
    value
        .and_then(amount_to_string)
        .ok_or_else(|| UpstreamError::Malformed(format!("missing field: {field}")))
}

fn optional_amount(value: Option<Value>) -> Option<String> {
    value.and_then(amount_to_string)
}

use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    db_types::UserId,
    gateway::{
        ApiResponse,
        GatewayConfig,
        GatewayError,
        GatewayReceipt,
        GatewayRequest,
        GatewayTransaction,
        PaymentProcessor,
        ResultType,
    },
};

/// Header carrying the id of the user on whose behalf a request is made.
pub const USER_ID_HEADER: &str = "X-USER-ID";

/// Talks to the payment processor's REST API.
///
/// * `POST {base_url}/api/v1/payments` requests a payment
/// * `GET {base_url}/api/v1/payments/{transaction_key}` fetches a transaction
///
/// Both wrap their payload in an [`ApiResponse`] envelope.
#[derive(Clone)]
pub struct HttpPaymentProcessor {
    base_url: String,
    timeout: Duration,
    client: Arc<Client>,
}

impl HttpPaymentProcessor {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        if !config.api_key.is_empty() {
            let val = HeaderValue::from_str(format!("Bearer {}", config.api_key.reveal()).as_str())
                .map_err(|e| GatewayError::Initialization(e.to_string()))?;
            headers.insert(AUTHORIZATION, val);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.call_timeout)
            .connect_timeout(config.call_timeout.min(Duration::from_secs(1)))
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, timeout: config.call_timeout, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        user_id: UserId,
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("💳️ Sending {method} {url}");
        let mut req = self.client.request(method, url).header(USER_ID_HEADER, user_id.to_string());
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("HTTP {}: {message}", status.as_u16())));
        }
        trace!("💳️ Payment processor replied with {status}");
        let envelope = response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        match envelope.meta.result {
            ResultType::Success => envelope
                .data
                .ok_or_else(|| GatewayError::InvalidResponse("Response envelope carried no data".to_string())),
            ResultType::Fail => {
                let code = envelope.meta.error_code.unwrap_or_else(|| "UNKNOWN".to_string());
                let message = envelope.meta.message.unwrap_or_default();
                Err(GatewayError::Rejected(format!("{code}: {message}")))
            },
        }
    }
}

impl PaymentProcessor for HttpPaymentProcessor {
    async fn request_payment(&self, user_id: UserId, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError> {
        debug!("💳️ Requesting payment of {} for order #{}", request.amount, request.order_id);
        let receipt = self.rest_query(Method::POST, "/payments", user_id, Some(request)).await?;
        Ok(receipt)
    }

    async fn fetch_transaction(
        &self,
        user_id: UserId,
        transaction_key: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let path = format!("/payments/{transaction_key}");
        debug!("💳️ Fetching transaction {transaction_key}");
        self.rest_query::<GatewayTransaction, ()>(Method::GET, &path, user_id, None).await
    }
}

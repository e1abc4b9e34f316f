use serde::{Deserialize, Serialize};

use crate::db_types::{Money, OrderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    pub order_id: OrderId,
    pub card_type: String,
    pub card_no: String,
    pub amount: Money,
    pub callback_url: String,
}

impl std::fmt::Debug for GatewayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRequest")
            .field("order_id", &self.order_id)
            .field("card_type", &self.card_type)
            .field("amount", &self.amount)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReceipt {
    pub transaction_key: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayTransaction {
    pub transaction_key: String,
    pub order_id: OrderId,
    pub card_type: String,
    pub card_no: String,
    pub amount: Money,
    pub status: TransactionStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    Success,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub result: ResultType,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The envelope the processor wraps every response in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub meta: ResponseMeta,
    pub data: Option<T>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_receipt() {
        let json = r#"{"meta":{"result":"SUCCESS","errorCode":null,"message":null},
            "data":{"transactionKey":"20250816:TR:9577c5","status":"PENDING","reason":null}}"#;
        let response: ApiResponse<GatewayReceipt> = serde_json::from_str(json).unwrap();
        assert_eq!(response.meta.result, ResultType::Success);
        let receipt = response.data.unwrap();
        assert_eq!(receipt.transaction_key, "20250816:TR:9577c5");
        assert_eq!(receipt.status, TransactionStatus::Pending);
    }

    #[test]
    fn parse_failure() {
        let json = r#"{"meta":{"result":"FAIL","errorCode":"Bad Request","message":"invalid card"},"data":null}"#;
        let response: ApiResponse<GatewayTransaction> = serde_json::from_str(json).unwrap();
        assert_eq!(response.meta.result, ResultType::Fail);
        assert_eq!(response.meta.message.as_deref(), Some("invalid card"));
        assert!(response.data.is_none());
    }

    #[test]
    fn request_shape() {
        let request = GatewayRequest {
            order_id: 12,
            card_type: "SAMSUNG".into(),
            card_no: "1234-5678-9814-1451".into(),
            amount: Money::from_units(15_000),
            callback_url: "http://localhost:8370/api/v1/payments/callback".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["orderId"], 12);
        assert_eq!(json["cardType"], "SAMSUNG");
        assert_eq!(json["amount"], "15000.00");
        assert!(!format!("{request:?}").contains("9814"));
    }
}

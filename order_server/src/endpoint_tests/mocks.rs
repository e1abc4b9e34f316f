use mockall::mock;
use order_engine::{
    db_types::UserId,
    gateway::{GatewayError, GatewayReceipt, GatewayRequest, GatewayTransaction, PaymentProcessor},
};

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        async fn request_payment(&self, user_id: UserId, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayError>;
        async fn fetch_transaction(&self, user_id: UserId, transaction_key: &str) -> Result<GatewayTransaction, GatewayError>;
    }
}

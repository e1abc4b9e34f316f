use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use order_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    gateway::{CircuitBreakerRegistry, GuardedGateway, HttpPaymentProcessor},
    settlement_hooks,
    AccountApi,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    payment_timeout_worker::start_payment_timeout_worker,
    routes::{
        health,
        CancelOrderRoute,
        ChargePointsRoute,
        ConfirmOrderRoute,
        MyOrdersRoute,
        MyPointsRoute,
        OrderByIdRoute,
        PayOrderRoute,
        PaymentCallbackRoute,
        PlaceOrderRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let processor = HttpPaymentProcessor::new(&config.gateway)
        .map_err(|e| ServerError::InitializeError(format!("Could not create the payment processor client. {e}")))?;
    info!("🚀️ Payment processor at {}", config.gateway.base_url);
    let gateway = GuardedGateway::from_config(processor, &config.gateway, CircuitBreakerRegistry::global());
    let producers = start_event_handlers(&db, config.event_buffer_size).await;
    // The worker runs for the lifetime of the process
    let _worker = start_payment_timeout_worker(
        OrderFlowApi::new(db.clone(), producers.clone()),
        config.payment_sweep_interval,
        config.payment_timeout,
    );
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(ServerError::from)
}

/// Starts the event handlers and returns the producers that publish to them.
///
/// Order events are handled first, since the settlement hooks themselves confirm and cancel orders and must be able
/// to publish those events too.
pub async fn start_event_handlers(db: &SqliteDatabase, buffer_size: usize) -> EventProducers {
    let order_handlers = EventHandlers::new(buffer_size, order_notification_hooks());
    let mut producers = order_handlers.producers();
    order_handlers.start_handlers().await;

    let settlement_api = OrderFlowApi::new(db.clone(), producers.clone());
    let settlement_handlers = EventHandlers::new(buffer_size, settlement_hooks(settlement_api));
    producers.extend(settlement_handlers.producers());
    settlement_handlers.start_handlers().await;
    info!("🚀️ Event handlers started");
    producers
}

fn order_notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_confirmed(|ev| {
        Box::pin(async move {
            info!(
                "📬️ Order #{} for user {} confirmed. Total {}",
                ev.order.id, ev.order.user_id, ev.order.final_total
            );
        })
    });
    hooks.on_order_cancelled(|ev| {
        Box::pin(async move {
            info!(
                "📬️ Order #{} for user {} cancelled. {} returned to the balance",
                ev.order.id, ev.order.user_id, ev.order.final_total
            );
        })
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GuardedGateway<HttpPaymentProcessor>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let payments_api = PaymentFlowApi::new(orders_api.clone(), gateway.clone());
        let accounts_api = AccountApi::new(db.clone());
        let api_scope = web::scope("/api/v1")
            .service(PlaceOrderRoute::<SqliteDatabase, HttpPaymentProcessor>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(ConfirmOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase, HttpPaymentProcessor>::new())
            .service(PayOrderRoute::<SqliteDatabase, HttpPaymentProcessor>::new())
            .service(ChargePointsRoute::<SqliteDatabase>::new())
            .service(MyPointsRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("orders::access_log"))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(accounts_api))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies are reported in the same `{"error": ...}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejected request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into())
}

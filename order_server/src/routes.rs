//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any I/O (database calls, calls to the payment processor) must be
//! awaited, never blocked on.
//!
//! All user-facing routes identify the caller with the [`ActingUser`] extractor. The payment callback is called by
//! the payment processor, not a user, and does not need it.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use order_engine::{
    db_types::OrderId,
    gateway::PaymentProcessor,
    order_objects::{OrderInfo, OrderRequest},
    payment_objects::{PayOrderRequest, PaymentCallback},
    traits::{AccountManagement, OrderManagement, PaymentManagement},
    AccountApi,
    OrderFlowApi,
    PaymentFlowApi,
};

use crate::{
    auth::ActingUser,
    data_objects::{CallbackResponse, ChargeRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(place_order => Post "/orders" impl PaymentManagement, PaymentProcessor);
/// Route handler for order creation
///
/// Creates the order for the acting user. If the body carries payment details, the payment is requested from the
/// processor once the order is stored. An unreachable processor does not fail the request: the order is returned
/// `PENDING` with a `FAILED` payment, and can be paid again via `POST /payments`.
pub async fn place_order<B, P>(
    user: ActingUser,
    body: web::Json<OrderRequest>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement,
    P: PaymentProcessor,
{
    debug!("💻️ POST order for user {}", user.id());
    let order = body.into_inner().into_new_order(user.id());
    let placed = api.place_order(order).await.map_err(|e| {
        debug!("💻️ Could not place order for user {}. {e}", user.id());
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(OrderInfo::from(placed)))
}

route!(my_orders => Get "/orders" impl OrderManagement);
/// Route handler for the orders endpoint. Returns the acting user's orders, newest first.
pub async fn my_orders<B: OrderManagement>(
    user: ActingUser,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for user {}", user.id());
    let orders = api.orders_for_user(user.id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl PaymentManagement);
/// Fetches one of the acting user's orders, with its lines and payment attempts. Other users' orders are reported as
/// not found.
pub async fn order_by_id<B: PaymentManagement>(
    user: ActingUser,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id} for user {}", user.id());
    let details = api.order_details_for_user(user.id(), order_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(confirm_order => Post "/orders/{order_id}/confirm" impl OrderManagement);
pub async fn confirm_order<B: OrderManagement>(
    user: ActingUser,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST confirm order #{order_id} for user {}", user.id());
    let order = api.confirm_order_for_user(user.id(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl OrderManagement);
/// Cancels a `PENDING` order. Stock, coupons and the debited balance are restored.
pub async fn cancel_order<B: OrderManagement>(
    user: ActingUser,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST cancel order #{order_id} for user {}", user.id());
    let order = api.cancel_order_for_user(user.id(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(pay_order => Post "/payments" impl PaymentManagement, PaymentProcessor);
/// Pays an existing `PENDING` order. The amount must equal the order's final total.
pub async fn pay_order<B, P>(
    user: ActingUser,
    body: web::Json<PayOrderRequest>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement,
    P: PaymentProcessor,
{
    let request = body.into_inner();
    info!("💻️ POST payment for order #{} by user {}", request.order_id, user.id());
    let payment = api.pay_order(user.id(), request).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_callback => Post "/payments/callback" impl PaymentManagement, PaymentProcessor);
/// Route handler for payment processor callbacks
///
/// Callbacks can be delivered more than once. A repeat delivery for a payment that has already settled is
/// acknowledged with `DUPLICATE` and changes nothing. A 503 tells the processor to try again later.
pub async fn payment_callback<B, P>(
    body: web::Json<PaymentCallback>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement,
    P: PaymentProcessor,
{
    let callback = body.into_inner();
    info!(
        "💻️ Payment callback for transaction {} (order #{}): {}",
        callback.transaction_key, callback.order_id, callback.status
    );
    let result = api.handle_callback(callback).await.map_err(|e| {
        warn!("💻️ Payment callback was not applied. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(CallbackResponse { result }))
}

//----------------------------------------------   Points  ----------------------------------------------------

route!(charge_points => Post "/points/charge" impl AccountManagement);
pub async fn charge_points<B: AccountManagement>(
    user: ActingUser,
    body: web::Json<ChargeRequest>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ChargeRequest { amount } = body.into_inner();
    info!("💻️ POST charge {amount} points for user {}", user.id());
    let balance = api.charge(user.id(), amount).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(my_points => Get "/points" impl AccountManagement);
/// The acting user's balance and its history, oldest first.
pub async fn my_points<B: AccountManagement>(
    user: ActingUser,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET points for user {}", user.id());
    let points = api.points(user.id()).await?;
    Ok(HttpResponse::Ok().json(points))
}

use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use order_common::{helpers::parse_or_default, Secret};
use order_engine::gateway::{CircuitBreakerConfig, GatewayConfig, RetryPolicy};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/orders.db";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;
const DEFAULT_GATEWAY_URL: &str = "http://localhost:8082";
const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 3000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_WAIT_MS: u64 = 100;
const DEFAULT_BREAKER_WINDOW: usize = 10;
const DEFAULT_BREAKER_MIN_CALLS: usize = 5;
const DEFAULT_BREAKER_FAILURE_RATE: f64 = 50.0;
const DEFAULT_BREAKER_OPEN_SECS: u64 = 60;
const DEFAULT_BREAKER_HALF_OPEN_CALLS: usize = 3;
const DEFAULT_PAYMENT_TIMEOUT_MINS: i64 = 10;
const DEFAULT_PAYMENT_SWEEP_SECS: u64 = 300;
const DEFAULT_EVENT_BUFFER: usize = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_db_connections: u32,
    /// Connection, retry and circuit breaker settings for the external payment processor
    pub gateway: GatewayConfig,
    /// A PENDING payment older than this is failed by the timeout sweep.
    pub payment_timeout: chrono::Duration,
    /// How often the timeout sweep runs
    pub payment_sweep_interval: Duration,
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            gateway: GatewayConfig::default(),
            payment_timeout: chrono::Duration::minutes(DEFAULT_PAYMENT_TIMEOUT_MINS),
            payment_sweep_interval: Duration::from_secs(DEFAULT_PAYMENT_SWEEP_SECS),
            event_buffer_size: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ORDERS_HOST").ok().unwrap_or_else(|| DEFAULT_HOST.into());
        let port = env_or_default("ORDERS_PORT", DEFAULT_PORT);
        let database_url = env::var("ORDERS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ ORDERS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_db_connections = env_or_default("ORDERS_MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS);
        let gateway = gateway_config_from_env();
        let payment_timeout =
            chrono::Duration::minutes(env_or_default("ORDERS_PAYMENT_TIMEOUT_MINS", DEFAULT_PAYMENT_TIMEOUT_MINS));
        let payment_sweep_interval =
            Duration::from_secs(env_or_default("ORDERS_PAYMENT_SWEEP_SECS", DEFAULT_PAYMENT_SWEEP_SECS));
        let event_buffer_size = env_or_default("ORDERS_EVENT_BUFFER", DEFAULT_EVENT_BUFFER);
        Self {
            host,
            port,
            database_url,
            max_db_connections,
            gateway,
            payment_timeout,
            payment_sweep_interval,
            event_buffer_size,
        }
    }
}

fn gateway_config_from_env() -> GatewayConfig {
    let base_url = env::var("ORDERS_GATEWAY_URL").ok().unwrap_or_else(|| {
        info!("🪛️ ORDERS_GATEWAY_URL is not set. Using the default, {DEFAULT_GATEWAY_URL}.");
        DEFAULT_GATEWAY_URL.to_string()
    });
    let api_key = Secret::new(env::var("ORDERS_GATEWAY_API_KEY").unwrap_or_default());
    if api_key.is_empty() {
        info!("🪛️ ORDERS_GATEWAY_API_KEY is not set. Requests to the payment processor will not be authenticated.");
    }
    let call_timeout = Duration::from_millis(env_or_default("ORDERS_GATEWAY_TIMEOUT_MS", DEFAULT_GATEWAY_TIMEOUT_MS));
    let retry = RetryPolicy::new(
        env_or_default("ORDERS_GATEWAY_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS),
        Duration::from_millis(env_or_default("ORDERS_GATEWAY_RETRY_WAIT_MS", DEFAULT_RETRY_WAIT_MS)),
    );
    let mut failure_rate_threshold = env_or_default("ORDERS_BREAKER_FAILURE_RATE", DEFAULT_BREAKER_FAILURE_RATE);
    if !(0.0..=100.0).contains(&failure_rate_threshold) {
        warn!(
            "🪛️ ORDERS_BREAKER_FAILURE_RATE must be a percentage, but was {failure_rate_threshold}. Using the \
             default, {DEFAULT_BREAKER_FAILURE_RATE}, instead."
        );
        failure_rate_threshold = DEFAULT_BREAKER_FAILURE_RATE;
    }
    let breaker = CircuitBreakerConfig {
        window_size: env_or_default("ORDERS_BREAKER_WINDOW", DEFAULT_BREAKER_WINDOW).max(1),
        minimum_calls: env_or_default("ORDERS_BREAKER_MIN_CALLS", DEFAULT_BREAKER_MIN_CALLS).max(1),
        failure_rate_threshold,
        open_wait: Duration::from_secs(env_or_default("ORDERS_BREAKER_OPEN_SECS", DEFAULT_BREAKER_OPEN_SECS)),
        half_open_calls: env_or_default("ORDERS_BREAKER_HALF_OPEN_CALLS", DEFAULT_BREAKER_HALF_OPEN_CALLS).max(1),
    };
    GatewayConfig { base_url, api_key, call_timeout, retry, breaker }
}

/// Reads `name` from the environment. Unset variables give `default` silently; invalid values are logged and also
/// give `default`.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    parse_or_default(env::var(name).ok(), default).unwrap_or_else(|e| {
        error!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
        default
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8370);
        assert_eq!(config.database_url, "sqlite://data/orders.db");
        assert_eq!(config.payment_timeout, chrono::Duration::minutes(10));
        assert_eq!(config.payment_sweep_interval, Duration::from_secs(300));
        assert_eq!(config.gateway.call_timeout, Duration::from_millis(3000));
        assert_eq!(config.gateway.retry, RetryPolicy::new(3, Duration::from_millis(100)));
        assert_eq!(config.gateway.breaker, CircuitBreakerConfig::default());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        // Only variables unique to this test are set, so it can run alongside the others.
        env::set_var("ORDERS_TEST_PORT_A", "not-a-port");
        env::set_var("ORDERS_TEST_PORT_B", "8400");
        assert_eq!(env_or_default("ORDERS_TEST_PORT_A", 8370u16), 8370);
        assert_eq!(env_or_default("ORDERS_TEST_PORT_B", 8370u16), 8400);
        assert_eq!(env_or_default("ORDERS_TEST_UNSET", 7u32), 7);
    }
}

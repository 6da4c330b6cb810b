use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rskafka::client::Client as KafkaClient;
use sqlx::PgPool;

use super::handlers;
use crate::cache::CacheAdapter;
use crate::config::{CacheSettings, IdempotencySettings};
use crate::idempotency::{IdempotencyManager, IdempotencyManagerConfig, PostgresIdempotencyStore};
use crate::observability::HealthChecker;
use crate::services::{AccountService, DoubleEntryEngine, PaymentEngine};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis_client: redis::Client,
    pub kafka_client: Option<Arc<KafkaClient>>,
    pub metrics_handle: Option<PrometheusHandle>,
    pub health_checker: Option<Arc<HealthChecker>>,
    pub account_service: Arc<AccountService>,
    pub payment_engine: Arc<PaymentEngine>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        redis_client: redis::Client,
        kafka_client: Option<Arc<KafkaClient>>,
        cache_adapter: Arc<dyn CacheAdapter>,
        cache_settings: CacheSettings,
        idempotency_settings: IdempotencySettings,
    ) -> Self {
        let account_service = AccountService::new(pool.clone(), cache_adapter.clone(), cache_settings);
        let double_entry = DoubleEntryEngine::new(pool.clone(), account_service.clone());
        let account_service = Arc::new(account_service);
        let idempotency_store = PostgresIdempotencyStore::new(pool.clone());
        let idempotency = Arc::new(IdempotencyManager::new(
            idempotency_store,
            cache_adapter,
            IdempotencyManagerConfig {
                ttl_seconds: idempotency_settings.ttl_seconds,
                key_prefix: idempotency_settings.key_prefix,
            },
        ));
        let transaction_repo = crate::repositories::TransactionRepository::new(pool.clone());
        let payment_engine = Arc::new(PaymentEngine::new(double_entry, idempotency, transaction_repo));

        Self {
            pool,
            redis_client,
            kafka_client,
            metrics_handle: None,
            health_checker: None,
            account_service,
            payment_engine,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Adds health checker to the state.
    pub fn with_health_checker(mut self, checker: Arc<HealthChecker>) -> Self {
        self.health_checker = Some(checker);
        self
    }

    /// Returns true if Kafka is connected.
    pub fn kafka_connected(&self) -> bool {
        self.kafka_client.is_some()
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::detailed_health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Account endpoints
        .route("/accounts", post(handlers::create_account))
        .route("/accounts", get(handlers::list_accounts))
        .route("/accounts/:id", get(handlers::get_account))
        .route("/accounts/:id/balance", get(handlers::get_account_balance))
        // Transfer endpoint
        .route("/transfers", post(handlers::create_transfer))
        // Transaction endpoints
        .route("/transactions/:id", get(handlers::get_transaction))
        .route("/transactions/:id/reverse", post(handlers::reverse_transaction))
        .route("/transactions/account/:id/history", get(handlers::get_account_transaction_history))
        .with_state(state)
}

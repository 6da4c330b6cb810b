use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Currency, Money};
use crate::observability::get_metrics;
use crate::services::{ReversalCommand, TransferCommand};

use super::requests::{CreateAccountRequest, CreateTransferRequest, ListAccountsQuery, ReverseTransactionRequest, TransactionHistoryQuery};
use super::responses::{
    AccountResponse, ApiResponse, BalanceResponse, ErrorResponse, HealthResponse, PaginatedResponse, ServiceHealth,
    TransactionHistoryResponse, TransactionResponse, ValidationErrorDetail,
};
use super::routes::AppState;

fn validation_response(errors: Vec<super::requests::ValidationError>) -> Response {
    let details = errors
        .into_iter()
        .map(|e| ValidationErrorDetail {
            field: e.field,
            message: e.message,
        })
        .collect();
    let body = ApiResponse::<()>::error(ErrorResponse::new("Validation", "request failed validation").with_details(details));
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn parse_currency(raw: &str) -> Result<Currency, AppError> {
    Currency::from_str(raw).map_err(|e| AppError::Validation(e.to_string()))
}

// --- Accounts ---------------------------------------------------------

pub async fn create_account(State(state): State<AppState>, Json(request): Json<CreateAccountRequest>) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(errors);
    }

    let currency = match parse_currency(&request.currency) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    let initial_balance = match request.initial_balance {
        Some(amount) => match Money::new(amount, currency) {
            Ok(m) => Some(m),
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    match state.account_service.create(request.user_id, currency, initial_balance).await {
        Ok(account) => (StatusCode::CREATED, Json(ApiResponse::success(AccountResponse::from(account)))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_account(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.account_service.get(id).await {
        Ok(account) => Json(ApiResponse::success(AccountResponse::from(account))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_account_balance(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.account_service.get_balance(id).await {
        Ok(balance) => Json(ApiResponse::success(BalanceResponse::new(id, balance))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_accounts(State(state): State<AppState>, Query(query): Query<ListAccountsQuery>) -> Response {
    let Some(user_id) = query.user_id else {
        return AppError::Validation("user_id query parameter is required".to_string()).into_response();
    };

    let currency = match query.currency.as_deref().map(parse_currency) {
        Some(Ok(c)) => Some(c),
        Some(Err(e)) => return e.into_response(),
        None => None,
    };

    match state.account_service.list_by_user(user_id, currency).await {
        Ok(accounts) => {
            let items: Vec<AccountResponse> = accounts.into_iter().map(AccountResponse::from).collect();
            Json(ApiResponse::success(PaginatedResponse::new(items))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// --- Transfers / transactions -------------------------------------------

pub async fn create_transfer(State(state): State<AppState>, Json(request): Json<CreateTransferRequest>) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(errors);
    }

    let currency = match parse_currency(&request.currency) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    let amount = match Money::new(request.amount, currency) {
        Ok(m) => m,
        Err(e) => return e.into_response(),
    };

    // actor_user_id/ip_address/user_agent are sourced from the HTTP layer
    // (auth middleware, connection info) once one is wired in front of this
    // router; left unset here since this core does not depend on them.
    let command = TransferCommand {
        from_id: request.from_account_id,
        to_id: request.to_account_id,
        amount,
        idempotency_key: request.idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string()),
        description: request.description,
        reference_id: request.reference_id,
        actor_user_id: None,
        ip_address: None,
        user_agent: None,
        reversal_of: None,
    };

    let metrics = get_metrics();
    match state.payment_engine.transfer(command).await {
        Ok(transaction) => {
            metrics.record_transaction_completed("TRANSFER", &transaction.currency.to_string());
            (StatusCode::CREATED, Json(ApiResponse::success(TransactionResponse::from(transaction)))).into_response()
        }
        Err(e) => {
            metrics.record_transaction_failed("TRANSFER", e.kind());
            e.into_response()
        }
    }
}

pub async fn get_transaction(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.payment_engine.get_transaction(id).await {
        Ok(Some(transaction)) => Json(ApiResponse::success(TransactionResponse::from(transaction))).into_response(),
        Ok(None) => AppError::NotFound(format!("transaction {id} not found")).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_account_transaction_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TransactionHistoryQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    match state
        .payment_engine
        .get_account_transactions(id, limit, offset, query.start_date, query.end_date)
        .await
    {
        Ok(page) => Json(ApiResponse::success(TransactionHistoryResponse::from(page))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn reverse_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReverseTransactionRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(errors);
    }

    let command = ReversalCommand {
        original_transaction_id: id,
        reason: request.reason,
        idempotency_key: request.idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string()),
        actor_user_id: None,
        ip_address: None,
        user_agent: None,
    };

    let metrics = get_metrics();
    match state.payment_engine.reverse(command).await {
        Ok(transaction) => {
            metrics.record_transaction_reversed("REVERSAL");
            Json(ApiResponse::success(TransactionResponse::from(transaction))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// --- Health / metrics -----------------------------------------------------

pub async fn health_check(State(state): State<AppState>) -> Response {
    let (database, redis, kafka) = match &state.health_checker {
        Some(checker) => {
            let health = checker.check_all().await;
            let mut database = false;
            let mut redis = false;
            let mut kafka = false;
            for dep in &health.dependencies {
                match dep.name.as_str() {
                    "database" => database = dep.status.is_healthy(),
                    "redis" => redis = dep.status.is_healthy() || dep.status.is_degraded(),
                    "kafka" => kafka = dep.status.is_healthy(),
                    _ => {}
                }
            }
            (database, redis, kafka)
        }
        None => (false, false, false),
    };

    let status = if database && redis { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        services: ServiceHealth { database, redis, kafka },
    })
    .into_response()
}

pub async fn detailed_health_check(State(state): State<AppState>) -> Response {
    match &state.health_checker {
        Some(checker) => Json(checker.check_all().await).into_response(),
        None => AppError::Internal(anyhow::anyhow!("health checker not configured")).into_response(),
    }
}

pub async fn readiness_check(State(state): State<AppState>) -> Response {
    match &state.health_checker {
        Some(checker) if checker.is_ready().await => StatusCode::OK.into_response(),
        _ => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

pub async fn liveness_check(State(state): State<AppState>) -> Response {
    match &state.health_checker {
        Some(checker) if checker.is_alive() => StatusCode::OK.into_response(),
        _ => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

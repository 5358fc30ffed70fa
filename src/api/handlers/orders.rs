use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{order_error, UserResponse};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::entitlement::NewOrder;
use crate::session::AuthContext;
use crate::storage::models::Order;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateOrderRequest {
    pub amount: f64,
    pub item_id: String,
    pub item_type: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PaymentProofRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOrderResponse {
    pub message: String,
    pub order: Order,
    pub user: UserResponse,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<JSend<Order>>), ApiError> {
    let order = state
        .orders
        .create_order(
            ctx.identity_id,
            NewOrder {
                amount: req.amount,
                item_id: req.item_id,
                item_type: req.item_type,
            },
        )
        .map_err(order_error)?;

    Ok((StatusCode::CREATED, JSend::success(order)))
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<Order>>>, ApiError> {
    let orders = state.orders.all_orders().map_err(order_error)?;
    Ok(JSend::success(orders))
}

pub async fn list_user_orders(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(user_id): Path<String>,
) -> Result<Json<JSend<Vec<Order>>>, ApiError> {
    let orders = state
        .orders
        .orders_for_user(&user_id, &ctx)
        .map_err(order_error)?;
    Ok(JSend::success(orders))
}

pub async fn attach_payment_proof(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<String>,
    AppJson(req): AppJson<PaymentProofRequest>,
) -> Result<Json<JSend<Order>>, ApiError> {
    let order = state
        .orders
        .attach_payment_proof(&id, &req.url, &ctx)
        .map_err(order_error)?;
    Ok(JSend::success(order))
}

pub async fn verify_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<VerifyOrderResponse>>, ApiError> {
    let granted = state.orders.verify_order(&id).map_err(order_error)?;

    Ok(JSend::success(VerifyOrderResponse {
        message: "order verified and premium access granted".to_string(),
        order: granted.order,
        user: UserResponse::from_user(granted.user, state.clock.now()),
    }))
}

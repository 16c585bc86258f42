use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use mongodb::bson::{doc, to_bson};
use tracing::info;

use crate::{
    auth::{AdminUser, AuthUser},
    error::AppError,
    models::PaymentConfig,
    state::AppState,
    utils::{canteen_key, canteens_key, parse_object_id},
};

/// Payment details shown to a user about to pay; 404 until the canteen's
/// admin has configured them.
pub async fn get_payment_handler(
    AuthUser(_): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(canteen_id): Path<String>,
) -> Result<Json<PaymentConfig>, AppError> {
    let canteen = state
        .db
        .canteens
        .find_one(doc! { "_id": parse_object_id(&canteen_id)? })
        .await?
        .ok_or(AppError::NotFound)?;

    let payment = canteen.payment.ok_or(AppError::NotFound)?;

    Ok(Json(payment))
}

pub async fn set_payment_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(canteen_id): Path<String>,
    Json(payment): Json<PaymentConfig>,
) -> Result<Json<PaymentConfig>, AppError> {
    if payment.upi_id.trim().is_empty() {
        return Err(AppError::Validation("UPI id must not be empty".into()));
    }

    let canteen_oid = parse_object_id(&canteen_id)?;

    let matched = state
        .db
        .canteens
        .update_one(
            doc! { "_id": canteen_oid },
            doc! { "$set": { "payment": to_bson(&payment)? } },
        )
        .await?
        .matched_count;

    if matched == 0 {
        return Err(AppError::NotFound);
    }

    state
        .cache
        .remove(&[canteens_key(), &canteen_key(&canteen_oid)])
        .await;
    info!(canteen = %canteen_id, "Updated payment config");

    Ok(Json(payment))
}

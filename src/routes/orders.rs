use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures::TryStreamExt;
use mongodb::bson::{DateTime, doc, to_bson};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    auth::{AdminUser, AuthUser, Role},
    cache::RECENT_ORDERS_TTL,
    error::AppError,
    models::{Order, OrderLine, OrderStatus},
    state::AppState,
    utils::{parse_object_id, recent_orders_key},
};

const RECENT_ORDERS_LIMIT: i64 = 20;

#[derive(Deserialize)]
pub struct OrderLineInput {
    pub menu_item_id: String,
    pub qty: i32,
}

#[derive(Deserialize)]
pub struct OrderInput {
    pub canteen_id: String,
    pub lines: Vec<OrderLineInput>,
}

#[derive(Deserialize)]
pub struct StatusInput {
    pub status: OrderStatus,
}

pub async fn create_order_handler(
    AuthUser(user): AuthUser,
    State(state): State<Arc<AppState>>,
    Json(input): Json<OrderInput>,
) -> Result<impl IntoResponse, AppError> {
    if input.lines.is_empty() {
        return Err(AppError::Validation("Order has no lines".into()));
    }

    let user_id = user.id.ok_or(AppError::Unauthorized)?;
    let canteen_id = parse_object_id(&input.canteen_id)?;

    let canteen = state
        .db
        .canteens
        .find_one(doc! { "_id": canteen_id })
        .await?
        .ok_or(AppError::NotFound)?;

    if !canteen.open {
        return Err(AppError::Validation("Canteen is closed".into()));
    }

    // Prices come from the menu, never from the client.
    let mut lines = Vec::with_capacity(input.lines.len());
    let mut total: i64 = 0;

    for line in &input.lines {
        if line.qty < 1 {
            return Err(AppError::Validation("Quantity must be at least 1".into()));
        }

        let item = state
            .db
            .menu_items
            .find_one(doc! { "_id": parse_object_id(&line.menu_item_id)? })
            .await?
            .ok_or(AppError::NotFound)?;

        if item.canteen_id != canteen_id {
            return Err(AppError::MalformedPayload);
        }
        if !item.available {
            return Err(AppError::Validation(format!(
                "{} is currently unavailable",
                item.name
            )));
        }

        total += item.price * i64::from(line.qty);
        lines.push(OrderLine {
            menu_item_id: item.id.ok_or(AppError::NotFound)?,
            name: item.name,
            price: item.price,
            qty: line.qty,
        });
    }

    let mut order = Order {
        id: None,
        user_id,
        canteen_id,
        lines,
        total,
        status: OrderStatus::Placed,
        created_at: DateTime::now(),
    };

    // The insert goes through the order queue so a rush of submissions hits
    // the database with bounded concurrency, first come first served.
    let orders = state.db.orders.clone();
    let created = state
        .orders
        .submit(user_id.to_hex(), async move {
            let inserted = orders.insert_one(&order).await?;
            order.id = inserted.inserted_id.as_object_id();
            Ok(order)
        })
        .await?;

    state.cache.remove(&[&recent_orders_key(&user_id)]).await;
    info!(order = ?created.id, total = created.total, "Placed order");

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_my_orders_handler(
    AuthUser(user): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let user_id = user.id.ok_or(AppError::Unauthorized)?;

    let key = recent_orders_key(&user_id);
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(Json(hit));
    }

    let orders: Vec<Order> = state
        .db
        .orders
        .find(doc! { "user_id": user_id })
        .sort(doc! { "created_at": -1 })
        .limit(RECENT_ORDERS_LIMIT)
        .await?
        .try_collect()
        .await?;

    let listing = serde_json::to_value(&orders)?;
    state
        .cache
        .set(key, listing.clone(), RECENT_ORDERS_TTL)
        .await;

    Ok(Json(listing))
}

pub async fn get_order_handler(
    AuthUser(user): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .db
        .orders
        .find_one(doc! { "_id": parse_object_id(&id)? })
        .await?
        .ok_or(AppError::NotFound)?;

    if user.role != Role::Admin && user.id != Some(order.user_id) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(order))
}

pub async fn update_order_status_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<StatusInput>,
) -> Result<Json<Order>, AppError> {
    let order_id = parse_object_id(&id)?;

    let updated = state
        .db
        .orders
        .find_one_and_update(
            doc! { "_id": order_id },
            doc! { "$set": { "status": to_bson(&input.status)? } },
        )
        .return_document(mongodb::options::ReturnDocument::After)
        .await?
        .ok_or(AppError::NotFound)?;

    // The owner's cached listing now shows a stale status.
    state
        .cache
        .remove(&[&recent_orders_key(&updated.user_id)])
        .await;
    info!(order = %id, status = ?updated.status, "Updated order status");

    Ok(Json(updated))
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures::TryStreamExt;
use mongodb::bson::{DateTime, doc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    auth::AdminUser,
    cache::MENU_TTL,
    error::AppError,
    models::MenuItem,
    state::AppState,
    utils::{menu_key, menu_prefix, parse_object_id},
};

#[derive(Deserialize)]
pub struct MenuQuery {
    pub category: Option<String>,
    pub available: Option<bool>,
}

#[derive(Deserialize)]
pub struct MenuItemInput {
    pub name: String,
    pub category: String,
    pub price: i64,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl MenuItemInput {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".into()));
        }
        if self.price < 0 {
            return Err(AppError::Validation("Price must not be negative".into()));
        }

        Ok(())
    }
}

pub async fn list_menu_handler(
    State(state): State<Arc<AppState>>,
    Path(canteen_id): Path<String>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<Value>, AppError> {
    let canteen_oid = parse_object_id(&canteen_id)?;

    let key = menu_key(&canteen_oid, query.category.as_deref(), query.available);
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(Json(hit));
    }

    let mut filter = doc! { "canteen_id": canteen_oid };
    if let Some(category) = &query.category {
        filter.insert("category", category);
    }
    if let Some(available) = query.available {
        filter.insert("available", available);
    }

    let items: Vec<MenuItem> = state
        .db
        .menu_items
        .find(filter)
        .sort(doc! { "category": 1, "name": 1 })
        .await?
        .try_collect()
        .await?;

    let listing = serde_json::to_value(&items)?;
    state.cache.set(key, listing.clone(), MENU_TTL).await;

    Ok(Json(listing))
}

pub async fn create_menu_item_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(canteen_id): Path<String>,
    Json(input): Json<MenuItemInput>,
) -> Result<impl IntoResponse, AppError> {
    input.validate()?;

    let canteen_oid = parse_object_id(&canteen_id)?;
    state
        .db
        .canteens
        .find_one(doc! { "_id": canteen_oid })
        .await?
        .ok_or(AppError::NotFound)?;

    let mut item = MenuItem {
        id: None,
        canteen_id: canteen_oid,
        name: input.name.trim().to_string(),
        category: input.category,
        price: input.price,
        available: input.available,
        created_at: DateTime::now(),
    };

    let inserted = state.db.menu_items.insert_one(&item).await?;
    item.id = inserted.inserted_id.as_object_id();

    state.cache.remove_prefix(&menu_prefix(&canteen_oid)).await;
    info!(canteen = %canteen_id, item = %item.name, "Created menu item");

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_menu_item_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<MenuItemInput>,
) -> Result<Json<MenuItem>, AppError> {
    input.validate()?;

    let item_id = parse_object_id(&id)?;

    let updated = state
        .db
        .menu_items
        .find_one_and_update(
            doc! { "_id": item_id },
            doc! { "$set": {
                "name": input.name.trim(),
                "category": &input.category,
                "price": input.price,
                "available": input.available,
            }},
        )
        .return_document(mongodb::options::ReturnDocument::After)
        .await?
        .ok_or(AppError::NotFound)?;

    state
        .cache
        .remove_prefix(&menu_prefix(&updated.canteen_id))
        .await;

    Ok(Json(updated))
}

pub async fn delete_menu_item_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let item_id = parse_object_id(&id)?;

    // Fetch first: the canteen id is needed to invalidate its listings.
    let item = state
        .db
        .menu_items
        .find_one_and_delete(doc! { "_id": item_id })
        .await?
        .ok_or(AppError::NotFound)?;

    state
        .cache
        .remove_prefix(&menu_prefix(&item.canteen_id))
        .await;
    info!(item = %item.name, "Deleted menu item");

    Ok(StatusCode::NO_CONTENT)
}

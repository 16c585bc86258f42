use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
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
    cache::CANTEENS_TTL,
    error::AppError,
    models::Canteen,
    state::AppState,
    utils::{canteen_key, canteens_key, menu_prefix, parse_object_id},
};

#[derive(Deserialize)]
pub struct CanteenInput {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_open")]
    pub open: bool,
}

fn default_open() -> bool {
    true
}

impl CanteenInput {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".into()));
        }

        Ok(())
    }
}

pub async fn list_canteens_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    if let Some(hit) = state.cache.get(canteens_key()).await {
        return Ok(Json(hit));
    }

    let canteens: Vec<Canteen> = state
        .db
        .canteens
        .find(doc! {})
        .sort(doc! { "name": 1 })
        .await?
        .try_collect()
        .await?;

    let listing = serde_json::to_value(&canteens)?;
    state
        .cache
        .set(canteens_key(), listing.clone(), CANTEENS_TTL)
        .await;

    Ok(Json(listing))
}

pub async fn get_canteen_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let canteen_id = parse_object_id(&id)?;

    let key = canteen_key(&canteen_id);
    if let Some(hit) = state.cache.get(&key).await {
        return Ok(Json(hit));
    }

    let canteen = state
        .db
        .canteens
        .find_one(doc! { "_id": canteen_id })
        .await?
        .ok_or(AppError::NotFound)?;

    let value = serde_json::to_value(&canteen)?;
    state.cache.set(key, value.clone(), CANTEENS_TTL).await;

    Ok(Json(value))
}

pub async fn create_canteen_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(input): Json<CanteenInput>,
) -> Result<impl IntoResponse, AppError> {
    input.validate()?;

    let mut canteen = Canteen {
        id: None,
        name: input.name.trim().to_string(),
        location: input.location,
        description: input.description,
        open: input.open,
        payment: None,
        created_at: DateTime::now(),
    };

    let inserted = state.db.canteens.insert_one(&canteen).await?;
    canteen.id = inserted.inserted_id.as_object_id();

    state.cache.remove(&[canteens_key()]).await;
    info!(name = %canteen.name, "Created canteen");

    Ok((StatusCode::CREATED, Json(canteen)))
}

pub async fn update_canteen_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<CanteenInput>,
) -> Result<Json<Canteen>, AppError> {
    input.validate()?;

    let canteen_id = parse_object_id(&id)?;

    let updated = state
        .db
        .canteens
        .find_one_and_update(
            doc! { "_id": canteen_id },
            doc! { "$set": {
                "name": input.name.trim(),
                "location": &input.location,
                "description": &input.description,
                "open": input.open,
            }},
        )
        .return_document(mongodb::options::ReturnDocument::After)
        .await?
        .ok_or(AppError::NotFound)?;

    state
        .cache
        .remove(&[canteens_key(), &canteen_key(&canteen_id)])
        .await;

    Ok(Json(updated))
}

pub async fn delete_canteen_handler(
    AdminUser(_): AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let canteen_id = parse_object_id(&id)?;

    let deleted = state
        .db
        .canteens
        .delete_one(doc! { "_id": canteen_id })
        .await?;

    if deleted.deleted_count == 0 {
        return Err(AppError::NotFound);
    }

    // Menu items of a deleted canteen have nothing to hang off anymore.
    state
        .db
        .menu_items
        .delete_many(doc! { "canteen_id": canteen_id })
        .await?;

    state
        .cache
        .remove(&[canteens_key(), &canteen_key(&canteen_id)])
        .await;
    state.cache.remove_prefix(&menu_prefix(&canteen_id)).await;
    info!(canteen = %id, "Deleted canteen");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> CanteenInput {
        CanteenInput {
            name: name.to_string(),
            location: "Block A".to_string(),
            description: String::new(),
            open: true,
        }
    }

    // Create and update share this check; a rename to whitespace must be
    // rejected the same way an all-whitespace create is.
    #[test]
    fn blank_name_rejected() {
        assert!(input("   ").validate().is_err());
        assert!(input("").validate().is_err());
        assert!(input("Main Canteen").validate().is_ok());
    }
}

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

use crate::{
    auth::AuthUser, error::AppError, models::Feedback, state::AppState, utils::parse_object_id,
};

#[derive(Deserialize)]
pub struct FeedbackInput {
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn create_feedback_handler(
    AuthUser(user): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(canteen_id): Path<String>,
    Json(input): Json<FeedbackInput>,
) -> Result<impl IntoResponse, AppError> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".into(),
        ));
    }

    let canteen_oid = parse_object_id(&canteen_id)?;
    state
        .db
        .canteens
        .find_one(doc! { "_id": canteen_oid })
        .await?
        .ok_or(AppError::NotFound)?;

    let mut feedback = Feedback {
        id: None,
        user_id: user.id.ok_or(AppError::Unauthorized)?,
        canteen_id: canteen_oid,
        rating: input.rating,
        comment: input.comment.filter(|c| !c.trim().is_empty()),
        created_at: DateTime::now(),
    };

    let inserted = state.db.feedback.insert_one(&feedback).await?;
    feedback.id = inserted.inserted_id.as_object_id();

    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn list_feedback_handler(
    State(state): State<Arc<AppState>>,
    Path(canteen_id): Path<String>,
) -> Result<Json<Vec<Feedback>>, AppError> {
    let feedback: Vec<Feedback> = state
        .db
        .feedback
        .find(doc! { "canteen_id": parse_object_id(&canteen_id)? })
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(feedback))
}

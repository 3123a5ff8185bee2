//! Categories API endpoints

use api_types::category::{CategoryCreated, CategoryNew, CategoryView};
use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{ServerError, server::ServerState, user};

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryNew>,
) -> Result<(StatusCode, Json<CategoryCreated>), ServerError> {
    let id = state
        .engine
        .new_category(&user.username, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(CategoryCreated { id })))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<CategoryView>>, ServerError> {
    let categories = state.engine.categories_for_user(&user.username).await?;
    Ok(Json(
        categories
            .into_iter()
            .map(|category| CategoryView {
                id: category.id,
                is_global: category.is_global(),
                name: category.name,
            })
            .collect(),
    ))
}

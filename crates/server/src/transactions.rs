//! Transactions API endpoints

use api_types::transaction::{TransactionCreated, TransactionList, TransactionNew, TransactionView};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::NewTransactionCmd;
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn view(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        account_id: tx.account_id,
        category_id: tx.category_id,
        amount_minor: tx.amount_minor,
        description: tx.description,
        effective_date: tx.effective_date,
        schedule_id: tx.schedule_id,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let id = state
        .engine
        .new_transaction(NewTransactionCmd {
            user_id: user.username,
            account_id: payload.account_id,
            category_id: payload.category_id,
            amount_minor: payload.amount_minor,
            description: payload.description,
            effective_date: payload.effective_date,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let tx = state.engine.transaction(&user.username, id).await?;
    Ok(Json(view(tx)))
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_transaction(&user.username, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(payload): Query<TransactionList>,
) -> Result<Json<Vec<TransactionView>>, ServerError> {
    let txs = state
        .engine
        .transactions_for_period(
            &user.username,
            payload.account_id,
            payload.date_start,
            payload.date_end,
        )
        .await?;
    Ok(Json(txs.into_iter().map(view).collect()))
}

//! Scheduled transactions API endpoints
//!
//! The list endpoint is the range view: it materializes anything due as a
//! side effect, then returns realized entries and projections together.

use api_types::scheduled_transaction::{
    Frequency as ApiFrequency, ScheduledEntryList, ScheduledEntryListResponse, ScheduledEntryView,
    ScheduledTransactionCreated, ScheduledTransactionNew, ScheduledTransactionView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::NewScheduleCmd;
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn map_frequency(frequency: ApiFrequency) -> engine::Frequency {
    match frequency {
        ApiFrequency::Daily => engine::Frequency::Daily,
        ApiFrequency::Weekly => engine::Frequency::Weekly,
        ApiFrequency::Monthly => engine::Frequency::Monthly,
        ApiFrequency::Yearly => engine::Frequency::Yearly,
    }
}

fn map_frequency_back(frequency: engine::Frequency) -> ApiFrequency {
    match frequency {
        engine::Frequency::Daily => ApiFrequency::Daily,
        engine::Frequency::Weekly => ApiFrequency::Weekly,
        engine::Frequency::Monthly => ApiFrequency::Monthly,
        engine::Frequency::Yearly => ApiFrequency::Yearly,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ScheduledTransactionNew>,
) -> Result<(StatusCode, Json<ScheduledTransactionCreated>), ServerError> {
    let id = state
        .engine
        .new_schedule(NewScheduleCmd {
            user_id: user.username,
            account_id: payload.account_id,
            category_id: payload.category_id,
            amount_minor: payload.amount_minor,
            description: payload.description,
            frequency: map_frequency(payload.frequency),
            interval: payload.interval,
            date_start: payload.date_start,
            date_end: payload.date_end,
            max_occurrences: payload.max_occurrences,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ScheduledTransactionCreated { id })))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledTransactionView>, ServerError> {
    let schedule = state.engine.schedule(&user.username, id).await?;
    Ok(Json(ScheduledTransactionView {
        id: schedule.id,
        account_id: schedule.account_id,
        category_id: schedule.category_id,
        amount_minor: schedule.amount_minor,
        description: schedule.description,
        frequency: map_frequency_back(schedule.rule.frequency),
        interval: schedule.rule.interval,
        date_start: schedule.rule.start,
        date_end: schedule.rule.end,
        max_occurrences: schedule.rule.max_occurrences,
    }))
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_schedule(&user.username, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(payload): Query<ScheduledEntryList>,
) -> Result<Json<ScheduledEntryListResponse>, ServerError> {
    let today = Utc::now().date_naive();
    let entries = state
        .engine
        .scheduled_entries(
            &user.username,
            payload.account_id,
            payload.date_start,
            payload.date_end,
            today,
        )
        .await?;
    Ok(Json(ScheduledEntryListResponse {
        entries: entries
            .into_iter()
            .map(|entry| ScheduledEntryView {
                id: entry.id,
                account_id: entry.account_id,
                category_id: entry.category_id,
                amount_minor: entry.amount_minor,
                description: entry.description,
                date: entry.date,
                is_projection: entry.is_projection,
            })
            .collect(),
    }))
}

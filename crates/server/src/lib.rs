use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{run, run_with_listener, spawn_with_listener};

mod accounts;
mod categories;
mod scheduled_transactions;
mod server;
mod transactions;
mod user;

pub mod types {
    pub mod account {
        pub use api_types::account::{AccountCreated, AccountNew, AccountView};
    }

    pub mod category {
        pub use api_types::category::{CategoryCreated, CategoryNew, CategoryView};
    }

    pub mod transaction {
        pub use api_types::transaction::{
            TransactionCreated, TransactionList, TransactionNew, TransactionView,
        };
    }

    pub mod scheduled_transaction {
        pub use api_types::scheduled_transaction::{
            Frequency, ScheduledEntryList, ScheduledEntryListResponse, ScheduledEntryView,
            ScheduledTransactionCreated, ScheduledTransactionNew, ScheduledTransactionView,
        };
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

//TODO: Find a better solution
#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        EngineError::LimitExceeded(_) => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Validation(_) | EngineError::InvalidRecurrence(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

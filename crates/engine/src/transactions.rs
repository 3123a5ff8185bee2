//! Ledger entry primitives.
//!
//! A `Transaction` is one materialized, balance-affecting ledger entry. When
//! it realizes an occurrence of a scheduled transaction it carries the
//! `(schedule_id, occurrence_date)` back-reference; that pair is the
//! idempotency key and is unique across the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, scheduled_transactions::ScheduledTransaction};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub effective_date: NaiveDate,
    pub schedule_id: Option<Uuid>,
    pub occurrence_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// An ad-hoc entry; its own id is the natural idempotency key.
    pub fn new(
        account_id: Uuid,
        category_id: Uuid,
        amount_minor: i64,
        description: Option<String>,
        effective_date: NaiveDate,
    ) -> ResultEngine<Self> {
        if amount_minor == 0 {
            return Err(EngineError::Validation(
                "amount_minor must not be 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            category_id,
            amount_minor,
            description,
            effective_date,
            schedule_id: None,
            occurrence_date: None,
            created_at: Utc::now(),
        })
    }

    /// An entry realizing one occurrence of a scheduled transaction.
    pub fn materialized(schedule: &ScheduledTransaction, occurrence_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: schedule.account_id,
            category_id: schedule.category_id,
            amount_minor: schedule.amount_minor,
            description: Some(schedule.description.clone()),
            effective_date: occurrence_date,
            schedule_id: Some(schedule.id),
            occurrence_date: Some(occurrence_date),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub effective_date: Date,
    pub schedule_id: Option<String>,
    pub occurrence_date: Option<Date>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Category,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            category_id: ActiveValue::Set(tx.category_id.to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            description: ActiveValue::Set(tx.description.clone()),
            effective_date: ActiveValue::Set(tx.effective_date),
            schedule_id: ActiveValue::Set(tx.schedule_id.map(|id| id.to_string())),
            occurrence_date: ActiveValue::Set(tx.occurrence_date),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("transaction".to_string()))?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| EngineError::NotFound("account".to_string()))?,
            category_id: Uuid::parse_str(&model.category_id)
                .map_err(|_| EngineError::NotFound("category".to_string()))?,
            amount_minor: model.amount_minor,
            description: model.description,
            effective_date: model.effective_date,
            schedule_id: model
                .schedule_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            occurrence_date: model.occurrence_date,
            created_at: model.created_at,
        })
    }
}

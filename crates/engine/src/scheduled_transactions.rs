//! Scheduled (recurring) transaction primitives.
//!
//! A `ScheduledTransaction` pairs a signed amount with a [`RecurrenceRule`]
//! describing when it comes due. It belongs to exactly one account and is
//! immutable aside from replacement; deleting it removes all undone
//! projections while already materialized entries stay in the ledger.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Frequency, RecurrenceRule, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_minor: i64,
    pub description: String,
    pub rule: RecurrenceRule,
    pub created_at: DateTime<Utc>,
}

impl ScheduledTransaction {
    pub fn new(
        account_id: Uuid,
        category_id: Uuid,
        amount_minor: i64,
        description: String,
        rule: RecurrenceRule,
    ) -> ResultEngine<Self> {
        if amount_minor == 0 {
            return Err(EngineError::Validation(
                "amount_minor must not be 0".to_string(),
            ));
        }
        rule.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            category_id,
            amount_minor,
            description,
            rule,
            created_at: Utc::now(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub frequency: String,
    pub interval: i32,
    pub date_start: Date,
    pub date_end: Option<Date>,
    pub max_occurrences: Option<i32>,
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

impl From<&ScheduledTransaction> for ActiveModel {
    fn from(schedule: &ScheduledTransaction) -> Self {
        Self {
            id: ActiveValue::Set(schedule.id.to_string()),
            account_id: ActiveValue::Set(schedule.account_id.to_string()),
            category_id: ActiveValue::Set(schedule.category_id.to_string()),
            amount_minor: ActiveValue::Set(schedule.amount_minor),
            description: ActiveValue::Set(schedule.description.clone()),
            frequency: ActiveValue::Set(schedule.rule.frequency.as_str().to_string()),
            interval: ActiveValue::Set(schedule.rule.interval as i32),
            date_start: ActiveValue::Set(schedule.rule.start),
            date_end: ActiveValue::Set(schedule.rule.end),
            max_occurrences: ActiveValue::Set(schedule.rule.max_occurrences.map(|n| n as i32)),
            created_at: ActiveValue::Set(schedule.created_at),
        }
    }
}

impl TryFrom<Model> for ScheduledTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let rule = RecurrenceRule {
            frequency: Frequency::try_from(model.frequency.as_str())?,
            interval: u32::try_from(model.interval).map_err(|_| {
                EngineError::InvalidRecurrence("interval must be >= 1".to_string())
            })?,
            start: model.date_start,
            end: model.date_end,
            max_occurrences: model
                .max_occurrences
                .map(|n| {
                    u32::try_from(n).map_err(|_| {
                        EngineError::InvalidRecurrence(
                            "max_occurrences must be >= 0".to_string(),
                        )
                    })
                })
                .transpose()?,
        };
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("scheduled transaction".to_string()))?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| EngineError::NotFound("account".to_string()))?,
            category_id: Uuid::parse_str(&model.category_id)
                .map_err(|_| EngineError::NotFound("category".to_string()))?,
            amount_minor: model.amount_minor,
            description: model.description,
            rule,
            created_at: model.created_at,
        })
    }
}

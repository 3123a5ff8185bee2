//! Scheduled transaction lifecycle: create, read, delete.
//!
//! Listing lives in [`super::assemble`], which merges materialized history
//! with projections.

use chrono::NaiveDate;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Frequency, RecurrenceRule, ResultEngine, ScheduledTransaction,
    scheduled_transactions,
};

use super::{Engine, with_tx};

/// Create a recurrence rule on an account.
#[derive(Clone, Debug)]
pub struct NewScheduleCmd {
    pub user_id: String,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_minor: i64,
    pub description: String,
    pub frequency: Frequency,
    pub interval: u32,
    pub date_start: NaiveDate,
    pub date_end: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
}

impl Engine {
    /// Validate and persist a new scheduled transaction.
    ///
    /// Ownership and recurrence validation happen before anything is
    /// written; no ledger mutation is involved at creation time.
    pub async fn new_schedule(&self, cmd: NewScheduleCmd) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            self.require_account_for_write(&db_tx, cmd.account_id, &cmd.user_id)
                .await?;
            self.require_category_usable(&db_tx, cmd.category_id, &cmd.user_id)
                .await?;

            let rule = RecurrenceRule {
                frequency: cmd.frequency,
                interval: cmd.interval,
                start: cmd.date_start,
                end: cmd.date_end,
                max_occurrences: cmd.max_occurrences,
            };
            let schedule = ScheduledTransaction::new(
                cmd.account_id,
                cmd.category_id,
                cmd.amount_minor,
                cmd.description.trim().to_string(),
                rule,
            )?;
            scheduled_transactions::ActiveModel::from(&schedule)
                .insert(&db_tx)
                .await?;
            Ok(schedule.id)
        })
    }

    pub(super) async fn require_schedule_owner(
        &self,
        db_tx: &DatabaseTransaction,
        schedule_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<ScheduledTransaction> {
        let model = scheduled_transactions::Entity::find_by_id(schedule_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("scheduled transaction".to_string()))?;
        let schedule = ScheduledTransaction::try_from(model)?;
        // Not-owned reads as absent.
        if self
            .account_owned_by(db_tx, schedule.account_id, user_id)
            .await?
            .is_none()
        {
            return Err(EngineError::NotFound("scheduled transaction".to_string()));
        }
        Ok(schedule)
    }

    /// The rule, when its account is owned by `user_id`.
    pub async fn schedule(
        &self,
        user_id: &str,
        schedule_id: Uuid,
    ) -> ResultEngine<ScheduledTransaction> {
        with_tx!(self, |db_tx| {
            self.require_schedule_owner(&db_tx, schedule_id, user_id)
                .await
        })
    }

    /// Remove a rule. Undone projections vanish with it; entries already
    /// materialized from it stay in the ledger.
    pub async fn delete_schedule(&self, user_id: &str, schedule_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_schedule_owner(&db_tx, schedule_id, user_id)
                .await?;
            scheduled_transactions::Entity::delete_by_id(schedule_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    pub(super) async fn schedules_for_account(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<Vec<ScheduledTransaction>> {
        let models: Vec<scheduled_transactions::Model> = scheduled_transactions::Entity::find()
            .filter(scheduled_transactions::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(scheduled_transactions::Column::CreatedAt)
            .all(db_tx)
            .await?;
        models
            .into_iter()
            .map(ScheduledTransaction::try_from)
            .collect()
    }
}

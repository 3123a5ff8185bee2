//! The ledger mutation unit.
//!
//! [`Engine::apply_entry`] is the single primitive through which every
//! balance-affecting write goes: inside one database transaction it checks
//! the idempotency key, inserts the entry and adjusts the account balance.
//! Either both the entry and the balance change are durably visible or
//! neither is. Re-applying the same `(schedule_id, occurrence_date)` key
//! returns the existing entry and changes nothing, which is what makes
//! materialization safe to retry or race.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Transaction, accounts, transactions};

use super::{Engine, normalize_optional_text, with_tx};

/// Create an ad-hoc ledger entry.
#[derive(Clone, Debug)]
pub struct NewTransactionCmd {
    pub user_id: String,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub effective_date: NaiveDate,
}

impl Engine {
    async fn find_by_occurrence_key(
        &self,
        db_tx: &DatabaseTransaction,
        schedule_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> ResultEngine<Option<transactions::Model>> {
        transactions::Entity::find()
            .filter(transactions::Column::ScheduleId.eq(schedule_id.to_string()))
            .filter(transactions::Column::OccurrenceDate.eq(occurrence_date))
            .one(db_tx)
            .await
            .map_err(Into::into)
    }

    /// Apply one financial effect: insert `tx` and add its signed amount to
    /// the account balance, as one indivisible unit.
    ///
    /// Returns the entry id and whether a new entry was created. No
    /// overdraft policy is enforced here; balances may go negative.
    pub(super) async fn apply_entry(
        &self,
        db_tx: &DatabaseTransaction,
        tx: &Transaction,
    ) -> ResultEngine<(Uuid, bool)> {
        if let (Some(schedule_id), Some(occurrence_date)) = (tx.schedule_id, tx.occurrence_date) {
            if let Some(existing) = self
                .find_by_occurrence_key(db_tx, schedule_id, occurrence_date)
                .await?
            {
                return Uuid::parse_str(&existing.id)
                    .map(|id| (id, false))
                    .map_err(|_| EngineError::Validation("invalid transaction id".to_string()));
            }
        }

        if let Err(err) = transactions::ActiveModel::from(tx).insert(db_tx).await {
            // Lost an insert race: the unique occurrence-key index rejected
            // us, so the winner's entry is the result.
            if let (Some(schedule_id), Some(occurrence_date)) =
                (tx.schedule_id, tx.occurrence_date)
            {
                if let Some(existing) = self
                    .find_by_occurrence_key(db_tx, schedule_id, occurrence_date)
                    .await?
                {
                    return Uuid::parse_str(&existing.id)
                        .map(|id| (id, false))
                        .map_err(|_| {
                            EngineError::Validation("invalid transaction id".to_string())
                        });
                }
            }
            return Err(err.into());
        }

        let account = accounts::Entity::find_by_id(tx.account_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        let account_update = accounts::ActiveModel {
            id: ActiveValue::Set(account.id),
            balance_minor: ActiveValue::Set(account.balance_minor + tx.amount_minor),
            ..Default::default()
        };
        account_update.update(db_tx).await?;

        Ok((tx.id, true))
    }

    /// Create an ad-hoc ledger entry through the mutation unit.
    pub async fn new_transaction(&self, cmd: NewTransactionCmd) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            self.require_account_for_write(&db_tx, cmd.account_id, &cmd.user_id)
                .await?;
            self.require_category_usable(&db_tx, cmd.category_id, &cmd.user_id)
                .await?;

            let tx = Transaction::new(
                cmd.account_id,
                cmd.category_id,
                cmd.amount_minor,
                normalize_optional_text(cmd.description.as_deref()),
                cmd.effective_date,
            )?;
            let (id, _) = self.apply_entry(&db_tx, &tx).await?;
            Ok(id)
        })
    }

    /// The entry, when its account is owned by `user_id`.
    pub async fn transaction(
        &self,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("transaction".to_string()))?;
            let tx = Transaction::try_from(model)?;
            self.require_account_owner(&db_tx, tx.account_id, user_id)
                .await?;
            Ok(tx)
        })
    }

    /// Delete an ad-hoc entry, reversing its balance effect in the same
    /// database transaction.
    ///
    /// Entries materialized from a schedule are refused: dropping their
    /// idempotency row would let the next sweep recreate them.
    pub async fn delete_transaction(
        &self,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<()> {
        let user_id = user_id.to_string();
        with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("transaction".to_string()))?;
            let tx = Transaction::try_from(model.clone())?;
            let account = self
                .require_account_owner(&db_tx, tx.account_id, &user_id)
                .await?;
            if tx.schedule_id.is_some() {
                return Err(EngineError::Validation(
                    "materialized entries cannot be deleted".to_string(),
                ));
            }

            model.delete(&db_tx).await?;
            let account_update = accounts::ActiveModel {
                id: ActiveValue::Set(account.id),
                balance_minor: ActiveValue::Set(account.balance_minor - tx.amount_minor),
                ..Default::default()
            };
            account_update.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Entries on the account within `[date_start, date_end]`, oldest first.
    ///
    /// Empty when the account is absent or not owned by `user_id`.
    pub async fn transactions_for_period(
        &self,
        user_id: &str,
        account_id: Uuid,
        date_start: NaiveDate,
        date_end: NaiveDate,
    ) -> ResultEngine<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            if self
                .account_owned_by(&db_tx, account_id, user_id)
                .await?
                .is_none()
            {
                return Ok(Vec::new());
            }

            let models: Vec<transactions::Model> = transactions::Entity::find()
                .filter(transactions::Column::AccountId.eq(account_id.to_string()))
                .filter(transactions::Column::EffectiveDate.gte(date_start))
                .filter(transactions::Column::EffectiveDate.lte(date_end))
                .order_by_asc(transactions::Column::EffectiveDate)
                .order_by_asc(transactions::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            models.into_iter().map(Transaction::try_from).collect()
        })
    }
}

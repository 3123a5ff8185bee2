//! Materialization: turning due occurrences into ledger entries.
//!
//! Runs both lazily (a range query noticing due-but-unmaterialized dates)
//! and from the periodic sweep. Both paths may race on the same schedule;
//! the occurrence idempotency key in the ledger mutation unit guarantees
//! each occurrence is realized exactly once.

use chrono::NaiveDate;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{ResultEngine, ScheduledTransaction, Transaction, scheduled_transactions};

use super::{Engine, with_tx};

impl Engine {
    /// Materialize every occurrence of `schedule` due on or before `today`.
    ///
    /// Returns the number of entries created; already materialized
    /// occurrences are skipped via the idempotency key.
    pub(super) async fn materialize_schedule(
        &self,
        db_tx: &DatabaseTransaction,
        schedule: &ScheduledTransaction,
        today: NaiveDate,
    ) -> ResultEngine<u64> {
        if today < schedule.rule.start {
            return Ok(0);
        }

        let mut created = 0;
        for date in schedule.rule.occurrences(schedule.rule.start, today)? {
            let tx = Transaction::materialized(schedule, date);
            let (_, inserted) = self.apply_entry(db_tx, &tx).await?;
            if inserted {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Sweep every schedule that has started, materializing due occurrences.
    ///
    /// One database transaction per schedule: a failure on one schedule does
    /// not roll back the others, and the next sweep retries it safely.
    pub async fn sweep_due(&self, today: NaiveDate) -> ResultEngine<u64> {
        let models: Vec<scheduled_transactions::Model> = scheduled_transactions::Entity::find()
            .filter(scheduled_transactions::Column::DateStart.lte(today))
            .order_by_asc(scheduled_transactions::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut created = 0;
        for model in models {
            // One bad schedule must not starve the rest of the sweep.
            let schedule = match ScheduledTransaction::try_from(model) {
                Ok(schedule) => schedule,
                Err(err) => {
                    tracing::warn!("skipping undecodable schedule during sweep: {err}");
                    continue;
                }
            };
            let result: ResultEngine<u64> = with_tx!(self, |db_tx| {
                self.materialize_schedule(&db_tx, &schedule, today).await
            });
            match result {
                Ok(count) => created += count,
                Err(err) => {
                    tracing::warn!(
                        schedule_id = %schedule.id,
                        "materialization failed during sweep, will retry next pass: {err}"
                    );
                }
            }
        }
        if created > 0 {
            tracing::info!(created, "materialization sweep applied new entries");
        }
        Ok(created)
    }
}

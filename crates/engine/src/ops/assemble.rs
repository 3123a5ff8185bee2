//! Range-query assembly: materialized history merged with projections.

use chrono::{Days, NaiveDate};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Transaction, transactions};

use super::{Engine, with_tx};

/// One row of a scheduled-transaction range query.
///
/// Realized entries carry their ledger entry id; projections carry the
/// schedule id and are never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub is_projection: bool,
}

impl ScheduledEntry {
    fn realized(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            account_id: tx.account_id,
            category_id: tx.category_id,
            amount_minor: tx.amount_minor,
            description: tx.description,
            date: tx.effective_date,
            is_projection: false,
        }
    }
}

impl Engine {
    /// Scheduled activity on an account over `[date_start, date_end]`:
    /// materializes what is due, then merges persisted entries with
    /// projected future occurrences.
    ///
    /// Empty when the account is absent or not owned by `user_id`. Entries
    /// are ordered by effective date ascending; on equal dates realized
    /// entries come before projections, in creation order.
    pub async fn scheduled_entries(
        &self,
        user_id: &str,
        account_id: Uuid,
        date_start: NaiveDate,
        date_end: NaiveDate,
        today: NaiveDate,
    ) -> ResultEngine<Vec<ScheduledEntry>> {
        if date_end < date_start {
            return Err(EngineError::Validation(
                "date_end before date_start".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            if self
                .account_owned_by(&db_tx, account_id, user_id)
                .await?
                .is_none()
            {
                return Ok(Vec::new());
            }

            let schedules = self.schedules_for_account(&db_tx, account_id).await?;

            // (a) Catch up on anything due, from each schedule's start up to
            // the window cap. Occurrences due after the window are left for
            // the sweep or a later query.
            let due_upper = date_end.min(today);
            for schedule in &schedules {
                self.materialize_schedule(&db_tx, schedule, due_upper)
                    .await?;
            }

            // (b) Persisted schedule-originated entries in the window.
            let models: Vec<transactions::Model> = transactions::Entity::find()
                .filter(transactions::Column::AccountId.eq(account_id.to_string()))
                .filter(transactions::Column::ScheduleId.is_not_null())
                .filter(transactions::Column::EffectiveDate.gte(date_start))
                .filter(transactions::Column::EffectiveDate.lte(date_end))
                .order_by_asc(transactions::Column::EffectiveDate)
                .order_by_asc(transactions::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            let realized = models
                .into_iter()
                .map(|model| Transaction::try_from(model).map(ScheduledEntry::realized))
                .collect::<ResultEngine<Vec<_>>>()?;

            // (c) Projections: strictly after today, within the window.
            let mut projected: Vec<ScheduledEntry> = Vec::new();
            if let Some(projection_lower) = today.checked_add_days(Days::new(1)) {
                let projection_lower = projection_lower.max(date_start);
                if projection_lower <= date_end {
                    for schedule in &schedules {
                        for date in schedule
                            .rule
                            .occurrences(projection_lower, date_end)?
                        {
                            projected.push(ScheduledEntry {
                                id: schedule.id,
                                account_id: schedule.account_id,
                                category_id: schedule.category_id,
                                amount_minor: schedule.amount_minor,
                                description: Some(schedule.description.clone()),
                                date,
                                is_projection: true,
                            });
                        }
                    }
                    // Schedules are iterated in creation order; a stable sort
                    // keeps that order within equal dates.
                    projected.sort_by_key(|entry| entry.date);
                }
            }

            Ok(merge_by_date(realized, projected))
        })
    }
}

/// Stable merge of two date-sorted runs; on ties `left` (realized) wins.
fn merge_by_date(left: Vec<ScheduledEntry>, right: Vec<ScheduledEntry>) -> Vec<ScheduledEntry> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut right_iter = right.into_iter().peekable();
    for entry in left {
        while right_iter
            .peek()
            .is_some_and(|candidate| candidate.date < entry.date)
        {
            // Checked non-empty just above.
            if let Some(candidate) = right_iter.next() {
                out.push(candidate);
            }
        }
        out.push(entry);
    }
    out.extend(right_iter);
    out
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub name: String,
        /// Signed balance in minor units (cents).
        pub balance_minor: i64,
    }
}

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: Uuid,
        pub name: String,
        /// Global categories are visible to every user and have no owner.
        pub is_global: bool,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub account_id: Uuid,
        pub category_id: Uuid,
        /// Signed amount in minor units; positive is income, negative expense.
        pub amount_minor: i64,
        pub description: Option<String>,
        pub effective_date: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: Uuid,
    }

    /// Query string for listing entries over a date range.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionList {
        pub account_id: Uuid,
        pub date_start: NaiveDate,
        pub date_end: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub account_id: Uuid,
        pub category_id: Uuid,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub effective_date: NaiveDate,
        /// Present when the entry was materialized from a schedule.
        pub schedule_id: Option<Uuid>,
    }
}

pub mod scheduled_transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Frequency {
        Daily,
        Weekly,
        Monthly,
        Yearly,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduledTransactionNew {
        pub account_id: Uuid,
        pub category_id: Uuid,
        /// Signed amount in minor units applied at every occurrence.
        pub amount_minor: i64,
        pub description: String,
        pub frequency: Frequency,
        pub interval: u32,
        pub date_start: NaiveDate,
        pub date_end: Option<NaiveDate>,
        pub max_occurrences: Option<u32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduledTransactionCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduledTransactionView {
        pub id: Uuid,
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

    /// Query string for the range view of scheduled activity.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduledEntryList {
        pub account_id: Uuid,
        pub date_start: NaiveDate,
        pub date_end: NaiveDate,
    }

    /// One row of the range view: a realized entry or a projection.
    ///
    /// Realized rows carry the ledger entry id; projected rows carry the
    /// schedule id and do not exist in the ledger yet.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduledEntryView {
        pub id: Uuid,
        pub account_id: Uuid,
        pub category_id: Uuid,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub date: NaiveDate,
        pub is_projection: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScheduledEntryListResponse {
        pub entries: Vec<ScheduledEntryView>,
    }
}

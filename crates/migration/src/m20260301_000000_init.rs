//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Gruzzolo:
//!
//! - `users`: authentication
//! - `accounts`: ledgers owned by users, with a denormalized balance
//! - `categories`: transaction labels, global (seeded here) or per user
//! - `scheduled_transactions`: recurrence rules projected over time
//! - `transactions`: ledger entries, ad-hoc or materialized from a schedule
//!
//! Entries materialized from a schedule keep their `schedule_id` back
//! reference after the schedule is deleted, so that column carries no
//! foreign key. The unique `(schedule_id, occurrence_date)` index is the
//! idempotency key for materialization.

use sea_orm::{ConnectionTrait, Statement, Value};
use sea_orm_migration::prelude::*;
use uuid::Uuid;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    BalanceMinor,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    UserId,
    Name,
}

#[derive(Iden)]
enum ScheduledTransactions {
    Table,
    Id,
    AccountId,
    CategoryId,
    AmountMinor,
    Description,
    Frequency,
    Interval,
    DateStart,
    DateEnd,
    MaxOccurrences,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    AccountId,
    CategoryId,
    AmountMinor,
    Description,
    EffectiveDate,
    ScheduleId,
    OccurrenceDate,
    CreatedAt,
}

const GLOBAL_CATEGORIES: [&str; 6] = [
    "Groceries",
    "Leisure",
    "Rent",
    "Salary",
    "Transport",
    "Utilities",
];

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::UserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-user_id")
                            .from(Accounts::Table, Accounts::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-user_id")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::UserId).string())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-user_id")
                            .from(Categories::Table, Categories::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-user_id-name-unique")
                    .table(Categories::Table)
                    .col(Categories::UserId)
                    .col(Categories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Scheduled Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ScheduledTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::CategoryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Frequency)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Interval)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::DateStart)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledTransactions::DateEnd).date())
                    .col(ColumnDef::new(ScheduledTransactions::MaxOccurrences).integer())
                    .col(
                        ColumnDef::new(ScheduledTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-scheduled_transactions-account_id")
                            .from(
                                ScheduledTransactions::Table,
                                ScheduledTransactions::AccountId,
                            )
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-scheduled_transactions-category_id")
                            .from(
                                ScheduledTransactions::Table,
                                ScheduledTransactions::CategoryId,
                            )
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-scheduled_transactions-account_id-date_start")
                    .table(ScheduledTransactions::Table)
                    .col(ScheduledTransactions::AccountId)
                    .col(ScheduledTransactions::DateStart)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(ColumnDef::new(Transactions::CategoryId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::EffectiveDate)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ScheduleId).string())
                    .col(ColumnDef::new(Transactions::OccurrenceDate).date())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-account_id")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-schedule_id-occurrence_date-unique")
                    .table(Transactions::Table)
                    .col(Transactions::ScheduleId)
                    .col(Transactions::OccurrenceDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-account_id-effective_date")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::EffectiveDate)
                    .to_owned(),
            )
            .await?;

        seed_global_categories(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(ScheduledTransactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

async fn seed_global_categories(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let db = manager.get_connection();
    let backend = db.get_database_backend();

    for name in GLOBAL_CATEGORIES {
        let values = vec![
            Uuid::new_v4().to_string().into(),
            Value::String(None),
            name.to_string().into(),
        ];
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO categories (id, user_id, name) VALUES (?, ?, ?);",
            values,
        ))
        .await?;
    }

    Ok(())
}

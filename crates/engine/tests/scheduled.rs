use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineError, Frequency, Limits, NewScheduleCmd, NewTransactionCmd};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_limits(limits: Limits) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for user in ["alice", "bob"] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password) VALUES (?, ?)",
            vec![user.into(), "password".into()],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder()
        .database(db.clone())
        .limits(limits)
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with_limits(Limits::default()).await
}

async fn global_category(engine: &Engine) -> Uuid {
    engine
        .categories_for_user("alice")
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.is_global())
        .expect("migrations seed global categories")
        .id
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn weekly_schedule(
    user: &str,
    account_id: Uuid,
    category_id: Uuid,
    start: NaiveDate,
) -> NewScheduleCmd {
    NewScheduleCmd {
        user_id: user.to_string(),
        account_id,
        category_id,
        amount_minor: -1500,
        description: "gym".to_string(),
        frequency: Frequency::Weekly,
        interval: 1,
        date_start: start,
        date_end: None,
        max_occurrences: None,
    }
}

#[tokio::test]
async fn weekly_window_mixes_realized_and_projected() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();

    let entries = engine
        .scheduled_entries(
            "alice",
            account_id,
            date(2023, 1, 1),
            date(2023, 1, 30),
            date(2023, 1, 15),
        )
        .await
        .unwrap();

    let dates: Vec<_> = entries.iter().map(|e| e.date).collect();
    assert_eq!(
        dates,
        vec![
            date(2023, 1, 2),
            date(2023, 1, 9),
            date(2023, 1, 16),
            date(2023, 1, 23),
            date(2023, 1, 30),
        ]
    );
    let projected: Vec<_> = entries.iter().map(|e| e.is_projection).collect();
    assert_eq!(projected, vec![false, false, true, true, true]);

    // Only the due occurrences touched the balance.
    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, -3000);
}

#[tokio::test]
async fn materialization_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();

    let first = engine.sweep_due(date(2023, 1, 16)).await.unwrap();
    assert_eq!(first, 3);
    let second = engine.sweep_due(date(2023, 1, 16)).await.unwrap();
    assert_eq!(second, 0);

    let txs = engine
        .transactions_for_period("alice", account_id, date(2023, 1, 1), date(2023, 1, 31))
        .await
        .unwrap();
    assert_eq!(txs.len(), 3);

    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, -4500);
}

#[tokio::test]
async fn query_and_sweep_agree_on_single_materialization() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    engine
        .new_schedule(NewScheduleCmd {
            user_id: "alice".to_string(),
            account_id,
            category_id,
            amount_minor: -2000,
            description: "rent".to_string(),
            frequency: Frequency::Monthly,
            interval: 1,
            date_start: date(2023, 2, 1),
            date_end: None,
            max_occurrences: None,
        })
        .await
        .unwrap();

    // Just-in-time materialization from a read and a background sweep race
    // on the 2023-02-01 occurrence.
    let engine = Arc::new(engine);
    let query_engine = Arc::clone(&engine);
    let sweep_engine = Arc::clone(&engine);
    let query = tokio::spawn(async move {
        query_engine
            .scheduled_entries(
                "alice",
                account_id,
                date(2023, 2, 1),
                date(2023, 2, 28),
                date(2023, 2, 1),
            )
            .await
    });
    let sweep = tokio::spawn(async move { sweep_engine.sweep_due(date(2023, 2, 1)).await });

    query.await.unwrap().unwrap();
    sweep.await.unwrap().unwrap();

    let txs = engine
        .transactions_for_period("alice", account_id, date(2023, 2, 1), date(2023, 2, 28))
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].effective_date, date(2023, 2, 1));

    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, -2000);
}

#[tokio::test]
async fn monthly_schedule_clamps_to_month_end() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    engine
        .new_schedule(NewScheduleCmd {
            user_id: "alice".to_string(),
            account_id,
            category_id,
            amount_minor: -9900,
            description: "subscription".to_string(),
            frequency: Frequency::Monthly,
            interval: 1,
            date_start: date(2023, 1, 31),
            date_end: None,
            max_occurrences: Some(3),
        })
        .await
        .unwrap();

    engine.sweep_due(date(2023, 6, 1)).await.unwrap();

    let txs = engine
        .transactions_for_period("alice", account_id, date(2023, 1, 1), date(2023, 12, 31))
        .await
        .unwrap();
    let dates: Vec<_> = txs.iter().map(|tx| tx.effective_date).collect();
    assert_eq!(
        dates,
        vec![date(2023, 1, 31), date(2023, 2, 28), date(2023, 3, 31)]
    );
}

#[tokio::test]
async fn balance_matches_entry_sum_after_mixed_activity() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let adhoc_id = engine
        .new_transaction(NewTransactionCmd {
            user_id: "alice".to_string(),
            account_id,
            category_id,
            amount_minor: 100_000,
            description: Some("salary".to_string()),
            effective_date: date(2023, 1, 1),
        })
        .await
        .unwrap();

    engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();
    engine.sweep_due(date(2023, 1, 31)).await.unwrap();

    engine
        .delete_transaction("alice", adhoc_id)
        .await
        .unwrap();

    let txs = engine
        .transactions_for_period("alice", account_id, date(2023, 1, 1), date(2023, 12, 31))
        .await
        .unwrap();
    let sum: i64 = txs.iter().map(|tx| tx.amount_minor).sum();
    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, sum);
    // Five Mondays in January 2023 from the 2nd.
    assert_eq!(txs.len(), 5);
}

#[tokio::test]
async fn deleting_a_schedule_keeps_materialized_entries() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let schedule_id = engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();
    engine.sweep_due(date(2023, 1, 9)).await.unwrap();

    engine.delete_schedule("alice", schedule_id).await.unwrap();

    let err = engine.schedule("alice", schedule_id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::NotFound("scheduled transaction".to_string())
    );

    // History survives; projections are gone.
    let entries = engine
        .scheduled_entries(
            "alice",
            account_id,
            date(2023, 1, 1),
            date(2023, 1, 30),
            date(2023, 1, 9),
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| !e.is_projection));
}

#[tokio::test]
async fn other_users_see_nothing() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let schedule_id = engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();

    let entries = engine
        .scheduled_entries(
            "bob",
            account_id,
            date(2023, 1, 1),
            date(2023, 1, 30),
            date(2023, 1, 15),
        )
        .await
        .unwrap();
    assert!(entries.is_empty());

    let err = engine.schedule("bob", schedule_id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::NotFound("scheduled transaction".to_string())
    );

    let err = engine
        .new_schedule(weekly_schedule(
            "bob",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Unauthorized("account not owned by user".to_string())
    );

    let err = engine
        .delete_schedule("bob", schedule_id)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::NotFound("scheduled transaction".to_string())
    );
}

#[tokio::test]
async fn adhoc_entries_require_ownership() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let err = engine
        .new_transaction(NewTransactionCmd {
            user_id: "bob".to_string(),
            account_id,
            category_id,
            amount_minor: -500,
            description: None,
            effective_date: date(2023, 1, 1),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Unauthorized("account not owned by user".to_string())
    );

    let tx_id = engine
        .new_transaction(NewTransactionCmd {
            user_id: "alice".to_string(),
            account_id,
            category_id,
            amount_minor: -500,
            description: None,
            effective_date: date(2023, 1, 1),
        })
        .await
        .unwrap();

    let err = engine.delete_transaction("bob", tx_id).await.unwrap_err();
    assert_eq!(err, EngineError::NotFound("account".to_string()));

    // Alice's balance only reflects her own entry.
    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, -500);
}

#[tokio::test]
async fn invalid_recurrence_is_rejected_before_persisting() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let mut cmd = weekly_schedule("alice", account_id, category_id, date(2023, 5, 1));
    cmd.interval = 0;
    let err = engine.new_schedule(cmd).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidRecurrence("interval must be >= 1".to_string())
    );

    let mut cmd = weekly_schedule("alice", account_id, category_id, date(2023, 5, 1));
    cmd.date_end = Some(date(2023, 4, 1));
    let err = engine.new_schedule(cmd).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidRecurrence("end date before start date".to_string())
    );

    let mut cmd = weekly_schedule("alice", account_id, category_id, date(2023, 5, 1));
    cmd.category_id = Uuid::new_v4();
    let err = engine.new_schedule(cmd).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("category not exists".to_string())
    );
}

#[tokio::test]
async fn oversized_recurrence_values_are_rejected_before_persisting() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let mut cmd = weekly_schedule("alice", account_id, category_id, date(2023, 1, 2));
    cmd.interval = 2_147_483_648;
    let err = engine.new_schedule(cmd).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidRecurrence("interval too large".to_string())
    );

    let mut cmd = weekly_schedule("alice", account_id, category_id, date(2023, 1, 2));
    cmd.max_occurrences = Some(2_147_483_648);
    let err = engine.new_schedule(cmd).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidRecurrence("max_occurrences too large".to_string())
    );

    // Nothing was stored, so there is nothing to materialize.
    let created = engine.sweep_due(date(2023, 12, 31)).await.unwrap();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn sweep_skips_schedules_it_cannot_decode() {
    let (engine, db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    let broken_id = engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE scheduled_transactions SET frequency = ? WHERE id = ?",
        vec!["fortnightly".into(), broken_id.to_string().into()],
    ))
    .await
    .unwrap();

    engine
        .new_schedule(NewScheduleCmd {
            user_id: "alice".to_string(),
            account_id,
            category_id,
            amount_minor: -2000,
            description: "rent".to_string(),
            frequency: Frequency::Monthly,
            interval: 1,
            date_start: date(2023, 1, 1),
            date_end: None,
            max_occurrences: None,
        })
        .await
        .unwrap();

    // The healthy monthly schedule still materializes its due occurrence.
    let created = engine.sweep_due(date(2023, 1, 16)).await.unwrap();
    assert_eq!(created, 1);

    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, -2000);
}

#[tokio::test]
async fn materialized_entries_cannot_be_deleted() {
    let (engine, _db) = engine_with_db().await;
    let category_id = global_category(&engine).await;
    let account_id = engine.new_account("alice", "Checking").await.unwrap();

    engine
        .new_schedule(weekly_schedule(
            "alice",
            account_id,
            category_id,
            date(2023, 1, 2),
        ))
        .await
        .unwrap();
    engine.sweep_due(date(2023, 1, 2)).await.unwrap();

    let txs = engine
        .transactions_for_period("alice", account_id, date(2023, 1, 1), date(2023, 1, 31))
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert!(txs[0].schedule_id.is_some());

    let err = engine
        .delete_transaction("alice", txs[0].id)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("materialized entries cannot be deleted".to_string())
    );

    // The entry and its balance effect survive; nothing is re-materialized.
    let account = engine.account("alice", account_id).await.unwrap();
    assert_eq!(account.balance_minor, -1500);
    let created = engine.sweep_due(date(2023, 1, 2)).await.unwrap();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn account_cap_is_enforced() {
    let (engine, _db) = engine_with_limits(Limits {
        max_allowed_accounts: 2,
    })
    .await;

    engine.new_account("alice", "One").await.unwrap();
    engine.new_account("alice", "Two").await.unwrap();
    let err = engine.new_account("alice", "Three").await.unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));

    // The cap is per user.
    engine.new_account("bob", "One").await.unwrap();
}

//! Integration tests for the SQL service and the transaction envelope on SQLite.

use db_lifecycle::backends::SqlService;
use db_lifecycle::error::{DbError, DbErrorKind};
use db_lifecycle::models::{QueryParam, SqlConfig};
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE)",
    "CREATE INDEX users_email_idx ON users (email)",
];

/// Connected service over a fresh SQLite file. Keep the TempDir alive.
async fn setup() -> (TempDir, SqlService) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("app.db").display());
    let service = SqlService::new(SqlConfig::writable("app", url).unwrap()).unwrap();
    service.connect().await.unwrap();
    service.migrate(SCHEMA).await.unwrap();
    (dir, service)
}

async fn user_count(service: &SqlService) -> i64 {
    service
        .query_scalar_i64("SELECT COUNT(*) FROM users", &[])
        .await
        .unwrap()
}

#[tokio::test]
async fn test_commit_makes_rows_visible() {
    let (_dir, service) = setup().await;

    let inserted = service
        .transaction(|tx| {
            Box::pin(async move {
                let mut total = 0;
                for email in ["ada@example.com", "grace@example.com"] {
                    total += tx
                        .execute(
                            "INSERT INTO users (email) VALUES (?)",
                            &[QueryParam::from(email)],
                        )
                        .await?;
                }
                Ok(total)
            })
        })
        .await
        .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(user_count(&service).await, 2);
}

#[tokio::test]
async fn test_work_error_rolls_back_and_is_returned_unchanged() {
    let (_dir, service) = setup().await;

    let err = service
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(
                    "INSERT INTO users (email) VALUES (?)",
                    &[QueryParam::from("ada@example.com")],
                )
                .await?;
                Err::<(), _>(DbError::work("constraint violation"))
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DbErrorKind::Work);
    assert_eq!(err.to_string(), "constraint violation");
    assert_eq!(user_count(&service).await, 0);
}

#[tokio::test]
async fn test_unique_violation_inside_transaction() {
    let (_dir, service) = setup().await;
    service
        .execute(
            "INSERT INTO users (email) VALUES (?)",
            &[QueryParam::from("ada@example.com")],
        )
        .await
        .unwrap();

    let err = service
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(
                    "INSERT INTO users (email) VALUES (?)",
                    &[QueryParam::from("grace@example.com")],
                )
                .await?;
                tx.execute(
                    "INSERT INTO users (email) VALUES (?)",
                    &[QueryParam::from("ada@example.com")],
                )
                .await
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DbErrorKind::Database);
    assert!(err.unique_violation().is_some());
    // grace was rolled back with the failing insert
    assert_eq!(user_count(&service).await, 1);
}

#[tokio::test]
async fn test_reads_inside_transaction_see_own_writes() {
    let (_dir, service) = setup().await;

    let seen = service
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(
                    "INSERT INTO users (id, email) VALUES (?, ?)",
                    &[QueryParam::Int(10), QueryParam::from("ada@example.com")],
                )
                .await?;
                tx.query_scalar_i64(
                    "SELECT id FROM users WHERE email = ?",
                    &[QueryParam::from("ada@example.com")],
                )
                .await
            })
        })
        .await
        .unwrap();

    assert_eq!(seen, 10);
}

#[tokio::test]
async fn test_empty_query_inside_transaction_rolls_back() {
    let (_dir, service) = setup().await;

    let err = service
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(
                    "INSERT INTO users (email) VALUES (?)",
                    &[QueryParam::from("ada@example.com")],
                )
                .await?;
                tx.execute("", &[]).await
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), DbErrorKind::EmptyQuery);
    assert_eq!(user_count(&service).await, 0);
}

#[tokio::test]
async fn test_missing_row() {
    let (_dir, service) = setup().await;

    let err = service
        .query_scalar_i64(
            "SELECT id FROM users WHERE email = ?",
            &[QueryParam::from("nobody@example.com")],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), DbErrorKind::RowNotFound);
}

#[tokio::test]
async fn test_failed_migration_applies_nothing() {
    let (_dir, service) = setup().await;

    let err = service
        .migrate(&[
            "CREATE TABLE audit (id INTEGER PRIMARY KEY)",
            "CREATE TABLE users (id INTEGER PRIMARY KEY)",
        ])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), DbErrorKind::Database);

    let tables = service
        .query_scalar_i64(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[QueryParam::from("audit")],
        )
        .await
        .unwrap();
    assert_eq!(tables, 0);

    // nothing to do
    service.migrate::<&str>(&[]).await.unwrap();
}

#[tokio::test]
async fn test_data_survives_reconnect() {
    let (_dir, service) = setup().await;
    service
        .execute(
            "INSERT INTO users (email) VALUES (?)",
            &[QueryParam::from("ada@example.com")],
        )
        .await
        .unwrap();

    service.disconnect().await.unwrap();
    let err = service.execute("SELECT 1", &[]).await.unwrap_err();
    assert_eq!(err.kind(), DbErrorKind::NotConnected);

    service.connect().await.unwrap();
    assert_eq!(user_count(&service).await, 1);
}

#[tokio::test]
async fn test_fetch_text_columns() {
    let (_dir, service) = setup().await;
    for email in ["ada@example.com", "grace@example.com"] {
        service
            .execute("INSERT INTO users (email) VALUES (?)", &[QueryParam::from(email)])
            .await
            .unwrap();
    }

    let (email,): (String,) = service
        .fetch_one("SELECT email FROM users WHERE id = ?", &[QueryParam::Int(1)])
        .await
        .unwrap();
    assert_eq!(email, "ada@example.com");

    let users: Vec<(i64, String)> = service
        .fetch_all("SELECT id, email FROM users ORDER BY email DESC", &[])
        .await
        .unwrap();
    assert_eq!(
        users,
        vec![
            (2, "grace@example.com".to_string()),
            (1, "ada@example.com".to_string()),
        ]
    );

    let err = service
        .fetch_one::<(String,)>("SELECT email FROM users WHERE id = ?", &[QueryParam::Int(42)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), DbErrorKind::RowNotFound);
}

#[tokio::test]
async fn test_fetch_rows_inside_transaction() {
    let (_dir, service) = setup().await;

    let emails = service
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(
                    "INSERT INTO users (email) VALUES (?), (?)",
                    &[
                        QueryParam::from("ada@example.com"),
                        QueryParam::from("grace@example.com"),
                    ],
                )
                .await?;
                let (first,): (String,) = tx
                    .fetch_one("SELECT email FROM users ORDER BY id LIMIT 1", &[])
                    .await?;
                let all: Vec<(String,)> = tx
                    .fetch_all("SELECT email FROM users ORDER BY id", &[])
                    .await?;
                Ok((first, all.len()))
            })
        })
        .await
        .unwrap();

    assert_eq!(emails, ("ada@example.com".to_string(), 2));
}

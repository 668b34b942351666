//! Record store for users, expenses and settings.
//!
//! A single libSQL database file holds every table. Each expense and setting
//! row carries its owner's `user_id` and every lookup filters on it.
use anyhow::{Context, Result};
use libsql::{Builder, Connection, Row};
use std::{path::Path, sync::Arc};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::RwLock;

use crate::constants::{DATABASE_FILE, DEFAULT_SETTINGS};
use crate::dates::ExpenseDate;
use crate::models::{Expense, Setting, User};
use crate::money::Cents;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    email          TEXT UNIQUE NOT NULL,
    password_hash  TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
"#;

const CREATE_EXPENSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS expenses (
    id             TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL,
    amount_cents   INTEGER NOT NULL,
    category       TEXT NOT NULL,
    description    TEXT NOT NULL DEFAULT '',
    date           TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
"#;

const CREATE_EXPENSES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses (user_id, date)";

const CREATE_SETTINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    user_id        TEXT NOT NULL,
    key            TEXT NOT NULL,
    value          TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (user_id, key)
);
"#;

const EXPENSE_COLUMNS: &str =
    "id, user_id, amount_cents, category, description, date, created_at, updated_at";

const UPSERT_SETTING: &str = r#"
INSERT INTO settings (user_id, key, value, created_at, updated_at) VALUES (?, ?, ?, ?, ?)
ON CONFLICT (user_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

pub type Db = Arc<RwLock<Connection>>;

/// Opens (and creates if needed) `money_manager.db` under `data_dir`.
pub async fn init_db(data_dir: &str) -> Result<Db> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = Path::new(data_dir).join(DATABASE_FILE);
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;

    for statement in [
        CREATE_USERS_TABLE,
        CREATE_EXPENSES_TABLE,
        CREATE_EXPENSES_INDEX,
        CREATE_SETTINGS_TABLE,
    ] {
        conn.execute(statement, ()).await?;
    }

    tracing::debug!("database ready in {data_dir}");
    Ok(Arc::new(RwLock::new(conn)))
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    ts.format(&Rfc3339).context("failed to format timestamp")
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("invalid timestamp '{raw}'"))
}

pub fn extract_expense_from_row(row: Row) -> Result<Expense> {
    let id: String = row.get(0).context("failed to get expense id")?;
    let user_id: String = row.get(1).context("failed to get expense user_id")?;
    let amount: i64 = row.get(2).context("failed to get expense amount")?;
    let category: String = row.get(3).context("failed to get expense category")?;
    let description: String = row.get(4).context("failed to get expense description")?;
    let date: String = row.get(5).context("failed to get expense date")?;
    let created_at: String = row.get(6).context("failed to get expense created_at")?;
    let updated_at: String = row.get(7).context("failed to get expense updated_at")?;

    Ok(Expense {
        id,
        user_id,
        amount: Cents::new(amount),
        category,
        description,
        date: date
            .parse::<ExpenseDate>()
            .with_context(|| format!("invalid stored date '{date}'"))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn extract_setting_from_row(row: Row) -> Result<Setting> {
    let user_id: String = row.get(0).context("failed to get setting user_id")?;
    let key: String = row.get(1).context("failed to get setting key")?;
    let value: String = row.get(2).context("failed to get setting value")?;
    let created_at: String = row.get(3).context("failed to get setting created_at")?;
    let updated_at: String = row.get(4).context("failed to get setting updated_at")?;

    Ok(Setting {
        user_id,
        key,
        value,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Inserts the user together with the default settings in one transaction.
pub async fn insert_user_with_defaults(db: &Db, user: &User, now: OffsetDateTime) -> Result<()> {
    let now = format_timestamp(now)?;
    let conn = db.write().await;
    let tx = conn.transaction().await?;

    tx.execute(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        (
            user.id.as_str(),
            user.name.as_str(),
            user.email.as_str(),
            user.password_hash.as_str(),
            now.as_str(),
            now.as_str(),
        ),
    )
    .await?;

    for (key, value) in DEFAULT_SETTINGS {
        tx.execute(
            UPSERT_SETTING,
            (user.id.as_str(), key, value, now.as_str(), now.as_str()),
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn find_user_by_email(db: &Db, email: &str) -> Result<Option<User>> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, name, email, password_hash FROM users WHERE email = ?",
            [email],
        )
        .await?;

    if let Some(row) = rows.next().await? {
        Ok(Some(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
        }))
    } else {
        Ok(None)
    }
}

pub async fn insert_expense(db: &Db, expense: &Expense) -> Result<()> {
    let created_at = format_timestamp(expense.created_at)?;
    let updated_at = format_timestamp(expense.updated_at)?;
    let conn = db.write().await;

    conn.execute(
        "INSERT INTO expenses (id, user_id, amount_cents, category, description, date, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            expense.id.as_str(),
            expense.user_id.as_str(),
            expense.amount.cents(),
            expense.category.as_str(),
            expense.description.as_str(),
            expense.date.to_string(),
            created_at,
            updated_at,
        ),
    )
    .await?;
    Ok(())
}

pub async fn find_expense(db: &Db, user_id: &str, id: &str) -> Result<Option<Expense>> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ? AND user_id = ?"),
            [id, user_id],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(extract_expense_from_row(row)?)),
        None => Ok(None),
    }
}

/// Returns `false` when no row owned by `expense.user_id` has that id.
pub async fn update_expense(db: &Db, expense: &Expense) -> Result<bool> {
    let updated_at = format_timestamp(expense.updated_at)?;
    let conn = db.write().await;

    let affected = conn
        .execute(
            "UPDATE expenses SET amount_cents = ?, category = ?, description = ?, date = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            (
                expense.amount.cents(),
                expense.category.as_str(),
                expense.description.as_str(),
                expense.date.to_string(),
                updated_at,
                expense.id.as_str(),
                expense.user_id.as_str(),
            ),
        )
        .await?;
    Ok(affected > 0)
}

pub async fn delete_expense(db: &Db, user_id: &str, id: &str) -> Result<bool> {
    let conn = db.write().await;
    let affected = conn
        .execute(
            "DELETE FROM expenses WHERE id = ? AND user_id = ?",
            [id, user_id],
        )
        .await?;
    Ok(affected > 0)
}

/// All expenses of one user, in insertion order.
pub async fn scan_expenses(db: &Db, user_id: &str) -> Result<Vec<Expense>> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_id = ? ORDER BY rowid"),
            [user_id],
        )
        .await?;

    let mut expenses = Vec::new();
    while let Some(row) = rows.next().await? {
        expenses.push(extract_expense_from_row(row)?);
    }
    Ok(expenses)
}

pub async fn load_settings(db: &Db, user_id: &str) -> Result<Vec<Setting>> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT user_id, key, value, created_at, updated_at FROM settings WHERE user_id = ? ORDER BY key",
            [user_id],
        )
        .await?;

    let mut settings = Vec::new();
    while let Some(row) = rows.next().await? {
        settings.push(extract_setting_from_row(row)?);
    }
    Ok(settings)
}

/// Writes every row or none of them.
pub async fn upsert_settings(db: &Db, settings: &[Setting]) -> Result<()> {
    if settings.is_empty() {
        return Ok(());
    }

    let conn = db.write().await;
    let tx = conn.transaction().await?;

    for setting in settings {
        tx.execute(
            UPSERT_SETTING,
            (
                setting.user_id.as_str(),
                setting.key.as_str(),
                setting.value.as_str(),
                format_timestamp(setting.created_at)?,
                format_timestamp(setting.updated_at)?,
            ),
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

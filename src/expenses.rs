use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::auth::get_current_user;
use crate::constants::*;
use crate::database::{self, Db};
use crate::dates::{DateRange, ExpenseDate};
use crate::error::AppError;
use crate::models::{Expense, ExpensePayload, GetExpensesQuery, MessageResponse};
use crate::money::Cents;
use crate::utils::{parse_optional_date, validate_expenses_limit, validate_string_length};

/// Category and date predicates applied to a user's expenses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub range: DateRange,
}

impl ExpenseFilter {
    pub fn new(category: Option<String>, range: DateRange) -> Self {
        Self { category, range }
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        self.category
            .as_deref()
            .is_none_or(|category| expense.category == category)
            && self.range.contains(expense.date)
    }
}

/// Keeps the expenses owned by `user_id` that match `filter`, in input order.
pub fn filter_expenses(user_id: &str, expenses: Vec<Expense>, filter: &ExpenseFilter) -> Vec<Expense> {
    expenses
        .into_iter()
        .filter(|e| e.user_id == user_id && filter.matches(e))
        .collect()
}

/// Filters, orders newest first (date, then `created_at`) and caps at `limit`.
pub fn query_expenses(
    user_id: &str,
    expenses: Vec<Expense>,
    filter: &ExpenseFilter,
    limit: usize,
) -> Vec<Expense> {
    let mut selected = filter_expenses(user_id, expenses, filter);
    selected.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    selected.truncate(limit);
    selected
}

/// Validated create/update body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseFields {
    pub amount: Cents,
    pub category: String,
    pub description: String,
    pub date: ExpenseDate,
}

pub fn validate_expense_payload(payload: &ExpensePayload) -> Result<ExpenseFields, AppError> {
    let (Some(amount), Some(category), Some(date)) =
        (&payload.amount, &payload.category, &payload.date)
    else {
        return Err(AppError::validation("Amount, category, and date are required"));
    };

    let amount = Cents::try_from(amount)
        .map_err(|e| AppError::validation(format!("Invalid amount: {}", e)))?;
    if amount.is_negative() || amount.is_zero() {
        return Err(AppError::validation("Amount must be greater than zero"));
    }

    validate_string_length(category, "Category", MAX_CATEGORY_LENGTH)?;

    let description = payload.description.as_deref().unwrap_or("").trim();
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(AppError::validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }

    let date = parse_optional_date(Some(date.as_str()), "Date")?
        .ok_or_else(|| AppError::validation("Amount, category, and date are required"))?;

    Ok(ExpenseFields {
        amount,
        category: category.trim().to_string(),
        description: description.to_string(),
        date,
    })
}

pub fn build_filter(query: &GetExpensesQuery) -> Result<ExpenseFilter, AppError> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let start = parse_optional_date(query.start_date.as_deref(), "start_date")?;
    let end = parse_optional_date(query.end_date.as_deref(), "end_date")?;

    Ok(ExpenseFilter::new(category, DateRange::new(start, end)))
}

pub async fn get_expenses(
    State(db): State<Db>,
    session: Session,
    query: Result<Query<GetExpensesQuery>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, AppError> {
    let user = get_current_user(&session).await?;
    let Query(query) = query?;

    let filter = build_filter(&query)?;
    let limit = validate_expenses_limit(query.limit)?;

    let expenses = database::scan_expenses(&db, &user.id).await?;
    Ok(Json(query_expenses(&user.id, expenses, &filter, limit as usize)))
}

pub async fn get_expense(
    State(db): State<Db>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Expense>, AppError> {
    let user = get_current_user(&session).await?;

    database::find_expense(&db, &user.id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(ERR_EXPENSE_NOT_FOUND.to_string()))
}

pub async fn create_expense(
    State(db): State<Db>,
    session: Session,
    payload: Result<Json<ExpensePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    let user = get_current_user(&session).await?;
    let Json(payload) = payload?;
    let fields = validate_expense_payload(&payload)?;

    let now = OffsetDateTime::now_utc();
    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        amount: fields.amount,
        category: fields.category,
        description: fields.description,
        date: fields.date,
        created_at: now,
        updated_at: now,
    };

    database::insert_expense(&db, &expense).await?;
    tracing::debug!(user_id = %expense.user_id, expense_id = %expense.id, "expense created");

    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense(
    State(db): State<Db>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<ExpensePayload>, JsonRejection>,
) -> Result<Json<Expense>, AppError> {
    let user = get_current_user(&session).await?;
    let Json(payload) = payload?;
    let fields = validate_expense_payload(&payload)?;

    let existing = database::find_expense(&db, &user.id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(ERR_EXPENSE_NOT_FOUND.to_string()))?;

    let updated = Expense {
        amount: fields.amount,
        category: fields.category,
        description: fields.description,
        date: fields.date,
        updated_at: OffsetDateTime::now_utc().max(existing.created_at),
        ..existing
    };

    if !database::update_expense(&db, &updated).await? {
        return Err(AppError::NotFound(ERR_EXPENSE_NOT_FOUND.to_string()));
    }
    tracing::debug!(user_id = %updated.user_id, expense_id = %updated.id, "expense updated");

    Ok(Json(updated))
}

pub async fn delete_expense(
    State(db): State<Db>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = get_current_user(&session).await?;

    if !database::delete_expense(&db, &user.id, &id).await? {
        return Err(AppError::NotFound(ERR_EXPENSE_NOT_FOUND.to_string()));
    }
    tracing::debug!(user_id = %user.id, expense_id = %id, "expense deleted");

    Ok(Json(MessageResponse::new(MSG_EXPENSE_DELETED)))
}

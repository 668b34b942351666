//! Statistics API endpoint and the aggregation behind it.

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Serialize;
use tower_sessions::Session;

use crate::auth::get_current_user;
use crate::database::{self, Db};
use crate::dates::{DateRange, ExpenseDate};
use crate::error::AppError;
use crate::expenses::{ExpenseFilter, filter_expenses};
use crate::models::{Expense, GetStatisticsQuery};
use crate::money::Cents;
use crate::utils::parse_optional_date;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Cents,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statistics {
    pub total: Cents,
    pub categories: Vec<CategoryTotal>,
    pub average_daily: f64,
}

/// Aggregates total spend, per-category totals and average daily spend.
///
/// Categories are ranked by total, highest first; equal totals keep the order
/// in which the category first appears in `expenses`. The daily average is the
/// mean over distinct dates that have at least one expense.
pub fn aggregate(expenses: &[Expense]) -> Statistics {
    let mut categories: Vec<CategoryTotal> = Vec::new();
    let mut category_index: HashMap<&str, usize> = HashMap::new();
    let mut daily: BTreeMap<ExpenseDate, Cents> = BTreeMap::new();

    for expense in expenses {
        let idx = *category_index
            .entry(expense.category.as_str())
            .or_insert_with(|| {
                categories.push(CategoryTotal {
                    category: expense.category.clone(),
                    total: Cents::ZERO,
                    count: 0,
                });
                categories.len() - 1
            });
        categories[idx].total += expense.amount;
        categories[idx].count += 1;

        *daily.entry(expense.date).or_default() += expense.amount;
    }

    // stable sort keeps first-seen order for ties
    categories.sort_by(|a, b| b.total.cmp(&a.total));

    let total: Cents = daily.values().copied().sum();
    let average_daily = if daily.is_empty() {
        0.0
    } else {
        total.as_major() / daily.len() as f64
    };

    Statistics {
        total,
        categories,
        average_daily,
    }
}

pub fn resolve_range(query: &GetStatisticsQuery, today: ExpenseDate) -> Result<DateRange, AppError> {
    let start = parse_optional_date(query.start_date.as_deref(), "start_date")?;
    let end = parse_optional_date(query.end_date.as_deref(), "end_date")?;

    match query.period {
        Some(_) if start.is_some() || end.is_some() => Err(AppError::validation(
            "period cannot be combined with start_date or end_date",
        )),
        Some(period) => Ok(period.range(today)),
        None => Ok(DateRange::new(start, end)),
    }
}

pub async fn get_statistics(
    State(db): State<Db>,
    session: Session,
    query: Result<Query<GetStatisticsQuery>, QueryRejection>,
) -> Result<Json<Statistics>, AppError> {
    let user = get_current_user(&session).await?;
    let Query(query) = query?;
    let range = resolve_range(&query, ExpenseDate::today())?;

    let expenses = database::scan_expenses(&db, &user.id).await?;
    let selected = filter_expenses(&user.id, expenses, &ExpenseFilter::new(None, range));

    Ok(Json(aggregate(&selected)))
}

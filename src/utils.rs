use crate::constants::*;
use crate::dates::ExpenseDate;
use crate::error::AppError;

pub fn validate_string_length(value: &str, field_name: &str, max_length: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} cannot be empty", field_name)));
    }
    if value.chars().count() > max_length {
        return Err(AppError::validation(format!(
            "{} must be at most {} characters",
            field_name, max_length
        )));
    }
    Ok(())
}

pub fn validate_limit(limit: Option<u32>, default: u32) -> Result<u32, AppError> {
    match limit {
        Some(0) => Err(AppError::validation("Limit must be greater than 0")),
        Some(l) if l > MAX_LIMIT => Err(AppError::validation(format!(
            "Limit cannot exceed {}",
            MAX_LIMIT
        ))),
        Some(l) => Ok(l),
        None => Ok(default),
    }
}

pub fn validate_expenses_limit(limit: Option<u32>) -> Result<u32, AppError> {
    validate_limit(limit, DEFAULT_EXPENSES_LIMIT)
}

/// Parses an optional `YYYY-MM-DD` query or body field.
pub fn parse_optional_date(value: Option<&str>, field_name: &str) -> Result<Option<ExpenseDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<ExpenseDate>().map(Some).map_err(|_| {
            AppError::validation(format!("{} must be a date in YYYY-MM-DD format", field_name))
        }),
    }
}

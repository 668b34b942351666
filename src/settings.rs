//! Per-user settings: the merge behind `PUT /api/settings`, the flat read
//! view, and a typed [`Preferences`] view used for budget tracking.

use std::{collections::BTreeMap, fmt, str::FromStr};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tower_sessions::Session;

use crate::auth::get_current_user;
use crate::constants::*;
use crate::database::{self, Db};
use crate::dates::{DateRange, ExpenseDate, Period};
use crate::error::AppError;
use crate::expenses::{ExpenseFilter, filter_expenses};
use crate::models::{MessageResponse, Setting};
use crate::money::Cents;
use crate::statistics::aggregate;
use crate::utils::validate_string_length;

pub type SettingsMap = BTreeMap<String, String>;

/// Outcome of merging an update into a user's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsMerge {
    /// Full key→value view after the update.
    pub settings: SettingsMap,
    /// One row per incoming key, ready to be written.
    pub upserts: Vec<Setting>,
}

/// Upserts every incoming key over `existing`; unmentioned keys are untouched.
pub fn merge_settings(
    user_id: &str,
    existing: &[Setting],
    incoming: &SettingsMap,
    now: OffsetDateTime,
) -> SettingsMerge {
    let mut settings: SettingsMap = existing
        .iter()
        .filter(|s| s.user_id == user_id)
        .map(|s| (s.key.clone(), s.value.clone()))
        .collect();

    let upserts = incoming
        .iter()
        .map(|(key, value)| {
            let current = existing
                .iter()
                .find(|s| s.user_id == user_id && &s.key == key);
            settings.insert(key.clone(), value.clone());

            match current {
                Some(current) => Setting {
                    value: value.clone(),
                    updated_at: now.max(current.created_at),
                    ..current.clone()
                },
                None => Setting {
                    user_id: user_id.to_string(),
                    key: key.clone(),
                    value: value.clone(),
                    created_at: now,
                    updated_at: now,
                },
            }
        })
        .collect();

    SettingsMerge { settings, upserts }
}

/// Converts an incoming JSON value to its stored string form.
pub fn normalize_value(key: &str, value: &Value) -> Result<String, AppError> {
    match value {
        Value::Null => Err(AppError::validation(format!("Setting '{}' cannot be null", key))),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Ok(value.to_string())
        }
    }
}

/// Validates an update body and flattens it to strings.
///
/// Nothing is written when any key fails.
pub fn validate_settings_update(body: &Map<String, Value>) -> Result<SettingsMap, AppError> {
    let mut incoming = SettingsMap::new();

    for (key, value) in body {
        if key.trim().is_empty() {
            return Err(AppError::validation("Setting keys cannot be empty"));
        }
        if key.trim() != key {
            return Err(AppError::validation(format!(
                "Setting key '{}' cannot have leading or trailing whitespace",
                key
            )));
        }
        if key.chars().count() > MAX_SETTING_KEY_LENGTH {
            return Err(AppError::validation(format!(
                "Setting keys must be at most {} characters",
                MAX_SETTING_KEY_LENGTH
            )));
        }

        let value = normalize_value(key, value)?;
        validate_known_setting(key, &value)?;
        incoming.insert(key.clone(), value);
    }

    Ok(incoming)
}

fn validate_known_setting(key: &str, value: &str) -> Result<(), AppError> {
    match key {
        SETTING_MONTHLY_BUDGET => {
            let budget: Cents = value.parse().map_err(|e| {
                AppError::validation(format!("monthly_budget must be a decimal amount: {}", e))
            })?;
            if budget.is_negative() {
                return Err(AppError::validation("monthly_budget cannot be negative"));
            }
        }
        SETTING_CURRENCY => {
            value.parse::<Currency>()?;
        }
        SETTING_DEFAULT_CATEGORY => {
            validate_string_length(value, "default_category", MAX_CATEGORY_LENGTH)?;
        }
        SETTING_CUSTOM_CATEGORIES => {
            parse_custom_categories(value)?;
        }
        _ => {}
    }
    Ok(())
}

fn parse_custom_categories(value: &str) -> Result<Vec<String>, AppError> {
    let categories: Vec<String> = serde_json::from_str(value).map_err(|_| {
        AppError::validation("custom_categories must be a JSON array of category names")
    })?;
    for category in &categories {
        validate_string_length(category, "Custom category", MAX_CATEGORY_LENGTH)?;
    }
    Ok(categories)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "SAR")]
    Sar,
    #[serde(rename = "AED")]
    Aed,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Usd,
        Currency::Inr,
        Currency::Sar,
        Currency::Aed,
        Currency::Eur,
        Currency::Gbp,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Inr => "INR",
            Currency::Sar => "SAR",
            Currency::Aed => "AED",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == s.trim())
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Unsupported currency '{}'; expected one of USD, INR, SAR, AED, EUR, GBP",
                    s
                ))
            })
    }
}

/// Typed view over the flat settings map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub monthly_budget: Cents,
    pub currency: Currency,
    pub default_category: String,
    pub custom_categories: Vec<String>,
}

/// Mirrors the settings seeded at registration.
impl Default for Preferences {
    fn default() -> Self {
        Self {
            monthly_budget: DEFAULT_MONTHLY_BUDGET.parse().unwrap_or(Cents::ZERO),
            currency: DEFAULT_CURRENCY.parse().unwrap_or(Currency::Usd),
            default_category: DEFAULT_CATEGORY.to_string(),
            custom_categories: Vec::new(),
        }
    }
}

impl Preferences {
    /// Decodes leniently: missing or undecodable entries keep their defaults.
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let mut prefs = Preferences::default();

        if let Some(raw) = settings.get(SETTING_MONTHLY_BUDGET) {
            match raw.parse::<Cents>() {
                Ok(budget) if !budget.is_negative() => prefs.monthly_budget = budget,
                _ => tracing::warn!("ignoring stored monthly_budget '{raw}'"),
            }
        }
        if let Some(raw) = settings.get(SETTING_CURRENCY) {
            match raw.parse::<Currency>() {
                Ok(currency) => prefs.currency = currency,
                Err(_) => tracing::warn!("ignoring stored currency '{raw}'"),
            }
        }
        if let Some(raw) = settings.get(SETTING_DEFAULT_CATEGORY) {
            if !raw.trim().is_empty() {
                prefs.default_category = raw.clone();
            }
        }
        if let Some(raw) = settings.get(SETTING_CUSTOM_CATEGORIES) {
            match parse_custom_categories(raw) {
                Ok(categories) => prefs.custom_categories = categories,
                Err(_) => tracing::warn!("ignoring stored custom_categories '{raw}'"),
            }
        }

        prefs
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BudgetStatus {
    pub period_start: ExpenseDate,
    pub period_end: ExpenseDate,
    pub currency: Currency,
    pub monthly_budget: Cents,
    pub spent: Cents,
    pub remaining: Cents,
    pub percent_used: f64,
}

pub fn budget_status(
    prefs: &Preferences,
    spent: Cents,
    period_start: ExpenseDate,
    period_end: ExpenseDate,
) -> BudgetStatus {
    let percent_used = if prefs.monthly_budget.is_zero() {
        0.0
    } else {
        spent.cents() as f64 / prefs.monthly_budget.cents() as f64 * 100.0
    };

    BudgetStatus {
        period_start,
        period_end,
        currency: prefs.currency,
        monthly_budget: prefs.monthly_budget,
        spent,
        remaining: prefs.monthly_budget - spent,
        percent_used,
    }
}

fn to_map(settings: &[Setting]) -> SettingsMap {
    settings
        .iter()
        .map(|s| (s.key.clone(), s.value.clone()))
        .collect()
}

pub async fn get_settings(
    State(db): State<Db>,
    session: Session,
) -> Result<Json<SettingsMap>, AppError> {
    let user = get_current_user(&session).await?;
    let settings = database::load_settings(&db, &user.id).await?;

    Ok(Json(to_map(&settings)))
}

pub async fn update_settings(
    State(db): State<Db>,
    session: Session,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = get_current_user(&session).await?;
    let Json(body) = payload?;
    let incoming = validate_settings_update(&body)?;

    let existing = database::load_settings(&db, &user.id).await?;
    let merge = merge_settings(&user.id, &existing, &incoming, OffsetDateTime::now_utc());

    database::upsert_settings(&db, &merge.upserts).await?;
    tracing::info!(
        user_id = %user.id,
        keys = ?incoming.keys().collect::<Vec<_>>(),
        "settings updated"
    );

    Ok(Json(MessageResponse::new(MSG_SETTINGS_UPDATED)))
}

pub async fn get_budget(
    State(db): State<Db>,
    session: Session,
) -> Result<Json<BudgetStatus>, AppError> {
    let user = get_current_user(&session).await?;
    let prefs = Preferences::from_settings(&to_map(&database::load_settings(&db, &user.id).await?));

    let (start, end) = Period::CurrentMonth.bounds(ExpenseDate::today());
    let range = DateRange::new(Some(start), Some(end));
    let expenses = database::scan_expenses(&db, &user.id).await?;
    let selected = filter_expenses(&user.id, expenses, &ExpenseFilter::new(None, range));
    let spent = aggregate(&selected).total;

    Ok(Json(budget_status(&prefs, spent, start, end)))
}

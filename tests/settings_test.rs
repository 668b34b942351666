/*!
 * Settings Merge Tests
 *
 * Covers upsert semantics of the settings merge, value normalization and
 * validation of known keys, the typed preferences view, budget status, and
 * the transactional settings store.
 */

mod common;

use common::*;
use money_manager_server::constants::DEFAULT_SETTINGS;
use money_manager_server::database;
use money_manager_server::models::Setting;
use money_manager_server::money::Cents;
use money_manager_server::settings::{
    Currency, Preferences, SettingsMap, budget_status, merge_settings, validate_settings_update,
};
use serde_json::{Map, Value, json};
use time::{Duration, OffsetDateTime};

const USER: &str = "user-1";

fn existing_defaults() -> Vec<Setting> {
    [
        ("currency", "USD"),
        ("default_category", "Others"),
        ("monthly_budget", "1000"),
    ]
    .into_iter()
    .map(|(key, value)| Setting {
        user_id: USER.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        created_at: TEST_BASE_TIME,
        updated_at: TEST_BASE_TIME,
    })
    .collect()
}

fn incoming(pairs: &[(&str, &str)]) -> SettingsMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn body(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("Test body must be an object")
}

#[test]
fn partial_update_leaves_other_keys_untouched() {
    let now = TEST_BASE_TIME + Duration::days(1);
    let merge = merge_settings(USER, &existing_defaults(), &incoming(&[("currency", "EUR")]), now);

    assert_eq!(merge.settings["currency"], "EUR");
    assert_eq!(merge.settings["monthly_budget"], "1000");
    assert_eq!(merge.settings["default_category"], "Others");

    assert_eq!(merge.upserts.len(), 1);
    let upsert = &merge.upserts[0];
    assert_eq!(upsert.key, "currency");
    assert_eq!(upsert.created_at, TEST_BASE_TIME);
    assert_eq!(upsert.updated_at, now);
}

#[test]
fn unknown_key_is_created_with_fresh_timestamps() {
    let now = TEST_BASE_TIME + Duration::hours(3);
    let merge = merge_settings(
        USER,
        &existing_defaults(),
        &incoming(&[("custom_categories", r#"["Pets"]"#)]),
        now,
    );

    assert_eq!(merge.settings.len(), 4);
    let created = &merge.upserts[0];
    assert_eq!(created.user_id, USER);
    assert_eq!(created.created_at, now);
    assert_eq!(created.updated_at, now);
}

#[test]
fn applying_the_same_update_twice_is_idempotent() {
    let update = incoming(&[("monthly_budget", "2500"), ("currency", "GBP")]);
    let now = OffsetDateTime::now_utc();

    let once = merge_settings(USER, &existing_defaults(), &update, now);
    let twice = merge_settings(USER, &once_rows(&once.upserts), &update, now);

    assert_eq!(once.settings, twice.settings);
}

fn once_rows(upserts: &[Setting]) -> Vec<Setting> {
    let mut rows = existing_defaults();
    for upsert in upserts {
        match rows.iter_mut().find(|r| r.key == upsert.key) {
            Some(row) => *row = upsert.clone(),
            None => rows.push(upsert.clone()),
        }
    }
    rows
}

#[test]
fn updated_at_never_precedes_created_at() {
    let earlier = TEST_BASE_TIME - Duration::days(1);
    let merge = merge_settings(USER, &existing_defaults(), &incoming(&[("currency", "INR")]), earlier);

    assert!(merge.upserts[0].created_at <= merge.upserts[0].updated_at);
}

#[test]
fn other_users_rows_are_ignored() {
    let mut rows = existing_defaults();
    rows.push(Setting {
        user_id: "someone-else".to_string(),
        key: "secret".to_string(),
        value: "x".to_string(),
        created_at: TEST_BASE_TIME,
        updated_at: TEST_BASE_TIME,
    });
    let merge = merge_settings(USER, &rows, &SettingsMap::new(), TEST_BASE_TIME);

    assert!(!merge.settings.contains_key("secret"));
    assert!(merge.upserts.is_empty());
}

#[test]
fn values_are_normalized_to_strings() {
    let update = validate_settings_update(&body(json!({
        "monthly_budget": 1500.5,
        "currency": "EUR",
        "notifications": true,
        "custom_categories": ["Pets", "Gym"],
    })))
    .unwrap();

    assert_eq!(update["monthly_budget"], "1500.5");
    assert_eq!(update["notifications"], "true");
    assert_eq!(update["custom_categories"], r#"["Pets","Gym"]"#);
}

#[test]
fn invalid_known_settings_are_rejected() {
    let cases = [
        json!({"monthly_budget": "lots"}),
        json!({"monthly_budget": -5}),
        json!({"currency": "XYZ"}),
        json!({"default_category": "   "}),
        json!({"custom_categories": "Pets"}),
        json!({"custom_categories": [1, 2]}),
        json!({"theme": null}),
        json!({"": "empty key"}),
    ];

    for case in cases {
        let err = validate_settings_update(&body(case.clone())).unwrap_err();
        assert_eq!(err.code(), "validation_error", "case {case} should fail");
    }
}

#[test]
fn preferences_decode_with_fallbacks() {
    let prefs = Preferences::from_settings(&incoming(&[
        ("monthly_budget", "250.75"),
        ("currency", "AED"),
        ("custom_categories", r#"["Pets"]"#),
    ]));

    assert_eq!(prefs.monthly_budget, Cents::new(25075));
    assert_eq!(prefs.currency, Currency::Aed);
    assert_eq!(prefs.default_category, "Others");
    assert_eq!(prefs.custom_categories, vec!["Pets".to_string()]);

    let broken = Preferences::from_settings(&incoming(&[("currency", "???"), ("monthly_budget", "x")]));
    assert_eq!(broken, Preferences::default());
}

#[test]
fn budget_status_reports_overspend() {
    let prefs = Preferences {
        monthly_budget: Cents::new(10_000),
        ..Preferences::default()
    };
    let start = "2024-01-01".parse().unwrap();
    let end = "2024-01-31".parse().unwrap();

    let status = budget_status(&prefs, Cents::new(12_500), start, end);
    assert_eq!(status.remaining, Cents::new(-2_500));
    assert_eq!(status.percent_used, 125.0);

    let zero_budget = Preferences {
        monthly_budget: Cents::ZERO,
        ..Preferences::default()
    };
    assert_eq!(budget_status(&zero_budget, Cents::new(100), start, end).percent_used, 0.0);
}

#[tokio::test]
async fn registration_seeds_default_settings() {
    let (db, _temp_dir) = setup_test_environment().await;
    let user_id = create_test_user(&db, "defaults@example.com").await;

    let rows = database::load_settings(&db, &user_id).await.unwrap();
    let map: SettingsMap = rows.into_iter().map(|s| (s.key, s.value)).collect();

    assert_eq!(map, incoming(&[
        ("currency", "USD"),
        ("default_category", "Others"),
        ("monthly_budget", "1000"),
    ]));
}

#[tokio::test]
async fn store_upsert_overwrites_and_inserts() {
    let (db, _temp_dir) = setup_test_environment().await;
    let user_id = create_test_user(&db, "upsert@example.com").await;

    let existing = database::load_settings(&db, &user_id).await.unwrap();
    let now = TEST_BASE_TIME + Duration::days(2);
    let merge = merge_settings(
        &user_id,
        &existing,
        &incoming(&[("currency", "EUR"), ("theme", "dark")]),
        now,
    );
    database::upsert_settings(&db, &merge.upserts).await.unwrap();

    let rows = database::load_settings(&db, &user_id).await.unwrap();
    assert_eq!(rows.len(), 4);

    let currency = rows.iter().find(|s| s.key == "currency").unwrap();
    assert_eq!(currency.value, "EUR");
    assert_eq!(currency.created_at, TEST_BASE_TIME);
    assert_eq!(currency.updated_at, now);

    let budget = rows.iter().find(|s| s.key == "monthly_budget").unwrap();
    assert_eq!(budget.value, "1000");
    assert_eq!(budget.updated_at, TEST_BASE_TIME);
}

#[tokio::test]
async fn settings_are_isolated_per_user() {
    let (db, _temp_dir) = setup_test_environment().await;
    let alice = create_test_user(&db, "alice@example.com").await;
    let bob = create_test_user(&db, "bob@example.com").await;

    let existing = database::load_settings(&db, &alice).await.unwrap();
    let merge = merge_settings(&alice, &existing, &incoming(&[("currency", "INR")]), TEST_BASE_TIME);
    database::upsert_settings(&db, &merge.upserts).await.unwrap();

    let bob_rows = database::load_settings(&db, &bob).await.unwrap();
    let bob_currency = bob_rows.iter().find(|s| s.key == "currency").unwrap();
    assert_eq!(bob_currency.value, "USD");
}

#[tokio::test]
async fn failed_batch_leaves_settings_untouched() {
    let (db, _temp_dir) = setup_test_environment().await;
    let user_id = create_test_user(&db, "rollback@example.com").await;

    db.write()
        .await
        .execute(
            "CREATE TRIGGER reject_broken BEFORE INSERT ON settings WHEN NEW.key = 'zzz_broken' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
            (),
        )
        .await
        .unwrap();

    let existing = database::load_settings(&db, &user_id).await.unwrap();
    let now = TEST_BASE_TIME + Duration::days(1);
    let merge = merge_settings(
        &user_id,
        &existing,
        &incoming(&[("currency", "EUR"), ("zzz_broken", "x")]),
        now,
    );
    assert_eq!(merge.upserts[0].key, "currency");
    assert!(database::upsert_settings(&db, &merge.upserts).await.is_err());

    let rows = database::load_settings(&db, &user_id).await.unwrap();
    assert_eq!(rows, existing);

    let merge = merge_settings(&user_id, &rows, &incoming(&[("theme", "dark")]), now);
    database::upsert_settings(&db, &merge.upserts).await.unwrap();

    let rows = database::load_settings(&db, &user_id).await.unwrap();
    let theme = rows.iter().find(|s| s.key == "theme").unwrap();
    assert_eq!(theme.value, "dark");
    let currency = rows.iter().find(|s| s.key == "currency").unwrap();
    assert_eq!(currency.value, "USD");
}

#[test]
fn padded_keys_are_rejected() {
    for key in [" currency", "currency ", "\ttheme"] {
        let mut update = Map::new();
        update.insert(key.to_string(), json!("EUR"));
        let err = validate_settings_update(&update).unwrap_err();
        assert_eq!(err.code(), "validation_error", "key {key:?} should fail");
    }
}

#[test]
fn preference_defaults_match_seeded_settings() {
    let seeded: SettingsMap = DEFAULT_SETTINGS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let prefs = Preferences::default();
    assert_eq!(Preferences::from_settings(&seeded), prefs);
    assert_eq!(prefs.monthly_budget, Cents::new(100_000));
    assert_eq!(prefs.currency, Currency::Usd);
    assert_eq!(prefs.default_category, "Others");
}

// SPDX-FileCopyrightText: 2026 Pushline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure payload and query helpers.
//!
//! Nothing here performs I/O. Payloads are plain `serde_json::Value`s whose
//! `data` object holds the platform keys (`alert`, `title`, `badge`) and
//! their locale variants (`alert-fr`, `title-en-US`, ...).

use std::collections::BTreeMap;

use serde_json::{json, Value};

use pushline_core::{Device, PushError, Where};

/// Keys that may carry per-locale variants.
pub const LOCALIZABLE_KEYS: [&str; 2] = ["alert", "title"];

/// Bucket for devices and bodies that match no requested locale.
pub const DEFAULT_LOCALE: &str = "default";

/// Whether the payload asks for each device's badge to be incremented.
///
/// True for a case-insensitive `"increment"` badge, or for an update
/// operator `{"__op": "Increment", "amount": <non-zero number>}`.
pub fn is_push_incrementing(body: &Value) -> bool {
    let Some(badge) = body.get("data").and_then(|data| data.get("badge")) else {
        return false;
    };

    match badge {
        Value::String(s) => s.eq_ignore_ascii_case("increment"),
        Value::Object(op) => {
            let is_increment = op
                .get("__op")
                .and_then(Value::as_str)
                .is_some_and(|name| name.eq_ignore_ascii_case("increment"));
            let amount = op.get("amount").and_then(as_number);
            is_increment && amount.is_some_and(|n| n != 0.0 && !n.is_nan())
        }
        _ => false,
    }
}

/// Locales referenced by `alert-<locale>` / `title-<locale>` keys, in first-seen order.
pub fn get_locales_from_push(body: &Value) -> Vec<String> {
    let Some(data) = body.get("data").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut locales: Vec<String> = Vec::new();
    for key in data.keys() {
        if let Some(locale) = locale_suffix(key) {
            if !locales.iter().any(|l| l == locale) {
                locales.push(locale.to_string());
            }
        }
    }
    locales
}

/// The payload a device with `locale` should receive.
///
/// Base `alert`/`title` values are replaced by their `-<locale>` variants
/// when present, then every locale variant is removed.
pub fn transform_push_body_for_locale(body: &Value, locale: &str) -> Value {
    if body.get("data").is_none() {
        return body.clone();
    }

    let mut body = body.clone();
    if let Some(data) = body.get_mut("data").and_then(Value::as_object_mut) {
        for key in LOCALIZABLE_KEYS {
            let localized = data.get(&format!("{key}-{locale}")).cloned();
            if let Some(value) = localized.filter(is_truthy) {
                data.insert(key.to_string(), value);
            }
        }
    }
    strip_locales_from_body(&body)
}

/// Remove every `alert-*` / `title-*` key from the payload's `data`.
pub fn strip_locales_from_body(body: &Value) -> Value {
    let mut body = body.clone();
    if let Some(data) = body.get_mut("data").and_then(Value::as_object_mut) {
        data.retain(|key, _| locale_suffix(key).is_none());
    }
    body
}

/// One payload per requested locale, plus the stripped `"default"` payload.
pub fn bodies_per_locales(body: &Value, locales: &[String]) -> BTreeMap<String, Value> {
    let mut bodies: BTreeMap<String, Value> = locales
        .iter()
        .map(|locale| (locale.clone(), transform_push_body_for_locale(body, locale)))
        .collect();
    bodies.insert(DEFAULT_LOCALE.to_string(), strip_locales_from_body(body));
    bodies
}

/// Partition devices by the first locale that prefixes their `localeIdentifier`.
///
/// The `"default"` bucket is always present and holds every device that
/// matched none of `locales`.
pub fn group_by_locale_identifier(
    devices: &[Device],
    locales: &[String],
) -> BTreeMap<String, Vec<Device>> {
    let mut groups: BTreeMap<String, Vec<Device>> = BTreeMap::new();
    groups.insert(DEFAULT_LOCALE.to_string(), Vec::new());

    for device in devices {
        let matched = device.locale_identifier.as_deref().and_then(|identifier| {
            locales
                .iter()
                .find(|locale| identifier.starts_with(locale.as_str()))
        });
        let bucket = matched.map_or(DEFAULT_LOCALE, String::as_str);
        groups
            .entry(bucket.to_string())
            .or_default()
            .push(device.clone());
    }
    groups
}

/// Reject a push whose `deviceType` constraint names an unsupported type.
///
/// Accepts a bare string or an `{"$in": [...]}` list. A missing constraint
/// targets every device and passes.
pub fn validate_push_type<S: AsRef<str>>(
    where_: &Where,
    valid_push_types: &[S],
) -> Result<(), PushError> {
    let requested: Vec<String> = match where_.get("deviceType") {
        Some(Value::String(device_type)) => vec![device_type.clone()],
        Some(Value::Object(op)) => match op.get("$in") {
            Some(Value::Array(types)) => types
                .iter()
                .map(|t| match t {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    for device_type in requested {
        if !valid_push_types.iter().any(|t| t.as_ref() == device_type) {
            return Err(PushError::PushMisconfigured(format!(
                "{device_type} is not supported push type."
            )));
        }
    }
    Ok(())
}

/// Copy of `where_` restricted to devices that have a token.
pub fn apply_device_token_exists(where_: &Where) -> Where {
    let mut where_ = where_.clone();
    if !where_.contains_key("deviceToken") {
        where_.insert("deviceToken".to_string(), json!({ "$exists": true }));
    }
    where_
}

fn locale_suffix(key: &str) -> Option<&str> {
    LOCALIZABLE_KEYS.iter().find_map(|base| {
        key.strip_prefix(*base)
            .and_then(|rest| rest.strip_prefix('-'))
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn where_of(value: Value) -> Where {
        value.as_object().cloned().unwrap()
    }

    fn device(id: &str, locale: Option<&str>) -> Device {
        let device = Device::new(id, "ios", format!("token-{id}"));
        match locale {
            Some(l) => device.with_locale(l),
            None => device,
        }
    }

    #[test]
    fn increment_string_is_case_insensitive() {
        assert!(is_push_incrementing(&json!({"data": {"badge": "increment"}})));
        assert!(is_push_incrementing(&json!({"data": {"badge": "Increment"}})));
        assert!(is_push_incrementing(&json!({"data": {"badge": "INCREMENT"}})));
    }

    #[test]
    fn numeric_or_missing_badge_is_not_incrementing() {
        assert!(!is_push_incrementing(&json!({"data": {"badge": 3}})));
        assert!(!is_push_incrementing(&json!({"data": {"alert": "hi"}})));
        assert!(!is_push_incrementing(&json!({})));
        assert!(!is_push_incrementing(&json!({"data": {"badge": "3"}})));
    }

    #[test]
    fn increment_operator_requires_non_zero_amount() {
        assert!(is_push_incrementing(
            &json!({"data": {"badge": {"__op": "Increment", "amount": 1}}})
        ));
        assert!(is_push_incrementing(
            &json!({"data": {"badge": {"__op": "Increment", "amount": "2"}}})
        ));
        assert!(!is_push_incrementing(
            &json!({"data": {"badge": {"__op": "Increment", "amount": 0}}})
        ));
        assert!(!is_push_incrementing(
            &json!({"data": {"badge": {"__op": "Increment", "amount": "many"}}})
        ));
        assert!(!is_push_incrementing(
            &json!({"data": {"badge": {"__op": "Delete", "amount": 1}}})
        ));
    }

    #[test]
    fn locales_follow_key_order() {
        let body = json!({"data": {"alert": "Yo!", "alert-fr": "french", "alert-en-US": "English"}});
        assert_eq!(get_locales_from_push(&body), vec!["fr", "en-US"]);
    }

    #[test]
    fn locales_empty_without_variants() {
        assert!(get_locales_from_push(&json!({"data": {"alert": "Yo!"}})).is_empty());
        assert!(get_locales_from_push(&json!({})).is_empty());
    }

    #[test]
    fn locales_deduplicate_across_alert_and_title() {
        let body = json!({"data": {"alert-fr": "a", "title-fr": "t", "title-de": "d"}});
        assert_eq!(get_locales_from_push(&body), vec!["fr", "de"]);
    }

    #[test]
    fn transform_replaces_and_strips() {
        let body = json!({"data": {"alert": "Yo!", "alert-fr": "frenchy!", "alert-en": "english"}});
        assert_eq!(
            transform_push_body_for_locale(&body, "fr"),
            json!({"data": {"alert": "frenchy!"}})
        );
    }

    #[test]
    fn transform_keeps_base_when_variant_missing_or_empty() {
        let body = json!({"data": {"alert": "Yo!", "title": "T", "title-fr": "", "alert-de": "Hallo"}});
        assert_eq!(
            transform_push_body_for_locale(&body, "fr"),
            json!({"data": {"alert": "Yo!", "title": "T"}})
        );
    }

    #[test]
    fn transform_without_data_is_unchanged() {
        let body = json!({"where": {}});
        assert_eq!(transform_push_body_for_locale(&body, "fr"), body);
    }

    #[test]
    fn strip_leaves_unrelated_keys() {
        let body = json!({"data": {"alert": "a", "alert-fr": "b", "badge": 1, "alertness": "x"}});
        assert_eq!(
            strip_locales_from_body(&body),
            json!({"data": {"alert": "a", "badge": 1, "alertness": "x"}})
        );
    }

    #[test]
    fn bodies_include_default_and_each_locale() {
        let body = json!({"data": {"alert": "Yo!", "alert-fr": "salut", "alert-en": "hi"}});
        let locales = vec!["fr".to_string(), "en".to_string()];
        let bodies = bodies_per_locales(&body, &locales);

        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[DEFAULT_LOCALE], strip_locales_from_body(&body));
        assert_eq!(bodies["fr"], json!({"data": {"alert": "salut"}}));
        assert_eq!(bodies["en"], json!({"data": {"alert": "hi"}}));
    }

    #[test]
    fn grouping_uses_first_matching_prefix() {
        let devices = vec![
            device("1", Some("fr-FR")),
            device("2", Some("en-US")),
            device("3", Some("de-DE")),
            device("4", None),
            device("5", Some("fr")),
        ];
        let locales = vec!["fr".to_string(), "en".to_string()];
        let groups = group_by_locale_identifier(&devices, &locales);

        let ids = |key: &str| -> Vec<String> {
            groups[key].iter().map(|d| d.object_id.clone()).collect()
        };
        assert_eq!(ids("fr"), vec!["1", "5"]);
        assert_eq!(ids("en"), vec!["2"]);
        assert_eq!(ids(DEFAULT_LOCALE), vec!["3", "4"]);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, devices.len());
    }

    #[test]
    fn grouping_always_has_default_bucket() {
        let groups = group_by_locale_identifier(&[device("1", Some("fr"))], &["fr".to_string()]);
        assert!(groups[DEFAULT_LOCALE].is_empty());
    }

    #[test]
    fn unsupported_device_type_is_misconfigured() {
        let err = validate_push_type(&where_of(json!({"deviceType": "android"})), &["ios"])
            .unwrap_err();
        match err {
            PushError::PushMisconfigured(msg) => assert!(msg.contains("android")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn in_list_of_supported_types_passes() {
        let where_ = where_of(json!({"deviceType": {"$in": ["ios", "android"]}}));
        assert!(validate_push_type(&where_, &["ios", "android"]).is_ok());
    }

    #[test]
    fn in_list_with_one_unsupported_type_fails() {
        let where_ = where_of(json!({"deviceType": {"$in": ["ios", "winphone"]}}));
        let err = validate_push_type(&where_, &["ios", "android"]).unwrap_err();
        assert!(err.to_string().contains("winphone"));
    }

    #[test]
    fn missing_device_type_passes() {
        assert!(validate_push_type(&Where::new(), &["ios"]).is_ok());
    }

    #[test]
    fn device_token_constraint_is_added_once() {
        let where_ = where_of(json!({"deviceType": "ios"}));
        let applied = apply_device_token_exists(&where_);
        assert_eq!(applied["deviceToken"], json!({"$exists": true}));
        assert!(!where_.contains_key("deviceToken"));

        let explicit = where_of(json!({"deviceToken": "abc"}));
        assert_eq!(apply_device_token_exists(&explicit), explicit);
    }

    proptest! {
        #[test]
        fn strip_is_idempotent(
            keys in proptest::collection::vec("(alert|title|badge|sound)(-[a-z]{2})?", 0..8),
        ) {
            let data: serde_json::Map<String, Value> =
                keys.iter().map(|k| (k.clone(), json!("v"))).collect();
            let body = json!({ "data": data });
            let once = strip_locales_from_body(&body);
            prop_assert_eq!(strip_locales_from_body(&once), once.clone());
            prop_assert!(get_locales_from_push(&once).is_empty());
        }
    }
}

//! Row expansion for nested and list-valued fields
//!
//! The dataset packs several one-to-many relations into single fields:
//! comma-separated category and check-in lists, an `hours` object, an `elite`
//! year list and an `attributes` object whose values are Python literals
//! (`"u'free'"`, `"{'garage': False}"`). These functions turn one record into
//! rows of the derived tables.

use serde_json::{Map, Value};

use super::mapping::{coerce, ColumnKind};
use crate::database::SqlValue;

/// Hours value the dataset uses for a closed day
const CLOSED_HOURS: &str = "0:0-0:0";

/// Trimmed, non-empty entries of a comma-separated list; `None` is an empty list
pub fn split_list(s: &str) -> impl Iterator<Item = &str> {
    let s = s.trim();
    let s = if s == "None" { "" } else { s };
    s.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn key(record: &Map<String, Value>, field: &str) -> SqlValue {
    match record.get(field) {
        None | Some(Value::Null) => SqlValue::Null,
        Some(value) => coerce(value, ColumnKind::TrimmedText),
    }
}

fn string_field<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

pub fn business_categories(record: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    let Some(categories) = string_field(record, "categories") else {
        return Vec::new();
    };
    let business_id = key(record, "business_id");
    split_list(categories)
        .map(|category| vec![business_id.clone(), SqlValue::from(category)])
        .collect()
}

pub fn business_attributes(record: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    let Some(Value::Object(attributes)) = record.get("attributes") else {
        return Vec::new();
    };
    let business_id = key(record, "business_id");
    flatten_attributes(attributes)
        .into_iter()
        .map(|(name, value)| vec![business_id.clone(), name.into(), value.into()])
        .collect()
}

pub fn business_hours(record: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    let Some(Value::Object(hours)) = record.get("hours") else {
        return Vec::new();
    };
    let business_id = key(record, "business_id");
    hours
        .iter()
        .filter_map(|(day, open)| open.as_str().map(|open| (day, open)))
        .filter(|(_, open)| *open != CLOSED_HOURS)
        .map(|(day, open)| {
            vec![
                business_id.clone(),
                SqlValue::from(day.as_str()),
                SqlValue::from(open),
            ]
        })
        .collect()
}

/// One row per id in the comma-separated `friends` list
pub fn user_friends(record: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    let user_id = key(record, "user_id");
    match record.get("friends") {
        Some(Value::String(friends)) => split_list(friends)
            .map(|friend| vec![user_id.clone(), SqlValue::from(friend)])
            .collect(),
        Some(Value::Array(friends)) => friends
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|friend| !friend.is_empty())
            .map(|friend| vec![user_id.clone(), SqlValue::from(friend)])
            .collect(),
        _ => Vec::new(),
    }
}

pub fn user_elite_years(record: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    let Some(elite) = string_field(record, "elite") else {
        return Vec::new();
    };
    let user_id = key(record, "user_id");
    parse_elite_years(elite)
        .into_iter()
        .map(|year| vec![user_id.clone(), SqlValue::Integer(year)])
        .collect()
}

pub fn checkin_dates(record: &Map<String, Value>) -> Vec<Vec<SqlValue>> {
    let Some(dates) = string_field(record, "date") else {
        return Vec::new();
    };
    let business_id = key(record, "business_id");
    split_list(dates)
        .map(|date| vec![business_id.clone(), SqlValue::from(date)])
        .collect()
}

/// Years from an elite list
///
/// The dataset writes 2020 as `20,20`; adjacent `20` tokens are joined back.
pub fn parse_elite_years(elite: &str) -> Vec<i64> {
    let tokens: Vec<&str> = split_list(elite).collect();
    let mut years = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "20" && tokens.get(i + 1) == Some(&"20") {
            years.push(2020);
            i += 2;
            continue;
        }
        if let Ok(year) = tokens[i].parse::<i64>() {
            if (1900..=2100).contains(&year) {
                years.push(year);
            }
        }
        i += 1;
    }
    years
}

/// Flatten an attributes object one level deep into `(name, value)` pairs
///
/// Nested objects (real JSON or Python dict literals) produce `outer_inner`
/// names. Values are rendered the way Python prints them: `True`, `False`,
/// `None`, or the bare string.
pub fn flatten_attributes(attributes: &Map<String, Value>) -> Vec<(String, String)> {
    let mut flat = Vec::new();
    for (name, value) in attributes {
        match value {
            Value::Object(inner) => {
                for (sub, sub_value) in inner {
                    flat.push((format!("{}_{}", name, sub), json_literal(sub_value)));
                }
            }
            Value::String(s) => match python_dict(s) {
                Some(pairs) => {
                    for (sub, sub_value) in pairs {
                        flat.push((format!("{}_{}", name, sub), sub_value));
                    }
                }
                None => flat.push((name.clone(), python_scalar(s))),
            },
            other => flat.push((name.clone(), json_literal(other))),
        }
    }
    flat
}

fn json_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => python_scalar(s),
        other => other.to_string(),
    }
}

/// Strip Python string quoting (`u'x'`, `'x'`, `"x"`) from a literal
fn python_scalar(s: &str) -> String {
    let s = s.trim();
    let unprefixed = s.strip_prefix('u').unwrap_or(s);
    for quote in ['\'', '"'] {
        if unprefixed.len() >= 2 && unprefixed.starts_with(quote) && unprefixed.ends_with(quote) {
            return unprefixed[1..unprefixed.len() - 1].to_string();
        }
    }
    s.to_string()
}

/// Parse a flat Python dict literal such as `{'garage': False, 'lot': True}`
fn python_dict(s: &str) -> Option<Vec<(String, String)>> {
    let body = s.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut pairs = Vec::new();
    for entry in split_top_level(body) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (k, v) = split_key_value(entry)?;
        pairs.push((python_scalar(k), python_scalar(v)));
    }
    Some(pairs)
}

/// Split on commas that are not inside quotes
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Split `key: value` on the first colon outside quotes
fn split_key_value(entry: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    for (i, c) in entry.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, ':') => return Some((&entry[..i], &entry[i + 1..])),
            _ => {}
        }
    }
    None
}

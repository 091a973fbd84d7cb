use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use url::Url;

use super::models::ReferenceItem;
use crate::error::{FieldViolation, ValidationError};

#[allow(clippy::expect_used)] // good regex, it doesn't panic
pub(crate) static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^2517\d{8}$").expect("static regex should not panic"));
#[allow(clippy::expect_used)] // good regex, it doesn't panic
pub(crate) static SIX_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6}$").expect("static regex should not panic"));
#[allow(clippy::expect_used)] // good regex, it doesn't panic
pub(crate) static SIX_OR_MORE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6,}$").expect("static regex should not panic"));
#[allow(clippy::expect_used)] // good regex, it doesn't panic
pub(crate) static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{14}$").expect("static regex should not panic"));

/// Five or six digit organization shortcodes.
pub(crate) const SHORT_CODE_RANGE: RangeInclusive<u64> = 10_000..=999_999;

/// Reads fields out of a raw JSON payload, recording every violation.
///
/// Each reader returns `None` when the field is unusable; the caller builds
/// its record with `?` once all fields have been read, then hands the result
/// to [`finish`](Self::finish).
pub(crate) struct FieldReader<'a> {
    payload: &'a Map<String, Value>,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(payload: &'a Value) -> Result<Self, ValidationError> {
        payload
            .as_object()
            .map(|payload| Self {
                payload,
                violations: Vec::new(),
            })
            .ok_or_else(|| ValidationError::single("payload", "must be a JSON object"))
    }

    /// `true` when `field` is present and not null.
    pub(crate) fn has(&self, field: &str) -> bool {
        self.raw(field).is_some()
    }

    fn raw(&self, field: &str) -> Option<&'a Value> {
        self.payload.get(field).filter(|v| !v.is_null())
    }

    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.to_owned(),
            message: message.into(),
        });
    }

    fn string(&mut self, field: &str, allow_blank: bool) -> Option<String> {
        match self.raw(field) {
            None => {
                self.reject(field, "is required");
                None
            }
            Some(Value::String(s)) if !allow_blank && s.trim().is_empty() => {
                self.reject(field, "must not be empty");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.reject(field, "must be a string");
                None
            }
        }
    }

    pub(crate) fn required_str(&mut self, field: &str) -> Option<String> {
        self.string(field, false)
    }

    pub(crate) fn matching(&mut self, field: &str, pattern: &Regex) -> Option<String> {
        let value = self.string(field, false)?;
        if pattern.is_match(&value) {
            Some(value)
        } else {
            self.reject(field, format!("must match {}", pattern.as_str()));
            None
        }
    }

    pub(crate) fn max_len(&mut self, field: &str, max: usize) -> Option<String> {
        let value = self.string(field, true)?;
        self.check_len(field, value, max)
    }

    /// `Some(None)` when absent, `None` when present but invalid.
    pub(crate) fn optional_max_len(&mut self, field: &str, max: usize) -> Option<Option<String>> {
        if !self.has(field) {
            return Some(None);
        }
        self.max_len(field, max).map(Some)
    }

    fn check_len(&mut self, field: &str, value: String, max: usize) -> Option<String> {
        if value.chars().count() <= max {
            Some(value)
        } else {
            self.reject(field, format!("must be at most {max} characters"));
            None
        }
    }

    pub(crate) fn one_of(&mut self, field: &str, allowed: &[&str]) -> Option<String> {
        let value = self.string(field, false)?;
        if allowed.contains(&value.as_str()) {
            Some(value)
        } else {
            self.reject(field, format!("must be one of: {}", allowed.join(", ")));
            None
        }
    }

    /// A strictly positive amount, given as a JSON number or numeric string.
    pub(crate) fn positive_amount(&mut self, field: &str) -> Option<Number> {
        let number = match self.raw(field) {
            None => {
                self.reject(field, "is required");
                return None;
            }
            Some(Value::Number(n)) => Some(n.clone()),
            Some(Value::String(s)) => parse_number(s.trim()),
            Some(_) => None,
        };
        let Some(number) = number else {
            self.reject(field, "must be a number");
            return None;
        };
        if number.as_f64().is_some_and(|v| v > 0.0) {
            Some(number)
        } else {
            self.reject(field, "amount must be > 0");
            None
        }
    }

    /// An integer, or a string of digits, inside `range`.
    pub(crate) fn int_in_range(&mut self, field: &str, range: RangeInclusive<u64>) -> Option<u64> {
        let value = match self.raw(field) {
            None => {
                self.reject(field, "is required");
                return None;
            }
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse::<u64>().ok()
            }
            Some(_) => None,
        };
        match value {
            Some(v) if range.contains(&v) => Some(v),
            _ => {
                self.reject(
                    field,
                    format!("must be an integer between {} and {}", range.start(), range.end()),
                );
                None
            }
        }
    }

    /// An absolute `http`/`https` URL in canonical form.
    pub(crate) fn url(&mut self, field: &str) -> Option<String> {
        let raw = self.string(field, false)?;
        match Url::parse(raw.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                Some(url.to_string())
            }
            Ok(url) => {
                self.reject(
                    field,
                    format!("must be an absolute http(s) URL, got scheme '{}'", url.scheme()),
                );
                None
            }
            Err(e) => {
                self.reject(field, format!("must be an absolute URL: {e}"));
                None
            }
        }
    }

    pub(crate) fn reference_items(&mut self, field: &str) -> Option<Vec<ReferenceItem>> {
        let Some(raw) = self.raw(field) else {
            self.reject(field, "is required");
            return None;
        };
        let Some(entries) = raw.as_array() else {
            self.reject(field, "must be a list of {Key, Value} items");
            return None;
        };

        let mut items = Vec::with_capacity(entries.len());
        let mut ok = true;
        for (i, entry) in entries.iter().enumerate() {
            let key = entry.get("Key").and_then(Value::as_str);
            let value = entry.get("Value").and_then(Value::as_str);
            if key.is_none() {
                self.reject(&format!("{field}[{i}].Key"), "must be a string");
            }
            if value.is_none() {
                self.reject(&format!("{field}[{i}].Value"), "must be a string");
            }
            match (key, value) {
                (Some(key), Some(value)) => items.push(ReferenceItem::new(key, value)),
                _ => ok = false,
            }
        }
        ok.then_some(items)
    }

    pub(crate) fn finish<T>(self, built: Option<T>) -> Result<T, ValidationError> {
        if let Some(err) = ValidationError::from_violations(self.violations) {
            return Err(err);
        }
        built.ok_or_else(|| ValidationError::single("payload", "incomplete payload"))
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(int) = s.parse::<u64>() {
        return Some(Number::from(int));
    }
    if let Ok(int) = s.parse::<i64>() {
        return Some(Number::from(int));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

//! Label and field selectors used to restrict list, watch and delete-collection requests
//!
//! Label selectors follow the Kubernetes syntax and are evaluated with
//! `kube::core::Selector`:
//! - Equality: `key=value` or `key==value`
//! - Inequality: `key!=value`
//! - Set-based: `key in (v1,v2)` or `key notin (v1,v2)`
//! - Existence: `key` or `!key`
//!
//! Field selectors support `=`, `==` and `!=` against dotted paths into the
//! object, e.g. `metadata.name=foo` or `status.address.url!=`.

use crate::{Error, Result};
use kube::api::{ListParams, WatchParams};
use kube::core::{Expression, Selector, SelectorExt};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Split on commas that are not inside a parenthesised value set
fn split_requirements(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, ch) in selector.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_value_set(requirement: &str, rest: &str) -> Result<BTreeSet<String>> {
    let inner = rest
        .trim()
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| {
            Error::InvalidRequest(format!("invalid label selector requirement: {}", requirement))
        })?;

    Ok(inner
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_requirement(requirement: &str) -> Result<Expression> {
    let invalid =
        || Error::InvalidRequest(format!("invalid label selector requirement: {}", requirement));

    if let Some((key, rest)) = requirement.split_once(" notin ") {
        return Ok(Expression::NotIn(
            key.trim().to_string(),
            parse_value_set(requirement, rest)?,
        ));
    }
    if let Some((key, rest)) = requirement.split_once(" in ") {
        return Ok(Expression::In(
            key.trim().to_string(),
            parse_value_set(requirement, rest)?,
        ));
    }
    if let Some((key, value)) = requirement.split_once("!=") {
        return Ok(Expression::NotEqual(
            key.trim().to_string(),
            value.trim().to_string(),
        ));
    }
    if let Some((key, value)) = requirement
        .split_once("==")
        .or_else(|| requirement.split_once('='))
    {
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }
        return Ok(Expression::Equal(key.to_string(), value.trim().to_string()));
    }
    if let Some(key) = requirement.strip_prefix('!') {
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }
        return Ok(Expression::DoesNotExist(key.to_string()));
    }
    if requirement.contains(char::is_whitespace) {
        return Err(invalid());
    }

    Ok(Expression::Exists(requirement.to_string()))
}

/// Parse a label selector string. An empty string selects everything.
///
/// ```
/// use messaging_fake_client::selector::parse_label_selector;
///
/// let selector = parse_label_selector("app=web,tier in (frontend,edge)").unwrap();
/// assert!(!selector.selects_all());
/// assert!(parse_label_selector("").unwrap().selects_all());
/// ```
pub fn parse_label_selector(selector: &str) -> Result<Selector> {
    split_requirements(selector)
        .into_iter()
        .map(parse_requirement)
        .collect::<Result<Vec<_>>>()
        .map(Selector::from_iter)
}

/// Check a label map against a label selector string
pub fn matches_label_selector(labels: &BTreeMap<String, String>, selector: &str) -> Result<bool> {
    Ok(parse_label_selector(selector)?.matches(labels))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldRequirement {
    Equal(String, String),
    NotEqual(String, String),
}

/// Parsed field selector; every requirement must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let mut requirements = Vec::new();

        for requirement in split_requirements(selector) {
            let parsed = if let Some((field, value)) = requirement.split_once("!=") {
                FieldRequirement::NotEqual(field.trim().to_string(), value.trim().to_string())
            } else if let Some((field, value)) = requirement
                .split_once("==")
                .or_else(|| requirement.split_once('='))
            {
                FieldRequirement::Equal(field.trim().to_string(), value.trim().to_string())
            } else {
                return Err(Error::InvalidRequest(format!(
                    "invalid field selector requirement: {}",
                    requirement
                )));
            };
            requirements.push(parsed);
        }

        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, object: &Value) -> bool {
        self.requirements.iter().all(|req| match req {
            FieldRequirement::Equal(field, value) => field_value(object, field) == *value,
            FieldRequirement::NotEqual(field, value) => field_value(object, field) != *value,
        })
    }
}

/// Render the value at a dotted path the way the API server does for field
/// selectors; missing fields compare as the empty string.
fn field_value(object: &Value, path: &str) -> String {
    let found = path
        .split('.')
        .try_fold(object, |current, segment| current.get(segment));

    match found {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Label and field restrictions carried by list, watch and delete-collection actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRestrictions {
    pub labels: Selector,
    pub fields: FieldSelector,
}

impl ListRestrictions {
    pub fn new(label_selector: Option<&str>, field_selector: Option<&str>) -> Result<Self> {
        Ok(Self {
            labels: parse_label_selector(label_selector.unwrap_or_default())?,
            fields: FieldSelector::parse(field_selector.unwrap_or_default())?,
        })
    }

    pub fn from_list_params(params: &ListParams) -> Result<Self> {
        Self::new(
            params.label_selector.as_deref(),
            params.field_selector.as_deref(),
        )
    }

    pub fn from_watch_params(params: &WatchParams) -> Result<Self> {
        Self::new(
            params.label_selector.as_deref(),
            params.field_selector.as_deref(),
        )
    }

    /// Whether the object's labels satisfy the label selector
    pub fn matches_labels(&self, object: &Value) -> bool {
        self.labels.matches(&object_labels(object))
    }

    pub fn matches(&self, object: &Value) -> bool {
        self.matches_labels(object) && self.fields.matches(object)
    }
}

fn object_labels(object: &Value) -> BTreeMap<String, String> {
    object
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

use crate::{tracker::GVK, Error, Result};
use serde_json::Value;

/// Plural resource name for a kind, following the rules kube-rs uses for discovery.
///
/// See: <https://github.com/kube-rs/kube/blob/main/kube-core/src/discovery.rs>
pub fn pluralize(kind: &str) -> String {
    let word = kind.to_ascii_lowercase();

    match word.as_str() {
        "endpoints" | "endpointslices" => return word,
        "nodemetrics" => return "nodes".to_string(),
        "podmetrics" => return "pods".to_string(),
        _ => {}
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        if stem
            .chars()
            .last()
            .is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        {
            return format!("{stem}ies");
        }
    }

    format!("{word}s")
}

pub fn extract_gvk(value: &Value) -> Result<GVK> {
    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidRequest("Missing apiVersion".to_string()))?;

    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidRequest("Missing kind".to_string()))?;

    let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));

    Ok(GVK::new(group, version, kind))
}

/// Fill in `apiVersion` and `kind` when an object omits them
pub fn ensure_type_meta(value: &mut Value, gvk: &GVK) {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("apiVersion")
            .or_insert_with(|| Value::String(gvk.api_version()));
        obj.entry("kind")
            .or_insert_with(|| Value::String(gvk.kind.clone()));
    }
}

/// Set `metadata.name` on a request body, creating `metadata` when absent
pub fn set_object_name(object: &mut Value, name: &str) -> Result<()> {
    let obj = object
        .as_object_mut()
        .ok_or_else(|| Error::InvalidRequest("request body must be an object".to_string()))?;

    let metadata = obj
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    if metadata.is_null() {
        *metadata = Value::Object(Default::default());
    }

    metadata
        .as_object_mut()
        .ok_or_else(|| Error::InvalidRequest("metadata must be an object".to_string()))?
        .insert("name".to_string(), Value::String(name.to_string()));
    Ok(())
}

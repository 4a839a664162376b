use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

const GENERATED_SUFFIX_LEN: usize = 5;

pub fn should_be_deleted(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some() && meta.finalizers.as_ref().is_none_or(Vec::is_empty)
}

pub fn has_finalizers(meta: &ObjectMeta) -> bool {
    meta.finalizers.as_ref().is_some_and(|f| !f.is_empty())
}

/// Fill in server-set metadata. `namespace` is `""` only for cluster-scoped resources.
pub fn ensure_metadata(meta: &mut ObjectMeta, namespace: &str) {
    // Cluster-scoped objects never carry a namespace
    if namespace.is_empty() {
        meta.namespace = None;
    } else if meta.namespace.as_deref().is_none_or(str::is_empty) {
        meta.namespace = Some(namespace.to_string());
    }
    if meta.creation_timestamp.is_none() {
        meta.creation_timestamp = Some(Time(chrono::Utc::now()));
    }
    if meta.uid.is_none() {
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
    }
}

/// Reject objects whose namespace disagrees with the request namespace
pub fn check_namespace(meta: &ObjectMeta, namespace: &str) -> Result<()> {
    match meta.namespace.as_deref() {
        Some(ns) if !ns.is_empty() && !namespace.is_empty() && ns != namespace => {
            Err(Error::InvalidRequest(format!(
                "the namespace of the object ({}) does not match the namespace on the request ({})",
                ns, namespace
            )))
        }
        _ => Ok(()),
    }
}

/// Resolve the object name, honouring `metadata.generateName` when no name is set
pub fn resolve_name(meta: &mut ObjectMeta) -> Result<String> {
    if let Some(name) = meta.name.as_ref().filter(|n| !n.is_empty()) {
        return Ok(name.clone());
    }

    let prefix = meta
        .generate_name
        .as_ref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::InvalidRequest("Object name is required".to_string()))?;

    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(GENERATED_SUFFIX_LEN)
        .collect();
    let name = format!("{}{}", prefix, suffix);
    meta.name = Some(name.clone());
    Ok(name)
}

pub fn deletion_timestamp_equal(a: &Option<Time>, b: &Option<Time>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.0 == b.0,
        (None, None) => true,
        _ => false,
    }
}

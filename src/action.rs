//! Records of the operations submitted to the fake clientset

use crate::selector::ListRestrictions;
use crate::tracker::{GVK, GVR};
use crate::{Error, Result};
use kube::api::Patch;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Delete,
    DeleteCollection,
    Patch,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Watch => "watch",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::DeleteCollection => "deletecollection",
            Verb::Patch => "patch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patch types, keyed by the Content-Type the API server expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum PatchType {
    /// RFC 6902 JSON Patch - application/json-patch+json
    JsonPatch,
    /// RFC 7386 JSON Merge Patch - application/merge-patch+json
    MergePatch,
    /// Kubernetes Strategic Merge Patch - application/strategic-merge-patch+json
    StrategicMergePatch,
    /// Server-Side Apply - application/apply-patch+yaml
    ApplyPatch,
}

impl PatchType {
    pub fn content_type(&self) -> &'static str {
        match self {
            PatchType::JsonPatch => "application/json-patch+json",
            PatchType::MergePatch => "application/merge-patch+json",
            PatchType::StrategicMergePatch => "application/strategic-merge-patch+json",
            PatchType::ApplyPatch => "application/apply-patch+yaml",
        }
    }

    /// Strategic merge is what the API server assumes when nothing matches
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("application/json-patch+json") => PatchType::JsonPatch,
            Some(ct) if ct.contains("application/merge-patch+json") => PatchType::MergePatch,
            Some(ct) if ct.contains("application/apply-patch+yaml") => PatchType::ApplyPatch,
            _ => PatchType::StrategicMergePatch,
        }
    }
}

/// Patch payload of a patch action
#[derive(Debug, Clone, PartialEq)]
pub struct PatchData {
    pub name: String,
    pub patch_type: PatchType,
    pub patch: Value,
}

impl PatchData {
    pub fn from_kube<P: Serialize>(name: &str, patch: &Patch<P>) -> Result<Self> {
        #[allow(unreachable_patterns)]
        let (patch_type, patch) = match patch {
            Patch::Apply(p) => (PatchType::ApplyPatch, serde_json::to_value(p)?),
            Patch::Json(p) => (PatchType::JsonPatch, serde_json::to_value(p)?),
            Patch::Merge(p) => (PatchType::MergePatch, serde_json::to_value(p)?),
            Patch::Strategic(p) => (PatchType::StrategicMergePatch, serde_json::to_value(p)?),
            _ => {
                return Err(Error::InvalidRequest(
                    "unsupported patch variant".to_string(),
                ))
            }
        };

        Ok(Self {
            name: name.to_string(),
            patch_type,
            patch,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Name(String),
    Object(Value),
    Restrictions(ListRestrictions),
    Patch(PatchData),
}

/// A single operation submitted to the fake backend
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub verb: Verb,
    pub resource: GVR,
    /// Kind of the objects the action returns, when the caller knows it
    pub kind: Option<GVK>,
    pub namespace: String,
    pub subresource: Option<String>,
    pub payload: Payload,
}

impl Action {
    fn new(verb: Verb, resource: &GVR, namespace: &str, payload: Payload) -> Self {
        Self {
            verb,
            resource: resource.clone(),
            kind: None,
            namespace: namespace.to_string(),
            subresource: None,
            payload,
        }
    }

    pub fn with_kind(mut self, kind: &GVK) -> Self {
        self.kind = Some(kind.clone());
        self
    }

    pub fn get(resource: &GVR, namespace: &str, name: &str) -> Self {
        Self::new(Verb::Get, resource, namespace, Payload::Name(name.to_string()))
    }

    pub fn get_subresource(resource: &GVR, subresource: &str, namespace: &str, name: &str) -> Self {
        Self::get(resource, namespace, name).subresource(subresource)
    }

    pub fn list(
        resource: &GVR,
        kind: &GVK,
        namespace: &str,
        restrictions: ListRestrictions,
    ) -> Self {
        Self::new(
            Verb::List,
            resource,
            namespace,
            Payload::Restrictions(restrictions),
        )
        .with_kind(kind)
    }

    pub fn watch(resource: &GVR, namespace: &str, restrictions: ListRestrictions) -> Self {
        Self::new(
            Verb::Watch,
            resource,
            namespace,
            Payload::Restrictions(restrictions),
        )
    }

    pub fn create(resource: &GVR, namespace: &str, object: Value) -> Self {
        Self::new(Verb::Create, resource, namespace, Payload::Object(object))
    }

    pub fn create_subresource(
        resource: &GVR,
        subresource: &str,
        namespace: &str,
        object: Value,
    ) -> Self {
        Self::create(resource, namespace, object).subresource(subresource)
    }

    pub fn update(resource: &GVR, namespace: &str, object: Value) -> Self {
        Self::new(Verb::Update, resource, namespace, Payload::Object(object))
    }

    pub fn update_subresource(
        resource: &GVR,
        subresource: &str,
        namespace: &str,
        object: Value,
    ) -> Self {
        Self::update(resource, namespace, object).subresource(subresource)
    }

    pub fn delete(resource: &GVR, namespace: &str, name: &str) -> Self {
        Self::new(Verb::Delete, resource, namespace, Payload::Name(name.to_string()))
    }

    pub fn delete_collection(
        resource: &GVR,
        namespace: &str,
        restrictions: ListRestrictions,
    ) -> Self {
        Self::new(
            Verb::DeleteCollection,
            resource,
            namespace,
            Payload::Restrictions(restrictions),
        )
    }

    /// Patch action; at most one subresource is meaningful, extra entries are
    /// joined with `/` the way the request path would be.
    pub fn patch_subresource(
        resource: &GVR,
        namespace: &str,
        patch: PatchData,
        subresources: &[&str],
    ) -> Self {
        let mut action = Self::new(Verb::Patch, resource, namespace, Payload::Patch(patch));
        if !subresources.is_empty() {
            action.subresource = Some(subresources.join("/"));
        }
        action
    }

    fn subresource(mut self, subresource: &str) -> Self {
        self.subresource = Some(subresource.to_string());
        self
    }

    /// Whether the action matches a verb and resource filter; `*` matches anything
    pub fn matches(&self, verb: &str, resource: &str) -> bool {
        (verb == "*" || verb == self.verb.as_str())
            && (resource == "*" || resource == self.resource.resource)
    }

    pub fn is_status(&self) -> bool {
        self.subresource.as_deref() == Some("status")
    }

    /// Object name for get, delete and patch actions, or the object's own name
    pub fn name(&self) -> Option<&str> {
        match &self.payload {
            Payload::Name(name) => Some(name),
            Payload::Patch(patch) => Some(&patch.name),
            Payload::Object(object) => object
                .get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str),
            Payload::Restrictions(_) => None,
        }
    }

    pub fn object(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn restrictions(&self) -> Option<&ListRestrictions> {
        match &self.payload {
            Payload::Restrictions(restrictions) => Some(restrictions),
            _ => None,
        }
    }

    pub fn patch(&self) -> Option<&PatchData> {
        match &self.payload {
            Payload::Patch(patch) => Some(patch),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.resource)?;
        if let Some(sub) = &self.subresource {
            write!(f, "/{}", sub)?;
        }
        if !self.namespace.is_empty() {
            write!(f, " in {}", self.namespace)?;
        }
        if let Some(name) = self.name() {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

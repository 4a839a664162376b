//! Resource registry
//!
//! Maps between resource paths (group, version, plural) and kinds so that
//! requests arriving over HTTP and objects loaded from fixtures can be routed
//! to the right bucket of the tracker. `InMemoryChannel` is always known;
//! other types are added with [`ResourceRegistry::register`].

use crate::client_utils::pluralize;
use crate::tracker::{GVK, GVR};
use crate::types;
use kube::core::ClusterResourceScope;
use kube::Resource;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Metadata for a registered resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub gvk: GVK,
    /// The plural name (e.g., "inmemorychannels")
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceMetadata {
    pub fn gvr(&self) -> GVR {
        GVR::new(&self.gvk.group, &self.gvk.version, &self.plural)
    }
}

#[derive(Debug)]
pub struct ResourceRegistry {
    resources: RwLock<HashMap<GVR, ResourceMetadata>>,
}

impl ResourceRegistry {
    /// Registry that knows about `InMemoryChannel`
    pub fn new() -> Self {
        let registry = Self {
            resources: RwLock::new(HashMap::new()),
        };
        registry.insert(ResourceMetadata {
            gvk: types::gvk(),
            plural: types::RESOURCE.to_string(),
            namespaced: true,
        });
        registry
    }

    /// Register a resource type using its `Resource` implementation
    pub fn register<K>(&self)
    where
        K: Resource<DynamicType = ()>,
        K::Scope: 'static,
    {
        let namespaced = TypeId::of::<K::Scope>() != TypeId::of::<ClusterResourceScope>();
        self.insert(ResourceMetadata {
            gvk: GVK::new(K::group(&()), K::version(&()), K::kind(&())),
            plural: K::plural(&()).into_owned(),
            namespaced,
        });
    }

    pub fn insert(&self, metadata: ResourceMetadata) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metadata.gvr(), metadata);
    }

    /// Look up a resource by (group, version, plural)
    pub fn lookup(&self, gvr: &GVR) -> Option<ResourceMetadata> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(gvr)
            .cloned()
    }

    pub fn lookup_by_kind(&self, gvk: &GVK) -> Option<ResourceMetadata> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|m| &m.gvk == gvk)
            .cloned()
    }

    /// Resource for a kind; unregistered kinds fall back to the pluralized kind
    pub fn gvk_to_gvr(&self, gvk: &GVK) -> GVR {
        self.lookup_by_kind(gvk)
            .map(|m| m.gvr())
            .unwrap_or_else(|| GVR::new(&gvk.group, &gvk.version, pluralize(&gvk.kind)))
    }

    /// Kind for a resource; unregistered resources get a singularized guess
    pub fn gvr_to_gvk(&self, gvr: &GVR) -> GVK {
        self.lookup(gvr)
            .map(|m| m.gvk)
            .unwrap_or_else(|| GVK::new(&gvr.group, &gvr.version, guess_kind(&gvr.resource)))
    }

    pub fn is_namespaced(&self, gvr: &GVR) -> bool {
        self.lookup(gvr).is_none_or(|m| m.namespaced)
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort kind for an unknown plural: `widgets` -> `Widget`
fn guess_kind(resource: &str) -> String {
    let singular = if let Some(base) = resource.strip_suffix("ies") {
        format!("{}y", base)
    } else if ["ses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|suffix| resource.ends_with(suffix))
    {
        resource[..resource.len() - 2].to_string()
    } else {
        resource.strip_suffix('s').unwrap_or(resource).to_string()
    };

    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => singular,
    }
}

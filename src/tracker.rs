//! In-memory object store backing the fake clientset

use crate::utils::{
    check_namespace, deletion_timestamp_equal, ensure_metadata, has_finalizers, resolve_name,
    should_be_deleted,
};
use crate::{Error, Result};
use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};

/// Events buffered per watcher before it starts lagging
const EVENT_BUFFER: usize = 1024;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GVR {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GVR {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

impl std::fmt::Display for GVR {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GVK {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GVK {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl EventType {
    /// Name used on the wire (`ADDED`, `MODIFIED`, `DELETED`)
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
        }
    }
}

/// A change observed by the tracker
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub object: Value,
}

pub type EventStream = BoxStream<'static, Event>;

#[derive(Debug, Clone)]
struct Notification {
    gvr: GVR,
    namespace: String,
    event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub data: Value,
    pub gvk: GVK,
}

type ObjectsByName = BTreeMap<String, StoredObject>;
type ObjectsByNamespace = BTreeMap<String, ObjectsByName>;

#[derive(Default)]
struct Store {
    objects: HashMap<GVR, ObjectsByNamespace>,
    /// Last resourceVersion handed out; shared by every resource
    revision: u64,
}

impl Store {
    fn lookup(&self, gvr: &GVR, namespace: &str, name: &str) -> Option<&StoredObject> {
        self.objects.get(gvr)?.get(namespace)?.get(name)
    }

    fn insert(&mut self, gvr: &GVR, namespace: &str, name: &str, stored: StoredObject) -> bool {
        self.objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), stored)
            .is_some()
    }

    fn remove(&mut self, gvr: &GVR, namespace: &str, name: &str) -> Option<StoredObject> {
        self.objects.get_mut(gvr)?.get_mut(namespace)?.remove(name)
    }

    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// Stores objects as JSON grouped by resource, namespace and name.
///
/// Every write bumps a tracker-wide resourceVersion and is broadcast to
/// watchers registered through [`ObjectTracker::watch`].
pub struct ObjectTracker {
    store: RwLock<Store>,
    with_status_subresource: RwLock<HashSet<GVK>>,
    events: broadcast::Sender<Notification>,
}

impl ObjectTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store: RwLock::new(Store::default()),
            with_status_subresource: RwLock::new(HashSet::new()),
            events,
        }
    }

    pub fn add_status_subresource(&self, gvk: GVK) {
        self.with_status_subresource
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(gvk);
    }

    pub fn has_status_subresource(&self, gvk: &GVK) -> bool {
        self.with_status_subresource
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(gvk)
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, Store>> {
        self.store
            .read()
            .map_err(|_| Error::Internal("object tracker lock poisoned".to_string()))
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, Store>> {
        self.store
            .write()
            .map_err(|_| Error::Internal("object tracker lock poisoned".to_string()))
    }

    fn notify(&self, gvr: &GVR, namespace: &str, event_type: EventType, object: &Value) {
        // Nobody listening is not an error
        let _ = self.events.send(Notification {
            gvr: gvr.clone(),
            namespace: namespace.to_string(),
            event: Event {
                event_type,
                object: object.clone(),
            },
        });
    }

    /// Seed an object, replacing any existing object with the same name.
    ///
    /// A resourceVersion already present on the object is kept.
    pub fn add(&self, gvr: &GVR, gvk: &GVK, mut object: Value, namespace: &str) -> Result<Value> {
        trace!("Adding object: {} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = resolve_name(&mut meta)?;

        if meta.deletion_timestamp.is_some() && !has_finalizers(&meta) {
            return Err(Error::InvalidRequest(format!(
                "refusing to add object {} with metadata.deletionTimestamp but no finalizers",
                name
            )));
        }

        ensure_metadata(&mut meta, namespace);
        if meta.generation.is_none() {
            meta.generation = Some(1);
        }

        let mut store = self.write_store()?;
        let revision = store.next_revision();
        if meta.resource_version.as_deref().is_none_or(str::is_empty) {
            meta.resource_version = Some(revision);
        }

        object["metadata"] = serde_json::to_value(&meta)?;
        let replaced = store.insert(
            gvr,
            namespace,
            &name,
            StoredObject {
                data: object.clone(),
                gvk: gvk.clone(),
            },
        );
        drop(store);

        let event_type = if replaced {
            EventType::Modified
        } else {
            EventType::Added
        };
        self.notify(gvr, namespace, event_type, &object);

        debug!("Added object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn create(
        &self,
        gvr: &GVR,
        gvk: &GVK,
        mut object: Value,
        namespace: &str,
    ) -> Result<Value> {
        trace!("Creating object: {} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = resolve_name(&mut meta)?;

        if meta
            .resource_version
            .as_ref()
            .is_some_and(|rv| !rv.is_empty())
        {
            return Err(Error::InvalidRequest(
                "resourceVersion can not be set for Create requests".to_string(),
            ));
        }
        check_namespace(&meta, namespace)?;

        meta.deletion_timestamp = None;
        meta.generation = Some(1);
        ensure_metadata(&mut meta, namespace);

        let mut store = self.write_store()?;
        if store.lookup(gvr, namespace, &name).is_some() {
            return Err(Error::AlreadyExists {
                kind: gvk.kind.clone(),
                name,
                namespace: namespace.to_string(),
            });
        }

        meta.resource_version = Some(store.next_revision());
        object["metadata"] = serde_json::to_value(&meta)?;
        store.insert(
            gvr,
            namespace,
            &name,
            StoredObject {
                data: object.clone(),
                gvk: gvk.clone(),
            },
        );
        drop(store);

        self.notify(gvr, namespace, EventType::Added, &object);

        debug!("Created object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Getting object: {} {}/{}", gvr, namespace, name);

        let store = self.read_store()?;
        store
            .lookup(gvr, namespace, name)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| not_found(gvr, namespace, name))
    }

    /// Replace an existing object.
    ///
    /// When the status subresource is enabled for `gvk`, a status update only
    /// changes `status` and a regular update leaves `status` untouched.
    pub fn update(
        &self,
        gvr: &GVR,
        gvk: &GVK,
        mut object: Value,
        namespace: &str,
        is_status: bool,
    ) -> Result<Value> {
        trace!("Updating object: {} in namespace: {}", gvr, namespace);

        let meta = extract_metadata(&object)?;
        let name = meta
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidRequest("Object name is required".to_string()))?;
        check_namespace(&meta, namespace)?;

        let mut store = self.write_store()?;
        let existing = store
            .lookup(gvr, namespace, &name)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| not_found(gvr, namespace, &name))?;
        let existing_meta = extract_metadata(&existing)?;

        if let (Some(provided), Some(current)) =
            (&meta.resource_version, &existing_meta.resource_version)
        {
            if !provided.is_empty() && provided != current {
                return Err(Error::Conflict(format!(
                    "the object {} has been modified: resourceVersion {} does not match {}",
                    name, provided, current
                )));
            }
        }

        if self.has_status_subresource(gvk) {
            let keep = if is_status { "spec" } else { "status" };
            match existing.get(keep) {
                Some(value) => object[keep] = value.clone(),
                None => {
                    if let Some(obj) = object.as_object_mut() {
                        obj.remove(keep);
                    }
                }
            }
            if is_status {
                // Only the status may change through the status subresource
                object["metadata"] = existing["metadata"].clone();
            }
        }

        let mut new_meta = extract_metadata(&object)?;
        if !deletion_timestamp_equal(
            &new_meta.deletion_timestamp,
            &existing_meta.deletion_timestamp,
        ) {
            return Err(Error::InvalidRequest(
                "metadata.deletionTimestamp field is immutable".to_string(),
            ));
        }

        let spec_changed = existing.get("spec") != object.get("spec");
        let generation = existing_meta.generation.unwrap_or(1);
        new_meta.generation = Some(if spec_changed {
            generation + 1
        } else {
            generation
        });
        new_meta.uid = existing_meta.uid;
        new_meta.creation_timestamp = existing_meta.creation_timestamp;
        new_meta.namespace = existing_meta.namespace;
        new_meta.resource_version = Some(store.next_revision());
        object["metadata"] = serde_json::to_value(&new_meta)?;

        if should_be_deleted(&new_meta) {
            store.remove(gvr, namespace, &name);
            drop(store);
            self.notify(gvr, namespace, EventType::Deleted, &object);
            debug!("Finalized and removed object: {}/{}", namespace, name);
            return Ok(object);
        }

        store.insert(
            gvr,
            namespace,
            &name,
            StoredObject {
                data: object.clone(),
                gvk: gvk.clone(),
            },
        );
        drop(store);

        self.notify(gvr, namespace, EventType::Modified, &object);

        debug!("Updated object: {}/{}", namespace, name);
        Ok(object)
    }

    /// Delete an object.
    ///
    /// Objects holding finalizers are only marked with a deletionTimestamp;
    /// they disappear once an update clears the finalizers.
    pub fn delete(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Deleting object: {} {}/{}", gvr, namespace, name);

        let mut store = self.write_store()?;
        let existing = store
            .lookup(gvr, namespace, name)
            .cloned()
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        let mut meta = extract_metadata(&existing.data)?;
        let revision = store.next_revision();

        if has_finalizers(&meta) {
            if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Time(chrono::Utc::now()));
            }
            meta.resource_version = Some(revision);
            let mut object = existing.data;
            object["metadata"] = serde_json::to_value(&meta)?;
            store.insert(
                gvr,
                namespace,
                name,
                StoredObject {
                    data: object.clone(),
                    gvk: existing.gvk,
                },
            );
            drop(store);

            self.notify(gvr, namespace, EventType::Modified, &object);
            debug!("Marked object for deletion: {}/{}", namespace, name);
            return Ok(object);
        }

        store.remove(gvr, namespace, name);
        drop(store);

        let mut object = existing.data;
        object["metadata"]["resourceVersion"] = Value::String(revision);
        self.notify(gvr, namespace, EventType::Deleted, &object);

        debug!("Deleted object: {}/{}", namespace, name);
        Ok(object)
    }

    /// List objects of a resource, across all namespaces when `namespace` is `None`
    pub fn list(&self, gvr: &GVR, namespace: Option<&str>) -> Result<Vec<Value>> {
        trace!("Listing objects: {} in namespace: {:?}", gvr, namespace);

        let store = self.read_store()?;
        let Some(by_namespace) = store.objects.get(gvr) else {
            return Ok(Vec::new());
        };

        let result = match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => by_namespace
                .get(ns)
                .map(|objects| objects.values().map(|s| s.data.clone()).collect())
                .unwrap_or_default(),
            None => by_namespace
                .values()
                .flat_map(|objects| objects.values().map(|s| s.data.clone()))
                .collect(),
        };

        Ok(result)
    }

    /// The resourceVersion of the most recent write
    pub fn resource_version(&self) -> Result<String> {
        Ok(self.read_store()?.revision.to_string())
    }

    /// Stream future changes to a resource. An empty namespace watches all namespaces.
    pub fn watch(&self, gvr: &GVR, namespace: &str) -> EventStream {
        trace!("Watching objects: {} in namespace: {:?}", gvr, namespace);

        let receiver = self.events.subscribe();
        let gvr = gvr.clone();
        let namespace = namespace.to_string();

        futures::stream::unfold(receiver, move |mut receiver| {
            let gvr = gvr.clone();
            let namespace = namespace.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(n) if n.gvr == gvr && (namespace.is_empty() || n.namespace == namespace) => {
                            return Some((n.event, receiver));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Watcher for {} lagged, dropped {} events", gvr, skipped);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        })
        .boxed()
    }
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn extract_metadata(object: &Value) -> Result<ObjectMeta> {
    let meta_value = object
        .get("metadata")
        .ok_or_else(|| Error::MetadataError("Object missing metadata field".to_string()))?;

    serde_json::from_value(meta_value.clone())
        .map_err(|e| Error::MetadataError(format!("Failed to parse metadata: {}", e)))
}

fn not_found(gvr: &GVR, namespace: &str, name: &str) -> Error {
    Error::NotFound {
        kind: gvr.resource.clone(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

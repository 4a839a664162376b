//! Builder for constructing fake clientsets with various options

use crate::action::Action;
use crate::client_utils::extract_gvk;
use crate::clientset::Clientset;
use crate::fake::Fake;
use crate::reactor::{object_reaction, watch_reaction, Reactor, WatchReactor};
use crate::registry::ResourceRegistry;
use crate::tracker::{EventStream, ObjectTracker, GVK};
use crate::types;
use crate::validator::SchemaValidator;
use crate::{Error, Result};
use kube::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builder for creating fake clientsets
///
/// Provides a fluent API for constructing fake clientsets with:
/// - Initial objects, from values or YAML fixtures
/// - Status subresources
/// - Extra resource types for the HTTP backend
/// - Reactors that run before the object tracker
///
/// # Example
///
/// ```rust
/// use messaging_fake_client::{ClientBuilder, InMemoryChannel, InMemoryChannelInterface};
/// use kube::api::GetParams;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut channel = InMemoryChannel::new("events", Default::default());
/// channel.metadata.namespace = Some("default".to_string());
///
/// let clientset = ClientBuilder::new()
///     .with_object(channel)
///     .with_status_subresource::<InMemoryChannel>()
///     .build()?;
///
/// let channels = clientset.messaging_v1beta1().in_memory_channels("default");
/// let fetched = channels.get("events", &GetParams::default()).await?;
/// assert_eq!(fetched.metadata.name.as_deref(), Some("events"));
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    initial_objects: Vec<Value>,
    with_status_subresource: Vec<GVK>,
    fixture_dir: Option<PathBuf>,
    reactors: Vec<Reactor>,
    watch_reactors: Vec<WatchReactor>,
    registry: ResourceRegistry,
    validator: Option<Arc<dyn SchemaValidator>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            initial_objects: Vec::new(),
            with_status_subresource: Vec::new(),
            fixture_dir: None,
            reactors: Vec::new(),
            watch_reactors: Vec::new(),
            registry: ResourceRegistry::new(),
            validator: None,
        }
    }

    /// Add an initial object; it is stored when the clientset is built
    pub fn with_object<K>(mut self, obj: K) -> Self
    where
        K: Resource + Serialize,
    {
        match serde_json::to_value(&obj) {
            Ok(value) => self.initial_objects.push(value),
            Err(e) => warn!("Skipping initial object that failed to serialize: {}", e),
        }
        self
    }

    /// Add multiple initial objects
    pub fn with_objects<K>(self, objects: Vec<K>) -> Self
    where
        K: Resource + Serialize,
    {
        objects
            .into_iter()
            .fold(self, |builder, obj| builder.with_object(obj))
    }

    /// Add initial objects from JSON values
    pub fn with_runtime_objects(mut self, objects: Vec<Value>) -> Self {
        self.initial_objects.extend(objects);
        self
    }

    /// Enable status subresource for a specific resource type
    ///
    /// When a status subresource is enabled for a type:
    /// - Regular Update operations will not modify the status field
    /// - Status Update operations will not modify other fields
    pub fn with_status_subresource<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        self.with_status_subresource
            .push(GVK::new(K::group(&()), K::version(&()), K::kind(&())));
        self
    }

    /// Make another resource type known to the HTTP backend
    ///
    /// `InMemoryChannel` is always registered. Registration gives the correct
    /// plural and scope for objects of `K` loaded from fixtures or served
    /// through [`Clientset::kube_client`].
    pub fn with_resource<K>(self) -> Self
    where
        K: Resource<DynamicType = ()>,
        K::Scope: 'static,
    {
        self.registry.register::<K>();
        self
    }

    /// Install a reactor ahead of the object tracker
    ///
    /// Reactors added here run in the order they were added.
    pub fn with_reactor<F>(mut self, verb: &str, resource: &str, reaction: F) -> Self
    where
        F: Fn(&Action) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.reactors.push(Reactor::new(verb, resource, reaction));
        self
    }

    /// Install a watch reactor ahead of the tracker's watch
    pub fn with_watch_reactor<F>(mut self, resource: &str, reaction: F) -> Self
    where
        F: Fn(&Action) -> Result<Option<EventStream>> + Send + Sync + 'static,
    {
        self.watch_reactors.push(WatchReactor::new(resource, reaction));
        self
    }

    /// Validate created, updated and patched objects before they are stored
    pub fn with_schema_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Validate `InMemoryChannel` writes against its generated CRD schema
    #[cfg(feature = "validation")]
    pub fn with_schema_validation(self) -> Result<Self> {
        let validator = crate::validator::CrdSchemaValidator::for_resource::<
            crate::types::InMemoryChannel,
        >()?;
        Ok(self.with_schema_validator(Arc::new(validator)))
    }

    /// Set the directory fixture paths are resolved against
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = Some(dir.into());
        self
    }

    /// Load objects from a YAML fixture file
    ///
    /// Supports both single-document and multi-document YAML files (separated by `---`).
    /// If a fixture directory was set with `with_fixture_dir`, the path is relative to that directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the YAML cannot be parsed.
    pub fn load_fixture(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let fixture_path = match &self.fixture_dir {
            Some(dir) => dir.join(path),
            None => path.as_ref().to_path_buf(),
        };

        let content = std::fs::read_to_string(&fixture_path).map_err(|e| {
            Error::Internal(format!(
                "Failed to read fixture file {:?}: {}",
                fixture_path, e
            ))
        })?;

        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = Value::deserialize(document).map_err(|e| {
                Error::Internal(format!("Failed to parse YAML in {:?}: {}", fixture_path, e))
            })?;

            // Empty documents, e.g. a trailing `---`
            if value.is_null() {
                continue;
            }
            if !value.get("metadata").is_some_and(Value::is_object) {
                return Err(Error::MetadataError(format!(
                    "fixture object in {:?} has no metadata",
                    fixture_path
                )));
            }

            self.initial_objects.push(value);
        }

        debug!("Loaded fixture {:?}", fixture_path);
        Ok(self)
    }

    /// Load objects from multiple YAML fixture files, in order
    pub fn load_fixtures<P>(mut self, paths: impl IntoIterator<Item = P>) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        for path in paths {
            self = self.load_fixture(path)?;
        }
        Ok(self)
    }

    /// Load objects from a YAML fixture file, panicking on error
    ///
    /// # Panics
    ///
    /// Panics if the fixture file cannot be loaded or parsed.
    pub fn load_fixture_or_panic(self, path: impl AsRef<Path>) -> Self {
        self.load_fixture(path).expect("Failed to load fixture")
    }

    /// Load objects from multiple YAML fixture files, panicking on error
    ///
    /// # Panics
    ///
    /// Panics if any fixture file cannot be loaded or parsed.
    pub fn load_fixtures_or_panic<P>(self, paths: impl IntoIterator<Item = P>) -> Self
    where
        P: AsRef<Path>,
    {
        self.load_fixtures(paths).expect("Failed to load fixtures")
    }

    /// Build the clientset and store the initial objects
    ///
    /// Initial objects are added the way fixtures are, not created: they
    /// keep any resourceVersion they carry. Objects without a namespace go to
    /// `default` unless their resource is cluster-scoped.
    ///
    /// # Errors
    ///
    /// Returns an error if any initial object cannot be stored.
    pub fn build(mut self) -> Result<Clientset> {
        let objects = std::mem::take(&mut self.initial_objects);
        let clientset = self.build_unseeded();

        for mut obj in objects {
            let gvk = extract_gvk(&obj)?;
            if gvk == types::gvk() {
                types::default_spec(&mut obj);
            }
            let gvr = clientset.registry().gvk_to_gvr(&gvk);
            let namespace = if clientset.registry().is_namespaced(&gvr) {
                extract_namespace(&obj)
            } else {
                String::new()
            };

            clientset
                .tracker()
                .add(&gvr, &gvk, obj, &namespace)
                .map_err(|e| Error::Internal(format!("Failed to add initial object: {}", e)))?;
        }

        Ok(clientset)
    }

    /// Wire the fake, ignoring initial objects
    pub(crate) fn build_unseeded(self) -> Clientset {
        let tracker = Arc::new(ObjectTracker::new());
        for gvk in self.with_status_subresource {
            tracker.add_status_subresource(gvk);
        }

        let registry = Arc::new(self.registry);
        let fake = Arc::new(Fake::new(tracker.clone()));

        for reactor in self.reactors {
            fake.push_reactor(reactor);
        }
        fake.push_reactor(Reactor::from_func(
            "*",
            "*",
            object_reaction(tracker.clone(), registry.clone(), self.validator),
        ));

        for reactor in self.watch_reactors {
            fake.push_watch_reactor(reactor);
        }
        fake.push_watch_reactor(WatchReactor::from_func("*", watch_reaction(tracker)));

        Clientset::from_parts(fake, registry)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract namespace from object metadata
fn extract_namespace(obj: &Value) -> String {
    obj.get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("default")
        .to_string()
}

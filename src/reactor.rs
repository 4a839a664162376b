//! Reactors decide how the fake backend answers an action
//!
//! Each reactor carries a verb and resource filter (`*` matches anything) and
//! a reaction that returns:
//! - `Ok(Some(value))` to answer the action and stop the chain
//! - `Ok(None)` to let the next reactor try
//! - `Err(e)` to fail the call with `e`
//!
//! ```
//! use messaging_fake_client::reactor::Reactor;
//! use messaging_fake_client::Error;
//!
//! let reactor = Reactor::new("create", "inmemorychannels", |_action| {
//!     Err(Error::Internal("etcd unavailable".to_string()))
//! });
//! assert_eq!(reactor.verb(), "create");
//! ```

use crate::action::{Action, PatchType, Verb};
use crate::client_utils::{ensure_type_meta, extract_gvk, set_object_name};
use crate::patch::apply_patch;
use crate::registry::ResourceRegistry;
use crate::tracker::{EventStream, ObjectTracker, GVK};
use crate::validator::SchemaValidator;
use crate::{Error, Result};
use futures::StreamExt;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

pub type ReactionFunc = Arc<dyn Fn(&Action) -> Result<Option<Value>> + Send + Sync>;
pub type WatchReactionFunc = Arc<dyn Fn(&Action) -> Result<Option<EventStream>> + Send + Sync>;

/// Reaction for request/response style actions
#[derive(Clone)]
pub struct Reactor {
    verb: String,
    resource: String,
    reaction: ReactionFunc,
}

impl Reactor {
    pub fn new<F>(verb: &str, resource: &str, reaction: F) -> Self
    where
        F: Fn(&Action) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Self::from_func(verb, resource, Arc::new(reaction))
    }

    pub fn from_func(verb: &str, resource: &str, reaction: ReactionFunc) -> Self {
        Self {
            verb: verb.to_string(),
            resource: resource.to_string(),
            reaction,
        }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn handles(&self, action: &Action) -> bool {
        action.matches(&self.verb, &self.resource)
    }

    pub fn react(&self, action: &Action) -> Result<Option<Value>> {
        (self.reaction)(action)
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("verb", &self.verb)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Reaction for watch actions
#[derive(Clone)]
pub struct WatchReactor {
    resource: String,
    reaction: WatchReactionFunc,
}

impl WatchReactor {
    pub fn new<F>(resource: &str, reaction: F) -> Self
    where
        F: Fn(&Action) -> Result<Option<EventStream>> + Send + Sync + 'static,
    {
        Self::from_func(resource, Arc::new(reaction))
    }

    pub fn from_func(resource: &str, reaction: WatchReactionFunc) -> Self {
        Self {
            resource: resource.to_string(),
            reaction,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn handles(&self, action: &Action) -> bool {
        action.matches(Verb::Watch.as_str(), &self.resource)
    }

    pub fn react(&self, action: &Action) -> Result<Option<EventStream>> {
        (self.reaction)(action)
    }
}

impl fmt::Debug for WatchReactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchReactor")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Default reaction: serve every action from the object tracker
pub fn object_reaction(
    tracker: Arc<ObjectTracker>,
    registry: Arc<ResourceRegistry>,
    validator: Option<Arc<dyn SchemaValidator>>,
) -> ReactionFunc {
    Arc::new(move |action: &Action| {
        ObjectReaction {
            tracker: &tracker,
            registry: &registry,
            validator: validator.as_deref(),
        }
        .react(action)
    })
}

/// Default watch reaction: stream tracker events that satisfy the action's restrictions
pub fn watch_reaction(tracker: Arc<ObjectTracker>) -> WatchReactionFunc {
    Arc::new(move |action: &Action| {
        let restrictions = action.restrictions().cloned().unwrap_or_default();
        let stream = tracker
            .watch(&action.resource, &action.namespace)
            .filter(move |event| futures::future::ready(restrictions.matches(&event.object)))
            .boxed();
        Ok(Some(stream))
    })
}

struct ObjectReaction<'a> {
    tracker: &'a ObjectTracker,
    registry: &'a ResourceRegistry,
    validator: Option<&'a dyn SchemaValidator>,
}

impl ObjectReaction<'_> {
    fn react(&self, action: &Action) -> Result<Option<Value>> {
        trace!("Object reaction for {}", action);

        let gvr = &action.resource;
        let namespace = action.namespace.as_str();

        match action.verb {
            Verb::Get => {
                let name = required_name(action)?;
                self.tracker.get(gvr, namespace, name).map(Some)
            }
            Verb::List => {
                let items = self.filtered(action)?;
                self.list_value(action, items).map(Some)
            }
            Verb::Watch => Ok(None),
            Verb::Create => {
                if let Some(sub) = &action.subresource {
                    return Err(Error::InvalidRequest(format!(
                        "create on subresource {} is not supported",
                        sub
                    )));
                }
                let (gvk, object) = self.typed_object(action)?;
                self.validate(&gvk, &object)?;
                let namespace = self.write_namespace(action, &object)?;
                self.tracker.create(gvr, &gvk, object, &namespace).map(Some)
            }
            Verb::Update => {
                let (gvk, object) = self.typed_object(action)?;
                self.validate(&gvk, &object)?;
                let namespace = self.write_namespace(action, &object)?;
                self.tracker
                    .update(gvr, &gvk, object, &namespace, action.is_status())
                    .map(Some)
            }
            Verb::Delete => {
                let name = required_name(action)?;
                self.tracker.delete(gvr, namespace, name).map(Some)
            }
            Verb::DeleteCollection => {
                let mut deleted = Vec::new();
                for object in self.filtered(action)? {
                    let name = object_name(&object)?;
                    let object_namespace = object_namespace(&object, namespace);
                    deleted.push(self.tracker.delete(gvr, &object_namespace, &name)?);
                }
                self.list_value(action, deleted).map(Some)
            }
            Verb::Patch => self.patch(action).map(Some),
        }
    }

    fn patch(&self, action: &Action) -> Result<Value> {
        let data = action
            .patch()
            .ok_or_else(|| Error::InvalidRequest("patch action without patch data".to_string()))?;
        let gvr = &action.resource;
        let namespace = action.namespace.as_str();

        let mut object = match self.tracker.get(gvr, namespace, &data.name) {
            Ok(object) => object,
            Err(e) if e.is_not_found() && data.patch_type == PatchType::ApplyPatch => {
                // Server-side apply creates missing objects
                if !data.patch.is_object() {
                    return Err(Error::InvalidRequest(
                        "apply patch must be an object".to_string(),
                    ));
                }
                let mut object = data.patch.clone();
                set_object_name(&mut object, &data.name)?;
                let gvk = self.kind_for(action, &mut object)?;
                self.validate(&gvk, &object)?;
                let namespace = self.write_namespace(action, &object)?;
                return self.tracker.create(gvr, &gvk, object, &namespace);
            }
            Err(e) => return Err(e),
        };

        apply_patch(&mut object, &data.patch, data.patch_type)?;
        let gvk = self.kind_for(action, &mut object)?;
        self.validate(&gvk, &object)?;
        self.tracker
            .update(gvr, &gvk, object, namespace, action.is_status())
    }

    /// Objects of the action's resource that satisfy its restrictions
    fn filtered(&self, action: &Action) -> Result<Vec<Value>> {
        let restrictions = action.restrictions().cloned().unwrap_or_default();
        let namespace = Some(action.namespace.as_str()).filter(|ns| !ns.is_empty());

        Ok(self
            .tracker
            .list(&action.resource, namespace)?
            .into_iter()
            .filter(|object| restrictions.matches(object))
            .collect())
    }

    fn list_value(&self, action: &Action, items: Vec<Value>) -> Result<Value> {
        let kind = action
            .kind
            .clone()
            .unwrap_or_else(|| self.registry.gvr_to_gvk(&action.resource));

        Ok(json!({
            "apiVersion": kind.api_version(),
            "kind": format!("{}List", kind.kind),
            "metadata": { "resourceVersion": self.tracker.resource_version()? },
            "items": items,
        }))
    }

    fn typed_object(&self, action: &Action) -> Result<(GVK, Value)> {
        let mut object = action.object().cloned().ok_or_else(|| {
            Error::InvalidRequest(format!("{} action without an object", action.verb))
        })?;
        let gvk = self.kind_for(action, &mut object)?;
        Ok((gvk, object))
    }

    /// Fill in missing type metadata and report the object's kind
    fn kind_for(&self, action: &Action, object: &mut Value) -> Result<GVK> {
        let fallback = action
            .kind
            .clone()
            .unwrap_or_else(|| self.registry.gvr_to_gvk(&action.resource));
        ensure_type_meta(object, &fallback);
        extract_gvk(object)
    }

    /// Namespace an object is written to
    ///
    /// Cluster-scoped resources always use `""`. For namespaced resources an
    /// all-namespaces request falls back to the object's own namespace.
    fn write_namespace(&self, action: &Action, object: &Value) -> Result<String> {
        if !self.registry.is_namespaced(&action.resource) {
            return Ok(String::new());
        }
        if !action.namespace.is_empty() {
            return Ok(action.namespace.clone());
        }
        object
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidRequest(format!(
                    "{} of namespaced resource {} requires a namespace",
                    action.verb, action.resource
                ))
            })
    }

    fn validate(&self, gvk: &GVK, object: &Value) -> Result<()> {
        match self.validator {
            Some(validator) => validator.validate(&gvk.group, &gvk.version, &gvk.kind, object),
            None => Ok(()),
        }
    }
}

fn required_name(action: &Action) -> Result<&str> {
    action
        .name()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidRequest(format!("{} requires a resource name", action.verb)))
}

fn object_name(object: &Value) -> Result<String> {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::MetadataError("stored object has no name".to_string()))
}

fn object_namespace(object: &Value, fallback: &str) -> String {
    object
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

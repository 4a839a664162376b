//! InMemoryChannel API types (`messaging.knative.dev/v1beta1`)

use crate::tracker::{GVK, GVR};
use kube::core::ObjectList;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GROUP: &str = "messaging.knative.dev";
pub const VERSION: &str = "v1beta1";
pub const KIND: &str = "InMemoryChannel";
pub const RESOURCE: &str = "inmemorychannels";

/// In-memory, best effort channel. Events are dispatched to every subscriber
/// without persistence.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "messaging.knative.dev",
    version = "v1beta1",
    kind = "InMemoryChannel",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[kube(status = "InMemoryChannelStatus", shortname = "imc")]
#[serde(rename_all = "camelCase")]
pub struct InMemoryChannelSpec {
    /// Subscribers currently attached to the channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<Vec<SubscriberSpec>>,

    /// Default delivery options for all subscribers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliverySpec>,
}

pub type InMemoryChannelList = ObjectList<InMemoryChannel>;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Generation of the Subscription this entry was built from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_uri: Option<String>,

    /// Per-subscriber override of the channel delivery options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliverySpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySpec {
    /// Where events go after the retries are exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_sink: Option<Destination>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_policy: Option<BackoffPolicy>,

    /// ISO 8601 duration, e.g. `PT1S`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_delay: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    Linear,
    Exponential,
}

/// Either an object reference or a URI (or both, the URI is then relative)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Destination {
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<KReference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KReference {
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub name: String,

    pub api_version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryChannelStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Address the channel accepts events on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<Vec<SubscriberStatus>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_channel: Option<KReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Addressable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// "True", "False" or "Unknown"
    pub ready: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Knative-style condition. Unlike the core `metav1.Condition`, every field
/// except `type` and `status` is optional.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InMemoryChannel {
    pub fn get_condition(&self, type_: &str) -> Option<&Condition> {
        self.status
            .as_ref()?
            .conditions
            .as_ref()?
            .iter()
            .find(|c| c.type_ == type_)
    }

    /// True when the `Ready` condition reports `True`
    pub fn is_ready(&self) -> bool {
        self.get_condition("Ready")
            .is_some_and(|c| c.status == "True")
    }
}

pub fn gvr() -> GVR {
    GVR::new(GROUP, VERSION, RESOURCE)
}

pub fn gvk() -> GVK {
    GVK::new(GROUP, VERSION, KIND)
}

/// Give an `InMemoryChannel` object without a `spec` an empty one
pub fn default_spec(object: &mut serde_json::Value) {
    if let Some(obj) = object.as_object_mut() {
        match obj.get("spec") {
            None | Some(serde_json::Value::Null) => {
                obj.insert("spec".to_string(), serde_json::json!({}));
            }
            Some(_) => {}
        }
    }
}

//! Typed client for `InMemoryChannel` resources
//!
//! [`InMemoryChannelInterface`] is implemented both by the fake
//! ([`FakeInMemoryChannels`]) and by `kube::Api<InMemoryChannel>`, so code
//! under test can take either.

use crate::action::{Action, PatchData, Verb};
use crate::fake::Fake;
use crate::selector::ListRestrictions;
use crate::tracker::EventType;
use crate::types::{self, InMemoryChannel, InMemoryChannelList};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use kube::api::{
    Api, DeleteParams, GetParams, ListParams, Patch, PatchParams, PostParams, WatchEvent,
    WatchParams,
};
use kube::core::SelectorExt;
use kube::ResourceExt;
use serde_json::Value;
use std::sync::Arc;

pub type InMemoryChannelWatch = BoxStream<'static, Result<WatchEvent<InMemoryChannel>>>;

/// Operations on the `inmemorychannels` resource of one namespace
#[async_trait]
pub trait InMemoryChannelInterface: Send + Sync {
    async fn get(&self, name: &str, params: &GetParams) -> Result<InMemoryChannel>;

    async fn list(&self, params: &ListParams) -> Result<InMemoryChannelList>;

    /// Stream of changes made after the call
    async fn watch(&self, params: &WatchParams) -> Result<InMemoryChannelWatch>;

    async fn create(
        &self,
        channel: &InMemoryChannel,
        params: &PostParams,
    ) -> Result<InMemoryChannel>;

    async fn update(
        &self,
        channel: &InMemoryChannel,
        params: &PostParams,
    ) -> Result<InMemoryChannel>;

    /// Replace only the status of the channel
    async fn update_status(
        &self,
        channel: &InMemoryChannel,
        params: &PostParams,
    ) -> Result<InMemoryChannel>;

    async fn delete(&self, name: &str, params: &DeleteParams) -> Result<()>;

    async fn delete_collection(
        &self,
        params: &DeleteParams,
        list_params: &ListParams,
    ) -> Result<()>;

    /// Patch a channel, or one of its subresources when `subresources` names one
    async fn patch(
        &self,
        name: &str,
        patch: &Patch<Value>,
        params: &PatchParams,
        subresources: &[&str],
    ) -> Result<InMemoryChannel>;
}

/// Fake `InMemoryChannel` client scoped to a namespace
#[derive(Debug, Clone)]
pub struct FakeInMemoryChannels {
    fake: Arc<Fake>,
    namespace: String,
}

impl FakeInMemoryChannels {
    pub fn new(fake: Arc<Fake>, namespace: impl Into<String>) -> Self {
        Self {
            fake,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn invoke(&self, action: Action) -> Result<Value> {
        let verb = action.verb;
        self.fake.invokes(action)?.ok_or_else(|| Error::NoReaction {
            verb: verb.to_string(),
            resource: types::RESOURCE.to_string(),
        })
    }

    fn invoke_channel(&self, action: Action) -> Result<InMemoryChannel> {
        decode_channel(self.invoke(action)?)
    }
}

#[async_trait]
impl InMemoryChannelInterface for FakeInMemoryChannels {
    async fn get(&self, name: &str, _params: &GetParams) -> Result<InMemoryChannel> {
        self.invoke_channel(Action::get(&types::gvr(), &self.namespace, name))
    }

    async fn list(&self, params: &ListParams) -> Result<InMemoryChannelList> {
        let restrictions = ListRestrictions::from_list_params(params)?;
        let action = Action::list(
            &types::gvr(),
            &types::gvk(),
            &self.namespace,
            restrictions.clone(),
        );

        let mut value = self.invoke(action)?;
        if let Some(items) = value.get_mut("items").and_then(Value::as_array_mut) {
            items.iter_mut().for_each(types::default_spec);
        }
        let mut list: InMemoryChannelList = serde_json::from_value(value)?;
        // Custom reactors may answer with an unfiltered list
        list.items
            .retain(|channel| restrictions.labels.matches(channel.labels()));
        Ok(list)
    }

    async fn watch(&self, params: &WatchParams) -> Result<InMemoryChannelWatch> {
        let restrictions = ListRestrictions::from_watch_params(params)?;
        let action = Action::watch(&types::gvr(), &self.namespace, restrictions);

        let events = self
            .fake
            .invokes_watch(action)?
            .map(|event| -> Result<WatchEvent<InMemoryChannel>> {
                let channel = decode_channel(event.object)?;
                Ok(match event.event_type {
                    EventType::Added => WatchEvent::Added(channel),
                    EventType::Modified => WatchEvent::Modified(channel),
                    EventType::Deleted => WatchEvent::Deleted(channel),
                })
            })
            .boxed();
        Ok(events)
    }

    async fn create(
        &self,
        channel: &InMemoryChannel,
        _params: &PostParams,
    ) -> Result<InMemoryChannel> {
        let action = Action::create(
            &types::gvr(),
            &self.namespace,
            serde_json::to_value(channel)?,
        )
        .with_kind(&types::gvk());
        self.invoke_channel(action)
    }

    async fn update(
        &self,
        channel: &InMemoryChannel,
        _params: &PostParams,
    ) -> Result<InMemoryChannel> {
        let action = Action::update(
            &types::gvr(),
            &self.namespace,
            serde_json::to_value(channel)?,
        )
        .with_kind(&types::gvk());
        self.invoke_channel(action)
    }

    async fn update_status(
        &self,
        channel: &InMemoryChannel,
        _params: &PostParams,
    ) -> Result<InMemoryChannel> {
        let action = Action::update_subresource(
            &types::gvr(),
            "status",
            &self.namespace,
            serde_json::to_value(channel)?,
        )
        .with_kind(&types::gvk());
        self.invoke_channel(action)
    }

    async fn delete(&self, name: &str, _params: &DeleteParams) -> Result<()> {
        self.invoke(Action::delete(&types::gvr(), &self.namespace, name))
            .map(|_| ())
    }

    async fn delete_collection(
        &self,
        _params: &DeleteParams,
        list_params: &ListParams,
    ) -> Result<()> {
        let restrictions = ListRestrictions::from_list_params(list_params)?;
        let action = Action::delete_collection(&types::gvr(), &self.namespace, restrictions)
            .with_kind(&types::gvk());
        self.invoke(action).map(|_| ())
    }

    async fn patch(
        &self,
        name: &str,
        patch: &Patch<Value>,
        _params: &PatchParams,
        subresources: &[&str],
    ) -> Result<InMemoryChannel> {
        let data = PatchData::from_kube(name, patch)?;
        let action =
            Action::patch_subresource(&types::gvr(), &self.namespace, data, subresources)
                .with_kind(&types::gvk());
        self.invoke_channel(action)
    }
}

/// Stored channels may omit `spec`; decode those with an empty one
fn decode_channel(mut value: Value) -> Result<InMemoryChannel> {
    types::default_spec(&mut value);
    Ok(serde_json::from_value(value)?)
}

fn required_name(channel: &InMemoryChannel, verb: Verb) -> Result<&str> {
    channel
        .metadata
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidRequest(format!("{} requires metadata.name", verb)))
}

#[async_trait]
impl InMemoryChannelInterface for Api<InMemoryChannel> {
    async fn get(&self, name: &str, params: &GetParams) -> Result<InMemoryChannel> {
        Ok(self.get_with(name, params).await?)
    }

    async fn list(&self, params: &ListParams) -> Result<InMemoryChannelList> {
        Ok(Api::list(self, params).await?)
    }

    async fn watch(&self, params: &WatchParams) -> Result<InMemoryChannelWatch> {
        let events = Api::watch(self, params, "0").await?;
        Ok(events.map_err(Error::from).boxed())
    }

    async fn create(
        &self,
        channel: &InMemoryChannel,
        params: &PostParams,
    ) -> Result<InMemoryChannel> {
        Ok(Api::create(self, params, channel).await?)
    }

    async fn update(
        &self,
        channel: &InMemoryChannel,
        params: &PostParams,
    ) -> Result<InMemoryChannel> {
        let name = required_name(channel, Verb::Update)?;
        Ok(self.replace(name, params, channel).await?)
    }

    async fn update_status(
        &self,
        channel: &InMemoryChannel,
        params: &PostParams,
    ) -> Result<InMemoryChannel> {
        let name = required_name(channel, Verb::Update)?;
        let body = serde_json::to_vec(channel)?;
        Ok(self.replace_status(name, params, body).await?)
    }

    async fn delete(&self, name: &str, params: &DeleteParams) -> Result<()> {
        Api::delete(self, name, params).await?;
        Ok(())
    }

    async fn delete_collection(
        &self,
        params: &DeleteParams,
        list_params: &ListParams,
    ) -> Result<()> {
        Api::delete_collection(self, params, list_params).await?;
        Ok(())
    }

    async fn patch(
        &self,
        name: &str,
        patch: &Patch<Value>,
        params: &PatchParams,
        subresources: &[&str],
    ) -> Result<InMemoryChannel> {
        let patched = match subresources {
            [] => Api::patch(self, name, params, patch).await?,
            ["status"] => self.patch_status(name, params, patch).await?,
            [subresource] => {
                self.patch_subresource(subresource, name, params, patch)
                    .await?
            }
            _ => {
                return Err(Error::InvalidRequest(format!(
                    "at most one subresource can be patched, got {}",
                    subresources.join("/")
                )))
            }
        };
        Ok(patched)
    }
}

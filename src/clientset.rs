//! Fake clientset exposing the messaging.knative.dev/v1beta1 group

use crate::action::Action;
use crate::builder::ClientBuilder;
use crate::fake::Fake;
use crate::inmemorychannel::FakeInMemoryChannels;
use crate::mock_service::MockService;
use crate::registry::ResourceRegistry;
use crate::tracker::ObjectTracker;
use std::sync::Arc;

/// Entry point for tests: owns the fake backend and hands out typed clients
///
/// # Example
///
/// ```rust
/// use messaging_fake_client::{Clientset, InMemoryChannelInterface};
/// use kube::api::ListParams;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let clientset = Clientset::new();
/// let channels = clientset.messaging_v1beta1().in_memory_channels("default");
///
/// let list = channels.list(&ListParams::default()).await?;
/// assert!(list.items.is_empty());
/// assert_eq!(clientset.actions().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Clientset {
    fake: Arc<Fake>,
    registry: Arc<ResourceRegistry>,
}

impl Clientset {
    /// Empty clientset backed by the object tracker
    pub fn new() -> Self {
        Self::builder().build_unseeded()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(fake: Arc<Fake>, registry: Arc<ResourceRegistry>) -> Self {
        Self { fake, registry }
    }

    pub fn messaging_v1beta1(&self) -> FakeMessagingV1beta1 {
        FakeMessagingV1beta1 {
            fake: self.fake.clone(),
        }
    }

    pub fn fake(&self) -> &Arc<Fake> {
        &self.fake
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        self.fake.tracker()
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Actions recorded so far, oldest first
    pub fn actions(&self) -> Vec<Action> {
        self.fake.actions()
    }

    pub fn clear_actions(&self) {
        self.fake.clear_actions()
    }

    /// A real `kube::Client` whose requests are served by this clientset
    ///
    /// Must be called from within a tokio runtime.
    pub fn kube_client(&self) -> kube::Client {
        let service = MockService::new(self.fake.clone(), self.registry.clone());
        kube::Client::new(service, "default")
    }
}

impl Default for Clientset {
    fn default() -> Self {
        Self::new()
    }
}

/// The messaging.knative.dev/v1beta1 group of a [`Clientset`]
#[derive(Debug, Clone)]
pub struct FakeMessagingV1beta1 {
    fake: Arc<Fake>,
}

impl FakeMessagingV1beta1 {
    pub fn in_memory_channels(&self, namespace: &str) -> FakeInMemoryChannels {
        FakeInMemoryChannels::new(self.fake.clone(), namespace)
    }
}

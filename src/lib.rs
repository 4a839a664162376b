//! In-memory fake clientset for Knative `InMemoryChannel` resources.
//!
//! Every call on the typed client is recorded as an [`action::Action`] and
//! answered by a chain of reactors, the last of which serves objects from an
//! in-memory tracker. Tests can inspect the recorded actions, put their own
//! reactors in front of the tracker, or talk to the same backend through a
//! real `kube::Client`.
//!
//! # Examples
//!
//! ## Typed client
//!
//! ```rust
//! use messaging_fake_client::{Clientset, InMemoryChannel, InMemoryChannelInterface};
//! use kube::api::{GetParams, PostParams};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clientset = Clientset::new();
//! let channels = clientset.messaging_v1beta1().in_memory_channels("default");
//!
//! let channel = InMemoryChannel::new("events", Default::default());
//! channels.create(&channel, &PostParams::default()).await?;
//!
//! let fetched = channels.get("events", &GetParams::default()).await?;
//! assert_eq!(fetched.metadata.resource_version.as_deref(), Some("1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Injecting errors
//!
//! ```rust
//! use messaging_fake_client::{ClientBuilder, Error, InMemoryChannelInterface};
//! use kube::api::GetParams;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clientset = ClientBuilder::new()
//!     .with_reactor("get", "inmemorychannels", |_| {
//!         Err(Error::Internal("etcd unavailable".to_string()))
//!     })
//!     .build()?;
//!
//! let channels = clientset.messaging_v1beta1().in_memory_channels("default");
//! assert!(channels.get("events", &GetParams::default()).await.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Through `kube::Api`
//!
//! ```rust
//! use messaging_fake_client::{Clientset, InMemoryChannel};
//! use kube::api::{Api, PostParams};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clientset = Clientset::new();
//! let channels: Api<InMemoryChannel> = Api::namespaced(clientset.kube_client(), "default");
//!
//! let channel = InMemoryChannel::new("events", Default::default());
//! channels.create(&PostParams::default(), &channel).await?;
//! assert_eq!(clientset.actions().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod action;
mod builder;
mod client_utils;
mod clientset;
mod error;
pub mod fake;
mod inmemorychannel;
mod mock_service;
pub mod patch;
pub mod reactor;
pub mod registry;
pub mod selector;
pub mod tracker;
pub mod types;
mod utils;
pub mod validator;

#[cfg(test)]
mod action_test;
#[cfg(test)]
mod client_utils_test;
#[cfg(test)]
mod inmemorychannel_test;

pub use builder::ClientBuilder;
pub use clientset::{Clientset, FakeMessagingV1beta1};
pub use error::{Error, Result};
pub use inmemorychannel::{FakeInMemoryChannels, InMemoryChannelInterface, InMemoryChannelWatch};
pub use mock_service::{MockService, ResponseBody};
pub use types::{InMemoryChannel, InMemoryChannelList, InMemoryChannelSpec, InMemoryChannelStatus};

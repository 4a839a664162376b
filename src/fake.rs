//! Action recorder and reactor chain shared by every typed fake client

use crate::action::Action;
use crate::reactor::{Reactor, WatchReactor};
use crate::tracker::{EventStream, ObjectTracker};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// Records every action it is asked to perform and answers it with the
/// first reactor that handles it.
///
/// Reactors are consulted in order. [`Fake::prepend_reactor`] puts a reactor
/// in front of the ones installed by the builder, which is how tests inject
/// errors or canned responses.
pub struct Fake {
    actions: RwLock<Vec<Action>>,
    reactors: RwLock<Vec<Reactor>>,
    watch_reactors: RwLock<Vec<WatchReactor>>,
    tracker: Arc<ObjectTracker>,
}

impl Fake {
    /// A fake with no reactors; every action goes unanswered until some are added
    pub fn new(tracker: Arc<ObjectTracker>) -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
            reactors: RwLock::new(Vec::new()),
            watch_reactors: RwLock::new(Vec::new()),
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        &self.tracker
    }

    /// Append a reactor to the end of the chain
    pub fn add_reactor<F>(&self, verb: &str, resource: &str, reaction: F)
    where
        F: Fn(&Action) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.push_reactor(Reactor::new(verb, resource, reaction));
    }

    /// Put a reactor at the front of the chain
    pub fn prepend_reactor<F>(&self, verb: &str, resource: &str, reaction: F)
    where
        F: Fn(&Action) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.reactors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, Reactor::new(verb, resource, reaction));
    }

    pub fn push_reactor(&self, reactor: Reactor) {
        self.reactors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reactor);
    }

    pub fn add_watch_reactor<F>(&self, resource: &str, reaction: F)
    where
        F: Fn(&Action) -> Result<Option<EventStream>> + Send + Sync + 'static,
    {
        self.push_watch_reactor(WatchReactor::new(resource, reaction));
    }

    pub fn prepend_watch_reactor<F>(&self, resource: &str, reaction: F)
    where
        F: Fn(&Action) -> Result<Option<EventStream>> + Send + Sync + 'static,
    {
        self.watch_reactors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, WatchReactor::new(resource, reaction));
    }

    pub fn push_watch_reactor(&self, reactor: WatchReactor) {
        self.watch_reactors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reactor);
    }

    /// Record `action` and run it through the reactor chain.
    ///
    /// Returns `Ok(None)` when no reactor answers.
    pub fn invokes(&self, action: Action) -> Result<Option<Value>> {
        debug!("Invoking {}", action);
        self.record(&action);

        // Reactions may add reactors or invoke other actions
        let chain = self
            .reactors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for reactor in chain.iter().filter(|r| r.handles(&action)) {
            match reactor.react(&action)? {
                Some(value) => return Ok(Some(value)),
                None => trace!("{:?} passed on {}", reactor, action),
            }
        }

        debug!("No reactor answered {}", action);
        Ok(None)
    }

    /// Record a watch action and return the first stream a watch reactor offers
    pub fn invokes_watch(&self, action: Action) -> Result<EventStream> {
        debug!("Invoking watch {}", action);
        self.record(&action);

        let chain = self
            .watch_reactors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for reactor in chain.iter().filter(|r| r.handles(&action)) {
            if let Some(stream) = reactor.react(&action)? {
                return Ok(stream);
            }
        }

        Err(Error::NoReaction {
            verb: action.verb.to_string(),
            resource: action.resource.resource.clone(),
        })
    }

    /// Snapshot of the actions recorded so far, oldest first
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_actions(&self) {
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, action: &Action) {
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
    }
}

impl std::fmt::Debug for Fake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fake")
            .field("actions", &self.actions().len())
            .finish_non_exhaustive()
    }
}

//! Client-side state containers.
//!
//! Each container is a plain state struct, an action enum and a pure
//! `apply(state, action, now)` returning a [`Transition`]: the next state plus
//! the side effects it asks for. Nothing in a transition touches storage, the
//! keyring or the network; [`EffectDriver`] executes the effects afterwards.
//! Async controllers that call services live next to the state they drive.

pub mod auth;
pub mod chat;
pub mod connection;
pub mod providers;
pub mod settings;

use crate::core::keyring::{CredentialStore, KeyringAccessError};
use crate::core::storage::{KeyValueStore, StorageError};
use crate::services::ServiceFactory;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Store `value` (already serialized) under `key`.
    Persist { key: &'static str, value: String },
    Remove { key: &'static str },
    Notify(Notice),
    /// Save the key in the credential store and apply it to the shared client.
    StoreApiKey(String),
    ClearApiKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub effects: Vec<Effect>,
}

impl<S> Transition<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    pub fn with_effects(state: S, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Chains another transition, keeping effects in order.
    pub fn and_then(self, next: impl FnOnce(S) -> Transition<S>) -> Transition<S> {
        let mut effects = self.effects;
        let next = next(self.state);
        effects.extend(next.effects);
        Transition {
            state: next.state,
            effects,
        }
    }
}

#[derive(Debug)]
pub enum EffectError {
    Storage(StorageError),
    Credentials(KeyringAccessError),
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectError::Storage(err) => write!(f, "{err}"),
            EffectError::Credentials(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for EffectError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            EffectError::Storage(err) => Some(err),
            EffectError::Credentials(err) => Some(err),
        }
    }
}

impl From<StorageError> for EffectError {
    fn from(err: StorageError) -> Self {
        EffectError::Storage(err)
    }
}

impl From<KeyringAccessError> for EffectError {
    fn from(err: KeyringAccessError) -> Self {
        EffectError::Credentials(err)
    }
}

/// Executes effects against storage, the credential store and the services.
pub struct EffectDriver {
    store: Arc<dyn KeyValueStore>,
    credentials: Arc<dyn CredentialStore>,
    factory: Option<Arc<ServiceFactory>>,
    notices: Vec<Notice>,
}

impl EffectDriver {
    pub fn new(store: Arc<dyn KeyValueStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            credentials,
            factory: None,
            notices: Vec::new(),
        }
    }

    /// API key effects also rotate the key on this factory's client.
    pub fn with_factory(self, factory: Arc<ServiceFactory>) -> Self {
        Self {
            factory: Some(factory),
            ..self
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    /// Runs every effect in order and returns the new state.
    ///
    /// Stops at the first failing effect; notices queued before it are kept.
    pub fn apply<S>(&mut self, transition: Transition<S>) -> Result<S, EffectError> {
        self.run(transition.effects)?;
        Ok(transition.state)
    }

    pub fn run(&mut self, effects: Vec<Effect>) -> Result<(), EffectError> {
        for effect in effects {
            self.execute(effect)?;
        }
        Ok(())
    }

    fn execute(&mut self, effect: Effect) -> Result<(), EffectError> {
        match effect {
            Effect::Persist { key, value } => {
                debug!(key, bytes = value.len(), "Persisting state");
                self.store.set(key, &value)?;
            }
            Effect::Remove { key } => {
                debug!(key, "Removing persisted state");
                self.store.remove(key)?;
            }
            Effect::Notify(notice) => {
                match notice.level {
                    NoticeLevel::Error => error!(title = %notice.title, "{}", notice.description),
                    NoticeLevel::Warning => warn!(title = %notice.title, "{}", notice.description),
                    NoticeLevel::Success | NoticeLevel::Info => {
                        info!(title = %notice.title, "{}", notice.description)
                    }
                }
                self.notices.push(notice);
            }
            Effect::StoreApiKey(api_key) => {
                self.credentials.set_api_key(&api_key)?;
                if let Some(factory) = &self.factory {
                    factory.set_api_key(&api_key);
                }
            }
            Effect::ClearApiKey => {
                self.credentials.clear_api_key()?;
                if let Some(factory) = &self.factory {
                    factory.clear_api_key();
                }
            }
        }
        Ok(())
    }

    /// Notices collected since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

//! Per-connection protocol session.
//!
//! A session starts uninitialized and becomes initialized through a
//! successful `initialize` request. It never reverts. stdio owns one session
//! per connection; the HTTP transport shares a single session across every
//! request it serves.

use std::sync::{PoisonError, RwLock};

use crate::protocol::{ClientCapabilities, Implementation, ServerCapabilities};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
}

/// What the client told us during `initialize`
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub protocol_version: String,
    pub client_info: Implementation,
    pub client_capabilities: ClientCapabilities,
}

/// Dispatcher state for one logical connection
pub struct ServerSession {
    capabilities: ServerCapabilities,
    server_info: Implementation,
    negotiated: RwLock<Option<Negotiated>>,
}

impl ServerSession {
    pub fn new(capabilities: ServerCapabilities, server_info: Implementation) -> Self {
        Self {
            capabilities,
            server_info,
            negotiated: RwLock::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        let negotiated = self.negotiated.read().unwrap_or_else(PoisonError::into_inner);
        if negotiated.is_some() {
            SessionState::Initialized
        } else {
            SessionState::Uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == SessionState::Initialized
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    /// The negotiated client state, once initialized
    pub fn negotiated(&self) -> Option<Negotiated> {
        self.negotiated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a successful negotiation. Returns the previous negotiation when
    /// the session was already initialized.
    pub fn initialize(&self, negotiated: Negotiated) -> Option<Negotiated> {
        self.negotiated
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(negotiated)
    }

    /// Record a negotiation only if none exists yet. Returns false, leaving
    /// the session untouched, when it was already initialized.
    pub fn initialize_once(&self, negotiated: Negotiated) -> bool {
        let mut slot = self.negotiated.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(negotiated);
        true
    }
}

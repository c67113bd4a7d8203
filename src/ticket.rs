//! TLS session ticket store.
//!
//! The QUIC engine hands issued tickets to [`SessionTicketStore::add`] and
//! looks them up on resumption with [`SessionTicketStore::pop`]. A ticket is
//! single-use: popping removes it.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// An issued session ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTicket {
    /// Opaque ticket label, used as the lookup key.
    pub ticket: Bytes,
    /// SNI the ticket was issued for.
    pub server_name: Option<String>,
    /// Resumption state, opaque to the store.
    pub payload: Bytes,
}

/// A thread-safe in-memory ticket store, shared by clone.
#[derive(Debug, Clone, Default)]
pub struct SessionTicketStore {
    inner: Arc<DashMap<Bytes, SessionTicket>>,
}

impl SessionTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a ticket, replacing any with the same label.
    pub fn add(&self, ticket: SessionTicket) {
        tracing::trace!(len = ticket.ticket.len(), "Session ticket stored");
        self.inner.insert(ticket.ticket.clone(), ticket);
    }

    /// Remove and return the ticket with this label.
    pub fn pop(&self, label: &[u8]) -> Option<SessionTicket> {
        self.inner.remove(label).map(|(_, ticket)| ticket)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

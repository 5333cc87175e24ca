//! Tracking of simulator WebSocket clients.
//!
//! - `ClientRegistry`: every push client currently attached
//! - `ClientGuard`: RAII registration, removed on drop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Metadata about an attached client.
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo {
    pub peer: SocketAddr,
    pub connected_at: Instant,
}

/// Registry of attached push clients.
///
/// Each client gets a child of the registry's root token, so
/// [`disconnect_all`](Self::disconnect_all) drops every socket at once.
pub struct ClientRegistry {
    clients: DashMap<u64, ClientInfo>,
    next_id: AtomicU64,
    /// Replaced after every `disconnect_all()` so new clients can attach.
    root_cancel: RwLock<CancellationToken>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
            root_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a client; the guard unregisters it when dropped.
    pub fn register(self: &Arc<Self>, peer: SocketAddr) -> ClientGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = self.root_cancel.read().child_token();
        self.clients.insert(
            id,
            ClientInfo {
                peer,
                connected_at: Instant::now(),
            },
        );
        log::info!(
            "[WS] Client {} attached from {} (total: {})",
            id,
            peer,
            self.clients.len()
        );

        ClientGuard {
            id,
            registry: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: u64) {
        if let Some((_, info)) = self.clients.remove(&id) {
            log::info!(
                "[WS] Client {} detached after {:?} (remaining: {})",
                id,
                info.connected_at.elapsed(),
                self.clients.len()
            );
        }
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Returns the attached clients' metadata.
    #[must_use]
    pub fn clients(&self) -> Vec<ClientInfo> {
        self.clients.iter().map(|entry| *entry.value()).collect()
    }

    /// Force-closes every attached client.
    ///
    /// Returns the number of clients signaled.
    pub fn disconnect_all(&self) -> usize {
        let count = self.clients.len();
        let mut root = self.root_cancel.write();
        root.cancel();
        *root = CancellationToken::new();
        log::info!("[WS] Force-closing {} client(s)", count);
        count
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters its client when dropped.
pub struct ClientGuard {
    id: u64,
    registry: Arc<ClientRegistry>,
    cancel_token: CancellationToken,
}

impl ClientGuard {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancelled when the registry force-closes this client.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

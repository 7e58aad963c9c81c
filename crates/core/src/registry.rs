//! Set of downstream browser-client connections.
//!
//! Each entry owns the sending half of an unbounded channel; the connection's
//! own task drains the other half into the socket. [`IndexMap`] storage keeps
//! registration order for broadcasts.
//!
//! Every mutation goes through one [`Mutex`], so accept, disconnect, and
//! broadcast can run on any runtime worker.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Unique identity of one accepted connection.
pub type ConnectionId = u64;

/// Line queued for delivery to a single connection.
pub type Outbound = Arc<str>;

type Entries = Arc<Mutex<IndexMap<ConnectionId, Downstream>>>;

#[derive(Debug)]
struct Downstream {
	peer: SocketAddr,
	tx: mpsc::UnboundedSender<Outbound>,
}

/// Registry of connections believed to be open.
///
/// Membership is not a delivery guarantee: a peer that vanished without a FIN
/// stays registered until its next write or read fails.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	entries: Entries,
	next_id: Arc<AtomicU64>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a freshly accepted connection.
	///
	/// Returns the handle that unregisters on drop and the receiver the
	/// connection task must drain.
	pub fn add(&self, peer: SocketAddr) -> (Registration, mpsc::UnboundedReceiver<Outbound>) {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
		let (tx, rx) = mpsc::unbounded_channel();
		self.entries.lock().insert(id, Downstream { peer, tx });

		let registration = Registration {
			id,
			peer,
			entries: Arc::downgrade(&self.entries),
		};
		(registration, rx)
	}

	/// Removes a connection by id. Returns false if it was already gone.
	pub fn remove(&self, id: ConnectionId) -> bool {
		self.entries.lock().shift_remove(&id).is_some()
	}

	/// Queues `payload` for every registered connection in registration order.
	///
	/// A connection whose task has already exited is dropped from the registry
	/// instead of failing the broadcast. Returns the number of connections the
	/// payload was queued to.
	pub fn broadcast(&self, payload: &str) -> usize {
		let line: Outbound = Arc::from(payload);
		let mut delivered = 0;

		self.entries.lock().retain(|id, conn| match conn.tx.send(Arc::clone(&line)) {
			Ok(()) => {
				delivered += 1;
				true
			}
			Err(_) => {
				debug!(target = "relay.registry", conn = id, peer = %conn.peer, "dropping closed connection");
				false
			}
		});

		delivered
	}

	pub fn count(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn contains(&self, id: ConnectionId) -> bool {
		self.entries.lock().contains_key(&id)
	}
}

/// RAII handle that unregisters a connection on drop.
///
/// Holds a weak reference, so dropping it after the registry is gone is a
/// no-op. Disconnect and error paths can both end the connection task; the
/// handle is dropped once, so removal happens once.
#[derive(Debug)]
pub struct Registration {
	id: ConnectionId,
	peer: SocketAddr,
	entries: Weak<Mutex<IndexMap<ConnectionId, Downstream>>>,
}

impl Registration {
	pub fn id(&self) -> ConnectionId {
		self.id
	}

	pub fn peer(&self) -> SocketAddr {
		self.peer
	}
}

impl Drop for Registration {
	fn drop(&mut self) {
		if let Some(entries) = self.entries.upgrade() {
			entries.lock().shift_remove(&self.id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn peer(port: u16) -> SocketAddr {
		SocketAddr::from(([127, 0, 0, 1], port))
	}

	#[test]
	fn ids_are_distinct() {
		let registry = Registry::new();
		let (a, _rx_a) = registry.add(peer(1));
		let (b, _rx_b) = registry.add(peer(2));
		assert_ne!(a.id(), b.id());
		assert_eq!(registry.count(), 2);
	}

	#[test]
	fn broadcast_reaches_every_connection_in_order() {
		let registry = Registry::new();
		let (_a, mut rx_a) = registry.add(peer(1));
		let (_b, mut rx_b) = registry.add(peer(2));
		let (_c, mut rx_c) = registry.add(peer(3));

		assert_eq!(registry.broadcast("https://example.com/test"), 3);
		for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
			assert_eq!(rx.try_recv().unwrap().as_ref(), "https://example.com/test");
			assert!(rx.try_recv().is_err());
		}
	}

	#[test]
	fn broadcast_with_no_connections() {
		let registry = Registry::new();
		assert_eq!(registry.broadcast("https://example.com"), 0);
	}

	#[test]
	fn closed_receiver_is_pruned_without_affecting_others() {
		let registry = Registry::new();
		let (_a, rx_a) = registry.add(peer(1));
		let (_b, mut rx_b) = registry.add(peer(2));
		drop(rx_a);

		assert_eq!(registry.broadcast("https://example.com"), 1);
		assert_eq!(registry.count(), 1);
		assert_eq!(rx_b.try_recv().unwrap().as_ref(), "https://example.com");
	}

	#[test]
	fn remove_is_idempotent() {
		let registry = Registry::new();
		let (a, _rx) = registry.add(peer(1));
		let id = a.id();

		assert!(registry.remove(id));
		assert!(!registry.remove(id));
		drop(a);
		assert_eq!(registry.count(), 0);
	}

	#[test]
	fn dropping_registration_unregisters() {
		let registry = Registry::new();
		let (a, _rx_a) = registry.add(peer(1));
		let (b, _rx_b) = registry.add(peer(2));
		let id = a.id();

		drop(a);
		assert!(!registry.contains(id));
		assert!(registry.contains(b.id()));
		assert_eq!(registry.count(), 1);
	}

	#[test]
	fn registration_outliving_registry_is_harmless() {
		let registry = Registry::new();
		let (a, _rx) = registry.add(peer(1));
		drop(registry);
		drop(a);
	}
}

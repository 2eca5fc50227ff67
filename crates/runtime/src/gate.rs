//! Admission gate bounding the number of requests in flight per client.
//!
//! Slots are leased as [`AdmissionSlot`] guards and returned to the gate when the
//! guard is dropped, so every exit path of a call (early `?` return, cancellation
//! by future drop, panic unwinding) gives its slot back.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Counting gate shared by all callers of one client instance.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
	semaphore: Arc<Semaphore>,
	capacity: usize,
}

impl AdmissionGate {
	/// Creates a gate with `capacity` slots. A zero capacity would deadlock every
	/// caller and is raised to one.
	pub fn new(capacity: usize) -> Self {
		let capacity = if capacity == 0 {
			warn!(target = "stor.gate", "admission capacity of 0 requested; using 1");
			1
		} else {
			capacity
		};

		Self {
			semaphore: Arc::new(Semaphore::new(capacity)),
			capacity,
		}
	}

	/// Waits until a slot is free. There is no timeout; wrap the call in
	/// `tokio::time::timeout` to bound the wait.
	pub async fn acquire(&self) -> Result<AdmissionSlot> {
		if self.semaphore.available_permits() == 0 {
			debug!(target = "stor.gate", capacity = self.capacity, "all admission slots busy; waiting");
		}

		let permit = Arc::clone(&self.semaphore).acquire_owned().await.map_err(|_| Error::GateClosed)?;
		Ok(AdmissionSlot { _permit: permit })
	}

	/// Instantaneous number of free slots.
	pub fn available(&self) -> usize {
		self.semaphore.available_permits()
	}

	/// Configured maximum concurrency.
	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

/// A leased slot. Dropping it returns the slot to the gate.
#[derive(Debug)]
pub struct AdmissionSlot {
	_permit: OwnedSemaphorePermit,
}

impl AdmissionSlot {
	/// Returns the slot immediately. Equivalent to dropping.
	pub fn release(self) {}
}

//! Bounded hand-off between the scanner and the classifier.
//!
//! A path stays in the in-flight set from the moment it is enqueued until
//! the classifier drops its [`InFlight`] guard, so repeated scan passes
//! cannot queue the same pending path twice.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue closed")]
    Closed,
    #[error("dispatch capacity must be at least 1")]
    ZeroCapacity,
}

#[derive(Debug, Default)]
struct InFlightSet(Mutex<HashSet<PathBuf>>);

impl InFlightSet {
    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn channel(capacity: usize) -> Result<(Dispatcher, DispatchReceiver), DispatchError> {
    if capacity == 0 {
        return Err(DispatchError::ZeroCapacity);
    }
    let (tx, rx) = mpsc::channel(capacity);
    let in_flight = Arc::new(InFlightSet::default());
    Ok((
        Dispatcher {
            tx,
            in_flight: in_flight.clone(),
        },
        DispatchReceiver { rx, in_flight },
    ))
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<PathBuf>,
    in_flight: Arc<InFlightSet>,
}

impl Dispatcher {
    /// Queues `path` unless it is already in flight. Waits while the queue
    /// is full.
    ///
    /// Returns `Ok(false)` when the path was already pending.
    pub async fn enqueue(&self, path: PathBuf) -> Result<bool, DispatchError> {
        if !self.in_flight.lock().insert(path.clone()) {
            return Ok(false);
        }
        let reservation = Reservation {
            in_flight: &self.in_flight,
            path: Some(path.clone()),
        };
        self.tx
            .send(path)
            .await
            .map_err(|_| DispatchError::Closed)?;
        reservation.commit();
        Ok(true)
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.in_flight.lock().contains(path)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Releases a reserved path unless the send completed. Covers both a
/// closed queue and an enqueue future dropped while waiting for room.
struct Reservation<'a> {
    in_flight: &'a InFlightSet,
    path: Option<PathBuf>,
}

impl Reservation<'_> {
    fn commit(mut self) {
        self.path = None;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            self.in_flight.lock().remove(&path);
        }
    }
}

#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<PathBuf>,
    in_flight: Arc<InFlightSet>,
}

impl DispatchReceiver {
    /// Waits for the next path. `None` once every dispatcher is dropped and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<InFlight> {
        let path = self.rx.recv().await?;
        Some(InFlight {
            path,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// A dequeued path. Dropping it makes the path eligible for dispatch again.
#[derive(Debug)]
pub struct InFlight {
    path: PathBuf,
    in_flight: Arc<InFlightSet>,
}

impl InFlight {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.path);
    }
}

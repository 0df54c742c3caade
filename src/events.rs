//! Structured events emitted while building an offset index
//!
//! Index construction reports noteworthy situations, most importantly falling back
//! from an embedded SFF index to a full scan, through an [`IndexObserver`] supplied
//! by the caller instead of global warnings. [`LogObserver`] forwards events to the
//! `log` facade and is used when no observer is configured.

use std::path::PathBuf;

/// Something that happened while building or reopening an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// The SFF file has no embedded index, every record will be scanned
    MissingSffIndex,
    /// The embedded SFF index could not be used, every record will be scanned
    SffIndexRejected { reason: String },
    /// A fresh index was built over the given number of records
    IndexBuilt { records: usize },
    /// An existing persistent index was reused without scanning
    StoreReused { path: PathBuf },
}

/// Receives [`IndexEvent`]s during index construction
pub trait IndexObserver {
    fn on_event(&mut self, event: &IndexEvent);
}

impl<F: FnMut(&IndexEvent)> IndexObserver for F {
    fn on_event(&mut self, event: &IndexEvent) {
        self(event);
    }
}

/// Default observer that reports events through the `log` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl IndexObserver for LogObserver {
    fn on_event(&mut self, event: &IndexEvent) {
        match event {
            IndexEvent::MissingSffIndex => {
                log::warn!("No SFF index, doing it the slow way");
            }
            IndexEvent::SffIndexRejected { reason } => {
                log::warn!("Could not parse the SFF index: {reason}");
            }
            IndexEvent::IndexBuilt { records } => {
                log::debug!("Indexed {records} records");
            }
            IndexEvent::StoreReused { path } => {
                log::debug!("Reusing offset index {}", path.display());
            }
        }
    }
}

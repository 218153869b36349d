//! Test doubles shared by the unit tests in this crate.

use crate::{Dispatcher, WatcherId};

/// A dispatcher that records registrations and can be told to reject
/// specific identities.
pub(crate) struct RecordingDispatcher {
    registered: Vec<WatcherId>,
    rejected: Vec<WatcherId>,
}

impl RecordingDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            registered: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// A dispatcher that refuses to register any of the given identities.
    pub(crate) fn rejecting(ids: &[WatcherId]) -> Self {
        Self {
            registered: Vec::new(),
            rejected: ids.to_vec(),
        }
    }

    pub(crate) fn is_registered(&self, id: WatcherId) -> bool {
        self.registered.contains(&id)
    }

    pub(crate) fn registered_len(&self) -> usize {
        self.registered.len()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn register(&mut self, id: WatcherId) -> bool {
        if self.rejected.contains(&id) {
            return false;
        }

        self.registered.push(id);
        true
    }

    fn unregister(&mut self, id: WatcherId) -> bool {
        match self.registered.iter().position(|candidate| *candidate == id) {
            Some(position) => {
                _ = self.registered.remove(position);
                true
            }
            None => false,
        }
    }
}

// Which hardware ids already have a controller bound to them

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct DeviceClaims {
    ids: Mutex<HashSet<u8>>,
}

impl DeviceClaims {
    /// Returns false if `id` is already owned
    pub(crate) fn claim(&self, id: u8) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id)
    }

    pub(crate) fn release(&self, id: u8) {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id);
    }
}

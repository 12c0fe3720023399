use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use skylift_common::db::Id;
use tokio::time::sleep;

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Per-gateway-id critical sections without a map of mutexes: ids currently
/// being processed live in one set, contenders spin with a sleep. The set
/// mutex is never held across a suspension point.
#[derive(Debug, Default)]
pub struct ProcessingIds {
    ids: Arc<Mutex<HashSet<Id>>>,
}

impl ProcessingIds {
    /// Wait until `id` is free, then claim it. The returned guard releases
    /// the id on drop, so every exit path gives it back.
    pub async fn lock(&self, id: Id) -> ProcessingGuard {
        loop {
            {
                let mut ids = self.ids.lock().expect("Failed to lock processing ids");
                if ids.insert(id) {
                    return ProcessingGuard {
                        ids: Arc::clone(&self.ids),
                        id,
                    };
                }
            }
            sleep(LOCK_RETRY_DELAY).await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids
            .lock()
            .expect("Failed to lock processing ids")
            .is_empty()
    }
}

pub struct ProcessingGuard {
    ids: Arc<Mutex<HashSet<Id>>>,
    id: Id,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .expect("Failed to lock processing ids")
            .remove(&self.id);
    }
}

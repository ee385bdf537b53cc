//! Post-operation hooks
//!
//! Each schema keeps a list of synchronous callbacks keyed by
//! [`HookEvent`]. Persistence operations invoke them after the driver call
//! succeeds, with the instance as it stands after the operation.
//!
//! Callbacks run outside the registry lock, so a hook may register or remove
//! hooks itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Operation a hook listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookEvent {
    /// After a successful `insert`
    Inserted,
    /// After an `update` that matched a document
    Updated,
    /// After a successful `delete`
    Deleted,
}

/// Handle for removing a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Callback invoked with the affected instance
pub type Hook = Arc<dyn Fn(&Frame) + Send + Sync>;

#[derive(Default)]
pub(crate) struct HookRegistry {
    next_id: AtomicU64,
    hooks: RwLock<Vec<(HookId, HookEvent, Hook)>>,
}

impl HookRegistry {
    pub(crate) fn register(&self, event: HookEvent, hook: Hook) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.write().push((id, event, hook));
        id
    }

    pub(crate) fn remove(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|(hook_id, _, _)| *hook_id != id);
        hooks.len() != before
    }

    pub(crate) fn emit(&self, event: HookEvent, frame: &Frame) {
        let matching: Vec<Hook> = self
            .hooks
            .read()
            .iter()
            .filter(|(_, e, _)| *e == event)
            .map(|(_, _, hook)| Arc::clone(hook))
            .collect();
        for hook in matching {
            hook(frame);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.read().len()
    }
}

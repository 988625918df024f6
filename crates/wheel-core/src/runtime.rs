//! Work deferred to the next frame boundary.

use std::collections::VecDeque;
use std::fmt;

use crate::collections::map::HashMap;
use crate::handle::ScrollHandle;

type Notification = Box<dyn FnOnce() + 'static>;

struct DeferredDisposal {
    handles: Vec<ScrollHandle>,
    frames_waited: u32,
}

/// Disposals waiting for their handles to detach, keyed by slot, and
/// notifications waiting for the current mutation to finish.
#[derive(Default)]
pub struct FrameQueue {
    disposals: HashMap<usize, DeferredDisposal>,
    notifications: VecDeque<Notification>,
}

impl fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("pending_disposals", &self.pending_disposals())
            .field("notifications", &self.notifications.len())
            .finish()
    }
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `handle` for disposal once it detaches. A request for a slot
    /// that already has one pending supersedes it: the earlier handles move
    /// into the new entry and the wait starts over.
    pub fn defer_disposal(&mut self, slot: usize, handle: ScrollHandle) {
        let mut handles = match self.disposals.remove(&slot) {
            Some(previous) => {
                log::debug!(
                    "slot {slot}: rescheduling deferred disposal after {} frames",
                    previous.frames_waited
                );
                previous.handles
            }
            None => Vec::new(),
        };
        if !handles.iter().any(|pending| pending.ptr_eq(&handle)) {
            handles.push(handle);
        }
        self.disposals.insert(
            slot,
            DeferredDisposal {
                handles,
                frames_waited: 0,
            },
        );
    }

    pub fn enqueue_notification(&mut self, task: impl FnOnce() + 'static) {
        self.notifications.push_back(Box::new(task));
    }

    pub fn pending_disposals(&self) -> usize {
        self.disposals.values().map(|entry| entry.handles.len()).sum()
    }

    pub fn has_pending(&self) -> bool {
        !self.disposals.is_empty() || !self.notifications.is_empty()
    }

    /// Removes every deferred handle that has detached since it was queued.
    pub(crate) fn take_ready_disposals(&mut self) -> Vec<ScrollHandle> {
        let mut ready = Vec::new();
        self.disposals.retain(|_, entry| {
            let (detached, attached): (Vec<_>, Vec<_>) = entry
                .handles
                .drain(..)
                .partition(|handle| !handle.is_attached());
            ready.extend(detached);
            entry.handles = attached;
            entry.frames_waited += 1;
            !entry.handles.is_empty()
        });
        ready
    }

    pub(crate) fn take_all_disposals(&mut self) -> Vec<ScrollHandle> {
        self.disposals
            .drain()
            .flat_map(|(_, entry)| entry.handles)
            .collect()
    }

    pub(crate) fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// Drops queued notifications, keeping deferred disposals.
    pub(crate) fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    pub(crate) fn clear(&mut self) {
        self.disposals.clear();
        self.notifications.clear();
    }
}

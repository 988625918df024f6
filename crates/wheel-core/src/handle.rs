//! Scroll-position handles and the bounded pool that recycles them.
//!
//! A [`ScrollHandle`] is shared between the manager, which owns its lifecycle,
//! and at most one attached view, which moves it while the user scrolls. The
//! pool follows a two-phase lookup: a detached handle last owned by the same
//! slot with the same initial position wins; otherwise any detached handle at
//! that initial position is taken.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::config::SlotKey;

pub const DEFAULT_POOL_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

struct HandleInner {
    id: HandleId,
    owner: Cell<SlotKey>,
    initial_index: Cell<usize>,
    position: Cell<usize>,
    animation_target: Cell<Option<usize>>,
    attached: Cell<bool>,
    disposed: Cell<bool>,
}

#[derive(Clone)]
pub struct ScrollHandle {
    inner: Rc<HandleInner>,
}

impl ScrollHandle {
    pub(crate) fn new(id: HandleId, owner: SlotKey, initial_index: usize) -> Self {
        Self {
            inner: Rc::new(HandleInner {
                id,
                owner: Cell::new(owner),
                initial_index: Cell::new(initial_index),
                position: Cell::new(initial_index),
                animation_target: Cell::new(None),
                attached: Cell::new(false),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    pub fn owner(&self) -> SlotKey {
        self.inner.owner.get()
    }

    /// Position the handle was (re)created at.
    pub fn initial_index(&self) -> usize {
        self.inner.initial_index.get()
    }

    pub fn position(&self) -> usize {
        self.inner.position.get()
    }

    pub fn animation_target(&self) -> Option<usize> {
        self.inner.animation_target.get()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Safe to hand to another view.
    pub fn is_reusable(&self) -> bool {
        !self.is_attached() && !self.is_disposed()
    }

    pub fn ptr_eq(&self, other: &ScrollHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Binds the handle to a view. Fails if it is already bound or disposed.
    pub fn attach(&self) -> bool {
        if self.is_disposed() {
            log::warn!("attach on disposed handle {:?}", self.id());
            return false;
        }
        if self.inner.attached.replace(true) {
            log::warn!("handle {:?} already attached to a view", self.id());
            return false;
        }
        true
    }

    pub fn detach(&self) {
        self.inner.attached.set(false);
    }

    pub fn jump_to(&self, index: usize) {
        if self.is_disposed() {
            return;
        }
        self.inner.animation_target.set(None);
        self.inner.position.set(index);
    }

    /// Starts moving towards `index`; the move completes on the next
    /// [`ScrollHandle::settle`].
    pub fn animate_to(&self, index: usize) {
        if self.is_disposed() {
            return;
        }
        self.inner.animation_target.set(Some(index));
    }

    /// Completes a pending animation. Returns whether one was pending.
    pub fn settle(&self) -> bool {
        match self.inner.animation_target.take() {
            Some(target) => {
                self.inner.position.set(target);
                true
            }
            None => false,
        }
    }

    pub(crate) fn reset(&self, owner: SlotKey, initial_index: usize) {
        self.inner.owner.set(owner);
        self.inner.initial_index.set(initial_index);
        self.inner.position.set(initial_index);
        self.inner.animation_target.set(None);
    }

    pub(crate) fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        if self.is_attached() {
            log::warn!("disposing handle {:?} while attached", self.id());
        }
        self.inner.animation_target.set(None);
    }
}

impl fmt::Debug for ScrollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollHandle")
            .field("id", &self.id())
            .field("initial_index", &self.initial_index())
            .field("position", &self.position())
            .field("attached", &self.is_attached())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    pub allocated: usize,
    pub reused: usize,
    pub pooled: usize,
    pub disposed: usize,
    pub deferred: usize,
}

/// Bounded store of detached handles awaiting reuse.
pub struct HandlePool {
    handles: Vec<ScrollHandle>,
    capacity: usize,
}

impl fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePool")
            .field("len", &self.handles.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for HandlePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl HandlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            handles: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes and returns a reusable handle recorded at `initial_index`.
    pub fn take_matching(&mut self, owner: SlotKey, initial_index: usize) -> Option<ScrollHandle> {
        self.handles.retain(|handle| !handle.is_disposed());
        let exact = self.handles.iter().position(|handle| {
            handle.is_reusable()
                && handle.owner() == owner
                && handle.initial_index() == initial_index
        });
        let position = exact.or_else(|| {
            self.handles
                .iter()
                .position(|handle| handle.is_reusable() && handle.initial_index() == initial_index)
        })?;
        Some(self.handles.remove(position))
    }

    pub fn contains(&self, handle: &ScrollHandle) -> bool {
        self.handles.iter().any(|pooled| pooled.ptr_eq(handle))
    }

    /// Offers an evicted handle. Returns `false` if it was not kept, in which
    /// case the caller must dispose it. A handle already in the pool counts as
    /// kept.
    pub fn offer(&mut self, handle: ScrollHandle) -> bool {
        if self.contains(&handle) {
            return true;
        }
        if !handle.is_reusable() || self.handles.len() >= self.capacity {
            return false;
        }
        self.handles.push(handle);
        true
    }

    /// Shrinks the pool to half its capacity, dropping the oldest entries.
    /// Returns the evicted handles for disposal.
    pub fn trim(&mut self) -> Vec<ScrollHandle> {
        let keep = self.capacity / 2;
        if self.handles.len() <= keep {
            return Vec::new();
        }
        let excess = self.handles.len() - keep;
        self.handles.drain(..excess).collect()
    }

    pub fn drain(&mut self) -> Vec<ScrollHandle> {
        self.handles.drain(..).collect()
    }
}

//! Standard scheduler for the wheel manager.
//!
//! [`StdScheduler`] records frame requests from a [`wheel_core::WheelManager`]
//! so the host loop can poll them, and optionally wakes the host through a
//! registered callback.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use wheel_core::{ManagerOptions, WheelManager, WheelScheduler};

/// Scheduler that delegates work to Rust's threading primitives.
pub struct StdScheduler {
    frame_requested: AtomicBool,
    requests: AtomicU64,
    frame_waker: RwLock<Option<Arc<dyn Fn() + Send + Sync + 'static>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            frame_requested: AtomicBool::new(false),
            requests: AtomicU64::new(0),
            frame_waker: RwLock::new(None),
        }
    }

    /// Returns whether a frame has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.swap(false, Ordering::SeqCst)
    }

    /// Total number of frame requests received.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Registers a waker that will be invoked whenever a new frame is scheduled.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        match self.frame_waker.write() {
            Ok(mut slot) => *slot = Some(Arc::new(waker)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(waker)),
        }
    }

    /// Clears any registered frame waker.
    pub fn clear_frame_waker(&self) {
        match self.frame_waker.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn wake(&self) {
        let waker = match self.frame_waker.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "frame_requested",
                &self.frame_requested.load(Ordering::SeqCst),
            )
            .field("requests", &self.request_count())
            .finish()
    }
}

impl WheelScheduler for StdScheduler {
    fn schedule_frame(&self) {
        self.frame_requested.store(true, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.wake();
    }
}

/// A [`WheelManager`] paired with the scheduler it reports to.
pub struct StdWheelRuntime {
    scheduler: Arc<StdScheduler>,
    manager: WheelManager,
}

impl StdWheelRuntime {
    pub fn new(options: ManagerOptions) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let manager = WheelManager::with_scheduler(options, scheduler.clone());
        Self { scheduler, manager }
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn manager(&self) -> &WheelManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut WheelManager {
        &mut self.manager
    }

    /// Runs a frame if one was requested. Returns whether it did.
    pub fn pump_frame(&mut self) -> bool {
        if !self.scheduler.take_frame_request() {
            return false;
        }
        self.manager.on_frame();
        true
    }
}

impl Default for StdWheelRuntime {
    fn default() -> Self {
        Self::new(ManagerOptions::default())
    }
}

impl fmt::Debug for StdWheelRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdWheelRuntime")
            .field("scheduler", &self.scheduler)
            .field("manager", &self.manager)
            .finish()
    }
}

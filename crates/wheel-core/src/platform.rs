//! Host integration for the wheel manager.
//!
//! The manager never runs work on its own schedule. Whenever it queues
//! something for the next frame (a deferred handle disposal, a deferred
//! `on_change` notification, a pending animation) it asks the host for a frame
//! through [`WheelScheduler`], and the host answers by calling
//! [`crate::WheelManager::on_frame`] at its next frame boundary.

/// Schedules frames on behalf of the wheel manager.
pub trait WheelScheduler: Send + Sync {
    /// Request that the host schedule a new frame.
    fn schedule_frame(&self);
}

/// Scheduler for hosts that drive frames unconditionally.
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl WheelScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

use thiserror::Error;

/// Structural problems detected while validating slots or registering
/// dependencies. These are raised at setup time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("item count must be positive")]
    InvalidItemCount,
    #[error("initial index {index} out of range for {item_count} items")]
    InvalidInitialIndex { index: usize, item_count: usize },
    #[error("width must be finite and positive, got {0}")]
    InvalidWidth(f32),
    #[error("dependency must name at least one slot")]
    EmptyDependencies,
    #[error("slot {0} listed more than once in dependency")]
    DuplicateDependency(usize),
    #[error("dependency on slot {index} but only {total} slots exist")]
    DependencyOutOfRange { index: usize, total: usize },
    #[error("slot {0} cannot depend on itself")]
    SelfDependency(usize),
    #[error("dependency of slot {slot} on slot {via} would create cycle")]
    CycleDetected { slot: usize, via: usize },
}

/// Failure reported by a dependency strategy. The engine never propagates it;
/// the affected slot simply keeps its current configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency computation failed: {0}")]
pub struct ComputeError(pub String);

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Misuse of a batch operation on [`crate::WheelManager`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WheelError {
    #[error("got {indices} indices but {configs} configurations")]
    LengthMismatch { indices: usize, configs: usize },
}

#![doc = r"Dependency resolution and selective recreation for linked wheel pickers."]

pub mod collections;
pub mod config;
pub mod decision;
pub mod dependency;
pub mod error;
pub mod graph;
pub mod handle;
pub mod hash;
pub mod manager;
pub mod platform;
pub mod runtime;

pub use config::{ChangeCallback, Formatter, SlotConfig, SlotKey, DEFAULT_WIDTH};
pub use decision::{
    decisions_for_all, decisions_for_change, should_recreate, validate_decision, DecisionReason,
    RecreationDecision,
};
pub use dependency::{
    clamp_selection, is_leap_year, DaysInMonth, DependencySpec, DependencyStrategy, FnStrategy,
};
pub use error::{ComputeError, ConfigError, WheelError};
pub use graph::DependencyGraph;
pub use handle::{HandleId, HandlePool, HandleStats, ScrollHandle, DEFAULT_POOL_CAPACITY};
pub use manager::{ChangeEvent, ListenerId, ManagerOptions, SlotState, WheelManager};
pub use platform::{DefaultScheduler, WheelScheduler};
pub use runtime::FrameQueue;

//! Per-slot recreation decisions.
//!
//! Decisions are recomputed from scratch every time; nothing here holds state.
//! Only a change in item count makes a dependent slot recreate. A failed
//! computation is reported as a decision, never as an error.

use std::fmt;

use crate::config::SlotConfig;
use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    NoDependency,
    CalculationFailed,
    Unchanged,
    ItemCountChanged { from: usize, to: usize },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::NoDependency => f.write_str("no dependency"),
            DecisionReason::CalculationFailed => f.write_str("calculation failed"),
            DecisionReason::Unchanged => f.write_str("unchanged"),
            DecisionReason::ItemCountChanged { from, to } => {
                write!(f, "item count changed: {from} -> {to}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecreationDecision {
    pub slot_index: usize,
    pub needs_recreation: bool,
    /// Replacement computed from the dependency. Present for
    /// `ItemCountChanged` and `Unchanged`; in the latter case only its
    /// presentation fields are meant to be applied.
    pub new_config: Option<SlotConfig>,
    pub reason: DecisionReason,
}

impl RecreationDecision {
    fn keep(slot_index: usize, reason: DecisionReason) -> Self {
        Self {
            slot_index,
            needs_recreation: false,
            new_config: None,
            reason,
        }
    }
}

pub fn should_recreate(
    slot_index: usize,
    current: &SlotConfig,
    selections: &[usize],
    graph: &DependencyGraph,
) -> RecreationDecision {
    if !graph.has_dependency(slot_index) {
        return RecreationDecision::keep(slot_index, DecisionReason::NoDependency);
    }
    let Some(replacement) = graph.compute_replacement_config(slot_index, current, selections)
    else {
        return RecreationDecision::keep(slot_index, DecisionReason::CalculationFailed);
    };
    if replacement.item_count == current.item_count {
        return RecreationDecision {
            slot_index,
            needs_recreation: false,
            new_config: Some(replacement),
            reason: DecisionReason::Unchanged,
        };
    }
    let reason = DecisionReason::ItemCountChanged {
        from: current.item_count,
        to: replacement.item_count,
    };
    RecreationDecision {
        slot_index,
        needs_recreation: true,
        new_config: Some(replacement),
        reason,
    }
}

/// Rejects decisions aimed outside `[0, slot_count)` and recreations without
/// a usable replacement.
pub fn validate_decision(decision: &RecreationDecision, slot_count: usize) -> bool {
    if decision.slot_index >= slot_count {
        log::warn!(
            "decision for slot {} outside {slot_count} slots",
            decision.slot_index
        );
        return false;
    }
    if decision.needs_recreation {
        return match &decision.new_config {
            Some(config) if config.is_valid() => true,
            _ => {
                log::warn!(
                    "slot {}: recreation requested without a valid configuration",
                    decision.slot_index
                );
                false
            }
        };
    }
    true
}

/// Decisions for the direct dependents of `changed`, in ascending slot order.
pub fn decisions_for_change(
    changed: usize,
    configs: &[SlotConfig],
    selections: &[usize],
    graph: &DependencyGraph,
) -> Vec<RecreationDecision> {
    let mut dependents: Vec<usize> = graph.dependents_of(changed).into_iter().collect();
    dependents.sort_unstable();
    dependents
        .into_iter()
        .filter_map(|slot| {
            configs
                .get(slot)
                .map(|config| should_recreate(slot, config, selections, graph))
        })
        .collect()
}

pub fn decisions_for_all(
    configs: &[SlotConfig],
    selections: &[usize],
    graph: &DependencyGraph,
) -> Vec<RecreationDecision> {
    configs
        .iter()
        .enumerate()
        .map(|(slot, config)| should_recreate(slot, config, selections, graph))
        .collect()
}

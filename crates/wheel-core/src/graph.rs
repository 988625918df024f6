//! Directed dependency graph between slot indices.
//!
//! The forward map stores, per slot, the [`DependencySpec`] it declared. The
//! reverse map stores, per slot, the set of slots that declared a dependency
//! on it. Both maps are updated together, and registration refuses any edge
//! set that would close a cycle, so the graph stays acyclic at all times.

use std::fmt;

use crate::collections::map::{HashMap, HashSet};
use crate::config::SlotConfig;
use crate::dependency::DependencySpec;
use crate::error::ConfigError;

#[derive(Default, Clone)]
pub struct DependencyGraph {
    forward: HashMap<usize, DependencySpec>,
    reverse: HashMap<usize, HashSet<usize>>,
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut forward: Vec<(usize, &[usize])> = self
            .forward
            .iter()
            .map(|(slot, spec)| (*slot, spec.depends_on()))
            .collect();
        forward.sort_unstable();
        f.debug_struct("DependencyGraph")
            .field("forward", &forward)
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `spec` as the dependency of `slot`, replacing any previous
    /// registration. On error the graph is left untouched.
    pub fn register(
        &mut self,
        slot: usize,
        spec: DependencySpec,
        total_slots: Option<usize>,
    ) -> Result<(), ConfigError> {
        spec.validate(total_slots)?;
        if let Some(total) = total_slots {
            if slot >= total {
                return Err(ConfigError::DependencyOutOfRange { index: slot, total });
            }
        }
        if spec.depends_on().contains(&slot) {
            return Err(ConfigError::SelfDependency(slot));
        }
        if let Some(via) = spec
            .depends_on()
            .iter()
            .copied()
            .find(|&dep| self.reaches(dep, slot))
        {
            return Err(ConfigError::CycleDetected { slot, via });
        }

        self.unregister(slot);
        for &dep in spec.depends_on() {
            self.reverse.entry(dep).or_default().insert(slot);
        }
        self.forward.insert(slot, spec);
        Ok(())
    }

    pub fn unregister(&mut self, slot: usize) {
        if self.forward.remove(&slot).is_none() {
            return;
        }
        self.reverse.retain(|_, dependents| {
            dependents.remove(&slot);
            !dependents.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    pub fn dependency(&self, slot: usize) -> Option<&DependencySpec> {
        self.forward.get(&slot)
    }

    pub fn dependents_of(&self, slot: usize) -> HashSet<usize> {
        self.reverse.get(&slot).cloned().unwrap_or_default()
    }

    /// Every slot reachable from `slot` through reverse edges, excluding
    /// `slot` itself.
    pub fn transitive_dependents(&self, slot: usize) -> HashSet<usize> {
        let mut seen = HashSet::new();
        let mut stack = vec![slot];
        while let Some(current) = stack.pop() {
            if let Some(dependents) = self.reverse.get(&current) {
                for &dependent in dependents {
                    if dependent != slot && seen.insert(dependent) {
                        stack.push(dependent);
                    }
                }
            }
        }
        seen
    }

    pub fn has_dependency(&self, slot: usize) -> bool {
        self.forward.contains_key(&slot)
    }

    pub fn has_dependents(&self, slot: usize) -> bool {
        self.reverse
            .get(&slot)
            .map(|dependents| !dependents.is_empty())
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of slots with a registered dependency.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// All slots that appear in the graph, sorted.
    pub fn nodes(&self) -> Vec<usize> {
        let mut nodes: Vec<usize> = self
            .forward
            .keys()
            .chain(self.reverse.keys())
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        nodes.sort_unstable();
        nodes
    }

    /// Whether `target` can be reached from `start` by following declared
    /// dependencies.
    fn reaches(&self, start: usize, target: usize) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(spec) = self.forward.get(&current) {
                stack.extend(spec.depends_on().iter().copied());
            }
        }
        false
    }

    pub fn detect_cycle(&self) -> bool {
        let mut marks = HashMap::new();
        self.nodes()
            .into_iter()
            .any(|node| self.cycle_from(node, &mut marks))
    }

    fn cycle_from(&self, node: usize, marks: &mut HashMap<usize, Mark>) -> bool {
        match marks.get(&node) {
            Some(Mark::InProgress) => return true,
            Some(Mark::Done) => return false,
            None => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(spec) = self.forward.get(&node) {
            for &dep in spec.depends_on() {
                if self.cycle_from(dep, marks) {
                    return true;
                }
            }
        }
        marks.insert(node, Mark::Done);
        false
    }

    /// Orders every known slot so that dependencies precede their dependents.
    /// Returns an empty list if the graph somehow contains a cycle.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut marks = HashMap::new();
        let mut order = Vec::new();
        for node in self.nodes() {
            if !self.visit(node, &mut marks, &mut order) {
                log::warn!("dependency graph contains a cycle; no topological order");
                return Vec::new();
            }
        }
        order
    }

    fn visit(&self, node: usize, marks: &mut HashMap<usize, Mark>, order: &mut Vec<usize>) -> bool {
        match marks.get(&node) {
            Some(Mark::InProgress) => return false,
            Some(Mark::Done) => return true,
            None => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(spec) = self.forward.get(&node) {
            for &dep in spec.depends_on() {
                if !self.visit(dep, marks, order) {
                    return false;
                }
            }
        }
        marks.insert(node, Mark::Done);
        order.push(node);
        true
    }

    /// Builds the configuration `slot` should have given the current
    /// selections. Returns `None` when the slot is independent or when the
    /// strategy fails or produces an unusable shape.
    pub fn compute_replacement_config(
        &self,
        slot: usize,
        current: &SlotConfig,
        selections: &[usize],
    ) -> Option<SlotConfig> {
        let spec = self.forward.get(&slot)?;
        let values = spec
            .depends_on()
            .iter()
            .map(|&dep| selections.get(dep).copied())
            .collect::<Option<Vec<usize>>>();
        let Some(values) = values else {
            log::warn!(
                "slot {slot}: dependency {:?} outside selection vector of {}",
                spec.depends_on(),
                selections.len()
            );
            return None;
        };

        let strategy = spec.strategy();
        let item_count = match strategy.item_count(&values) {
            Ok(0) => {
                log::warn!("slot {slot}: computed item count is zero for {values:?}");
                return None;
            }
            Ok(count) => count,
            Err(err) => {
                log::warn!("slot {slot}: {err}");
                return None;
            }
        };

        let current_selection = selections
            .get(slot)
            .copied()
            .unwrap_or(current.initial_index);
        let initial_index = match strategy.initial_index(&values, current_selection, item_count) {
            Ok(index) if index < item_count => index,
            Ok(index) => {
                log::warn!("slot {slot}: computed initial index {index} outside {item_count} items");
                return None;
            }
            Err(err) => {
                log::warn!("slot {slot}: {err}");
                return None;
            }
        };

        let mut replacement = current.clone();
        replacement.item_count = item_count;
        replacement.initial_index = initial_index;
        if let Some(formatter) = strategy.formatter(&values) {
            replacement.formatter = Some(formatter);
        }
        Some(replacement)
    }
}

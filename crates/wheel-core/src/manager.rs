//! Owner of the live wheel state.
//!
//! [`WheelManager`] holds the authoritative slot configurations, the selection
//! vector, the live scroll handles and the dependency graph, and is the only
//! place any of them change. A selection change on a driving slot cascades to
//! every transitive dependent in topological order, so each dependent sees the
//! already-updated state of the slots it reads from.
//!
//! Setup problems are reported as errors. Anything that goes wrong during live
//! interaction (bad indices, failing strategies, handles still attached) is
//! logged and absorbed.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::collections::map::HashSet;
use crate::config::{SlotConfig, SlotKey};
use crate::decision;
use crate::dependency::{clamp_selection, DependencySpec};
use crate::error::{ConfigError, WheelError};
use crate::graph::DependencyGraph;
use crate::handle::{HandleId, HandlePool, HandleStats, ScrollHandle, DEFAULT_POOL_CAPACITY};
use crate::platform::{DefaultScheduler, WheelScheduler};
use crate::runtime::FrameQueue;

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub pool_capacity: usize,
    /// Check the dependency graph once `initialize` has registered every slot.
    pub validate_on_initialize: bool,
    /// Run [`WheelManager::repair_inconsistencies`] when a consistency check
    /// after initialization or a batch fails.
    pub repair_on_invalid: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            validate_on_initialize: true,
            repair_on_invalid: true,
        }
    }
}

/// Snapshot of one slot.
#[derive(Debug, Clone)]
pub struct SlotState {
    pub id: String,
    pub key: SlotKey,
    pub selection: usize,
    pub config: SlotConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: u64,
    /// Slots whose configuration, handle or selection changed, ascending.
    pub slots: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&ChangeEvent)>;

pub struct WheelManager {
    configs: Vec<SlotConfig>,
    selections: Vec<usize>,
    handles: Vec<ScrollHandle>,
    identities: Vec<String>,
    graph: DependencyGraph,
    pool: HandlePool,
    frame_queue: FrameQueue,
    scheduler: Arc<dyn WheelScheduler>,
    options: ManagerOptions,
    stats: HandleStats,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
    next_handle_id: u64,
    revision: u64,
    disposed: bool,
}

impl fmt::Debug for WheelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WheelManager")
            .field("configs", &self.configs)
            .field("selections", &self.selections)
            .field("handles", &self.handles)
            .field("graph", &self.graph)
            .field("pool", &self.pool)
            .field("frame_queue", &self.frame_queue)
            .field("stats", &self.stats)
            .field("revision", &self.revision)
            .finish()
    }
}

impl Default for WheelManager {
    fn default() -> Self {
        Self::new(ManagerOptions::default())
    }
}

impl WheelManager {
    pub fn new(options: ManagerOptions) -> Self {
        Self::with_scheduler(options, Arc::new(DefaultScheduler))
    }

    pub fn with_scheduler(options: ManagerOptions, scheduler: Arc<dyn WheelScheduler>) -> Self {
        Self {
            configs: Vec::new(),
            selections: Vec::new(),
            handles: Vec::new(),
            identities: Vec::new(),
            graph: DependencyGraph::new(),
            pool: HandlePool::new(options.pool_capacity),
            frame_queue: FrameQueue::new(),
            scheduler,
            options,
            stats: HandleStats::default(),
            listeners: Vec::new(),
            next_listener_id: 1,
            next_handle_id: 1,
            revision: 0,
            disposed: false,
        }
    }

    /// Replaces all state with `slots`. Every slot must have a valid shape;
    /// a dependency that fails to register leaves its slot independent.
    pub fn initialize(&mut self, slots: Vec<SlotConfig>) -> Result<(), ConfigError> {
        for slot in &slots {
            slot.validate_shape()?;
        }

        self.reset();
        let total = slots.len();
        for (index, mut config) in slots.into_iter().enumerate() {
            if let Some(spec) = config.dependency.clone() {
                if let Err(err) = self.graph.register(index, spec, Some(total)) {
                    log::warn!("slot {index}: dependency not registered: {err}");
                    config.dependency = None;
                }
            }
            let identity = config.identity(index);
            let handle = self.acquire_handle(SlotKey::from_identity(&identity), config.initial_index);
            self.selections.push(config.initial_index);
            self.handles.push(handle);
            self.identities.push(identity);
            self.configs.push(config);
        }

        if self.options.validate_on_initialize && !self.validate_graph() {
            log::warn!("dependency graph failed validation after initialize");
        }
        if !self.validate_consistency() && self.options.repair_on_invalid {
            self.repair_inconsistencies();
        }
        self.notify_changed((0..total).collect());
        Ok(())
    }

    fn reset(&mut self) {
        let handles: Vec<ScrollHandle> = self.handles.drain(..).collect();
        for (slot, handle) in handles.into_iter().enumerate() {
            self.retire_handle(slot, handle);
        }
        self.configs.clear();
        self.selections.clear();
        self.identities.clear();
        self.graph.clear();
        self.frame_queue.clear_notifications();
        self.disposed = false;
    }

    /// Registers a dependency for `slot` and records it on the slot's
    /// configuration. `total_slots` defaults to the current slot count.
    pub fn register_dependency(
        &mut self,
        slot: usize,
        spec: DependencySpec,
        total_slots: Option<usize>,
    ) -> Result<(), ConfigError> {
        let total = total_slots.or(Some(self.configs.len()));
        self.graph.register(slot, spec.clone(), total)?;
        if let Some(config) = self.configs.get_mut(slot) {
            config.dependency = Some(spec);
        }
        Ok(())
    }

    pub fn unregister_dependency(&mut self, slot: usize) {
        self.graph.unregister(slot);
        if let Some(config) = self.configs.get_mut(slot) {
            config.dependency = None;
        }
    }

    pub fn dependents_of(&self, slot: usize) -> HashSet<usize> {
        self.graph.dependents_of(slot)
    }

    pub fn compute_replacement_config(
        &self,
        slot: usize,
        current: &SlotConfig,
        selections: &[usize],
    ) -> Option<SlotConfig> {
        self.graph.compute_replacement_config(slot, current, selections)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The graph is acyclic and references only existing slots.
    pub fn validate_graph(&self) -> bool {
        if self.graph.detect_cycle() {
            log::warn!("dependency graph contains a cycle");
            return false;
        }
        let total = self.configs.len();
        for slot in self.graph.nodes() {
            if slot >= total {
                log::warn!("dependency graph references slot {slot} of {total}");
                return false;
            }
        }
        true
    }

    /// Replaces the configuration of `index` and swaps its handle. Does nothing
    /// unless the item count or stable identity differs from the current one.
    pub fn recreate(&mut self, index: usize, new_config: SlotConfig) -> bool {
        if !self.check_index(index, "recreate") {
            return false;
        }
        if let Err(err) = new_config.validate_shape() {
            log::warn!("recreate: slot {index} rejected: {err}");
            return false;
        }
        if !self.configs[index].needs_recreation(&new_config) {
            log::debug!("recreate: slot {index} unchanged, skipping");
            return false;
        }
        self.recreate_slot(index, new_config);
        let mut touched = vec![index];
        touched.extend(self.cascade_from(index));
        self.notify_changed(touched);
        true
    }

    /// Applies several replacements with a single retire pass followed by a
    /// single acquire pass, so handles released by one slot can be reused by
    /// another. Entries that need no recreation are skipped as in
    /// [`Self::recreate`]. Returns the number of slots recreated.
    pub fn recreate_many(
        &mut self,
        indices: &[usize],
        new_configs: Vec<SlotConfig>,
    ) -> Result<usize, WheelError> {
        if indices.len() != new_configs.len() {
            return Err(WheelError::LengthMismatch {
                indices: indices.len(),
                configs: new_configs.len(),
            });
        }

        let mut recreations: Vec<(usize, SlotConfig)> = Vec::new();
        for (&index, config) in indices.iter().zip(new_configs) {
            if !self.check_index(index, "recreate_many") {
                continue;
            }
            if let Err(err) = config.validate_shape() {
                log::warn!("recreate_many: slot {index} rejected: {err}");
                continue;
            }
            recreations.retain(|(slot, _)| *slot != index);
            if self.configs[index].needs_recreation(&config) {
                recreations.push((index, config));
            }
        }

        for &(index, _) in &recreations {
            let old = self.handles[index].clone();
            self.retire_handle(index, old);
        }
        let mut recreated = Vec::with_capacity(recreations.len());
        for (index, mut config) in recreations {
            self.sync_dependency(index, &mut config);
            self.identities[index] = config.identity(index);
            self.configs[index] = config;
            recreated.push(index);
        }
        for &index in &recreated {
            let key = SlotKey::from_identity(&self.identities[index]);
            let initial = self.configs[index].initial_index;
            self.handles[index] = self.acquire_handle(key, initial);
            self.sync_selection(index, initial);
        }

        let mut touched = recreated.clone();
        for &index in &recreated {
            touched.extend(self.cascade_from(index));
        }

        if !self.validate_consistency() && self.options.repair_on_invalid {
            self.repair_inconsistencies();
        }
        if !touched.is_empty() {
            self.notify_changed(touched);
        }
        Ok(recreated.len())
    }

    fn recreate_slot(&mut self, index: usize, mut config: SlotConfig) {
        let old = self.handles[index].clone();
        self.retire_handle(index, old);

        self.sync_dependency(index, &mut config);
        let identity = config.identity(index);
        let initial = config.initial_index;
        self.handles[index] = self.acquire_handle(SlotKey::from_identity(&identity), initial);
        self.identities[index] = identity;
        self.configs[index] = config;
        self.sync_selection(index, initial);
        log::debug!(
            "slot {index}: recreated with {} items at {initial}",
            self.configs[index].item_count
        );
    }

    /// Re-registers the dependency of `index` if `config` declares a different
    /// one. A declaration the graph refuses is dropped from `config`.
    fn sync_dependency(&mut self, index: usize, config: &mut SlotConfig) {
        let changed = match (&self.configs[index].dependency, &config.dependency) {
            (None, None) => false,
            (Some(old), Some(new)) => !old.same_as(new),
            _ => true,
        };
        if !changed {
            return;
        }
        self.graph.unregister(index);
        if let Some(spec) = config.dependency.clone() {
            if let Err(err) = self.graph.register(index, spec, Some(self.configs.len())) {
                log::warn!("slot {index}: new dependency not registered: {err}");
                config.dependency = None;
            }
        }
    }

    fn sync_selection(&mut self, index: usize, value: usize) {
        if self.selections[index] == value {
            return;
        }
        self.selections[index] = value;
        if let Some(on_change) = self.configs[index].on_change.clone() {
            self.frame_queue
                .enqueue_notification(move || on_change(value));
            self.scheduler.schedule_frame();
        }
    }

    /// Re-evaluates every transitive dependent of `driver` in topological
    /// order against the live selection vector. Returns the slots touched.
    fn cascade_from(&mut self, driver: usize) -> Vec<usize> {
        let targets = self.graph.transitive_dependents(driver);
        if targets.is_empty() {
            return Vec::new();
        }
        let mut order: Vec<usize> = self
            .graph
            .topological_order()
            .into_iter()
            .filter(|slot| targets.contains(slot))
            .collect();
        if order.is_empty() {
            log::warn!("slot {driver}: no topological order, cascading in index order");
            order = targets.into_iter().collect();
            order.sort_unstable();
        }

        let mut touched = Vec::new();
        for slot in order {
            let Some(current) = self.configs.get(slot) else {
                continue;
            };
            let decision = decision::should_recreate(slot, current, &self.selections, &self.graph);
            if !decision::validate_decision(&decision, self.configs.len()) {
                continue;
            }
            log::debug!("slot {slot}: {}", decision.reason);
            match decision.new_config {
                Some(config) if decision.needs_recreation => {
                    self.recreate_slot(slot, config);
                    touched.push(slot);
                }
                Some(config) => {
                    self.configs[slot].apply_presentation(&config);
                    touched.push(slot);
                }
                None => {}
            }
        }
        touched
    }

    /// Writes a new selection and cascades to dependents. Returns `false` for
    /// out-of-range input or an unchanged value.
    pub fn update_selection(&mut self, index: usize, value: usize) -> bool {
        if !self.check_selection(index, value, "update_selection") {
            return false;
        }
        if self.selections[index] == value {
            return false;
        }
        self.selections[index] = value;
        let handle = &self.handles[index];
        if handle.position() != value && handle.animation_target() != Some(value) {
            handle.jump_to(value);
        }
        let mut touched = vec![index];
        touched.extend(self.cascade_from(index));
        self.notify_changed(touched);
        true
    }

    /// Moves the slot's handle without running the dependency cascade. Slots
    /// that other slots depend on fall back to [`Self::update_selection`].
    pub fn update_position_only(&mut self, index: usize, value: usize, animate: bool) -> bool {
        if !self.check_selection(index, value, "update_position_only") {
            return false;
        }
        if self.graph.has_dependents(index) {
            if animate {
                self.handles[index].animate_to(value);
                self.scheduler.schedule_frame();
            }
            return self.update_selection(index, value);
        }
        let handle = &self.handles[index];
        if self.selections[index] == value && handle.position() == value {
            return false;
        }
        self.selections[index] = value;
        if animate {
            handle.animate_to(value);
            self.scheduler.schedule_frame();
        } else {
            handle.jump_to(value);
        }
        self.notify_changed(vec![index]);
        true
    }

    /// Writes every selection and moves every handle first, then runs each
    /// required cascade once. Returns the number of selections changed.
    pub fn update_positions_many(&mut self, updates: &[(usize, usize)], animate: bool) -> usize {
        let mut applied = Vec::new();
        let mut drivers = Vec::new();
        for &(index, value) in updates {
            if !self.check_selection(index, value, "update_positions_many") {
                continue;
            }
            if self.selections[index] == value {
                continue;
            }
            self.selections[index] = value;
            if !applied.contains(&index) {
                applied.push(index);
            }
            if self.graph.has_dependents(index) && !drivers.contains(&index) {
                drivers.push(index);
            }
        }

        for &index in &applied {
            let value = self.selections[index];
            if animate {
                self.handles[index].animate_to(value);
            } else {
                self.handles[index].jump_to(value);
            }
        }
        if animate && !applied.is_empty() {
            self.scheduler.schedule_frame();
        }

        let mut touched = applied.clone();
        for driver in drivers {
            touched.extend(self.cascade_from(driver));
        }
        if !touched.is_empty() {
            self.notify_changed(touched);
        }
        applied.len()
    }

    fn acquire_handle(&mut self, owner: SlotKey, initial_index: usize) -> ScrollHandle {
        if let Some(handle) = self.pool.take_matching(owner, initial_index) {
            handle.reset(owner, initial_index);
            self.stats.reused += 1;
            log::debug!("reusing handle {:?} at {initial_index}", handle.id());
            return handle;
        }
        let id = HandleId(self.next_handle_id);
        self.next_handle_id += 1;
        self.stats.allocated += 1;
        ScrollHandle::new(id, owner, initial_index)
    }

    /// Takes a handle out of service. Attached handles wait in the frame
    /// queue; the rest are pooled or disposed right away.
    fn retire_handle(&mut self, slot: usize, handle: ScrollHandle) {
        if handle.is_disposed() {
            return;
        }
        if handle.is_attached() {
            log::debug!("slot {slot}: deferring disposal of attached handle {:?}", handle.id());
            self.frame_queue.defer_disposal(slot, handle);
            self.stats.deferred += 1;
            self.scheduler.schedule_frame();
            return;
        }
        self.release_handle(handle);
    }

    fn release_handle(&mut self, handle: ScrollHandle) {
        if self.pool.contains(&handle) {
            return;
        }
        if self.pool.offer(handle.clone()) {
            self.stats.pooled += 1;
        } else {
            handle.dispose();
            self.stats.disposed += 1;
        }
    }

    /// Disposes pooled handles beyond half the pool capacity.
    pub fn trim_pool(&mut self) -> usize {
        let evicted = self.pool.trim();
        for handle in &evicted {
            handle.dispose();
        }
        self.stats.disposed += evicted.len();
        evicted.len()
    }

    /// Runs work deferred to the frame boundary: releases detached handles,
    /// settles pending animations and delivers queued `on_change` callbacks.
    pub fn on_frame(&mut self) {
        for handle in self.frame_queue.take_ready_disposals() {
            self.release_handle(handle);
        }
        for handle in &self.handles {
            handle.settle();
        }
        for notification in self.frame_queue.take_notifications() {
            notification();
        }
        if self.frame_queue.has_pending() {
            self.scheduler.schedule_frame();
        }
    }

    pub fn handle(&self, index: usize) -> Option<ScrollHandle> {
        self.handles.get(index).cloned()
    }

    pub fn handle_stats(&self) -> HandleStats {
        self.stats
    }

    pub fn pooled_handles(&self) -> usize {
        self.pool.len()
    }

    pub fn pending_disposals(&self) -> usize {
        self.frame_queue.pending_disposals()
    }

    pub fn state(&self, index: usize) -> Option<SlotState> {
        let config = self.configs.get(index)?;
        let id = self.identities.get(index)?.clone();
        Some(SlotState {
            key: SlotKey::from_identity(&id),
            id,
            selection: *self.selections.get(index)?,
            config: config.clone(),
        })
    }

    pub fn slot_count(&self) -> usize {
        self.configs.len()
    }

    pub fn selections(&self) -> &[usize] {
        &self.selections
    }

    pub fn configs(&self) -> &[SlotConfig] {
        &self.configs
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn subscribe(&mut self, listener: impl Fn(&ChangeEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify_changed(&mut self, mut slots: Vec<usize>) {
        slots.sort_unstable();
        slots.dedup();
        self.revision += 1;
        let event = ChangeEvent {
            revision: self.revision,
            slots,
        };
        let listeners: Vec<Listener> = self
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn validate_consistency(&self) -> bool {
        let len = self.configs.len();
        if self.selections.len() != len
            || self.handles.len() != len
            || self.identities.len() != len
        {
            log::warn!(
                "parallel lists out of step: {} configs, {} selections, {} handles, {} identities",
                len,
                self.selections.len(),
                self.handles.len(),
                self.identities.len()
            );
            return false;
        }
        if let Some(slot) = self.handles.iter().position(ScrollHandle::is_disposed) {
            log::warn!("slot {slot}: live handle is disposed");
            return false;
        }
        if let Some(slot) = (0..len).find(|&slot| self.selections[slot] >= self.configs[slot].item_count)
        {
            log::warn!(
                "slot {slot}: selection {} outside {} items",
                self.selections[slot],
                self.configs[slot].item_count
            );
            return false;
        }
        true
    }

    /// Best-effort repair: trims the parallel lists to their common length,
    /// drops dependencies that point past it, clamps selections and replaces
    /// disposed handles. Returns whether the state validates afterwards.
    pub fn repair_inconsistencies(&mut self) -> bool {
        let len = self
            .configs
            .len()
            .min(self.selections.len())
            .min(self.handles.len())
            .min(self.identities.len());

        while self.handles.len() > len {
            let slot = self.handles.len() - 1;
            if let Some(handle) = self.handles.pop() {
                self.retire_handle(slot, handle);
            }
        }
        self.configs.truncate(len);
        self.selections.truncate(len);
        self.identities.truncate(len);

        for slot in self.graph.nodes() {
            let dangling = slot >= len
                || self
                    .graph
                    .dependency(slot)
                    .map(|spec| spec.depends_on().iter().any(|&dep| dep >= len))
                    .unwrap_or(false);
            if dangling {
                log::warn!("repair: dropping dependency of slot {slot}");
                self.graph.unregister(slot);
                if let Some(config) = self.configs.get_mut(slot) {
                    config.dependency = None;
                }
            }
        }

        for slot in 0..len {
            let item_count = self.configs[slot].item_count;
            if self.selections[slot] >= item_count {
                self.selections[slot] = clamp_selection(self.selections[slot], item_count);
            }
            if self.handles[slot].is_disposed() {
                let key = SlotKey::from_identity(&self.identities[slot]);
                let handle = self.acquire_handle(key, self.configs[slot].initial_index);
                handle.jump_to(self.selections[slot]);
                self.handles[slot] = handle;
            }
        }

        let repaired = self.validate_consistency();
        if !repaired {
            log::warn!("repair left the manager inconsistent; continuing degraded");
        }
        self.notify_changed((0..len).collect());
        repaired
    }

    fn check_index(&self, index: usize, operation: &str) -> bool {
        if index < self.configs.len() {
            return true;
        }
        log::warn!(
            "{operation}: slot {index} outside {} slots",
            self.configs.len()
        );
        false
    }

    fn check_selection(&self, index: usize, value: usize, operation: &str) -> bool {
        if !self.check_index(index, operation) {
            return false;
        }
        let item_count = self.configs[index].item_count;
        if value >= item_count {
            log::warn!("{operation}: value {value} outside {item_count} items of slot {index}");
            return false;
        }
        true
    }

    /// Releases every handle and all graph state. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let mut released: Vec<ScrollHandle> = self.handles.drain(..).collect();
        released.extend(self.pool.drain());
        released.extend(self.frame_queue.take_all_disposals());
        for handle in &released {
            handle.dispose();
        }
        self.stats.disposed += released.len();
        self.frame_queue.clear();
        self.graph.clear();
        self.configs.clear();
        self.selections.clear();
        self.identities.clear();
        self.listeners.clear();
        self.disposed = true;
    }
}

impl Drop for WheelManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
impl WheelManager {
    /// Pushes the parallel lists out of step for repair tests.
    pub(crate) fn corrupt_for_test(&mut self, extra_selection: usize, bad_selection: Option<(usize, usize)>) {
        self.selections.push(extra_selection);
        if let Some((slot, value)) = bad_selection {
            self.selections[slot] = value;
        }
    }

    pub(crate) fn dispose_handle_for_test(&mut self, slot: usize) {
        self.handles[slot].dispose();
    }

    /// Appends a handle, identity and selection with no matching config.
    pub(crate) fn push_orphan_handle_for_test(&mut self) -> ScrollHandle {
        let handle = self.acquire_handle(SlotKey::from_identity("orphan"), 0);
        self.handles.push(handle.clone());
        self.identities.push("orphan".to_string());
        self.selections.push(0);
        handle
    }
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;

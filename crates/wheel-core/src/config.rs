//! Immutable description of one wheel slot.

use std::fmt;
use std::rc::Rc;

use crate::dependency::DependencySpec;
use crate::error::ConfigError;
use crate::hash::hash_one;

/// Label for an item index. Invoked by the renderer, never by the engine.
pub type Formatter = Rc<dyn Fn(usize) -> String>;
pub type ChangeCallback = Rc<dyn Fn(usize)>;

pub const DEFAULT_WIDTH: f32 = 60.0;

/// Stable 64-bit key derived from a slot's identity string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey(pub u64);

impl SlotKey {
    pub fn from_identity(identity: &str) -> Self {
        Self(hash_one(identity))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
pub struct SlotConfig {
    pub item_count: usize,
    pub initial_index: usize,
    pub width: f32,
    pub formatter: Option<Formatter>,
    pub leading: Option<String>,
    pub trailing: Option<String>,
    pub on_change: Option<ChangeCallback>,
    pub stable_id: Option<String>,
    pub dependency: Option<DependencySpec>,
}

impl SlotConfig {
    pub fn new(item_count: usize, initial_index: usize) -> Self {
        Self {
            item_count,
            initial_index,
            width: DEFAULT_WIDTH,
            formatter: None,
            leading: None,
            trailing: None,
            on_change: None,
            stable_id: None,
            dependency: None,
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn with_formatter(mut self, formatter: impl Fn(usize) -> String + 'static) -> Self {
        self.formatter = Some(Rc::new(formatter));
        self
    }

    pub fn with_leading(mut self, leading: impl Into<String>) -> Self {
        self.leading = Some(leading.into());
        self
    }

    pub fn with_trailing(mut self, trailing: impl Into<String>) -> Self {
        self.trailing = Some(trailing.into());
        self
    }

    pub fn with_on_change(mut self, on_change: impl Fn(usize) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }

    pub fn with_stable_id(mut self, stable_id: impl Into<String>) -> Self {
        self.stable_id = Some(stable_id.into());
        self
    }

    pub fn with_dependency(mut self, dependency: DependencySpec) -> Self {
        self.dependency = Some(dependency);
        self
    }

    /// Validates the slot on its own. When `slot_index` is given, a dependency
    /// naming the slot itself is rejected as well.
    pub fn validate(
        &self,
        slot_index: Option<usize>,
        total_slots: Option<usize>,
    ) -> Result<(), ConfigError> {
        self.validate_shape()?;
        if let Some(dependency) = &self.dependency {
            dependency.validate(total_slots)?;
            if let Some(slot) = slot_index {
                if dependency.depends_on().contains(&slot) {
                    return Err(ConfigError::SelfDependency(slot));
                }
            }
        }
        Ok(())
    }

    /// Item count, initial index and width only; the dependency is not checked.
    pub fn validate_shape(&self) -> Result<(), ConfigError> {
        if self.item_count == 0 {
            return Err(ConfigError::InvalidItemCount);
        }
        if self.initial_index >= self.item_count {
            return Err(ConfigError::InvalidInitialIndex {
                index: self.initial_index,
                item_count: self.item_count,
            });
        }
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(ConfigError::InvalidWidth(self.width));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate(None, None).is_ok()
    }

    /// Whether replacing `self` with `other` requires tearing the slot down.
    /// Only the item count and the stable identity count; presentation and
    /// `initial_index` differences are applied in place.
    pub fn needs_recreation(&self, other: &SlotConfig) -> bool {
        self.item_count != other.item_count || self.stable_id != other.stable_id
    }

    /// Copies the fields that never force recreation from `other`.
    pub fn apply_presentation(&mut self, other: &SlotConfig) {
        self.width = other.width;
        self.formatter = other.formatter.clone();
        self.leading = other.leading.clone();
        self.trailing = other.trailing.clone();
        self.on_change = other.on_change.clone();
    }

    pub fn identity(&self, slot_index: usize) -> String {
        match &self.stable_id {
            Some(id) => id.clone(),
            None => format!("wheel_{slot_index}"),
        }
    }

    pub fn key(&self, slot_index: usize) -> SlotKey {
        SlotKey::from_identity(&self.identity(slot_index))
    }

    pub fn label(&self, index: usize) -> String {
        match &self.formatter {
            Some(formatter) => formatter(index),
            None => index.to_string(),
        }
    }
}

impl fmt::Debug for SlotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotConfig")
            .field("item_count", &self.item_count)
            .field("initial_index", &self.initial_index)
            .field("width", &self.width)
            .field("stable_id", &self.stable_id)
            .field("has_formatter", &self.formatter.is_some())
            .field("dependency", &self.dependency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_bad_shapes() {
        assert_eq!(
            SlotConfig::new(0, 0).validate(None, None),
            Err(ConfigError::InvalidItemCount)
        );
        assert_eq!(
            SlotConfig::new(3, 3).validate(None, None),
            Err(ConfigError::InvalidInitialIndex {
                index: 3,
                item_count: 3
            })
        );
        assert!(SlotConfig::new(3, 0)
            .with_width(f32::NAN)
            .validate(None, None)
            .is_err());
        assert!(SlotConfig::new(3, 2).is_valid());
    }

    #[test]
    fn validation_rejects_self_dependency() {
        let config =
            SlotConfig::new(5, 0).with_dependency(DependencySpec::from_fn(vec![0, 1], |_| Ok(3)));
        assert_eq!(
            config.validate(Some(0), Some(2)),
            Err(ConfigError::SelfDependency(0))
        );
        assert!(config.validate(Some(2), Some(3)).is_ok());
    }

    #[test]
    fn presentation_changes_never_force_recreation() {
        let base = SlotConfig::new(12, 0).with_stable_id("month");
        let restyled = SlotConfig::new(12, 0)
            .with_stable_id("month")
            .with_width(120.0)
            .with_formatter(|index| format!("M{index}"))
            .with_leading("<")
            .with_trailing(">")
            .with_on_change(|_| {});
        assert!(!base.needs_recreation(&restyled));
    }

    #[test]
    fn initial_index_change_alone_is_not_recreation() {
        let base = SlotConfig::new(12, 0);
        let moved = SlotConfig::new(12, 7);
        assert!(!base.needs_recreation(&moved));
    }

    #[test]
    fn item_count_or_identity_change_forces_recreation() {
        let base = SlotConfig::new(12, 0).with_stable_id("month");
        assert!(base.needs_recreation(&SlotConfig::new(11, 0).with_stable_id("month")));
        assert!(base.needs_recreation(&SlotConfig::new(12, 0).with_stable_id("other")));
        assert!(base.needs_recreation(&SlotConfig::new(12, 0)));
    }

    #[test]
    fn identity_defaults_to_positional_name() {
        assert_eq!(SlotConfig::new(1, 0).identity(4), "wheel_4");
        let named = SlotConfig::new(1, 0).with_stable_id("year");
        assert_eq!(named.identity(4), "year");
        assert_eq!(named.key(0), named.key(9));
        assert_ne!(SlotConfig::new(1, 0).key(0), SlotConfig::new(1, 0).key(1));
    }

    #[test]
    fn label_uses_formatter_when_present() {
        let plain = SlotConfig::new(3, 0);
        assert_eq!(plain.label(2), "2");
        let formatted = SlotConfig::new(3, 0).with_formatter(|index| format!("#{index}"));
        assert_eq!(formatted.label(2), "#2");
    }
}

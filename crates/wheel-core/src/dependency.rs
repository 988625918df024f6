//! Dependency declarations between wheel slots.
//!
//! A [`DependencySpec`] names the slots a wheel reads from and carries a
//! [`DependencyStrategy`] that turns their current selections into a new item
//! count, initial position and (optionally) label formatter. Strategies must be
//! pure: the engine may call them several times for the same inputs and relies
//! on getting the same answer back.

use std::fmt;
use std::rc::Rc;

use crate::config::Formatter;
use crate::error::{ComputeError, ConfigError};

/// Computes the shape of a dependent slot from the values of the slots it
/// depends on. `values` is ordered like [`DependencySpec::depends_on`].
pub trait DependencyStrategy {
    fn item_count(&self, values: &[usize]) -> Result<usize, ComputeError>;

    /// Position to select after recreation. Defaults to keeping the current
    /// selection, clamped to the last valid index.
    fn initial_index(
        &self,
        values: &[usize],
        current_selection: usize,
        item_count: usize,
    ) -> Result<usize, ComputeError> {
        let _ = values;
        Ok(clamp_selection(current_selection, item_count))
    }

    fn formatter(&self, values: &[usize]) -> Option<Formatter> {
        let _ = values;
        None
    }
}

/// Clamps `selection` into `[0, item_count)`, landing on the last valid index
/// on overflow.
#[inline]
pub fn clamp_selection(selection: usize, item_count: usize) -> usize {
    selection.min(item_count.saturating_sub(1))
}

#[derive(Clone)]
pub struct DependencySpec {
    depends_on: Vec<usize>,
    strategy: Rc<dyn DependencyStrategy>,
}

impl DependencySpec {
    pub fn new(depends_on: Vec<usize>, strategy: impl DependencyStrategy + 'static) -> Self {
        Self {
            depends_on,
            strategy: Rc::new(strategy),
        }
    }

    pub fn from_strategy(depends_on: Vec<usize>, strategy: Rc<dyn DependencyStrategy>) -> Self {
        Self {
            depends_on,
            strategy,
        }
    }

    /// Dependency whose item count is computed by `item_count`; the initial
    /// index follows the default clamp rule.
    pub fn from_fn(
        depends_on: Vec<usize>,
        item_count: impl Fn(&[usize]) -> Result<usize, ComputeError> + 'static,
    ) -> Self {
        Self::new(depends_on, FnStrategy::new(item_count))
    }

    /// Day-of-month wheel driven by a zero-based month slot and a year slot
    /// whose index 0 is `base_year`.
    pub fn days_in_month(month_slot: usize, year_slot: usize, base_year: i32) -> Self {
        Self::new(vec![month_slot, year_slot], DaysInMonth::new(base_year))
    }

    pub fn depends_on(&self) -> &[usize] {
        &self.depends_on
    }

    pub fn strategy(&self) -> &dyn DependencyStrategy {
        self.strategy.as_ref()
    }

    /// Checks the shape of the declaration. `total_slots`, when known, bounds
    /// the indices. Cycle checks need the graph and happen at registration.
    pub fn validate(&self, total_slots: Option<usize>) -> Result<(), ConfigError> {
        if self.depends_on.is_empty() {
            return Err(ConfigError::EmptyDependencies);
        }
        for (position, &index) in self.depends_on.iter().enumerate() {
            if self.depends_on[..position].contains(&index) {
                return Err(ConfigError::DuplicateDependency(index));
            }
            if let Some(total) = total_slots {
                if index >= total {
                    return Err(ConfigError::DependencyOutOfRange { index, total });
                }
            }
        }
        Ok(())
    }

    /// Same slots and the same strategy instance.
    pub fn same_as(&self, other: &DependencySpec) -> bool {
        self.depends_on == other.depends_on && Rc::ptr_eq(&self.strategy, &other.strategy)
    }
}

impl fmt::Debug for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencySpec")
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

type CountFn = dyn Fn(&[usize]) -> Result<usize, ComputeError>;
type IndexFn = dyn Fn(&[usize], usize, usize) -> Result<usize, ComputeError>;
type FormatterFn = dyn Fn(&[usize]) -> Formatter;

/// Strategy assembled from closures.
pub struct FnStrategy {
    item_count: Box<CountFn>,
    initial_index: Option<Box<IndexFn>>,
    formatter: Option<Box<FormatterFn>>,
}

impl FnStrategy {
    pub fn new(item_count: impl Fn(&[usize]) -> Result<usize, ComputeError> + 'static) -> Self {
        Self {
            item_count: Box::new(item_count),
            initial_index: None,
            formatter: None,
        }
    }

    /// `initial_index(values, current_selection, new_item_count)`.
    pub fn with_initial_index(
        mut self,
        initial_index: impl Fn(&[usize], usize, usize) -> Result<usize, ComputeError> + 'static,
    ) -> Self {
        self.initial_index = Some(Box::new(initial_index));
        self
    }

    pub fn with_formatter(mut self, formatter: impl Fn(&[usize]) -> Formatter + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }
}

impl DependencyStrategy for FnStrategy {
    fn item_count(&self, values: &[usize]) -> Result<usize, ComputeError> {
        (self.item_count)(values)
    }

    fn initial_index(
        &self,
        values: &[usize],
        current_selection: usize,
        item_count: usize,
    ) -> Result<usize, ComputeError> {
        match &self.initial_index {
            Some(compute) => compute(values, current_selection, item_count),
            None => Ok(clamp_selection(current_selection, item_count)),
        }
    }

    fn formatter(&self, values: &[usize]) -> Option<Formatter> {
        self.formatter.as_ref().map(|build| build(values))
    }
}

/// Number of days in a Gregorian month. Expects `[month, year_offset]`, with
/// `month` zero-based and the year computed as `base_year + year_offset`.
#[derive(Debug, Clone, Copy)]
pub struct DaysInMonth {
    pub base_year: i32,
    pub zero_padded: bool,
}

impl DaysInMonth {
    pub fn new(base_year: i32) -> Self {
        Self {
            base_year,
            zero_padded: false,
        }
    }

    pub fn zero_padded(mut self) -> Self {
        self.zero_padded = true;
        self
    }

    pub fn days(month: usize, year: i32) -> Option<usize> {
        let days = match month {
            0 | 2 | 4 | 6 | 7 | 9 | 11 => 31,
            3 | 5 | 8 | 10 => 30,
            1 if is_leap_year(year) => 29,
            1 => 28,
            _ => return None,
        };
        Some(days)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

impl DependencyStrategy for DaysInMonth {
    fn item_count(&self, values: &[usize]) -> Result<usize, ComputeError> {
        let [month, year_offset] = values else {
            return Err(ComputeError::new(format!(
                "expected [month, year], got {} values",
                values.len()
            )));
        };
        let year = i32::try_from(*year_offset)
            .ok()
            .and_then(|offset| self.base_year.checked_add(offset))
            .ok_or_else(|| ComputeError::new(format!("year offset {year_offset} overflows")))?;
        Self::days(*month, year).ok_or_else(|| ComputeError::new(format!("month {month} invalid")))
    }

    fn formatter(&self, values: &[usize]) -> Option<Formatter> {
        let _ = values;
        if !self.zero_padded {
            return None;
        }
        Some(Rc::new(|index: usize| format!("{:02}", index + 1)))
    }
}

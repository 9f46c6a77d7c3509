//! [`LimitTable`] – immutable per-joint bounds.
//!
//! Built once from configuration; entry `j` always describes destination
//! joint `j`.

use telerelay_types::{ConfigError, JointLimit};

/// Per-destination-joint `[min, max]` bounds, indexed contiguously from 0.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitTable {
    entries: Vec<JointLimit>,
}

impl LimitTable {
    /// Build a table covering exactly `destination_joints` joints.
    ///
    /// Entries may arrive in any order; they are sorted by index.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::LimitIndexGap`] – an entry's index is `>= destination_joints`.
    /// - [`ConfigError::DuplicateLimit`] – two entries share an index.
    /// - [`ConfigError::MissingLimit`] – a destination joint has no entry.
    /// - [`ConfigError::InvalidLimit`] – `min > max` or a bound is not finite.
    pub fn new(limits: &[JointLimit], destination_joints: usize) -> Result<Self, ConfigError> {
        let mut slots: Vec<Option<JointLimit>> = vec![None; destination_joints];

        for limit in limits {
            if !limit.min.is_finite() || !limit.max.is_finite() {
                return Err(ConfigError::InvalidLimit {
                    index: limit.index,
                    name: limit.name.clone(),
                    reason: "bounds must be finite".to_string(),
                });
            }
            if limit.min > limit.max {
                return Err(ConfigError::InvalidLimit {
                    index: limit.index,
                    name: limit.name.clone(),
                    reason: format!("min {} is greater than max {}", limit.min, limit.max),
                });
            }
            let slot = slots
                .get_mut(limit.index)
                .ok_or(ConfigError::LimitIndexGap {
                    index: limit.index,
                    len: destination_joints,
                })?;
            if slot.is_some() {
                return Err(ConfigError::DuplicateLimit(limit.index));
            }
            *slot = Some(limit.clone());
        }

        let entries = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(ConfigError::MissingLimit(index)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&JointLimit> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointLimit> {
        self.entries.iter()
    }
}

//! [`JointMapper`] – source-slot to destination-slot remapping.
//!
//! `result[mapping[i]] = source[i]` for every mapped source joint `i`.
//! Destination joints that no entry writes receive the value selected by the
//! configured [`UnmappedPolicy`].  All index checks happen in
//! [`JointMapper::new`]; [`JointMapper::map`] never fails.

use telerelay_types::ConfigError;

use crate::config::{MappingPair, UnmappedPolicy};

/// Where a destination slot takes its value from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Source(usize),
    Constant(f64),
}

/// Resolved, immutable joint mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMapper {
    source_joints: usize,
    slots: Vec<Slot>,
}

impl JointMapper {
    /// Resolve `pairs` into a mapper from `source_joints` to `mapped_joints`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a pair references an out-of-range
    /// index, when two pairs target the same destination, or when one source
    /// joint is mapped twice.
    pub fn new(
        source_joints: usize,
        mapped_joints: usize,
        pairs: &[MappingPair],
        policy: UnmappedPolicy,
        unmapped_value: f64,
    ) -> Result<Self, ConfigError> {
        let mut slots: Vec<Option<Slot>> = vec![None; mapped_joints];
        let mut source_seen = vec![false; source_joints];

        for pair in pairs {
            if pair.source >= source_joints {
                return Err(ConfigError::MappingSourceOutOfRange {
                    index: pair.source,
                    len: source_joints,
                });
            }
            if pair.destination >= mapped_joints {
                return Err(ConfigError::MappingDestinationOutOfRange {
                    index: pair.destination,
                    len: mapped_joints,
                });
            }
            if source_seen[pair.source] {
                return Err(ConfigError::DuplicateSource(pair.source));
            }
            if slots[pair.destination].is_some() {
                return Err(ConfigError::DuplicateDestination(pair.destination));
            }
            source_seen[pair.source] = true;
            slots[pair.destination] = Some(Slot::Source(pair.source));
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(dst, slot)| {
                slot.unwrap_or(match policy {
                    UnmappedPolicy::PassThrough if dst < source_joints => Slot::Source(dst),
                    _ => Slot::Constant(unmapped_value),
                })
            })
            .collect();

        Ok(Self {
            source_joints,
            slots,
        })
    }

    /// Identity mapping `i → i` over `source_joints`, padded up to
    /// `mapped_joints` according to `policy`.
    pub fn identity(
        source_joints: usize,
        mapped_joints: usize,
        policy: UnmappedPolicy,
        unmapped_value: f64,
    ) -> Result<Self, ConfigError> {
        let pairs: Vec<MappingPair> = (0..source_joints).map(|i| MappingPair::new(i, i)).collect();
        Self::new(source_joints, mapped_joints, &pairs, policy, unmapped_value)
    }

    pub fn source_joints(&self) -> usize {
        self.source_joints
    }

    /// Length of the vectors produced by [`map`][Self::map].
    pub fn mapped_joints(&self) -> usize {
        self.slots.len()
    }

    /// Map `source` into destination order.
    ///
    /// A source slot missing from a short input reads as NaN so the
    /// validator rejects the result.
    pub fn map(&self, source: &[f64]) -> Vec<f64> {
        self.slots
            .iter()
            .map(|slot| match *slot {
                Slot::Source(i) => source.get(i).copied().unwrap_or(f64::NAN),
                Slot::Constant(v) => v,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(usize, usize)]) -> Vec<MappingPair> {
        list.iter().map(|&(s, d)| MappingPair::new(s, d)).collect()
    }

    #[test]
    fn identity_returns_input() {
        let m = JointMapper::identity(3, 3, UnmappedPolicy::Constant, 0.0).unwrap();
        assert_eq!(m.map(&[0.1, 0.2, 0.3]), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn permutation_reorders() {
        // {0: 2, 1: 0, 2: 1}
        let m = JointMapper::new(
            3,
            3,
            &pairs(&[(0, 2), (1, 0), (2, 1)]),
            UnmappedPolicy::Constant,
            0.0,
        )
        .unwrap();
        assert_eq!(m.map(&[1.0, 2.0, 3.0]), vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn partial_mapping_fills_constant() {
        let m = JointMapper::new(
            3,
            3,
            &pairs(&[(0, 1)]),
            UnmappedPolicy::Constant,
            -0.5,
        )
        .unwrap();
        assert_eq!(m.map(&[1.0, 2.0, 3.0]), vec![-0.5, 1.0, -0.5]);
    }

    #[test]
    fn partial_mapping_passes_through() {
        let m = JointMapper::new(
            2,
            3,
            &pairs(&[(0, 1)]),
            UnmappedPolicy::PassThrough,
            9.0,
        )
        .unwrap();
        // dst 0 ← src 0 (pass-through), dst 1 ← src 0 (mapped), dst 2 has no
        // source counterpart.
        assert_eq!(m.map(&[1.0, 2.0]), vec![1.0, 1.0, 9.0]);
    }

    #[test]
    fn out_of_range_source_is_config_error() {
        let result = JointMapper::new(2, 2, &pairs(&[(5, 0)]), UnmappedPolicy::Constant, 0.0);
        assert_eq!(
            result,
            Err(ConfigError::MappingSourceOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn out_of_range_destination_is_config_error() {
        let result = JointMapper::new(2, 2, &pairs(&[(0, 2)]), UnmappedPolicy::Constant, 0.0);
        assert_eq!(
            result,
            Err(ConfigError::MappingDestinationOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn overlapping_destination_is_config_error() {
        let result = JointMapper::new(
            2,
            2,
            &pairs(&[(0, 1), (1, 1)]),
            UnmappedPolicy::Constant,
            0.0,
        );
        assert_eq!(result, Err(ConfigError::DuplicateDestination(1)));
    }

    #[test]
    fn duplicated_source_is_config_error() {
        let result = JointMapper::new(
            2,
            2,
            &pairs(&[(0, 0), (0, 1)]),
            UnmappedPolicy::Constant,
            0.0,
        );
        assert_eq!(result, Err(ConfigError::DuplicateSource(0)));
    }

    #[test]
    fn short_input_yields_nan() {
        let m = JointMapper::identity(2, 2, UnmappedPolicy::Constant, 0.0).unwrap();
        let out = m.map(&[1.0]);
        assert_eq!(out[0], 1.0);
        assert!(out[1].is_nan());
    }

    #[test]
    fn identity_wider_than_source_pads() {
        let m = JointMapper::identity(2, 4, UnmappedPolicy::Constant, 0.0).unwrap();
        assert_eq!(m.mapped_joints(), 4);
        assert_eq!(m.map(&[1.0, 2.0]), vec![1.0, 2.0, 0.0, 0.0]);
    }
}

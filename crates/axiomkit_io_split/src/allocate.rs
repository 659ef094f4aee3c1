//! Per-folder count allocation.
//!
//! Ideal counts are exact rationals `n_files * units[i] / N_PERCENT_UNITS_TOTAL`
//! kept as `(floor, remainder)` pairs, so rounding decisions (half-way ties,
//! remainder ordering) never depend on floating point error.

use crate::spec::{
    EnumSplitRoundingMode, N_PERCENT_UNITS_TOTAL, SpecSplitConfig, SplitAllocationError,
};

const N_DENOMINATOR: u128 = N_PERCENT_UNITS_TOTAL as u128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpecIdealCount {
    n_floor: usize,
    n_remainder: u128,
}

impl SpecIdealCount {
    fn new(n_files: usize, unit: u64) -> Self {
        let n_numerator = n_files as u128 * unit as u128;
        Self {
            n_floor: (n_numerator / N_DENOMINATOR) as usize,
            n_remainder: n_numerator % N_DENOMINATOR,
        }
    }

    fn round_half_to_even(&self) -> usize {
        let n_twice = self.n_remainder * 2;
        if n_twice > N_DENOMINATOR || (n_twice == N_DENOMINATOR && self.n_floor % 2 == 1) {
            self.n_floor + 1
        } else {
            self.n_floor
        }
    }

    fn ceil(&self) -> usize {
        if self.n_remainder > 0 {
            self.n_floor + 1
        } else {
            self.n_floor
        }
    }
}

/// Ideal (unrounded) count per split, for reporting only.
pub fn derive_ideal_counts(n_files: usize, spec_split_config: &SpecSplitConfig) -> Vec<f64> {
    spec_split_config
        .units()
        .iter()
        .map(|unit| n_files as f64 * *unit as f64 / N_PERCENT_UNITS_TOTAL as f64)
        .collect()
}

/// Compute how many of `n_files` go to each split.
///
/// `Standard`, `Floor` and `Ceil` round every split but the last, never letting
/// the running total exceed `n_files` (earlier splits win the clamp); the last
/// split takes the remainder. `Proportional` floors all splits and hands the
/// leftover units to the largest fractional remainders, earliest split first
/// on ties.
///
/// The result always has one count per split and sums to `n_files`; anything
/// else is reported as [`SplitAllocationError`].
pub fn allocate_counts(
    n_files: usize,
    spec_split_config: &SpecSplitConfig,
    rule_rounding: EnumSplitRoundingMode,
) -> Result<Vec<usize>, SplitAllocationError> {
    let units = spec_split_config.units();
    let counts = match rule_rounding {
        EnumSplitRoundingMode::Proportional => allocate_largest_remainder(n_files, units),
        _ => allocate_with_remainder_bucket(n_files, units, rule_rounding),
    };
    validate_counts(n_files, units.len(), &counts)?;
    Ok(counts)
}

fn allocate_with_remainder_bucket(
    n_files: usize,
    units: &[u64],
    rule_rounding: EnumSplitRoundingMode,
) -> Vec<usize> {
    let Some((_, units_leading)) = units.split_last() else {
        return Vec::new();
    };

    let mut counts = Vec::with_capacity(units.len());
    let mut n_remaining = n_files;
    for unit in units_leading {
        let spec_ideal = SpecIdealCount::new(n_files, *unit);
        let n_rounded = match rule_rounding {
            EnumSplitRoundingMode::Floor => spec_ideal.n_floor,
            EnumSplitRoundingMode::Ceil => spec_ideal.ceil(),
            EnumSplitRoundingMode::Standard | EnumSplitRoundingMode::Proportional => {
                spec_ideal.round_half_to_even()
            }
        };
        let n_count = n_rounded.min(n_remaining);
        n_remaining -= n_count;
        counts.push(n_count);
    }
    counts.push(n_remaining);
    counts
}

fn allocate_largest_remainder(n_files: usize, units: &[u64]) -> Vec<usize> {
    let l_ideal: Vec<SpecIdealCount> = units
        .iter()
        .map(|unit| SpecIdealCount::new(n_files, *unit))
        .collect();
    let mut counts: Vec<usize> = l_ideal.iter().map(|v| v.n_floor).collect();
    let n_leftover = n_files.saturating_sub(counts.iter().sum());

    let mut l_order: Vec<usize> = (0..l_ideal.len()).collect();
    l_order.sort_by(|a, b| {
        l_ideal[*b]
            .n_remainder
            .cmp(&l_ideal[*a].n_remainder)
            .then(a.cmp(b))
    });
    for n_idx in l_order.into_iter().take(n_leftover) {
        counts[n_idx] += 1;
    }
    counts
}

/// Check the allocation invariants for one folder.
pub fn validate_counts(
    n_files: usize,
    n_splits: usize,
    counts: &[usize],
) -> Result<(), SplitAllocationError> {
    if counts.len() != n_splits {
        return Err(SplitAllocationError::SplitCountMismatch {
            n_splits,
            n_counts: counts.len(),
        });
    }
    if counts.iter().sum::<usize>() != n_files {
        return Err(SplitAllocationError::InvariantViolation {
            n_files,
            counts: counts.to_vec(),
        });
    }
    Ok(())
}

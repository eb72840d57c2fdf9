//! Harmonic family helpers
//!
//! A family is one root tempo plus siblings at small-integer ratios of it. Family ids
//! are derived from the root tempo alone, so identical input always reproduces the same
//! grouping. [`family_id_to_hue`] is a presentation helper and plays no part in ranking.

use serde::{Deserialize, Serialize};

use super::TempoHypothesis;

/// Sibling ratios in canonical order, with their display labels
pub const SIBLING_RATIOS: [(f64, &str); 6] = [
    (2.0, "2:1"),
    (0.5, "1:2"),
    (3.0, "3:1"),
    (1.5, "3:2"),
    (1.0 / 3.0, "1:3"),
    (2.0 / 3.0, "2:3"),
];

/// Label of the root ratio
pub const ROOT_LABEL: &str = "1:1";

/// Deterministic family id for a root tempo
pub fn family_id_for_root(root_bpm: f64) -> String {
    format!("fam-{:.2}", root_bpm)
}

/// Hypothesis id within a family
pub fn hypothesis_id(family_id: &str, ratio_label: &str) -> String {
    format!("{}@{}", family_id, ratio_label)
}

/// Position of a ratio in canonical order (root first)
pub(crate) fn ratio_rank(ratio: f64) -> usize {
    if (ratio - 1.0).abs() < 1e-9 {
        return 0;
    }
    SIBLING_RATIOS
        .iter()
        .position(|(r, _)| (r - ratio).abs() < 1e-9)
        .map_or(SIBLING_RATIOS.len() + 1, |p| p + 1)
}

/// Map a family id to a display hue in [0, 360)
///
/// FNV-1a over the id bytes; stable across runs and platforms.
///
/// # Example
///
/// ```
/// use stratum_mir::features::period::harmonic::family_id_to_hue;
///
/// let hue = family_id_to_hue("fam-120.00");
/// assert_eq!(hue, family_id_to_hue("fam-120.00"));
/// assert!((0.0..360.0).contains(&hue));
/// ```
pub fn family_id_to_hue(family_id: &str) -> f64 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let hash = family_id
        .bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ b as u32).wrapping_mul(FNV_PRIME));

    hash as f64 / (u32::MAX as f64 + 1.0) * 360.0
}

/// Hypotheses of one family, in presentation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoFamily {
    /// Shared family id
    pub family_id: String,
    /// Tempo of the root member
    pub root_bpm: f64,
    /// Display hue from [`family_id_to_hue`]
    pub hue: f64,
    /// Members, highest confidence first
    pub members: Vec<TempoHypothesis>,
}

impl TempoFamily {
    /// Highest member confidence
    pub fn max_confidence(&self) -> f64 {
        self.members
            .iter()
            .map(|h| h.confidence)
            .fold(0.0, f64::max)
    }
}

/// Group a ranked hypothesis list by family, keeping first-appearance order
pub fn group_by_family(hypotheses: &[TempoHypothesis]) -> Vec<TempoFamily> {
    let mut families: Vec<TempoFamily> = Vec::new();
    for hypothesis in hypotheses {
        match families
            .iter_mut()
            .find(|f| f.family_id == hypothesis.family_id)
        {
            Some(family) => family.members.push(hypothesis.clone()),
            None => families.push(TempoFamily {
                family_id: hypothesis.family_id.clone(),
                root_bpm: hypothesis.bpm / hypothesis.harmonic_ratio,
                hue: family_id_to_hue(&hypothesis.family_id),
                members: vec![hypothesis.clone()],
            }),
        }
    }
    families
}

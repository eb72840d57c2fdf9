//! Tempo hypotheses from beat candidates
//!
//! Inter-onset intervals between each candidate and its next few successors are
//! converted to BPM and accumulated into a histogram. Histogram peaks are refined to
//! the mean of the intervals around them, then grouped greedily into harmonic families:
//! the strongest unclaimed peak becomes a root, and tempos at small-integer ratios of
//! it become siblings when intervals support them.
//!
//! # Algorithm
//!
//! 1. Sort candidate times, drop non-finite values and duplicates
//! 2. Collect intervals to the next `max_interval_span` candidates within the BPM range
//! 3. Histogram the interval tempos, find local maxima
//! 4. Refine each maximum: supporting window of ±`harmonic_tolerance`, bpm = 60 / mean interval
//! 5. Build families from the strongest remaining peak, claiming every peak near a member
//! 6. Order families by best member confidence, members by confidence

use crate::analysis::confidence::tempo_confidence;
use crate::cancel::{try_outcome, CancellationToken, Outcome, CHECK_INTERVAL};
use crate::error::AnalysisError;

use super::harmonic::{family_id_for_root, hypothesis_id, ratio_rank, ROOT_LABEL, SIBLING_RATIOS};
use super::{HypothesisEvidence, TempoConfig, TempoHypothesis};

/// Intervals around one tempo
#[derive(Debug, Clone, Copy)]
struct Support {
    count: u32,
    lo_bpm: f64,
    hi_bpm: f64,
    mean_interval: f64,
}

/// Refined histogram peak
#[derive(Debug, Clone)]
struct Peak {
    bpm: f64,
    support: Support,
    confidence: f64,
}

/// Compute ranked tempo hypotheses from beat-candidate times
///
/// # Arguments
///
/// * `beat_candidate_times` - Candidate times in seconds, any order
/// * `config` - Engine parameters
/// * `token` - Cancellation token
///
/// # Returns
///
/// Hypotheses ordered by family (strongest family first), then by confidence.
/// Fewer than two usable candidates yield an empty list.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidConfig` if `config` fails validation
///
/// # Example
///
/// ```
/// use stratum_mir::cancel::CancellationToken;
/// use stratum_mir::features::period::tempo_hypotheses::compute_tempo_hypotheses;
/// use stratum_mir::features::period::TempoConfig;
///
/// let beats: Vec<f64> = (0..16).map(|i| i as f64 * 0.5).collect();
/// let hypotheses = compute_tempo_hypotheses(&beats, &TempoConfig::default(), &CancellationToken::new())?
///     .completed()
///     .unwrap_or_default();
/// assert!((hypotheses[0].bpm - 120.0).abs() < 1e-9);
/// # Ok::<(), stratum_mir::AnalysisError>(())
/// ```
pub fn compute_tempo_hypotheses(
    beat_candidate_times: &[f64],
    config: &TempoConfig,
    token: &CancellationToken,
) -> Result<Outcome<Vec<TempoHypothesis>>, AnalysisError> {
    config.validate()?;

    let mut times: Vec<f64> = beat_candidate_times
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    if times.len() < 2 {
        log::debug!("Fewer than two beat candidates, no tempo hypotheses");
        return Ok(Outcome::Completed(Vec::new()));
    }

    let interval_bpms = try_outcome!(collect_interval_bpms(&times, config, token));
    if interval_bpms.is_empty() {
        log::debug!(
            "No inter-onset intervals inside [{:.1}, {:.1}] BPM",
            config.min_bpm,
            config.max_bpm
        );
        return Ok(Outcome::Completed(Vec::new()));
    }

    log::debug!(
        "Tempo histogram: {} candidates, {} intervals",
        times.len(),
        interval_bpms.len()
    );

    let histogram = build_histogram(&interval_bpms, config);
    let mut peaks: Vec<Peak> = histogram_peak_centers(&histogram, config)
        .into_iter()
        .filter_map(|center| refine_peak(center, &interval_bpms, config))
        .collect();
    peaks.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.bpm.total_cmp(&b.bpm))
    });

    let mut claimed = vec![false; peaks.len()];
    let mut families: Vec<Vec<TempoHypothesis>> = Vec::new();

    for root_idx in 0..peaks.len() {
        if families.len() >= config.max_families {
            break;
        }
        if claimed[root_idx] {
            continue;
        }
        if token.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let root = &peaks[root_idx];
        let family = build_family(root, &interval_bpms, config);

        for (idx, peak) in peaks.iter().enumerate() {
            if !claimed[idx] && near_family_member(peak.bpm, root.bpm, config.harmonic_tolerance) {
                claimed[idx] = true;
            }
        }

        log::debug!(
            "Tempo family {}: root {:.2} BPM, {} members",
            family[0].family_id,
            root.bpm,
            family.len()
        );
        families.push(family);
    }

    for family in &mut families {
        family.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(ratio_rank(a.harmonic_ratio).cmp(&ratio_rank(b.harmonic_ratio)))
        });
    }
    families.sort_by(|a, b| {
        max_confidence(b)
            .total_cmp(&max_confidence(a))
            .then(root_bpm(a).total_cmp(&root_bpm(b)))
    });

    Ok(Outcome::Completed(families.into_iter().flatten().collect()))
}

/// Tempos of intervals from each candidate to its next `max_interval_span` successors
fn collect_interval_bpms(
    times: &[f64],
    config: &TempoConfig,
    token: &CancellationToken,
) -> Outcome<Vec<f64>> {
    let mut bpms = Vec::new();
    for (i, &t) in times.iter().enumerate() {
        if token.should_stop(i, CHECK_INTERVAL) {
            return Outcome::Cancelled;
        }
        for &next in times.iter().skip(i + 1).take(config.max_interval_span) {
            let bpm = 60.0 / (next - t);
            if bpm >= config.min_bpm && bpm <= config.max_bpm {
                bpms.push(bpm);
            }
        }
    }
    Outcome::Completed(bpms)
}

fn bin_count(config: &TempoConfig) -> usize {
    ((config.max_bpm - config.min_bpm) / config.bin_width_bpm).ceil().max(1.0) as usize
}

fn build_histogram(interval_bpms: &[f64], config: &TempoConfig) -> Vec<u32> {
    let n_bins = bin_count(config);
    let mut histogram = vec![0u32; n_bins];
    for &bpm in interval_bpms {
        let bin = ((bpm - config.min_bpm) / config.bin_width_bpm).floor() as usize;
        histogram[bin.min(n_bins - 1)] += 1;
    }
    histogram
}

/// Centers of bins that rise above their left neighbour and hold against their right
fn histogram_peak_centers(histogram: &[u32], config: &TempoConfig) -> Vec<f64> {
    (0..histogram.len())
        .filter(|&i| {
            let left = if i > 0 { histogram[i - 1] } else { 0 };
            let right = histogram.get(i + 1).copied().unwrap_or(0);
            histogram[i] > 0 && histogram[i] > left && histogram[i] >= right
        })
        .map(|i| config.min_bpm + (i as f64 + 0.5) * config.bin_width_bpm)
        .collect()
}

fn support_around(target_bpm: f64, interval_bpms: &[f64], tolerance: f64) -> Option<Support> {
    let lo = target_bpm * (1.0 - tolerance);
    let hi = target_bpm * (1.0 + tolerance);

    let mut count = 0u32;
    let mut lo_bpm = f64::INFINITY;
    let mut hi_bpm = f64::NEG_INFINITY;
    let mut interval_sum = 0.0;
    for &bpm in interval_bpms.iter().filter(|&&b| b >= lo && b <= hi) {
        count += 1;
        lo_bpm = lo_bpm.min(bpm);
        hi_bpm = hi_bpm.max(bpm);
        interval_sum += 60.0 / bpm;
    }

    (count > 0).then(|| Support {
        count,
        lo_bpm,
        hi_bpm,
        mean_interval: interval_sum / count as f64,
    })
}

fn refine_peak(center_bpm: f64, interval_bpms: &[f64], config: &TempoConfig) -> Option<Peak> {
    let initial = support_around(center_bpm, interval_bpms, config.harmonic_tolerance)?;
    let bpm = 60.0 / initial.mean_interval;
    let support = support_around(bpm, interval_bpms, config.harmonic_tolerance).unwrap_or(initial);
    let confidence = confidence_of(&support, interval_bpms.len());
    Some(Peak {
        bpm,
        support,
        confidence,
    })
}

fn confidence_of(support: &Support, total: usize) -> f64 {
    tempo_confidence(support.count, total, (support.lo_bpm, support.hi_bpm))
}

fn build_family(root: &Peak, interval_bpms: &[f64], config: &TempoConfig) -> Vec<TempoHypothesis> {
    let family_id = family_id_for_root(root.bpm);
    let mut members = vec![hypothesis(&family_id, ROOT_LABEL, root.bpm, 1.0, &root.support, root.confidence)];

    for &(ratio, label) in SIBLING_RATIOS.iter() {
        let bpm = root.bpm * ratio;
        if bpm < config.min_bpm || bpm > config.max_bpm {
            continue;
        }
        if let Some(support) = support_around(bpm, interval_bpms, config.harmonic_tolerance) {
            let confidence = confidence_of(&support, interval_bpms.len());
            members.push(hypothesis(&family_id, label, bpm, ratio, &support, confidence));
        }
    }
    members
}

fn hypothesis(
    family_id: &str,
    label: &str,
    bpm: f64,
    ratio: f64,
    support: &Support,
    confidence: f64,
) -> TempoHypothesis {
    TempoHypothesis {
        id: hypothesis_id(family_id, label),
        bpm,
        confidence,
        family_id: family_id.to_string(),
        harmonic_ratio: ratio,
        evidence: HypothesisEvidence {
            supporting_interval_count: support.count,
            bin_range: (support.lo_bpm, support.hi_bpm),
        },
    }
}

fn near_family_member(bpm: f64, root_bpm: f64, tolerance: f64) -> bool {
    std::iter::once(1.0)
        .chain(SIBLING_RATIOS.iter().map(|&(r, _)| r))
        .any(|ratio| (bpm / (root_bpm * ratio) - 1.0).abs() <= tolerance)
}

fn max_confidence(family: &[TempoHypothesis]) -> f64 {
    family.iter().map(|h| h.confidence).fold(0.0, f64::max)
}

fn root_bpm(family: &[TempoHypothesis]) -> f64 {
    family
        .iter()
        .find(|h| h.is_root())
        .map_or(f64::INFINITY, |h| h.bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(times: &[f64]) -> Vec<TempoHypothesis> {
        compute_tempo_hypotheses(times, &TempoConfig::default(), &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap()
    }

    fn regular(bpm: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| i as f64 * 60.0 / bpm).collect()
    }

    #[test]
    fn test_regular_pulse_root_and_half_time() {
        let hypotheses = run(&regular(120.0, 5));
        assert_eq!(hypotheses.len(), 2);

        let root = &hypotheses[0];
        assert!((root.bpm - 120.0).abs() < 1e-9);
        assert!(root.is_root());
        assert_eq!(root.id, "fam-120.00@1:1");
        assert_eq!(root.evidence.supporting_interval_count, 4);

        let half = &hypotheses[1];
        assert!((half.bpm - 60.0).abs() < 1e-9);
        assert!((half.harmonic_ratio - 0.5).abs() < 1e-12);
        assert_eq!(half.family_id, root.family_id);
        assert_eq!(half.evidence.supporting_interval_count, 3);
        assert!(root.confidence > half.confidence);
    }

    #[test]
    fn test_confidences_in_unit_range() {
        let mut times = regular(128.0, 32);
        times.extend(regular(90.0, 12).iter().map(|t| t + 0.13));
        for h in run(&times) {
            assert!((0.0..=1.0).contains(&h.confidence), "{:?}", h);
            assert!(h.bpm >= 60.0 && h.bpm <= 200.0);
        }
    }

    #[test]
    fn test_deterministic_and_order_independent() {
        let times = regular(100.0, 20);
        let mut shuffled = times.clone();
        shuffled.reverse();
        shuffled.swap(3, 11);
        let a = run(&times);
        let b = run(&shuffled);
        assert_eq!(a, b);
        assert_eq!(a, run(&times));
    }

    #[test]
    fn test_family_members_share_id_and_ratio() {
        let hypotheses = run(&regular(90.0, 24));
        let root = hypotheses.iter().find(|h| h.is_root()).unwrap();
        assert!((root.bpm - 90.0).abs() < 1e-6);
        for h in hypotheses.iter().filter(|h| h.family_id == root.family_id) {
            assert!(h.id.starts_with(&h.family_id));
            assert!((h.bpm / h.harmonic_ratio - root.bpm).abs() < 1e-6);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(run(&[]).is_empty());
        assert!(run(&[1.0]).is_empty());
        assert!(run(&[1.0, 1.0, f64::NAN]).is_empty());
        // A single 5 s gap is 12 BPM, below range
        assert!(run(&[0.0, 5.0]).is_empty());
    }

    #[test]
    fn test_max_families_respected() {
        let mut times = regular(120.0, 40);
        times.extend(regular(77.0, 30).iter().map(|t| t + 0.011));
        times.extend(regular(143.0, 30).iter().map(|t| t + 0.023));
        let config = TempoConfig {
            max_families: 1,
            ..TempoConfig::default()
        };
        let hypotheses = compute_tempo_hypotheses(&times, &config, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert!(!hypotheses.is_empty());
        assert!(hypotheses.iter().all(|h| h.family_id == hypotheses[0].family_id));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TempoConfig {
            min_bpm: 0.0,
            ..TempoConfig::default()
        };
        let result = compute_tempo_hypotheses(&[0.0, 0.5], &config, &CancellationToken::new());
        assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = compute_tempo_hypotheses(&regular(120.0, 8), &TempoConfig::default(), &token).unwrap();
        assert!(outcome.is_cancelled());
    }
}

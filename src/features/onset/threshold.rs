//! Adaptive local statistics for thresholding
//!
//! Computes a centered moving mean and standard deviation. The adaptive peak picker
//! derives its per-sample threshold as `mean + k * std` from these curves.
//!
//! Windows shrink at the signal boundaries rather than wrapping or padding, so the
//! first and last samples are judged against the samples that actually exist.

/// Local mean and population standard deviation over a centered window
///
/// Sample `i` uses indices `[i - window/2, i + window/2]` clamped to the signal. An even
/// `window` is treated as the next odd size. Runs in O(n) via prefix sums.
///
/// # Arguments
///
/// * `values` - Signal values
/// * `window` - Window size in samples (0 and 1 both mean "the sample itself")
///
/// # Returns
///
/// `(means, stds)`, each the same length as `values`
///
/// # Example
///
/// ```
/// use stratum_mir::features::onset::threshold::local_mean_std;
///
/// let (mean, std) = local_mean_std(&[1.0, 1.0, 4.0, 1.0, 1.0], 3);
/// assert_eq!(mean[2], 2.0);
/// assert!(std[0].abs() < 1e-12);
/// ```
pub fn local_mean_std(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let half = window.max(1) / 2;

    // Prefix sums of x and x^2
    let mut sum = Vec::with_capacity(n + 1);
    let mut sum_sq = Vec::with_capacity(n + 1);
    sum.push(0.0f64);
    sum_sq.push(0.0f64);
    for &v in values {
        let v = if v.is_finite() { v } else { 0.0 };
        sum.push(sum[sum.len() - 1] + v);
        sum_sq.push(sum_sq[sum_sq.len() - 1] + v * v);
    }

    let mut means = Vec::with_capacity(n);
    let mut stds = Vec::with_capacity(n);

    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(n);
        let count = (end - start) as f64;

        let mean = (sum[end] - sum[start]) / count;
        let mean_sq = (sum_sq[end] - sum_sq[start]) / count;
        // Cancellation in E[x^2] - E[x]^2 can dip just below zero
        let variance = (mean_sq - mean * mean).max(0.0);

        means.push(mean);
        stds.push(variance.sqrt());
    }

    (means, stds)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct O(n * w) reference
    fn naive(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
        let half = window.max(1) / 2;
        let mut means = Vec::new();
        let mut stds = Vec::new();
        for i in 0..values.len() {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(values.len());
            let slice = &values[start..end];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let var = slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / slice.len() as f64;
            means.push(mean);
            stds.push(var.sqrt());
        }
        (means, stds)
    }

    #[test]
    fn test_local_mean_std_matches_naive() {
        let values: Vec<f64> = (0..50).map(|i| ((i * 7) % 11) as f64 * 0.3 - 1.0).collect();
        for window in [1, 2, 3, 5, 9, 20, 101] {
            let (m, s) = local_mean_std(&values, window);
            let (nm, ns) = naive(&values, window);
            for i in 0..values.len() {
                assert!((m[i] - nm[i]).abs() < 1e-9, "mean mismatch w={} i={}", window, i);
                assert!((s[i] - ns[i]).abs() < 1e-6, "std mismatch w={} i={}", window, i);
            }
        }
    }

    #[test]
    fn test_window_shrinks_at_edges() {
        let (means, _) = local_mean_std(&[0.0, 3.0, 6.0, 9.0], 3);
        // First window is [0, 1], last is [2, 3]
        assert_eq!(means[0], 1.5);
        assert_eq!(means[3], 7.5);
    }

    #[test]
    fn test_empty_and_constant() {
        let (m, s) = local_mean_std(&[], 5);
        assert!(m.is_empty() && s.is_empty());

        let (m, s) = local_mean_std(&[2.0; 10], 5);
        assert!(m.iter().all(|&v| (v - 2.0).abs() < 1e-12));
        assert!(s.iter().all(|&v| v.abs() < 1e-6));
    }
}

//! Composed signals
//!
//! A composed signal is a piecewise curve over beat time, defined by nodes with a value
//! in [0, 1] and an easing kind towards the next node. Outside the node range the curve
//! holds the nearest endpoint value.

pub mod easing;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub use easing::{apply_easing, InterpolationKind};

/// One node of a composed signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComposedSignalNode {
    /// Position in beats
    pub time_beats: f64,
    /// Value in [0, 1]
    pub value: f64,
    /// Easing applied from this node to the next
    pub interp_to_next: InterpolationKind,
}

impl ComposedSignalNode {
    /// Create a node
    pub fn new(time_beats: f64, value: f64, interp_to_next: InterpolationKind) -> Self {
        Self {
            time_beats,
            value,
            interp_to_next,
        }
    }
}

/// Sample a composed signal at `time_beats`
///
/// `nodes` must be sorted by `time_beats`. The result is rescaled from [0, 1] to
/// `[value_min, value_max]`; an empty node list yields `value_min`.
///
/// # Example
///
/// ```
/// use stratum_mir::composition::{sample_composed_signal, ComposedSignalNode, InterpolationKind};
///
/// let nodes = [
///     ComposedSignalNode::new(0.0, 0.2, InterpolationKind::Linear),
///     ComposedSignalNode::new(4.0, 0.8, InterpolationKind::Linear),
/// ];
/// assert_eq!(sample_composed_signal(&nodes, -1.0, 0.0, 1.0), 0.2);
/// assert_eq!(sample_composed_signal(&nodes, 10.0, 0.0, 1.0), 0.8);
/// ```
pub fn sample_composed_signal(
    nodes: &[ComposedSignalNode],
    time_beats: f64,
    value_min: f64,
    value_max: f64,
) -> f64 {
    let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
        return value_min;
    };

    let unit = if time_beats <= first.time_beats || nodes.len() == 1 {
        first.value
    } else if time_beats >= last.time_beats {
        last.value
    } else {
        // First node strictly after `time_beats`; always in 1..len here
        let next_idx = nodes.partition_point(|n| n.time_beats <= time_beats);
        let start = &nodes[next_idx - 1];
        let end = &nodes[next_idx];
        let span = end.time_beats - start.time_beats;
        if span <= 0.0 {
            start.value
        } else {
            let t = (time_beats - start.time_beats) / span;
            let eased = apply_easing(t, start.interp_to_next);
            start.value + (end.value - start.value) * eased
        }
    };

    value_min + unit * (value_max - value_min)
}

/// Validated, time-sorted node list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposedSignal {
    nodes: Vec<ComposedSignalNode>,
}

impl ComposedSignal {
    /// Sort and validate nodes
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` for non-finite times, values outside
    /// [0, 1], or two nodes at the same time
    pub fn new(mut nodes: Vec<ComposedSignalNode>) -> Result<Self, AnalysisError> {
        if let Some(node) = nodes
            .iter()
            .find(|n| !n.time_beats.is_finite() || !(0.0..=1.0).contains(&n.value))
        {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid node at {} beats with value {}",
                node.time_beats, node.value
            )));
        }

        nodes.sort_by(|a, b| a.time_beats.total_cmp(&b.time_beats));
        if let Some(pair) = nodes.windows(2).find(|w| w[0].time_beats == w[1].time_beats) {
            return Err(AnalysisError::InvalidInput(format!(
                "Duplicate node time: {} beats",
                pair[0].time_beats
            )));
        }

        Ok(Self { nodes })
    }

    /// Nodes in time order
    pub fn nodes(&self) -> &[ComposedSignalNode] {
        &self.nodes
    }

    /// Sample at `time_beats`, rescaled to `[value_min, value_max]`
    pub fn sample(&self, time_beats: f64, value_min: f64, value_max: f64) -> f64 {
        sample_composed_signal(&self.nodes, time_beats, value_min, value_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_pair() -> Vec<ComposedSignalNode> {
        vec![
            ComposedSignalNode::new(0.0, 0.2, InterpolationKind::Linear),
            ComposedSignalNode::new(4.0, 0.8, InterpolationKind::Linear),
        ]
    }

    #[test]
    fn test_clamp_outside_range() {
        let nodes = linear_pair();
        assert_eq!(sample_composed_signal(&nodes, -1.0, 0.0, 1.0), 0.2);
        assert_eq!(sample_composed_signal(&nodes, 10.0, 0.0, 1.0), 0.8);
    }

    #[test]
    fn test_linear_midpoint_and_rescale() {
        let nodes = linear_pair();
        assert!((sample_composed_signal(&nodes, 2.0, 0.0, 1.0) - 0.5).abs() < 1e-12);
        assert!((sample_composed_signal(&nodes, 2.0, 100.0, 200.0) - 150.0).abs() < 1e-9);
        assert!((sample_composed_signal(&nodes, -5.0, -1.0, 1.0) - (-0.6)).abs() < 1e-12);
    }

    #[test]
    fn test_hold_returns_start_value() {
        let nodes = vec![
            ComposedSignalNode::new(0.0, 0.3, InterpolationKind::Hold),
            ComposedSignalNode::new(2.0, 0.9, InterpolationKind::Linear),
        ];
        for t in [0.001, 0.5, 1.0, 1.999] {
            assert_eq!(sample_composed_signal(&nodes, t, 0.0, 1.0), 0.3);
        }
        assert_eq!(sample_composed_signal(&nodes, 2.0, 0.0, 1.0), 0.9);
    }

    #[test]
    fn test_starting_node_easing_applies() {
        let nodes = vec![
            ComposedSignalNode::new(0.0, 0.0, InterpolationKind::EaseIn),
            ComposedSignalNode::new(1.0, 1.0, InterpolationKind::Hold),
            ComposedSignalNode::new(2.0, 0.0, InterpolationKind::Linear),
        ];
        assert!((sample_composed_signal(&nodes, 0.5, 0.0, 1.0) - 0.25).abs() < 1e-12);
        assert_eq!(sample_composed_signal(&nodes, 1.5, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_empty_and_single_node() {
        assert_eq!(sample_composed_signal(&[], 1.0, 0.25, 1.0), 0.25);
        let single = [ComposedSignalNode::new(3.0, 0.4, InterpolationKind::Linear)];
        assert_eq!(sample_composed_signal(&single, 0.0, 0.0, 1.0), 0.4);
        assert_eq!(sample_composed_signal(&single, 9.0, 0.0, 1.0), 0.4);
    }

    #[test]
    fn test_composed_signal_sorts_and_validates() {
        let mut nodes = linear_pair();
        nodes.reverse();
        let signal = ComposedSignal::new(nodes).unwrap();
        assert_eq!(signal.nodes()[0].time_beats, 0.0);
        assert!((signal.sample(1.0, 0.0, 1.0) - 0.35).abs() < 1e-12);

        let duplicate = vec![
            ComposedSignalNode::new(1.0, 0.1, InterpolationKind::Linear),
            ComposedSignalNode::new(1.0, 0.2, InterpolationKind::Linear),
        ];
        assert!(ComposedSignal::new(duplicate).is_err());

        let out_of_range = vec![ComposedSignalNode::new(0.0, 1.5, InterpolationKind::Linear)];
        assert!(ComposedSignal::new(out_of_range).is_err());
    }
}

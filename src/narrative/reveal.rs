//! Reveal state for timeline nodes.
//!
//! Two channels reveal content. The percentage channel compares scroll
//! progress against a per-node threshold and drives the terminal
//! fully-connected flag. The intersection channel reveals any tagged element
//! once enough of it is visible, independent of progress.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Default progress at which the narrative counts as fully connected.
pub const DEFAULT_CONNECT_THRESHOLD: f64 = 100.0;

/// Lowest accepted fully-connected threshold.
pub const MIN_CONNECT_THRESHOLD: f64 = 95.0;

/// Default visible ratio for the intersection channel.
pub const DEFAULT_INTERSECTION_THRESHOLD: f64 = 0.1;

/// Tuning for both reveal channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealPolicy {
    /// When `true`, progress never decreases and revealed nodes stay
    /// revealed until [`RevealStateMachine::reset`].
    pub one_way: bool,
    /// Progress at or above which the narrative is fully connected.
    pub connect_threshold: f64,
    /// Visible ratio at or above which an element is revealed.
    pub intersection_threshold: f64,
}

impl Default for RevealPolicy {
    fn default() -> Self {
        Self {
            one_way: true,
            connect_threshold: DEFAULT_CONNECT_THRESHOLD,
            intersection_threshold: DEFAULT_INTERSECTION_THRESHOLD,
        }
    }
}

impl RevealPolicy {
    /// Returns the policy with the connect threshold clamped into
    /// `[95, 100]`. Non-finite values fall back to the default.
    #[must_use]
    pub fn with_connect_threshold(mut self, threshold: f64) -> Self {
        self.connect_threshold = if threshold.is_finite() {
            threshold.clamp(MIN_CONNECT_THRESHOLD, DEFAULT_CONNECT_THRESHOLD)
        } else {
            DEFAULT_CONNECT_THRESHOLD
        };
        self
    }

    /// Returns the policy with the intersection threshold clamped into
    /// `[0, 1]`. Non-finite values fall back to the default.
    #[must_use]
    pub fn with_intersection_threshold(mut self, ratio: f64) -> Self {
        self.intersection_threshold = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            DEFAULT_INTERSECTION_THRESHOLD
        };
        self
    }

    /// Returns the policy with re-dormancy enabled or disabled.
    #[must_use]
    pub const fn with_one_way(mut self, one_way: bool) -> Self {
        self.one_way = one_way;
        self
    }
}

/// Reveal state of one timeline node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Not yet shown.
    Dormant,
    /// Shown.
    Revealed,
}

/// Progress threshold for node `index` of `total`.
///
/// Node `i` is revealed once progress is strictly greater than this value.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn node_threshold(index: usize, total: usize) -> f64 {
    if total == 0 {
        return DEFAULT_CONNECT_THRESHOLD;
    }
    index as f64 / total as f64 * 100.0
}

/// Percentage-channel reveal state over an ordered list of nodes.
#[derive(Debug, Clone)]
pub struct RevealStateMachine {
    policy: RevealPolicy,
    progress: f64,
    nodes: Vec<NodeState>,
    fully_connected: bool,
}

impl RevealStateMachine {
    /// Creates a machine with `node_count` dormant nodes at zero progress.
    #[must_use]
    pub fn new(policy: RevealPolicy, node_count: usize) -> Self {
        Self {
            policy,
            progress: 0.0,
            nodes: vec![NodeState::Dormant; node_count],
            fully_connected: false,
        }
    }

    /// Feeds one progress measurement.
    ///
    /// Under the one-way policy the accepted progress is the maximum seen
    /// so far. Non-finite samples are ignored. Returns `true` if any node,
    /// the progress or the fully-connected flag changed.
    pub fn apply_progress(&mut self, sample: f64) -> bool {
        if !sample.is_finite() {
            return false;
        }
        let sample = sample.clamp(0.0, 100.0);
        let next = if self.policy.one_way {
            self.progress.max(sample)
        } else {
            sample
        };
        let moved = (next - self.progress).abs() > f64::EPSILON;
        self.progress = next;
        self.evaluate() || moved
    }

    /// Resizes the node list after events were added or removed.
    ///
    /// New nodes start dormant; every node is then re-evaluated against the
    /// current progress. Under the one-way policy no node is un-revealed.
    pub fn set_node_count(&mut self, node_count: usize) -> bool {
        let resized = node_count != self.nodes.len();
        self.nodes.resize(node_count, NodeState::Dormant);
        self.evaluate() || resized
    }

    /// Returns every node to dormant, progress to zero and clears the
    /// fully-connected flag.
    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.nodes.fill(NodeState::Dormant);
        self.fully_connected = false;
    }

    /// Accepted progress.
    #[must_use]
    pub const fn progress(&self) -> f64 {
        self.progress
    }

    /// State of every node in display order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    /// State of node `index`, if it exists.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<NodeState> {
        self.nodes.get(index).copied()
    }

    /// Number of revealed nodes.
    #[must_use]
    pub fn revealed_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| **n == NodeState::Revealed)
            .count()
    }

    /// Whether the narrative has reached the fully-connected state.
    #[must_use]
    pub const fn is_fully_connected(&self) -> bool {
        self.fully_connected
    }

    /// Policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &RevealPolicy {
        &self.policy
    }

    fn evaluate(&mut self) -> bool {
        let total = self.nodes.len();
        let mut changed = false;
        for (index, node) in self.nodes.iter_mut().enumerate() {
            let next = if self.progress > node_threshold(index, total) {
                NodeState::Revealed
            } else if self.policy.one_way {
                *node
            } else {
                NodeState::Dormant
            };
            if next != *node {
                *node = next;
                changed = true;
            }
        }
        if !self.fully_connected && self.progress >= self.policy.connect_threshold {
            self.fully_connected = true;
            changed = true;
        }
        changed
    }
}

/// Intersection-channel reveal state keyed by element.
///
/// Always one-way: an element stays revealed until [`IntersectionReveal::reset`].
#[derive(Debug, Clone)]
pub struct IntersectionReveal {
    threshold: f64,
    revealed: BTreeSet<String>,
}

impl IntersectionReveal {
    /// Creates an empty tracker with the given visible-ratio threshold.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            revealed: BTreeSet::new(),
        }
    }

    /// Records an intersection reading. Returns `true` if `key` was newly
    /// revealed.
    pub fn observe(&mut self, key: &str, visible_ratio: f64) -> bool {
        if !visible_ratio.is_finite() || visible_ratio < self.threshold {
            return false;
        }
        self.revealed.insert(key.to_string())
    }

    /// Whether `key` has been revealed.
    #[must_use]
    pub fn is_revealed(&self, key: &str) -> bool {
        self.revealed.contains(key)
    }

    /// Revealed keys in sorted order.
    pub fn revealed_keys(&self) -> impl Iterator<Item = &str> {
        self.revealed.iter().map(String::as_str)
    }

    /// Number of revealed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revealed.len()
    }

    /// Whether nothing has been revealed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revealed.is_empty()
    }

    /// Forgets every revealed key.
    pub fn reset(&mut self) {
        self.revealed.clear();
    }
}

use serde::{Deserialize, Serialize};

/// Per-vertex/edge weights and balance targets shared by every back-end (§4.7). Defaults to unit
/// vertex weights, uniform per-part target weights, and an imbalance tolerance of `1.05`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionerConfig {
    /// One weight per locally-known node, in the same order `DistributedGraph::get_local_nodes`
    /// returns them. `None` means unit weight for every node.
    pub vertex_weights: Option<Vec<f64>>,
    /// One weight per local directed edge. `None` means unit weight for every edge.
    pub edge_weights: Option<Vec<f64>>,
    /// Target weight fraction for each part; must sum to (approximately) `1.0`. `None` means
    /// `1/nParts` for every part.
    pub target_part_weights: Option<Vec<f64>>,
    /// Allowed imbalance above a part's target weight, e.g. `1.05` permits 5% over target.
    pub imbalance_tolerance: f64,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            vertex_weights: None,
            edge_weights: None,
            target_part_weights: None,
            imbalance_tolerance: 1.05,
        }
    }
}

impl PartitionerConfig {
    pub fn target_weights(&self, n_parts: usize) -> Vec<f64> {
        self.target_part_weights
            .clone()
            .unwrap_or_else(|| vec![1.0 / n_parts as f64; n_parts])
    }
}

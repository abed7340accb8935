// 🔎 Anomaly Detector
// Applies a pre-trained outlier model to a batch of expense amounts.
//
// The model is trained elsewhere and exported as a JSON artifact; this module
// only loads it once and evaluates it. Two artifact kinds are understood:
//   - isolation_forest: exported trees (flat node arrays), scored with the
//     standard average-path-length rule
//   - mean_threshold:   flags values above `factor` x the batch mean

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Label the model assigns to an outlier
pub const OUTLIER: i8 = -1;
/// Label the model assigns to a normal sample
pub const INLIER: i8 = 1;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const TREE_LEAF: i64 = -1;

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// Opaque pre-trained binary classifier over single-feature samples
pub trait OutlierModel: Send + Sync {
    fn name(&self) -> &str;

    /// One label per sample, `OUTLIER` or `INLIER`
    fn predict(&self, samples: &[[f64; 1]]) -> Vec<i8>;
}

// ============================================================================
// ISOLATION FOREST
// ============================================================================

/// One exported tree. Arrays are indexed by node id; node 0 is the root and
/// leaves have `children_left == children_right == -1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub n_node_samples: Vec<usize>,
}

impl IsolationTree {
    fn validate(&self, index: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err(format!("tree {} has no nodes", index));
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.n_node_samples.len() != n
        {
            return Err(format!("tree {} has mismatched node arrays", index));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == TREE_LEAF && right == TREE_LEAF {
                continue;
            }
            // Children always come after their parent, so traversal terminates
            for child in [left, right] {
                if child <= node as i64 || child as usize >= n {
                    return Err(format!(
                        "tree {} node {} has invalid child {}",
                        index, node, child
                    ));
                }
            }
            if self.feature[node] != 0 {
                return Err(format!(
                    "tree {} node {} splits on feature {}, model must be single-feature",
                    index, node, self.feature[node]
                ));
            }
        }

        Ok(())
    }

    /// Edges from root to leaf plus the expected depth of the leaf's
    /// unsplit remainder
    fn path_length(&self, value: f64) -> f64 {
        let mut node = 0usize;
        let mut depth = 0.0;

        while self.children_left[node] != TREE_LEAF {
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
            depth += 1.0;
        }

        depth + average_path_length(self.n_node_samples[node])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Sub-sample size each tree was grown on
    pub max_samples: usize,

    /// Decision offset; samples with `-score - offset < 0` are outliers
    #[serde(default = "default_offset")]
    pub offset: f64,

    pub estimators: Vec<IsolationTree>,
}

fn default_offset() -> f64 {
    -0.5
}

impl IsolationForest {
    fn validate(&self) -> Result<(), String> {
        if self.estimators.is_empty() {
            return Err("isolation forest has no estimators".to_string());
        }
        if self.max_samples < 2 {
            return Err(format!("max_samples must be >= 2, got {}", self.max_samples));
        }
        for (index, tree) in self.estimators.iter().enumerate() {
            tree.validate(index)?;
        }
        Ok(())
    }

    /// Anomaly score in (0, 1]; values close to 1 are isolated quickly
    pub fn score(&self, value: f64) -> f64 {
        let total: f64 = self
            .estimators
            .iter()
            .map(|tree| tree.path_length(value))
            .sum();
        let mean_depth = total / self.estimators.len() as f64;

        2f64.powf(-mean_depth / average_path_length(self.max_samples))
    }
}

impl OutlierModel for IsolationForest {
    fn name(&self) -> &str {
        "isolation_forest"
    }

    fn predict(&self, samples: &[[f64; 1]]) -> Vec<i8> {
        samples
            .iter()
            .map(|[value]| {
                let decision = -self.score(*value) - self.offset;
                if decision < 0.0 {
                    OUTLIER
                } else {
                    INLIER
                }
            })
            .collect()
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// MEAN THRESHOLD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanThreshold {
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    2.0
}

impl OutlierModel for MeanThreshold {
    fn name(&self) -> &str {
        "mean_threshold"
    }

    fn predict(&self, samples: &[[f64; 1]]) -> Vec<i8> {
        if samples.is_empty() {
            return Vec::new();
        }
        let mean = samples.iter().map(|[v]| v).sum::<f64>() / samples.len() as f64;
        let limit = self.factor * mean;

        samples
            .iter()
            .map(|[v]| if *v > limit { OUTLIER } else { INLIER })
            .collect()
    }
}

// ============================================================================
// ARTIFACT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    IsolationForest(IsolationForest),
    MeanThreshold(MeanThreshold),
}

impl ModelArtifact {
    /// Read and validate a serialized model
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> AppResult<Self> {
        let artifact: ModelArtifact = serde_json::from_str(content)
            .map_err(|e| AppError::ModelUnavailable(format!("cannot parse model artifact: {}", e)))?;

        artifact.validate().map_err(AppError::ModelUnavailable)?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            ModelArtifact::IsolationForest(forest) => forest.validate(),
            ModelArtifact::MeanThreshold(rule) if !rule.factor.is_finite() || rule.factor <= 0.0 => {
                Err(format!("mean_threshold factor must be positive, got {}", rule.factor))
            }
            ModelArtifact::MeanThreshold(_) => Ok(()),
        }
    }

    pub fn into_model(self) -> Arc<dyn OutlierModel> {
        match self {
            ModelArtifact::IsolationForest(forest) => Arc::new(forest),
            ModelArtifact::MeanThreshold(rule) => Arc::new(rule),
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Clone)]
pub struct AnomalyDetector {
    model: Arc<dyn OutlierModel>,
}

impl AnomalyDetector {
    pub fn new(model: Arc<dyn OutlierModel>) -> Self {
        AnomalyDetector { model }
    }

    /// Load the artifact once at startup
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let artifact = ModelArtifact::from_file(path.as_ref())?;
        let detector = AnomalyDetector::new(artifact.into_model());
        info!(
            model = detector.model_name(),
            path = %path.as_ref().display(),
            "anomaly model loaded"
        );
        Ok(detector)
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Input values labelled as outliers, in input order, duplicates kept
    pub fn detect(&self, expenses: &[f64]) -> AppResult<Vec<f64>> {
        if expenses.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(bad) = expenses.iter().find(|v| !v.is_finite()) {
            return Err(AppError::InvalidInput(format!(
                "expense amount {} is not a number",
                bad
            )));
        }

        let samples: Vec<[f64; 1]> = expenses.iter().map(|v| [*v]).collect();
        let labels = self.model.predict(&samples);

        if labels.len() != samples.len() {
            return Err(AppError::ModelUnavailable(format!(
                "model returned {} labels for {} samples",
                labels.len(),
                samples.len()
            )));
        }

        let anomalies: Vec<f64> = expenses
            .iter()
            .zip(labels)
            .filter(|(_, label)| *label == OUTLIER)
            .map(|(value, _)| *value)
            .collect();

        debug!(
            samples = expenses.len(),
            anomalies = anomalies.len(),
            "anomaly scan complete"
        );

        Ok(anomalies)
    }
}

impl std::fmt::Debug for AnomalyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyDetector")
            .field("model", &self.model.name())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

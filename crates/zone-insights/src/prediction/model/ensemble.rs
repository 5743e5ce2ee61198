use serde::{Deserialize, Serialize};

use super::{ModelError, RegressionModel};
use crate::prediction::domain::FEATURE_COUNT;

/// Additive ensemble of regression trees (boosted-tree export format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

/// Flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Samples with `features[feature] < threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

impl TreeEnsemble {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if !self.base_score.is_finite() {
            return Err(ModelError::InvalidArtifact(
                "base_score must be finite".to_string(),
            ));
        }

        for (tree_index, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|reason| ModelError::InvalidArtifact(format!("tree {tree_index}: {reason}")))?;
        }
        Ok(())
    }
}

impl RegressionTree {
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        let node_count = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(format!("node {index} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {index} has a non-finite threshold"));
                    }
                    if *left >= node_count || *right >= node_count {
                        return Err(format!("node {index} points outside the tree"));
                    }
                }
                TreeNode::Leaf { leaf } => {
                    if !leaf.is_finite() {
                        return Err(format!("leaf {index} has a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk is bounded by the node count so a malformed (cyclic) tree
    /// surfaces as an inference error instead of hanging.
    fn evaluate(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        let mut index = 0;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { leaf }) => return Ok(*leaf),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().ok_or_else(|| {
                        ModelError::Inference(format!("feature index {feature} out of range"))
                    })?;
                    index = if value < *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::Inference(format!(
                        "node index {index} out of range"
                    )))
                }
            }
        }

        Err(ModelError::Inference(
            "tree traversal did not reach a leaf".to_string(),
        ))
    }
}

impl RegressionModel for TreeEnsemble {
    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }

    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        self.trees
            .iter()
            .try_fold(self.base_score, |total, tree| {
                tree.evaluate(features).map(|leaf| total + leaf)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::model::ModelArtifact;

    const ARTIFACT: &str = r#"{
        "kind": "tree_ensemble",
        "base_score": 50.0,
        "trees": [
            { "nodes": [
                { "feature": 0, "threshold": 0.04, "left": 1, "right": 2 },
                { "leaf": -5.0 },
                { "leaf": 12.5 }
            ] },
            { "nodes": [
                { "feature": 1, "threshold": 0.015, "left": 1, "right": 2 },
                { "leaf": 8.0 },
                { "feature": 2, "threshold": 0.75, "left": 3, "right": 4 },
                { "leaf": -10.0 },
                { "leaf": 2.0 }
            ] }
        ]
    }"#;

    fn features(growth: f64, crime: f64, infra: f64) -> [f64; FEATURE_COUNT] {
        [growth, crime, infra, 0.6, 4.5, 85000.0, 0.5, 0.5]
    }

    #[test]
    fn ensemble_sums_leaves_over_base_score() {
        let model = ModelArtifact::from_reader(ARTIFACT.as_bytes())
            .expect("parse")
            .into_model()
            .expect("valid ensemble");
        assert_eq!(model.kind(), "tree_ensemble");

        assert_eq!(model.predict(&features(0.05, 0.01, 0.8)).expect("score"), 70.5);
        assert_eq!(model.predict(&features(0.03, 0.02, 0.7)).expect("score"), 35.0);
        assert_eq!(model.predict(&features(0.05, 0.02, 0.8)).expect("score"), 64.5);
    }

    #[test]
    fn validate_rejects_out_of_range_children() {
        let ensemble = TreeEnsemble {
            base_score: 0.0,
            trees: vec![RegressionTree {
                nodes: vec![TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 1,
                    right: 7,
                }],
            }],
        };
        assert!(matches!(
            ensemble.validate(),
            Err(ModelError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn validate_rejects_unknown_feature() {
        let ensemble = TreeEnsemble {
            base_score: 0.0,
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: FEATURE_COUNT,
                        threshold: 1.0,
                        left: 1,
                        right: 1,
                    },
                    TreeNode::Leaf { leaf: 1.0 },
                ],
            }],
        };
        assert!(ensemble.validate().is_err());
    }

    #[test]
    fn cyclic_tree_fails_inference_instead_of_looping() {
        let ensemble = TreeEnsemble {
            base_score: 0.0,
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 1,
                        right: 1,
                    },
                    TreeNode::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 0,
                        right: 0,
                    },
                ],
            }],
        };
        ensemble.validate().expect("indices are in range");
        assert!(matches!(
            ensemble.predict(&features(0.0, 0.0, 0.0)),
            Err(ModelError::Inference(_))
        ));
    }
}

//! Evaluator for models saved with LightGBM's `Booster.save_model` text format.
//!
//! Only numerical splits and constant leaves are supported; the grid models
//! are trained on continuous weather features and lags. Objectives whose
//! output transform is not implemented here are refused at load time.

use std::collections::HashMap;

use crate::error::{GridcastError, Result};

use super::Predictor;

const KZERO_THRESHOLD: f64 = 1e-35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone)]
struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    default_left: Vec<bool>,
    missing_type: Vec<MissingType>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
}

impl Tree {
    fn go_left(&self, node: usize, value: f64) -> bool {
        let missing = self.missing_type[node];
        let value = if value.is_nan() && missing != MissingType::NaN { 0.0 } else { value };

        let is_missing = match missing {
            MissingType::None => false,
            MissingType::Zero => value.abs() <= KZERO_THRESHOLD,
            MissingType::NaN => value.is_nan(),
        };

        if is_missing { self.default_left[node] } else { value <= self.threshold[node] }
    }

    fn predict(&self, features: &[f64]) -> f64 {
        if self.split_feature.is_empty() {
            return self.leaf_value[0];
        }

        let mut node = 0usize;
        loop {
            let value = features[self.split_feature[node]];
            let next =
                if self.go_left(node, value) { self.left_child[node] } else { self.right_child[node] };

            if next < 0 {
                return self.leaf_value[!next as usize];
            }
            node = next as usize;
        }
    }

    fn validate(&self, index: usize, num_features: usize) -> Result<()> {
        let internal = self.split_feature.len();
        let leaves = self.leaf_value.len();

        if leaves != internal + 1 {
            return Err(malformed(format!("tree {index} has {internal} splits but {leaves} leaves")));
        }
        for (name, len) in [
            ("threshold", self.threshold.len()),
            ("decision_type", self.default_left.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ] {
            if internal > 0 && len != internal {
                return Err(malformed(format!(
                    "tree {index}: {name} has {len} entries, expected {internal}"
                )));
            }
        }
        if let Some(f) = self.split_feature.iter().find(|&&f| f >= num_features) {
            return Err(malformed(format!("tree {index} splits on unknown feature index {f}")));
        }

        // Children must point strictly forward so evaluation always terminates.
        for (node, &child) in self.left_child.iter().chain(&self.right_child).enumerate() {
            let node = node % internal.max(1);
            let ok = if child < 0 {
                (!child as usize) < leaves
            } else {
                (child as usize) < internal && child as usize > node
            };
            if !ok {
                return Err(malformed(format!("tree {index} has invalid child index {child}")));
            }
        }
        Ok(())
    }
}

/// How the summed raw score becomes a prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputTransform {
    Identity,
    /// `regression sqrt`: trained on sign(y)·sqrt(|y|).
    SignedSquare,
    Exp,
    Sigmoid(f64),
}

impl OutputTransform {
    fn from_objective(objective: &str) -> Result<Self> {
        let mut parts = objective.split_whitespace();
        let name = parts.next().ok_or_else(|| malformed("empty objective"))?;
        let params: Vec<&str> = parts.collect();

        match name {
            "regression" | "regression_l1" | "huber" | "fair" | "quantile" | "mape" => {
                Ok(if params.contains(&"sqrt") { Self::SignedSquare } else { Self::Identity })
            }
            "poisson" | "gamma" | "tweedie" => Ok(Self::Exp),
            "binary" => {
                let sigmoid = params
                    .iter()
                    .find_map(|p| p.strip_prefix("sigmoid:"))
                    .map(|v| v.parse::<f64>())
                    .transpose()
                    .map_err(|_| malformed(format!("bad sigmoid parameter in '{objective}'")))?
                    .unwrap_or(1.0);
                Ok(Self::Sigmoid(sigmoid))
            }
            "cross_entropy" | "xentropy" => Ok(Self::Sigmoid(1.0)),
            other => Err(malformed(format!("unsupported objective '{other}'"))),
        }
    }

    fn apply(self, raw: f64) -> f64 {
        match self {
            Self::Identity => raw,
            Self::SignedSquare => raw.signum() * raw * raw,
            Self::Exp => raw.exp(),
            Self::Sigmoid(k) => 1.0 / (1.0 + (-k * raw).exp()),
        }
    }
}

/// Gradient-boosted regression trees loaded from a LightGBM text dump.
#[derive(Debug, Clone)]
pub struct LightGbmModel {
    feature_names: Vec<String>,
    trees: Vec<Tree>,
    /// Random-forest boosting: the score is the mean of the trees, not their sum.
    average_output: bool,
    transform: OutputTransform,
}

impl LightGbmModel {
    pub fn parse(text: &str) -> Result<Self> {
        let mut header: HashMap<&str, &str> = HashMap::new();
        let mut average_output = false;
        let mut blocks: Vec<HashMap<&str, &str>> = Vec::new();

        for line in text.lines().map(str::trim) {
            if line == "end of trees" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            if line.starts_with("Tree=") {
                blocks.push(HashMap::new());
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                match blocks.last_mut() {
                    Some(block) => block.insert(key, value),
                    None => header.insert(key, value),
                };
            } else if blocks.is_empty() && line == "average_output" {
                average_output = true;
            }
        }

        let feature_names: Vec<String> = header
            .get("feature_names")
            .ok_or_else(|| malformed("missing feature_names header"))?
            .split_whitespace()
            .map(str::to_string)
            .collect();

        if let Some(n) = header.get("num_class") {
            if n.trim() != "1" {
                return Err(malformed(format!("expected a single-output model, found num_class={n}")));
            }
        }

        let transform = OutputTransform::from_objective(
            header.get("objective").ok_or_else(|| malformed("missing objective header"))?,
        )?;

        if blocks.is_empty() {
            return Err(malformed("model contains no trees"));
        }

        let trees = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let tree = parse_tree(i, block)?;
                tree.validate(i, feature_names.len())?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { feature_names, trees, average_output, transform })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for LightGbmModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_names.len() {
            return Err(GridcastError::ModelInvocation(format!(
                "feature vector has {} values, model expects {}",
                features.len(),
                self.feature_names.len()
            )));
        }

        let mut raw: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        if self.average_output {
            raw /= self.trees.len() as f64;
        }
        Ok(self.transform.apply(raw))
    }
}

fn parse_tree(index: usize, block: &HashMap<&str, &str>) -> Result<Tree> {
    let num_leaves: usize = field(index, block, "num_leaves")?
        .trim()
        .parse()
        .map_err(|_| malformed(format!("tree {index}: bad num_leaves")))?;

    if block.get("num_cat").is_some_and(|n| n.trim() != "0") {
        return Err(malformed(format!("tree {index} uses categorical splits, which are unsupported")));
    }
    if block.get("is_linear").is_some_and(|n| n.trim() != "0") {
        return Err(malformed(format!("tree {index} has linear leaves, which are unsupported")));
    }

    let leaf_value: Vec<f64> = parse_list(index, block, "leaf_value")?;
    if leaf_value.len() != num_leaves {
        return Err(malformed(format!(
            "tree {index}: num_leaves={num_leaves} but {} leaf values",
            leaf_value.len()
        )));
    }

    if num_leaves == 1 {
        return Ok(Tree {
            split_feature: Vec::new(),
            threshold: Vec::new(),
            default_left: Vec::new(),
            missing_type: Vec::new(),
            left_child: Vec::new(),
            right_child: Vec::new(),
            leaf_value,
        });
    }

    let decision_type: Vec<u32> = parse_list(index, block, "decision_type")?;
    if decision_type.iter().any(|d| d & 1 != 0) {
        return Err(malformed(format!("tree {index} uses categorical splits, which are unsupported")));
    }

    Ok(Tree {
        split_feature: parse_list(index, block, "split_feature")?,
        threshold: parse_list(index, block, "threshold")?,
        default_left: decision_type.iter().map(|d| d & 2 != 0).collect(),
        missing_type: decision_type
            .iter()
            .map(|d| match (d >> 2) & 3 {
                1 => MissingType::Zero,
                2 => MissingType::NaN,
                _ => MissingType::None,
            })
            .collect(),
        left_child: parse_list(index, block, "left_child")?,
        right_child: parse_list(index, block, "right_child")?,
        leaf_value,
    })
}

fn field<'a>(index: usize, block: &HashMap<&str, &'a str>, key: &str) -> Result<&'a str> {
    block.get(key).copied().ok_or_else(|| malformed(format!("tree {index} is missing '{key}'")))
}

fn parse_list<T: std::str::FromStr>(
    index: usize,
    block: &HashMap<&str, &str>,
    key: &str,
) -> Result<Vec<T>> {
    field(index, block, key)?
        .split_whitespace()
        .map(|tok| {
            tok.parse::<T>()
                .map_err(|_| malformed(format!("tree {index}: cannot parse '{tok}' in '{key}'")))
        })
        .collect()
}

fn malformed(msg: impl Into<String>) -> GridcastError {
    GridcastError::ModelInvocation(format!("malformed LightGBM model: {}", msg.into()))
}

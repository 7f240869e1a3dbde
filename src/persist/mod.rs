//! On-disk artifacts for the model and the encoder.
//!
//! Both artifacts are JSON documents wrapped in a version-tagged enum, so a
//! future layout change can add a `V2` arm and keep loading old files. The
//! in-memory types never derive `Serialize` directly; the payload structs
//! here mirror them field by field, which keeps the file format decoupled
//! from refactors of the runtime representation.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};
use crate::processing::EncodingState;
use crate::repr::{Forest, Tree};
use crate::training::GbrtParams;

// ============================================================================
// Payloads
// ============================================================================

/// One decision tree as parallel arrays, matching the in-memory layout.
#[derive(Debug, Serialize, Deserialize)]
struct TreePayload {
    split_features: Vec<u32>,
    thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
    gains: Vec<f32>,
}

impl TreePayload {
    fn from_tree(tree: &Tree) -> Self {
        Self {
            split_features: tree.split_features_raw().to_vec(),
            thresholds: tree.thresholds_raw().to_vec(),
            left_children: tree.left_children_raw().to_vec(),
            right_children: tree.right_children_raw().to_vec(),
            is_leaf: tree.is_leaf_raw().to_vec(),
            leaf_values: tree.leaf_values_raw().to_vec(),
            gains: tree.gains_raw().to_vec(),
        }
    }

    fn into_tree(self) -> Tree {
        Tree::from_arrays(
            self.split_features,
            self.thresholds,
            self.left_children,
            self.right_children,
            self.is_leaf,
            self.leaf_values,
            self.gains,
        )
    }
}

/// Versioned model file.
#[derive(Debug, Serialize, Deserialize)]
enum ModelArtifact {
    V1 {
        n_features: usize,
        base_score: f32,
        params: GbrtParams,
        trees: Vec<TreePayload>,
    },
}

/// Versioned encoder file.
#[derive(Debug, Serialize, Deserialize)]
enum ProcessorArtifact {
    V1(EncodingState),
}

// ============================================================================
// Model
// ============================================================================

pub fn save_model(path: impl AsRef<Path>, forest: &Forest, params: &GbrtParams) -> Result<()> {
    let artifact = ModelArtifact::V1 {
        n_features: forest.n_features(),
        base_score: forest.base_score(),
        params: params.clone(),
        trees: forest.trees().iter().map(TreePayload::from_tree).collect(),
    };
    write_json(path.as_ref(), &artifact)
}

/// Load a model and the parameters it was trained with.
pub fn load_model(path: impl AsRef<Path>) -> Result<(Forest, GbrtParams)> {
    let path = path.as_ref();
    let artifact: ModelArtifact = read_json(path)?;
    match artifact {
        ModelArtifact::V1 {
            n_features,
            base_score,
            params,
            trees,
        } => {
            let trees = trees.into_iter().map(TreePayload::into_tree).collect();
            Ok((Forest::from_parts(base_score, n_features, trees), params))
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

pub fn save_processor(path: impl AsRef<Path>, state: &EncodingState) -> Result<()> {
    write_json(path.as_ref(), &ProcessorArtifact::V1(state.clone()))
}

pub fn load_processor(path: impl AsRef<Path>) -> Result<EncodingState> {
    let artifact: ProcessorArtifact = read_json(path.as_ref())?;
    match artifact {
        ProcessorArtifact::V1(state) => Ok(state),
    }
}

// ============================================================================
// IO helpers
// ============================================================================

/// Write to a sibling temp file, then rename into place. A failed write
/// never clobbers an existing artifact.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp).map_err(|e| ValuationError::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| ValuationError::persistence(path, e))?;
    writer
        .flush()
        .map_err(|e| ValuationError::persistence(path, e))?;
    drop(writer);
    fs::rename(&tmp, path).map_err(|e| ValuationError::persistence(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| ValuationError::persistence(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ValuationError::persistence(path, e))
}

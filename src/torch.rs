//! Code for loading and running (trained) TorchScript classifiers, and for
//! turning their raw scores into ranked labels

use crate::vision::ModelInput;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;
use tch::vision::imagenet;
use tch::{no_grad, Kind, Tensor};
use thiserror::Error;
use tracing::debug;

/// Inference failed after the image was decoded and preprocessed
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("unexpected model output: {0}")]
    Output(String),

    #[error("model produced {scores} scores but {labels} labels are loaded")]
    LabelMismatch { scores: usize, labels: usize },
}

/// Anything that maps a preprocessed image to one score per class
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn classify(&self, input: &ModelInput) -> Result<Vec<f32>, InferenceError>;
}

/// A class prediction outputted by a classifier model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub prediction: f32,
}

/// Human readable class names, indexed by class id
#[derive(Debug, Clone)]
pub struct Labels(Vec<String>);

impl Labels {
    pub fn new(labels: Vec<String>) -> Self {
        Labels(labels)
    }

    /// The 1000 ImageNet classes, keeping the first synonym of each entry
    pub fn imagenet() -> Self {
        Labels(
            imagenet::CLASSES
                .iter()
                .map(|c| c.split(',').next().unwrap_or_default().trim().to_string())
                .collect(),
        )
    }

    /// Read one label per line, skipping blank lines
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Labels(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, class: usize) -> Option<&str> {
        self.0.get(class).map(String::as_str)
    }
}

/// Pick the `k` highest scores, best first. Ties go to the lower class id and
/// NaN scores sort last
pub fn top_k(scores: &[f32], labels: &Labels, k: usize) -> Result<Vec<Prediction>, InferenceError> {
    if scores.len() != labels.len() {
        return Err(InferenceError::LabelMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }

    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| match (a.is_nan(), b.is_nan()) {
        (true, true) => ia.cmp(ib),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(a).then(ia.cmp(ib)),
    });

    Ok(ranked
        .into_iter()
        .take(k)
        .filter_map(|(class, prediction)| {
            labels.get(class).map(|label| Prediction {
                label: label.to_string(),
                prediction,
            })
        })
        .collect())
}

/// A loaded TorchScript model, run on the CPU
#[derive(Debug)]
pub struct TorchModel {
    /// The loaded torch model
    model: tch::jit::CModule,

    /// Whether to softmax the output (for models that emit logits)
    softmax: bool,
}

impl TorchModel {
    pub fn new(filename: impl AsRef<Path>, softmax: bool) -> Result<Self, InferenceError> {
        Ok(TorchModel {
            model: tch::CModule::load(filename)?,
            softmax,
        })
    }
}

impl Classifier for TorchModel {
    fn classify(&self, input: &ModelInput) -> Result<Vec<f32>, InferenceError> {
        let tensor = Tensor::from_slice(&input.data).view(input.shape);
        let output = no_grad(|| self.model.forward_ts(&[tensor]))?;
        let output = if self.softmax {
            output.softmax(-1, Some(Kind::Float))
        } else {
            output.to_kind(Kind::Float)
        };

        let size = output.size();
        debug!("model output shape {size:?}");
        // a single image batch: [1, classes] or [classes]
        let classes = match size.as_slice() {
            [1, n] | [n] => *n,
            other => {
                return Err(InferenceError::Output(format!(
                    "expected a single row of scores, got shape {other:?}"
                )))
            }
        };
        if classes == 0 {
            return Err(InferenceError::Output("empty score vector".into()));
        }

        Ok(Vec::<f32>::try_from(output.flatten(0, -1))?)
    }
}

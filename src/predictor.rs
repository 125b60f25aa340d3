//! The `predict` pipeline: base 64 in, ranked labels out

use crate::torch::{top_k, Classifier, InferenceError, Labels, Prediction};
use crate::vision::{self, DecodeError, DecodedFrame, PreprocessError, Preprocessing, TensorLayout};
use thiserror::Error;
use tracing::debug;

/// Pick `TOP_N` largest probabilities by default
pub const TOP_N: usize = 5;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// A loaded classifier plus everything needed to feed it. Built once at
/// startup and only read afterwards
#[derive(Debug)]
pub struct Predictor {
    classifier: Box<dyn Classifier>,
    labels: Labels,
    top_n: usize,
    preprocessing: Preprocessing,
    layout: TensorLayout,
}

impl Predictor {
    pub fn new(
        classifier: Box<dyn Classifier>,
        labels: Labels,
        preprocessing: Preprocessing,
        layout: TensorLayout,
    ) -> Self {
        Predictor {
            classifier,
            labels,
            top_n: TOP_N,
            preprocessing,
            layout,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Run image classification on a base 64 encoded image
    pub fn predict(&self, image: &str) -> Result<Vec<Prediction>, PredictError> {
        let decoded = vision::decode_base64(image)?;
        let frame = DecodedFrame::from_image(&decoded)?;
        let input = frame.to_input(self.preprocessing, self.layout);
        let scores = self.classifier.classify(&input)?;
        let predictions = top_k(&scores, &self.labels, self.top_n)?;
        debug!("predicted {predictions:?}");
        Ok(predictions)
    }
}

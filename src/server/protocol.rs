use crate::torch::Prediction;
use serde::{Deserialize, Serialize};

/// Body of an inference request: a base 64 encoded image
#[derive(Deserialize)]
pub struct PredictRequest {
    pub image: String,
}

impl std::fmt::Debug for PredictRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PredictRequest {{ image: <{} bytes> }}", self.image.len())
    }
}

/// Either the ranked predictions or an error flag, never both
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Predictions { predictions: Vec<Prediction> },
    Error { error: bool },
}

impl ResponseEnvelope {
    pub fn error() -> Self {
        ResponseEnvelope::Error { error: true }
    }
}

impl From<Vec<Prediction>> for ResponseEnvelope {
    fn from(predictions: Vec<Prediction>) -> Self {
        ResponseEnvelope::Predictions { predictions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let ok = ResponseEnvelope::from(vec![Prediction {
            label: "tabby".into(),
            prediction: 0.5,
        }]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"predictions": [{"label": "tabby", "prediction": 0.5}]})
        );
        assert_eq!(
            serde_json::to_value(ResponseEnvelope::error()).unwrap(),
            json!({"error": true})
        );
    }

    #[test]
    fn test_request_debug_hides_payload() {
        let req: PredictRequest = serde_json::from_str(r#"{"image": "aGVsbG8="}"#).unwrap();
        assert_eq!(format!("{req:?}"), "PredictRequest { image: <8 bytes> }");
    }
}

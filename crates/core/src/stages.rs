use crate::stage::{InputSlot, OutputSlot, StageUnit};
use crate::types::{ContentType, ParameterType};

/// Pulls the transaction table from the datastore
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchData;

impl StageUnit for FetchData {
    fn operation(&self) -> &str {
        "fetch_transactionsdb_data"
    }

    fn description(&self) -> Option<&str> {
        Some("Fetch transactions from the datastore")
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::parameter("datastore", ParameterType::Object)]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("dataset", ContentType::Dataset)]
    }
}

/// Checks the raw dataset against its expected schema
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateData;

impl StageUnit for ValidateData {
    fn operation(&self) -> &str {
        "validate_transactiondb_data"
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::artifact("dataset", ContentType::Dataset)]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        Vec::new()
    }
}

/// Splits, scales and weights the dataset for training
#[derive(Debug, Clone, Copy, Default)]
pub struct PreprocessData;

impl StageUnit for PreprocessData {
    fn operation(&self) -> &str {
        "preprocess_transactiondb_data"
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::artifact("in_data", ContentType::Dataset)]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        vec![
            OutputSlot::new("train_data", ContentType::Dataset),
            OutputSlot::new("val_data", ContentType::Dataset),
            OutputSlot::new("test_data", ContentType::Dataset),
            OutputSlot::new("scaler", ContentType::Scaler),
            OutputSlot::new("class_weights", ContentType::ClassWeights),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrainModel;

impl StageUnit for TrainModel {
    fn operation(&self) -> &str {
        "train_fraud_model"
    }

    fn description(&self) -> Option<&str> {
        Some("Train the fraud detection model")
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![
            InputSlot::artifact("train_data", ContentType::Dataset),
            InputSlot::artifact("val_data", ContentType::Dataset),
            InputSlot::artifact("scaler", ContentType::Scaler),
            InputSlot::artifact("class_weights", ContentType::ClassWeights),
            InputSlot::parameter("hyperparameters", ParameterType::Object),
        ]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("trained_model", ContentType::Model)]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertToOnnx;

impl StageUnit for ConvertToOnnx {
    fn operation(&self) -> &str {
        "convert_keras_to_onnx"
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![InputSlot::artifact("keras_model", ContentType::Model)]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("onnx_model", ContentType::OnnxModel)]
    }
}

/// Scores the trained model against the test split and a previous baseline
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateModel;

impl StageUnit for EvaluateModel {
    fn operation(&self) -> &str {
        "evaluate_keras_model_performance"
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![
            InputSlot::artifact("model", ContentType::Model),
            InputSlot::artifact("test_data", ContentType::Dataset),
            InputSlot::artifact("scaler", ContentType::Scaler),
            InputSlot::parameter("previous_model_metrics", ParameterType::Object),
        ]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("metrics", ContentType::Metrics)]
    }
}

/// Checks that the converted model agrees with the Keras model on the test split
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOnnx;

impl StageUnit for ValidateOnnx {
    fn operation(&self) -> &str {
        "validate_onnx_model"
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![
            InputSlot::artifact("keras_model", ContentType::Model),
            InputSlot::artifact("onnx_model", ContentType::OnnxModel),
            InputSlot::artifact("test_data", ContentType::Dataset),
        ]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        vec![OutputSlot::new("metrics", ContentType::Metrics)]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PushToRegistry;

impl StageUnit for PushToRegistry {
    fn operation(&self) -> &str {
        "push_to_model_registry"
    }

    fn description(&self) -> Option<&str> {
        Some("Publish the converted model to the model registry")
    }

    fn declare_inputs(&self) -> Vec<InputSlot> {
        vec![
            InputSlot::parameter("version", ParameterType::String),
            InputSlot::artifact("model", ContentType::OnnxModel),
        ]
    }

    fn declare_outputs(&self) -> Vec<OutputSlot> {
        Vec::new()
    }
}

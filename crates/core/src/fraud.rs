use crate::error::Result;
use crate::params::{ParameterSet, ParameterSpec};
use crate::pipeline::{PipelineBuilder, PipelineGraph};
use crate::secrets::SecretBinding;
use crate::stage::InputBinding;
use crate::stages::{
    ConvertToOnnx, EvaluateModel, FetchData, PreprocessData, PushToRegistry, TrainModel,
    ValidateData, ValidateOnnx,
};
use crate::types::ParameterType;
use serde_json::json;

pub const PIPELINE_NAME: &str = "fraud-detection-training-pipeline";
pub const PIPELINE_DESCRIPTION: &str = "Trains the fraud detection model.";

/// Node that publishes the model and receives the registry credentials
pub const REGISTER_STAGE: &str = "register";

pub const DEFAULT_REGISTRY_SECRET: &str = "aws-connection-models";

/// Keys of the registry connection secret, each exposed under its own name
pub const REGISTRY_SECRET_KEYS: [&str; 4] = [
    "AWS_S3_ENDPOINT",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_S3_BUCKET",
];

/// Parameters the pipeline declares.
///
/// `previous_model_metrics` is the baseline the evaluation stage compares
/// against; it defaults to a fixed accuracy bar and can be overridden per run.
pub fn parameters() -> Result<ParameterSet> {
    ParameterSet::new()
        .with(
            ParameterSpec::required("datastore", ParameterType::Object)
                .description("Location of the transactions table"),
        )?
        .with(ParameterSpec::required("hyperparameters", ParameterType::Object))?
        .with(
            ParameterSpec::required("version", ParameterType::String)
                .description("Version the model is published under"),
        )?
        .with(ParameterSpec::with_default(
            "previous_model_metrics",
            ParameterType::Object,
            json!({"accuracy": 0.85}),
        ))
}

/// Wire the eight training stages into a graph
pub fn fraud_training_pipeline(parameters: ParameterSet) -> Result<PipelineGraph> {
    let mut builder =
        PipelineBuilder::new(PIPELINE_NAME, parameters).description(PIPELINE_DESCRIPTION);

    let fetch = builder.add_stage(
        "fetch",
        &FetchData,
        [("datastore", InputBinding::parameter("datastore"))],
    );
    let dataset: InputBinding = fetch.output("dataset")?.into();

    builder.add_stage("validate", &ValidateData, [("dataset", dataset.clone())]);

    let preprocess = builder.add_stage("preprocess", &PreprocessData, [("in_data", dataset)]);
    let test_data: InputBinding = preprocess.output("test_data")?.into();
    let scaler: InputBinding = preprocess.output("scaler")?.into();

    let train = builder.add_stage(
        "train",
        &TrainModel,
        [
            ("train_data", preprocess.output("train_data")?.into()),
            ("val_data", preprocess.output("val_data")?.into()),
            ("scaler", scaler.clone()),
            ("class_weights", preprocess.output("class_weights")?.into()),
            ("hyperparameters", InputBinding::parameter("hyperparameters")),
        ],
    );
    let trained_model: InputBinding = train.output("trained_model")?.into();

    let convert = builder.add_stage(
        "convert",
        &ConvertToOnnx,
        [("keras_model", trained_model.clone())],
    );
    let onnx_model: InputBinding = convert.output("onnx_model")?.into();

    builder.add_stage(
        "evaluate",
        &EvaluateModel,
        [
            ("model", trained_model.clone()),
            ("test_data", test_data.clone()),
            ("scaler", scaler),
            (
                "previous_model_metrics",
                InputBinding::parameter("previous_model_metrics"),
            ),
        ],
    );

    builder.add_stage(
        "validate_onnx",
        &ValidateOnnx,
        [
            ("keras_model", trained_model),
            ("onnx_model", onnx_model.clone()),
            ("test_data", test_data),
        ],
    );

    builder.add_stage(
        REGISTER_STAGE,
        &PushToRegistry,
        [
            ("version", InputBinding::parameter("version")),
            ("model", onnx_model),
        ],
    );

    builder.build()
}

/// Registry connection secret with every key exposed under its own name
pub fn registry_secret(secret_name: impl Into<String>) -> SecretBinding {
    SecretBinding::identity(secret_name, REGISTRY_SECRET_KEYS)
}

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing '{0}' field")]
    MissingField(&'static str),

    #[error("No reference_*.wav files found in {0}")]
    NoReferences(String),

    #[error("Engine init failed: {0}")]
    EngineError(String),

    #[error("Synthesis failed: {0}")]
    SynthesisError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

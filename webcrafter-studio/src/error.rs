use thiserror::Error;
use webcrafter_core::PlaygroundError;

pub type StudioResult<T> = Result<T, StudioError>;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error(transparent)]
    Playground(#[from] PlaygroundError),

    // --- gateway errors ---

    #[error("OPENROUTER_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model {model} returned status {status}: {body}")]
    ModelStatus {
        model: String,
        status: u16,
        body: String,
    },

    #[error("Model {model} returned no choices")]
    NoChoices { model: String },

    #[error("All models failed. Last error: {last}")]
    AllModelsFailed { last: String },

    #[error("A {0} request is already running")]
    SlotBusy(&'static str),

    #[error("Request task failed: {0}")]
    TaskFailed(String),

    // --- config / io errors ---

    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- session errors ---

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

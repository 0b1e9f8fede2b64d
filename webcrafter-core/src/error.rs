use thiserror::Error;

use crate::bundle::Language;

pub type PlaygroundResult<T> = Result<T, PlaygroundError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaygroundError {
    // --- editor widget errors ---

    #[error("Editor widget is unavailable: {0}")]
    WidgetUnavailable(String),

    #[error("Unknown editor buffer #{id}")]
    UnknownBuffer { id: u64 },

    #[error("Unknown editor instance #{id}")]
    UnknownInstance { id: u64 },

    #[error("Position {line}:{column} is outside the buffer")]
    PositionOutOfRange { line: usize, column: usize },

    #[error("Editor resource #{id} was already disposed")]
    AlreadyDisposed { id: u64 },

    // --- drag and drop errors ---

    #[error("Drag payload is missing")]
    MissingDragPayload,

    #[error("Malformed drag payload: {0}")]
    MalformedDragPayload(String),

    // --- persistence errors ---

    #[error("Key-value store error: {0}")]
    Store(String),

    #[error("Saved project is corrupt: {0}")]
    CorruptSnapshot(String),

    // --- gateway result errors ---

    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("AI returned empty content")]
    EmptyResult,

    #[error("AI returned content that is too short for {language} ({len} chars, minimum {min})")]
    ResultTooShort {
        language: Language,
        len: usize,
        min: usize,
    },

    #[error("AI returned HTML instead of {language}")]
    UnexpectedMarkup { language: Language },

    #[error("AI response doesn't appear to be valid {language}")]
    NotCode { language: Language },

    #[error("AI response appears to be an error message rather than HTML")]
    ApologyInsteadOfHtml,

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),
}

impl From<serde_json::Error> for PlaygroundError {
    fn from(err: serde_json::Error) -> Self {
        PlaygroundError::MalformedResponse(err.to_string())
    }
}

//! Boundary to the third-party code editing widget and the adapter that keeps
//! its per-language buffers in step with the Code Bundle.

pub mod adapter;
pub mod headless;
pub mod loader;

use crate::error::PlaygroundResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use adapter::{DropOutcome, EditorAdapter};
pub use headless::{HeadlessModule, HeadlessWidget};
pub use loader::{global_loader, WidgetLoader, WidgetModule};

/// Handle to a widget-owned text buffer ("model").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Handle to a live widget view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

/// 1-based line and column, columns counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Zero-width range at `at`, used for insertions.
    pub fn collapsed(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorTheme {
    Light,
    #[default]
    Dark,
}

impl EditorTheme {
    /// Theme name the widget understands.
    pub fn widget_name(&self) -> &'static str {
        match self {
            EditorTheme::Light => "vs",
            EditorTheme::Dark => "vs-dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            EditorTheme::Light => EditorTheme::Dark,
            EditorTheme::Dark => EditorTheme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditorTheme::Light => "light",
            EditorTheme::Dark => "dark",
        }
    }
}

impl FromStr for EditorTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "vs" => Ok(EditorTheme::Light),
            "dark" | "vs-dark" => Ok(EditorTheme::Dark),
            other => Err(format!("unknown theme '{}': expected light or dark", other)),
        }
    }
}

/// Construction options passed to the widget instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorOptions {
    pub automatic_layout: bool,
    pub minimap: bool,
    pub font_family: String,
    pub word_wrap: bool,
    pub padding_top: u32,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            automatic_layout: true,
            minimap: true,
            font_family: "Fira Code, Menlo, Monaco, Courier New, monospace".to_string(),
            word_wrap: true,
            padding_top: 10,
        }
    }
}

/// Called with the buffer's full text after every content change.
pub type ChangeListener = Box<dyn FnMut(&str) + Send>;

/// What the adapter needs from the editing widget.
///
/// Implementations own all buffers and instances they hand out; ids become
/// invalid once disposed.
pub trait EditorWidget: Send {
    fn create_buffer(&mut self, content: &str, language: &str) -> PlaygroundResult<BufferId>;

    fn on_content_change(&mut self, buffer: BufferId, listener: ChangeListener) -> PlaygroundResult<()>;

    fn create_instance(
        &mut self,
        container: &str,
        model: BufferId,
        theme: EditorTheme,
        options: &EditorOptions,
    ) -> PlaygroundResult<InstanceId>;

    fn set_model(&mut self, instance: InstanceId, buffer: BufferId) -> PlaygroundResult<()>;

    fn set_theme(&mut self, theme: EditorTheme);

    fn get_value(&self, buffer: BufferId) -> PlaygroundResult<String>;

    /// Replaces the whole buffer text; fires change listeners when it differs.
    fn set_value(&mut self, buffer: BufferId, text: &str) -> PlaygroundResult<()>;

    fn get_selection(&self, instance: InstanceId) -> PlaygroundResult<Option<TextRange>>;

    fn set_selection(&mut self, instance: InstanceId, selection: Option<TextRange>) -> PlaygroundResult<()>;

    fn get_value_in_range(&self, buffer: BufferId, range: TextRange) -> PlaygroundResult<String>;

    /// Applies `text` over `range` in the instance's current buffer.
    fn execute_edit(&mut self, instance: InstanceId, range: TextRange, text: &str) -> PlaygroundResult<()>;

    /// Maps client coordinates to a text position, or None outside any line.
    fn resolve_position(&self, instance: InstanceId, x: f64, y: f64) -> Option<Position>;

    fn focus(&mut self, instance: InstanceId);

    fn dispose_instance(&mut self, instance: InstanceId) -> PlaygroundResult<()>;

    fn dispose_buffer(&mut self, buffer: BufferId) -> PlaygroundResult<()>;
}

//! Drag-and-drop of snippets from the palette into the editor.

use crate::error::{PlaygroundError, PlaygroundResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Private transfer type the palette writes its payload under.
pub const SNIPPET_MIME: &str = "application/x-webcrafter-snippet";

/// Platform drag transfer data: format string → payload string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragData {
    items: HashMap<String, String>,
}

impl DragData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, format: &str, data: impl Into<String>) {
        self.items.insert(format.to_string(), data.into());
    }

    /// Empty string when the format is absent, like the browser API.
    pub fn get_data(&self, format: &str) -> &str {
        self.items.get(format).map(|s| s.as_str()).unwrap_or("")
    }
}

/// What a palette entry carries across a drag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload {
    pub snippet: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl DragPayload {
    pub fn new(snippet: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            snippet: snippet.into(),
            kind: kind.into(),
        }
    }

    pub fn write_to(&self, data: &mut DragData) -> PlaygroundResult<()> {
        let raw = serde_json::to_string(self)
            .map_err(|e| PlaygroundError::MalformedDragPayload(e.to_string()))?;
        data.set_data(SNIPPET_MIME, raw);
        Ok(())
    }

    /// Reads the payload back; unrelated drags have no payload under our type.
    pub fn read_from(data: &DragData) -> PlaygroundResult<Self> {
        let raw = data.get_data(SNIPPET_MIME);
        if raw.is_empty() {
            return Err(PlaygroundError::MissingDragPayload);
        }
        serde_json::from_str(raw).map_err(|e| PlaygroundError::MalformedDragPayload(e.to_string()))
    }
}

/// A draggable snippet in the palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub snippet: String,
    #[serde(rename = "iconName", default)]
    pub icon: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Presentation only: set between drag start and drag end.
    #[serde(skip)]
    pub dragging: bool,
}

impl PaletteEntry {
    pub fn new(kind: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            snippet: snippet.into(),
            icon: String::new(),
            tags: Vec::new(),
            dragging: false,
        }
    }

    pub fn payload(&self) -> DragPayload {
        DragPayload::new(self.snippet.clone(), self.kind.clone())
    }

    pub fn drag_start(&mut self, data: &mut DragData) -> PlaygroundResult<()> {
        self.payload().write_to(data)?;
        self.dragging = true;
        Ok(())
    }

    pub fn drag_end(&mut self) {
        self.dragging = false;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

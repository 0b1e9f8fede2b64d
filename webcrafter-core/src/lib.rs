//! # WebCrafter Playground Core
//!
//! The state pipeline behind the WebCrafter editor: a three-file Code Bundle
//! edited through per-language buffers and mirrored into a sandboxed live
//! preview, with debounced undo/redo history and autosave.
//!
//! ## Features
//! - Shared Code Bundle with change origins and echo suppression
//! - Editor adapter over a pluggable widget (a headless one is included)
//! - Preview documents assembled from html/css/js with external references stripped
//! - Bounded, debounced, linear history
//! - Autosave to a key/value store (in-memory or JSON file)
//! - Palette drag-and-drop insertion
//! - Splitting and validating gateway responses
//!
//! ## Example
//! ```ignore
//! use webcrafter_core::{assemble_preview, CodeBundle};
//!
//! let bundle = CodeBundle::new("<h1>Hello</h1>", "h1 { color: teal; }", "console.log('hi')");
//! let document = assemble_preview(&bundle);
//! assert!(document.contains("/* User CSS */"));
//! ```
//!
//! ## Example: a session
//! ```ignore
//! use std::time::Instant;
//! use webcrafter_core::{CodeBundle, HeadlessModule, MemoryStore, Playground, PlaygroundSettings};
//!
//! let mut pg = Playground::open(
//!     MemoryStore::new(),
//!     Some(&HeadlessModule),
//!     CodeBundle::new("<p>draft</p>", "", ""),
//!     &PlaygroundSettings::default(),
//! );
//! pg.type_text("<p>final</p>", Instant::now());
//! if let Some(deadline) = pg.next_deadline() {
//!     pg.tick(deadline);
//! }
//! ```

pub mod bundle;
pub mod debounce;
pub mod dnd;
pub mod editor;
pub mod error;
pub mod history;
pub mod partition;
pub mod persistence;
pub mod playground;
pub mod preview;

// --- Core types ---
pub use bundle::{ChangeOrigin, CodeBundle, Language, SharedBundle};
pub use error::{PlaygroundError, PlaygroundResult};
pub use playground::{Playground, PlaygroundSettings, TickOutcome};

// --- Components ---
pub use debounce::Debouncer;
pub use dnd::{DragData, DragPayload, PaletteEntry, SNIPPET_MIME};
pub use editor::{
    global_loader, DropOutcome, EditorAdapter, EditorOptions, EditorTheme, EditorWidget,
    HeadlessModule, HeadlessWidget, Position, TextRange, WidgetLoader, WidgetModule,
};
pub use history::{HistoryManager, HistoryState};
pub use persistence::{
    FileStore, KeyValueStore, MemoryStore, PersistenceBridge, AUTOSAVE_KEY, THEME_KEY,
};
pub use preview::{PreviewFrame, PreviewRenderer, SandboxPolicy};

/// Assemble the preview document for a bundle.
pub fn assemble_preview(bundle: &CodeBundle) -> String {
    preview::assemble_document(&bundle.html, &bundle.css, &bundle.js)
}

/// Split a single-document gateway response into html, css and js.
pub fn partition_response(content: &str) -> CodeBundle {
    partition::partition_response(content)
}

/// Clean and validate a single-file refinement for `language`.
pub fn finish_refinement(raw: &str, language: Language) -> PlaygroundResult<String> {
    let cleaned = partition::clean_code_block(raw, Some(language));
    partition::validate_refinement(&cleaned, language)
}

//! The Code Bundle: the `{html, css, js}` triple every other component derives from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// One project's full source. All three fields are always present (possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeBundle {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

impl CodeBundle {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Html => &self.html,
            Language::Css => &self.css,
            Language::Js => &self.js,
        }
    }

    /// Returns a copy with one field replaced.
    pub fn with(&self, language: Language, text: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.set(language, text);
        next
    }

    pub fn set(&mut self, language: Language, text: impl Into<String>) {
        let text = text.into();
        match language {
            Language::Html => self.html = text,
            Language::Css => self.css = text,
            Language::Js => self.js = text,
        }
    }

    /// True when every field is empty.
    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.js.is_empty()
    }
}

/// Language tag of one bundle field / editor buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Html,
    Css,
    Js,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Html, Language::Css, Language::Js];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Js => "js",
        }
    }

    /// File name used in the editor tabs and in gateway prompts.
    pub fn file_name(&self) -> &'static str {
        match self {
            Language::Html => "index.html",
            Language::Css => "index.css",
            Language::Js => "index.js",
        }
    }

    /// Language id understood by the editor widget.
    pub fn widget_language(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Js => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            "js" | "javascript" => Ok(Language::Js),
            other => Err(format!("unknown language '{}': expected html, css or js", other)),
        }
    }
}

/// Why the bundle last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    /// Keystrokes or edits inside an editor buffer.
    Editor,
    /// Generation, refinement, template load or any other wholesale replacement.
    External,
    /// Undo/redo replaying a history snapshot.
    TimeTravel,
    /// Resume from the persisted snapshot at startup.
    Restore,
}

impl ChangeOrigin {
    /// Changes the history manager must not record as new edits.
    pub fn is_replay(&self) -> bool {
        matches!(self, ChangeOrigin::TimeTravel)
    }
}

#[derive(Debug)]
struct BundleSlot {
    bundle: CodeBundle,
    revision: u64,
    origin: ChangeOrigin,
}

/// Shared, authoritative bundle handle.
///
/// Clones point at the same slot. Writes that leave the text unchanged are
/// dropped without bumping the revision, which keeps editor echoes from
/// looping back as new changes.
#[derive(Debug, Clone)]
pub struct SharedBundle {
    inner: Arc<Mutex<BundleSlot>>,
}

impl SharedBundle {
    pub fn new(bundle: CodeBundle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BundleSlot {
                bundle,
                revision: 0,
                origin: ChangeOrigin::External,
            })),
        }
    }

    fn slot(&self) -> MutexGuard<'_, BundleSlot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> CodeBundle {
        self.slot().bundle.clone()
    }

    pub fn field(&self, language: Language) -> String {
        self.slot().bundle.get(language).to_string()
    }

    /// Monotonic counter bumped on every effective write.
    pub fn revision(&self) -> u64 {
        self.slot().revision
    }

    pub fn last_origin(&self) -> ChangeOrigin {
        self.slot().origin
    }

    /// Revision, origin and contents read under one lock.
    pub fn observe(&self) -> (u64, ChangeOrigin, CodeBundle) {
        let slot = self.slot();
        (slot.revision, slot.origin, slot.bundle.clone())
    }

    /// Writes one field. Returns false when the text was already equal.
    pub fn set_field(&self, language: Language, text: &str, origin: ChangeOrigin) -> bool {
        let mut slot = self.slot();
        if slot.bundle.get(language) == text {
            return false;
        }
        slot.bundle.set(language, text);
        slot.revision += 1;
        slot.origin = origin;
        true
    }

    /// Replaces the whole bundle. Returns false when nothing changed.
    pub fn replace(&self, bundle: CodeBundle, origin: ChangeOrigin) -> bool {
        let mut slot = self.slot();
        if slot.bundle == bundle {
            return false;
        }
        slot.bundle = bundle;
        slot.revision += 1;
        slot.origin = origin;
        true
    }
}

impl Default for SharedBundle {
    fn default() -> Self {
        Self::new(CodeBundle::default())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_field_access() {
        let mut bundle = CodeBundle::new("<p>a</p>", "p{}", "");
        assert_eq!(bundle.get(Language::Css), "p{}");
        bundle.set(Language::Js, "alert(1)");
        assert_eq!(bundle.js, "alert(1)");
        assert!(!bundle.is_empty());
        assert!(CodeBundle::default().is_empty());
    }

    #[test]
    fn test_bundle_json_defaults_missing_fields() {
        let bundle: CodeBundle = serde_json::from_str(r#"{"html":"<h1>x</h1>"}"#).unwrap();
        assert_eq!(bundle, CodeBundle::new("<h1>x</h1>", "", ""));
    }

    #[test]
    fn test_language_parse_and_display() {
        assert_eq!("javascript".parse::<Language>(), Ok(Language::Js));
        assert_eq!(" CSS ".parse::<Language>(), Ok(Language::Css));
        assert!("rust".parse::<Language>().is_err());
        assert_eq!(Language::Html.to_string(), "HTML");
        assert_eq!(Language::Js.file_name(), "index.js");
        assert_eq!(Language::Js.widget_language(), "javascript");
    }

    #[test]
    fn test_shared_bundle_equal_write_is_noop() {
        let shared = SharedBundle::new(CodeBundle::new("a", "b", "c"));
        assert!(!shared.set_field(Language::Html, "a", ChangeOrigin::Editor));
        assert_eq!(shared.revision(), 0);

        assert!(shared.set_field(Language::Html, "z", ChangeOrigin::Editor));
        assert_eq!(shared.revision(), 1);
        assert_eq!(shared.last_origin(), ChangeOrigin::Editor);
        assert_eq!(shared.field(Language::Html), "z");
    }

    #[test]
    fn test_shared_bundle_replace_tracks_origin() {
        let shared = SharedBundle::default();
        let clone = shared.clone();
        assert!(clone.replace(CodeBundle::new("x", "", ""), ChangeOrigin::TimeTravel));
        let (revision, origin, bundle) = shared.observe();
        assert_eq!(revision, 1);
        assert_eq!(origin, ChangeOrigin::TimeTravel);
        assert_eq!(bundle.html, "x");
        assert!(!shared.replace(bundle, ChangeOrigin::External));
    }
}

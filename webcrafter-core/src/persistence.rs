//! Debounced autosave of the Code Bundle into a key-value store.

use crate::bundle::{ChangeOrigin, CodeBundle};
use crate::debounce::Debouncer;
use crate::error::{PlaygroundError, PlaygroundResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Key the autosaved project lives under.
pub const AUTOSAVE_KEY: &str = "webcrafter_autosave";

/// Key the editor theme lives under.
pub const THEME_KEY: &str = "webcrafter_theme";

/// Quiet period before a change is written.
pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// String key-value store boundary.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> PlaygroundResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> PlaygroundResult<()>;
}

/// Volatile store, used by tests and by sessions without a store path.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PlaygroundResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> PlaygroundResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file holding the whole key-value map. Writes go through a temp file
/// and a rename so a crash never leaves a half-written store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "store: corrupt file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "store: unreadable file, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_through(&self) -> PlaygroundResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| PlaygroundError::Store(format!("mkdir {}: {}", parent.display(), e)))?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.values)
            .map_err(|e| PlaygroundError::Store(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| PlaygroundError::Store(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| PlaygroundError::Store(format!("rename {}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> PlaygroundResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> PlaygroundResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.write_through()
    }
}

/// Autosave coordinator over a store.
pub struct PersistenceBridge<S: KeyValueStore> {
    store: S,
    pending: Debouncer<CodeBundle>,
    loading: bool,
    last_saved: Option<DateTime<Utc>>,
}

impl<S: KeyValueStore> PersistenceBridge<S> {
    pub fn new(store: S) -> Self {
        Self::with_debounce(store, DEFAULT_AUTOSAVE_DEBOUNCE)
    }

    pub fn with_debounce(store: S, debounce: Duration) -> Self {
        Self {
            store,
            pending: Debouncer::new(debounce),
            loading: false,
            last_saved: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// While set, changes are not autosaved (initial load or generation in progress).
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        if loading {
            self.pending.cancel();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    /// Feeds a bundle change in. Empty bundles and changes during load are
    /// skipped; an empty bundle also drops any save still pending.
    pub fn observe(&mut self, bundle: &CodeBundle, origin: ChangeOrigin, now: Instant) {
        if self.loading {
            return;
        }
        if bundle.is_empty() {
            self.pending.cancel();
            return;
        }
        tracing::trace!(?origin, "autosave: scheduling");
        self.pending.schedule(bundle.clone(), now);
    }

    /// Writes the pending bundle once its window has elapsed.
    /// Returns true when a save happened.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.pending.fire(now) {
            Some(bundle) => self.write(&bundle),
            None => false,
        }
    }

    /// Writes the pending bundle immediately (e.g. on shutdown).
    pub fn flush(&mut self) -> bool {
        match self.pending.flush() {
            Some(bundle) => self.write(&bundle),
            None => false,
        }
    }

    /// Serialises `bundle` under [`AUTOSAVE_KEY`] without waiting.
    pub fn save_now(&mut self, bundle: &CodeBundle) -> PlaygroundResult<()> {
        let raw = serde_json::to_string(bundle).map_err(|e| PlaygroundError::Store(e.to_string()))?;
        self.store.set(AUTOSAVE_KEY, &raw)?;
        self.last_saved = Some(Utc::now());
        Ok(())
    }

    fn write(&mut self, bundle: &CodeBundle) -> bool {
        match self.save_now(bundle) {
            Ok(()) => {
                tracing::info!(bytes = bundle.html.len() + bundle.css.len() + bundle.js.len(), "autosave: project saved");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "autosave: save failed");
                false
            }
        }
    }

    /// Whether a resume affordance should be offered.
    pub fn has_saved_project(&self) -> bool {
        matches!(self.store.get(AUTOSAVE_KEY), Ok(Some(_)))
    }

    /// Strict load: corrupt data is an error.
    pub fn try_load(&self) -> PlaygroundResult<Option<CodeBundle>> {
        match self.store.get(AUTOSAVE_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| PlaygroundError::CorruptSnapshot(e.to_string())),
            None => Ok(None),
        }
    }

    /// Lenient load: corrupt or unreadable data is logged and reported as no project.
    pub fn load(&self) -> Option<CodeBundle> {
        match self.try_load() {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(error = %e, "autosave: failed to parse saved project");
                None
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autosave_round_trip() {
        let mut bridge = PersistenceBridge::new(MemoryStore::new());
        let bundle = CodeBundle::new("<h1>x</h1>", "", "");
        let start = Instant::now();

        bridge.observe(&bundle, ChangeOrigin::Editor, start);
        assert!(!bridge.tick(start + Duration::from_millis(999)));
        assert!(bridge.tick(start + DEFAULT_AUTOSAVE_DEBOUNCE));

        assert!(bridge.has_saved_project());
        assert_eq!(bridge.load(), Some(bundle));
        assert!(bridge.last_saved().is_some());
    }

    #[test]
    fn test_empty_bundle_and_loading_are_skipped() {
        let mut bridge = PersistenceBridge::new(MemoryStore::new());
        let start = Instant::now();
        bridge.observe(&CodeBundle::default(), ChangeOrigin::Editor, start);
        assert_eq!(bridge.next_deadline(), None);

        bridge.set_loading(true);
        bridge.observe(&CodeBundle::new("x", "", ""), ChangeOrigin::External, start);
        assert_eq!(bridge.next_deadline(), None);
        assert!(!bridge.has_saved_project());
    }

    #[test]
    fn test_clearing_the_bundle_drops_pending_save() {
        let mut bridge = PersistenceBridge::new(MemoryStore::new());
        let start = Instant::now();
        bridge.observe(&CodeBundle::new("a", "", ""), ChangeOrigin::Editor, start);
        let cleared = start + Duration::from_millis(200);
        bridge.observe(&CodeBundle::default(), ChangeOrigin::Editor, cleared);
        assert_eq!(bridge.next_deadline(), None);
        assert!(!bridge.tick(start + Duration::from_secs(2)));
        assert_eq!(bridge.store().get(AUTOSAVE_KEY).unwrap(), None);
    }

    #[test]
    fn test_burst_saves_last_value_once() {
        let mut bridge = PersistenceBridge::new(MemoryStore::new());
        let start = Instant::now();
        bridge.observe(&CodeBundle::new("a", "", ""), ChangeOrigin::Editor, start);
        bridge.observe(&CodeBundle::new("ab", "", ""), ChangeOrigin::Editor, start + Duration::from_millis(500));
        assert!(!bridge.tick(start + Duration::from_millis(1200)));
        assert!(bridge.tick(start + Duration::from_millis(1500)));
        assert_eq!(bridge.load(), Some(CodeBundle::new("ab", "", "")));
    }

    #[test]
    fn test_corrupt_snapshot_is_no_project() {
        let mut store = MemoryStore::new();
        store.set(AUTOSAVE_KEY, "{not json").unwrap();
        let bridge = PersistenceBridge::new(store);
        assert!(bridge.has_saved_project());
        assert_eq!(bridge.load(), None);
        assert!(matches!(bridge.try_load(), Err(PlaygroundError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        {
            let mut store = FileStore::open(&path);
            store.set(AUTOSAVE_KEY, r#"{"html":"<p>x</p>","css":"","js":""}"#).unwrap();
        }
        let bridge = PersistenceBridge::new(FileStore::open(&path));
        assert_eq!(bridge.load(), Some(CodeBundle::new("<p>x</p>", "", "")));
    }

    #[test]
    fn test_file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "garbage").unwrap();
        let store = FileStore::open(&path);
        assert_eq!(store.get(AUTOSAVE_KEY).unwrap(), None);
    }
}

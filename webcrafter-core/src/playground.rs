//! The playground hub: one shared bundle and everything derived from it.
//!
//! Each mutation goes through the [`SharedBundle`]; [`Playground::tick`]
//! notices the new revision and fans it out to history, autosave, the
//! editor buffers and the preview. The hub never sleeps: callers pass `now`
//! and wake it again at [`Playground::next_deadline`].

use crate::bundle::{ChangeOrigin, CodeBundle, Language, SharedBundle};
use crate::dnd::DragData;
use crate::editor::{DropOutcome, EditorAdapter, EditorOptions, EditorTheme, WidgetModule};
use crate::history::{HistoryManager, DEFAULT_HISTORY_DEBOUNCE, DEFAULT_HISTORY_LIMIT};
use crate::partition::partition_response;
use crate::persistence::{KeyValueStore, PersistenceBridge, DEFAULT_AUTOSAVE_DEBOUNCE, THEME_KEY};
use crate::preview::{PreviewFrame, PreviewRenderer, SandboxPolicy};
use std::time::{Duration, Instant};

/// Tunables for a playground session.
#[derive(Debug, Clone)]
pub struct PlaygroundSettings {
    pub history_limit: usize,
    pub history_debounce: Duration,
    pub autosave_debounce: Duration,
    pub sandbox: SandboxPolicy,
    pub editor: EditorOptions,
    /// Element id the editor view mounts into.
    pub container: String,
}

impl Default for PlaygroundSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_debounce: DEFAULT_HISTORY_DEBOUNCE,
            autosave_debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
            sandbox: SandboxPolicy::default(),
            editor: EditorOptions::default(),
            container: "editor".to_string(),
        }
    }
}

/// What one [`Playground::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A new bundle revision was propagated.
    pub changed: bool,
    /// A history snapshot was appended.
    pub recorded: bool,
    /// The project was autosaved.
    pub saved: bool,
}

pub struct Playground<S: KeyValueStore> {
    bundle: SharedBundle,
    editor: EditorAdapter,
    preview: PreviewRenderer,
    history: HistoryManager,
    persistence: PersistenceBridge<S>,
    seen_revision: u64,
}

impl<S: KeyValueStore> Playground<S> {
    /// Builds a session around `initial`. The editor theme is read back from
    /// the store; a missing or unknown value means the default theme.
    pub fn open(
        store: S,
        module: Option<&dyn WidgetModule>,
        initial: CodeBundle,
        settings: &PlaygroundSettings,
    ) -> Self {
        let persistence = PersistenceBridge::with_debounce(store, settings.autosave_debounce);
        let theme = stored_theme(persistence.store());
        let bundle = SharedBundle::new(initial.clone());
        let editor = EditorAdapter::mount(
            module,
            bundle.clone(),
            &settings.container,
            Language::Html,
            theme,
            &settings.editor,
        );
        let mut preview = PreviewRenderer::new(settings.sandbox);
        preview.render(&initial);

        Self {
            seen_revision: bundle.revision(),
            history: HistoryManager::with_settings(
                initial,
                settings.history_limit,
                settings.history_debounce,
            ),
            bundle,
            editor,
            preview,
            persistence,
        }
    }

    /// Handle for writers outside the hub (e.g. a gateway task).
    pub fn bundle(&self) -> &SharedBundle {
        &self.bundle
    }

    pub fn snapshot(&self) -> CodeBundle {
        self.bundle.snapshot()
    }

    pub fn editor(&self) -> &EditorAdapter {
        &self.editor
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn persistence(&self) -> &PersistenceBridge<S> {
        &self.persistence
    }

    pub fn preview(&self) -> Option<&PreviewFrame> {
        self.preview.current()
    }

    pub fn preview_reloads(&self) -> u64 {
        self.preview.reloads()
    }

    /// Earliest instant at which [`tick`](Self::tick) has debounced work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.history.next_deadline(), self.persistence.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Propagates any unseen bundle revision, then fires due debouncers.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let changed = self.propagate(now);
        TickOutcome {
            changed,
            recorded: self.history.tick(now),
            saved: self.persistence.tick(now),
        }
    }

    fn propagate(&mut self, now: Instant) -> bool {
        let (revision, origin, bundle) = self.bundle.observe();
        if revision == self.seen_revision {
            return false;
        }
        self.seen_revision = revision;

        match origin {
            ChangeOrigin::Restore => self.history.reset(bundle.clone()),
            _ => {
                self.history.observe(&bundle, origin, now);
                self.persistence.observe(&bundle, origin, now);
            }
        }
        let pushed = self.editor.reconcile();
        if pushed > 0 {
            tracing::debug!(pushed, ?origin, "playground: editor buffers updated");
        }
        self.preview.render(&bundle);
        true
    }

    /// Replaces the active buffer's text as if typed.
    pub fn type_text(&mut self, text: &str, now: Instant) -> bool {
        let typed = self.editor.type_into_active(text);
        self.propagate(now);
        typed
    }

    /// Replaces the whole bundle from outside the editor.
    pub fn replace(&mut self, bundle: CodeBundle, now: Instant) -> bool {
        let changed = self.bundle.replace(bundle, ChangeOrigin::External);
        self.propagate(now);
        changed
    }

    /// Loads a template's files.
    pub fn load_template(&mut self, template: CodeBundle, now: Instant) -> bool {
        tracing::info!("playground: loading template");
        self.replace(template, now)
    }

    /// Splits a single-document gateway response and installs it.
    pub fn apply_generated(&mut self, response: &str, now: Instant) -> CodeBundle {
        let bundle = partition_response(response);
        self.replace(bundle.clone(), now);
        bundle
    }

    /// Installs a refined copy of one file.
    pub fn apply_refined_file(&mut self, language: Language, text: &str, now: Instant) -> bool {
        let changed = self.bundle.set_field(language, text, ChangeOrigin::External);
        self.propagate(now);
        changed
    }

    /// Suspends autosave and history recording while a generation is in flight.
    pub fn set_generating(&mut self, generating: bool) {
        self.persistence.set_loading(generating);
        self.history.set_paused(generating);
    }

    /// Whether a previous session left a project behind.
    pub fn has_saved_project(&self) -> bool {
        self.persistence.has_saved_project()
    }

    /// Restores the autosaved project and starts a fresh history from it.
    pub fn resume(&mut self, now: Instant) -> bool {
        let Some(saved) = self.persistence.load() else {
            return false;
        };
        self.propagate(now);
        if !self.bundle.replace(saved.clone(), ChangeOrigin::Restore) {
            self.history.reset(saved);
            return true;
        }
        self.propagate(now);
        tracing::info!("playground: resumed saved project");
        true
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        self.propagate(now);
        self.time_travel(|history| history.undo(), now)
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        self.propagate(now);
        self.time_travel(|history| history.redo(), now)
    }

    fn time_travel(
        &mut self,
        step: impl FnOnce(&mut HistoryManager) -> Option<CodeBundle>,
        now: Instant,
    ) -> bool {
        let Some(snapshot) = step(&mut self.history) else {
            return false;
        };
        self.bundle.replace(snapshot, ChangeOrigin::TimeTravel);
        self.propagate(now);
        true
    }

    pub fn active_language(&self) -> Language {
        self.editor.active_language()
    }

    pub fn set_active_language(&mut self, language: Language) {
        self.editor.switch_language(language);
    }

    pub fn theme(&self) -> EditorTheme {
        self.editor.theme()
    }

    /// Applies and persists the editor theme.
    pub fn set_theme(&mut self, theme: EditorTheme) {
        self.editor.set_theme(theme);
        if let Err(e) = self.persistence.store_mut().set(THEME_KEY, theme.as_str()) {
            tracing::warn!(error = %e, "playground: failed to persist theme");
        }
    }

    pub fn toggle_theme(&mut self) -> EditorTheme {
        let next = self.theme().toggled();
        self.set_theme(next);
        next
    }

    /// Drops a palette snippet onto the editor at `(x, y)`.
    pub fn drop_snippet(&mut self, data: &DragData, x: f64, y: f64, now: Instant) -> DropOutcome {
        let outcome = self.editor.handle_drop(data, x, y);
        self.propagate(now);
        outcome
    }

    pub fn select(&mut self, range: Option<crate::editor::TextRange>) -> bool {
        self.editor.select(range)
    }

    /// Selection or whole active file, for targeted refinement.
    pub fn refinement_context(&self) -> String {
        self.editor.refinement_context()
    }

    /// Flushes pending history and autosave work and tears the editor down.
    pub fn shutdown(&mut self, now: Instant) {
        self.propagate(now);
        self.history.flush();
        self.persistence.flush();
        self.editor.dispose();
    }
}

fn stored_theme<S: KeyValueStore>(store: &S) -> EditorTheme {
    match store.get(THEME_KEY) {
        Ok(Some(raw)) => raw.parse().unwrap_or_else(|e: String| {
            tracing::warn!(error = %e, "playground: ignoring stored theme");
            EditorTheme::default()
        }),
        Ok(None) => EditorTheme::default(),
        Err(e) => {
            tracing::warn!(error = %e, "playground: failed to read stored theme");
            EditorTheme::default()
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnd::DragPayload;
    use crate::editor::{HeadlessModule, HeadlessWidget, Position};
    use crate::persistence::{MemoryStore, AUTOSAVE_KEY};

    fn open(initial: CodeBundle) -> Playground<MemoryStore> {
        open_with(MemoryStore::new(), initial)
    }

    fn open_with(store: MemoryStore, initial: CodeBundle) -> Playground<MemoryStore> {
        Playground::open(store, Some(&HeadlessModule), initial, &PlaygroundSettings::default())
    }

    #[test]
    fn test_typing_settles_into_history_and_autosave() {
        let start = Instant::now();
        let mut pg = open(CodeBundle::new("<p>a</p>", "", ""));
        pg.type_text("<p>ab</p>", start);
        assert_eq!(pg.next_deadline(), Some(start + DEFAULT_HISTORY_DEBOUNCE));

        let outcome = pg.tick(start + DEFAULT_HISTORY_DEBOUNCE);
        assert!(outcome.recorded);
        assert!(!outcome.saved);
        assert_eq!(pg.history().len(), 2);

        let outcome = pg.tick(start + DEFAULT_AUTOSAVE_DEBOUNCE);
        assert!(outcome.saved);
        assert!(pg.has_saved_project());
        assert!(pg.preview().unwrap().srcdoc.contains("<p>ab</p>"));
    }

    #[test]
    fn test_undo_restores_editor_and_preview() {
        let start = Instant::now();
        let mut pg = open(CodeBundle::new("<p>one</p>", "", ""));
        pg.type_text("<p>two</p>", start);
        pg.tick(start + DEFAULT_HISTORY_DEBOUNCE);

        assert!(pg.undo(start + Duration::from_secs(2)));
        assert_eq!(pg.snapshot().html, "<p>one</p>");
        assert_eq!(pg.editor().buffer_text(Language::Html).as_deref(), Some("<p>one</p>"));
        assert!(pg.preview().unwrap().srcdoc.contains("<p>one</p>"));
        assert_eq!(pg.history().len(), 2);
        assert_eq!(pg.next_deadline().map(|d| d > start), Some(true));

        assert!(pg.redo(start + Duration::from_secs(3)));
        assert_eq!(pg.snapshot().html, "<p>two</p>");
        assert_eq!(pg.history().len(), 2);
        assert!(!pg.redo(start + Duration::from_secs(4)));
    }

    #[test]
    fn test_generated_response_is_partitioned() {
        let start = Instant::now();
        let mut pg = open(CodeBundle::default());
        let bundle = pg.apply_generated(
            "<html><head></head><body><h1>x</h1><script>go()</script></body></html>",
            start,
        );
        assert_eq!(bundle.js, "go()\n\n");
        assert_eq!(pg.editor().buffer_text(Language::Js).as_deref(), Some("go()\n\n"));
    }

    #[test]
    fn test_generating_suspends_autosave_and_history() {
        let start = Instant::now();
        let mut pg = open(CodeBundle::default());
        pg.set_generating(true);
        pg.load_template(CodeBundle::new("<p>t</p>", "", ""), start);
        let outcome = pg.tick(start + Duration::from_secs(5));
        assert!(!outcome.saved);
        assert!(!outcome.recorded);
        assert!(!pg.has_saved_project());
        assert_eq!(pg.history().len(), 1);

        pg.set_generating(false);
        pg.replace(CodeBundle::new("<p>generated</p>", "", ""), start + Duration::from_secs(6));
        let outcome = pg.tick(start + Duration::from_secs(8));
        assert!(outcome.saved);
        assert!(outcome.recorded);
        assert_eq!(pg.history().len(), 2);
    }

    #[test]
    fn test_resume_replaces_bundle_and_resets_history() {
        let mut store = MemoryStore::new();
        store
            .set(AUTOSAVE_KEY, r#"{"html":"<p>saved</p>","css":"p{}","js":""}"#)
            .unwrap();
        let start = Instant::now();
        let mut pg = open_with(store, CodeBundle::new("<p>template</p>", "", ""));
        assert!(pg.has_saved_project());
        assert!(pg.resume(start));
        assert_eq!(pg.snapshot(), CodeBundle::new("<p>saved</p>", "p{}", ""));
        assert_eq!(pg.history().len(), 1);
        assert!(!pg.history().can_undo());
        assert_eq!(pg.next_deadline(), None);
    }

    #[test]
    fn test_theme_persists_across_sessions() {
        let mut pg = open(CodeBundle::default());
        assert_eq!(pg.theme(), EditorTheme::Dark);
        assert_eq!(pg.toggle_theme(), EditorTheme::Light);

        let mut store = MemoryStore::new();
        store.set(THEME_KEY, "light").unwrap();
        let reopened = open_with(store, CodeBundle::default());
        assert_eq!(reopened.theme(), EditorTheme::Light);
    }

    #[test]
    fn test_drop_snippet_flows_into_bundle() {
        let start = Instant::now();
        let mut pg = open(CodeBundle::new("<main></main>", "", ""));
        let mut data = DragData::new();
        DragPayload::new("<p>hi</p>", "html").write_to(&mut data).unwrap();
        let (x, y) = HeadlessWidget::point_for(Position::new(1, 7));

        let outcome = pg.drop_snippet(&data, x, y, start);
        assert!(matches!(outcome, DropOutcome::Inserted { .. }));
        assert_eq!(pg.snapshot().html, "<main><p>hi</p></main>");
        assert!(pg.next_deadline().is_some());
    }

    #[test]
    fn test_external_writer_is_picked_up_on_tick() {
        let start = Instant::now();
        let mut pg = open(CodeBundle::default());
        let handle = pg.bundle().clone();
        handle.set_field(Language::Css, "body{}", ChangeOrigin::External);

        assert!(pg.tick(start).changed);
        assert_eq!(pg.editor().buffer_text(Language::Css).as_deref(), Some("body{}"));
        assert!(!pg.tick(start).changed);
    }
}

//! Keeps one widget buffer per language synchronised with the shared bundle.
//!
//! Buffer → bundle: each buffer's change listener writes its text into the
//! bundle tagged [`ChangeOrigin::Editor`]. Bundle → buffer: [`EditorAdapter::reconcile`]
//! pushes a field into its buffer only when the texts differ, so neither
//! direction echoes back into the other.
//!
//! Without a widget the adapter is inert: every call is a no-op.

use super::{
    BufferId, EditorOptions, EditorTheme, EditorWidget, InstanceId, Position, TextRange, WidgetModule,
};
use crate::bundle::{ChangeOrigin, Language, SharedBundle};
use crate::dnd::{DragData, DragPayload};
use crate::error::{PlaygroundError, PlaygroundResult};

/// Result of a drop on the editor surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Inserted {
        language: Language,
        position: Position,
        snippet: String,
    },
    /// The drag carried no snippet payload (e.g. a file or plain text drag).
    NoPayload,
    /// A payload was present but did not decode.
    Malformed,
    /// The drop point is not over any text line.
    Unresolved,
    /// No live widget.
    Inert,
}

#[derive(Debug, Clone, Copy)]
struct BufferSet {
    html: BufferId,
    css: BufferId,
    js: BufferId,
}

impl BufferSet {
    fn get(&self, language: Language) -> BufferId {
        match language {
            Language::Html => self.html,
            Language::Css => self.css,
            Language::Js => self.js,
        }
    }
}

struct Live {
    widget: Box<dyn EditorWidget>,
    buffers: BufferSet,
    instance: Option<InstanceId>,
}

pub struct EditorAdapter {
    live: Option<Live>,
    bundle: SharedBundle,
    active: Language,
    theme: EditorTheme,
}

impl EditorAdapter {
    /// An adapter with no editable surface.
    pub fn inert(bundle: SharedBundle) -> Self {
        Self {
            live: None,
            bundle,
            active: Language::default(),
            theme: EditorTheme::default(),
        }
    }

    /// Mounts a widget from `module` (None when the module never loaded).
    pub fn mount(
        module: Option<&dyn WidgetModule>,
        bundle: SharedBundle,
        container: &str,
        active: Language,
        theme: EditorTheme,
        options: &EditorOptions,
    ) -> Self {
        match module {
            Some(module) => Self::mount_widget(module.create_widget(), bundle, container, active, theme, options),
            None => {
                tracing::warn!("editor: widget unavailable, mounting inert");
                let mut adapter = Self::inert(bundle);
                adapter.active = active;
                adapter.theme = theme;
                adapter
            }
        }
    }

    /// Mounts on an already created widget: one buffer per language from the
    /// current bundle, a change listener per buffer, then the view.
    pub fn mount_widget(
        mut widget: Box<dyn EditorWidget>,
        bundle: SharedBundle,
        container: &str,
        active: Language,
        theme: EditorTheme,
        options: &EditorOptions,
    ) -> Self {
        let mut adapter = Self::inert(bundle);
        adapter.active = active;
        adapter.theme = theme;

        let buffers = match create_buffers(widget.as_mut(), &adapter.bundle) {
            Ok(buffers) => buffers,
            Err(e) => {
                tracing::warn!(error = %e, "editor: failed to create buffers, staying inert");
                return adapter;
            }
        };

        let instance = match widget.create_instance(container, buffers.get(active), theme, options) {
            Ok(instance) => Some(instance),
            Err(e) => {
                tracing::warn!(error = %e, "editor: failed to create instance");
                None
            }
        };

        adapter.live = Some(Live {
            widget,
            buffers,
            instance,
        });
        adapter
    }

    /// True when a widget view is mounted.
    pub fn is_live(&self) -> bool {
        self.live.as_ref().map(|l| l.instance.is_some()).unwrap_or(false)
    }

    pub fn active_language(&self) -> Language {
        self.active
    }

    pub fn theme(&self) -> EditorTheme {
        self.theme
    }

    pub fn bundle(&self) -> &SharedBundle {
        &self.bundle
    }

    pub fn instance(&self) -> Option<InstanceId> {
        self.live.as_ref().and_then(|l| l.instance)
    }

    pub fn buffer_id(&self, language: Language) -> Option<BufferId> {
        self.live.as_ref().map(|l| l.buffers.get(language))
    }

    /// Current text of one buffer.
    pub fn buffer_text(&self, language: Language) -> Option<String> {
        let live = self.live.as_ref()?;
        live.widget.get_value(live.buffers.get(language)).ok()
    }

    /// Shows another language's buffer; other buffers keep their state.
    pub fn switch_language(&mut self, language: Language) {
        self.active = language;
        if let Some(live) = self.live.as_mut() {
            if let Some(instance) = live.instance {
                if let Err(e) = live.widget.set_model(instance, live.buffers.get(language)) {
                    tracing::warn!(error = %e, %language, "editor: failed to switch buffer");
                }
            }
        }
    }

    pub fn set_theme(&mut self, theme: EditorTheme) {
        self.theme = theme;
        if let Some(live) = self.live.as_mut() {
            live.widget.set_theme(theme);
        }
    }

    /// Pushes bundle fields that differ from their buffers into the widget.
    /// Returns how many buffers were rewritten.
    pub fn reconcile(&mut self) -> usize {
        let Some(live) = self.live.as_mut() else {
            return 0;
        };
        let bundle = self.bundle.snapshot();
        let mut pushed = 0;
        for language in Language::ALL {
            let buffer = live.buffers.get(language);
            let wanted = bundle.get(language);
            match live.widget.get_value(buffer) {
                Ok(current) if current == wanted => {}
                Ok(_) => match live.widget.set_value(buffer, wanted) {
                    Ok(()) => {
                        tracing::debug!(%language, "editor: pushed external change into buffer");
                        pushed += 1;
                    }
                    Err(e) => tracing::warn!(error = %e, %language, "editor: failed to update buffer"),
                },
                Err(e) => tracing::warn!(error = %e, %language, "editor: failed to read buffer"),
            }
        }
        pushed
    }

    /// Replaces the active buffer's text the way typing would: through the
    /// widget, so the change reaches the bundle via the buffer listener.
    pub fn type_into_active(&mut self, text: &str) -> bool {
        let active = self.active;
        let Some(live) = self.live.as_mut() else {
            return false;
        };
        match live.widget.set_value(live.buffers.get(active), text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "editor: edit rejected");
                false
            }
        }
    }

    /// Selects a range in the active buffer.
    pub fn select(&mut self, range: Option<TextRange>) -> bool {
        let Some(live) = self.live.as_mut() else {
            return false;
        };
        let Some(instance) = live.instance else {
            return false;
        };
        live.widget.set_selection(instance, range).is_ok()
    }

    /// Handles a drop at client coordinates `(x, y)`.
    pub fn handle_drop(&mut self, data: &DragData, x: f64, y: f64) -> DropOutcome {
        let active = self.active;
        let Some(live) = self.live.as_mut() else {
            return DropOutcome::Inert;
        };
        let Some(instance) = live.instance else {
            return DropOutcome::Inert;
        };

        let payload = match DragPayload::read_from(data) {
            Ok(payload) => payload,
            Err(PlaygroundError::MissingDragPayload) => return DropOutcome::NoPayload,
            Err(e) => {
                tracing::debug!(error = %e, "editor: ignoring drop");
                return DropOutcome::Malformed;
            }
        };

        let Some(position) = live.widget.resolve_position(instance, x, y) else {
            tracing::debug!(x, y, "editor: drop outside any line");
            return DropOutcome::Unresolved;
        };

        if let Err(e) = live
            .widget
            .execute_edit(instance, TextRange::collapsed(position), &payload.snippet)
        {
            tracing::warn!(error = %e, %position, "editor: drop insertion failed");
            return DropOutcome::Unresolved;
        }
        live.widget.focus(instance);
        tracing::debug!(kind = %payload.kind, %position, "editor: inserted snippet");

        DropOutcome::Inserted {
            language: active,
            position,
            snippet: payload.snippet,
        }
    }

    /// Text a targeted refinement works on: the non-blank selection, else the
    /// whole active file.
    pub fn refinement_context(&self) -> String {
        if let Some(selected) = self.selected_text() {
            if !selected.trim().is_empty() {
                return selected;
            }
        }
        self.bundle.field(self.active)
    }

    fn selected_text(&self) -> Option<String> {
        let live = self.live.as_ref()?;
        let instance = live.instance?;
        let selection = match live.widget.get_selection(instance) {
            Ok(selection) => selection?,
            Err(e) => {
                tracing::warn!(error = %e, "editor: error getting selection");
                return None;
            }
        };
        live.widget
            .get_value_in_range(live.buffers.get(self.active), selection)
            .ok()
    }

    /// Tears down the view, then the buffers. Safe to call more than once.
    pub fn dispose(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        if let Some(instance) = live.instance.take() {
            if let Err(e) = live.widget.dispose_instance(instance) {
                tracing::warn!(error = %e, "editor: error disposing instance");
            }
        }
        for language in Language::ALL {
            if let Err(e) = live.widget.dispose_buffer(live.buffers.get(language)) {
                tracing::warn!(error = %e, %language, "editor: error disposing buffer");
            }
        }
    }
}

impl Drop for EditorAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn create_buffers(widget: &mut dyn EditorWidget, bundle: &SharedBundle) -> PlaygroundResult<BufferSet> {
    let initial = bundle.snapshot();
    let mut ids = Vec::with_capacity(3);
    for language in Language::ALL {
        let buffer = widget.create_buffer(initial.get(language), language.widget_language())?;
        let sink = bundle.clone();
        widget.on_content_change(
            buffer,
            Box::new(move |text| {
                sink.set_field(language, text, ChangeOrigin::Editor);
            }),
        )?;
        ids.push(buffer);
    }
    Ok(BufferSet {
        html: ids[0],
        css: ids[1],
        js: ids[2],
    })
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::CodeBundle;
    use crate::dnd::SNIPPET_MIME;
    use crate::editor::{HeadlessModule, HeadlessWidget};

    fn mount(bundle: &SharedBundle) -> EditorAdapter {
        EditorAdapter::mount(
            Some(&HeadlessModule as &dyn WidgetModule),
            bundle.clone(),
            "editor",
            Language::Html,
            EditorTheme::Dark,
            &EditorOptions::default(),
        )
    }

    #[test]
    fn test_mount_creates_buffers_from_bundle() {
        let bundle = SharedBundle::new(CodeBundle::new("<p>a</p>", "p{}", "x()"));
        let adapter = mount(&bundle);
        assert!(adapter.is_live());
        assert_eq!(adapter.buffer_text(Language::Css).as_deref(), Some("p{}"));
        assert_eq!(adapter.buffer_text(Language::Js).as_deref(), Some("x()"));
    }

    #[test]
    fn test_typing_updates_bundle_as_editor_change() {
        let bundle = SharedBundle::default();
        let mut adapter = mount(&bundle);
        adapter.switch_language(Language::Css);
        assert!(adapter.type_into_active("body{}"));
        assert_eq!(bundle.field(Language::Css), "body{}");
        assert_eq!(bundle.last_origin(), ChangeOrigin::Editor);
        assert_eq!(bundle.revision(), 1);
    }

    #[test]
    fn test_reconcile_pushes_only_differing_fields() {
        let bundle = SharedBundle::new(CodeBundle::new("a", "b", "c"));
        let mut adapter = mount(&bundle);
        assert_eq!(adapter.reconcile(), 0);

        bundle.replace(CodeBundle::new("a", "B", "C"), ChangeOrigin::External);
        let revision = bundle.revision();
        assert_eq!(adapter.reconcile(), 2);
        assert_eq!(adapter.buffer_text(Language::Js).as_deref(), Some("C"));
        // The buffer listener echo did not count as a new change.
        assert_eq!(bundle.revision(), revision);
        assert_eq!(bundle.last_origin(), ChangeOrigin::External);
    }

    #[test]
    fn test_drop_inserts_at_resolved_position() {
        let bundle = SharedBundle::new(CodeBundle::new("<main></main>", "", ""));
        let mut adapter = mount(&bundle);
        let mut data = DragData::new();
        DragPayload::new("<p>hi</p>", "html").write_to(&mut data).unwrap();

        let (x, y) = HeadlessWidget::point_for(Position::new(1, 7));
        let outcome = adapter.handle_drop(&data, x, y);
        assert_eq!(
            outcome,
            DropOutcome::Inserted {
                language: Language::Html,
                position: Position::new(1, 7),
                snippet: "<p>hi</p>".to_string(),
            }
        );
        assert_eq!(bundle.field(Language::Html), "<main><p>hi</p></main>");
    }

    #[test]
    fn test_drop_rejections_leave_text_alone() {
        let bundle = SharedBundle::new(CodeBundle::new("<main></main>", "", ""));
        let mut adapter = mount(&bundle);

        assert_eq!(adapter.handle_drop(&DragData::new(), 4.0, 4.0), DropOutcome::NoPayload);

        let mut bad = DragData::new();
        bad.set_data(SNIPPET_MIME, "not json");
        assert_eq!(adapter.handle_drop(&bad, 4.0, 4.0), DropOutcome::Malformed);

        let mut good = DragData::new();
        DragPayload::new("<p>hi</p>", "html").write_to(&mut good).unwrap();
        assert_eq!(adapter.handle_drop(&good, 4.0, 10_000.0), DropOutcome::Unresolved);

        assert_eq!(bundle.field(Language::Html), "<main></main>");
        assert_eq!(bundle.revision(), 0);
    }

    #[test]
    fn test_refinement_context_prefers_selection() {
        let bundle = SharedBundle::new(CodeBundle::new("<h1>Title</h1>\n<p>x</p>", "", ""));
        let mut adapter = mount(&bundle);
        assert_eq!(adapter.refinement_context(), "<h1>Title</h1>\n<p>x</p>");

        adapter.select(Some(TextRange::new(Position::new(1, 1), Position::new(1, 15))));
        assert_eq!(adapter.refinement_context(), "<h1>Title</h1>");

        // A blank selection falls back to the whole file.
        adapter.select(Some(TextRange::collapsed(Position::new(2, 1))));
        assert_eq!(adapter.refinement_context(), "<h1>Title</h1>\n<p>x</p>");
    }

    #[test]
    fn test_inert_adapter_is_noop() {
        let bundle = SharedBundle::new(CodeBundle::new("x", "", ""));
        let mut adapter = EditorAdapter::mount(
            None,
            bundle.clone(),
            "editor",
            Language::Js,
            EditorTheme::Light,
            &EditorOptions::default(),
        );
        assert!(!adapter.is_live());
        assert_eq!(adapter.active_language(), Language::Js);
        assert!(!adapter.type_into_active("y"));
        assert_eq!(adapter.reconcile(), 0);
        assert_eq!(adapter.handle_drop(&DragData::new(), 0.0, 0.0), DropOutcome::Inert);
        adapter.switch_language(Language::Css);
        adapter.set_theme(EditorTheme::Dark);
        assert_eq!(adapter.refinement_context(), "");
        adapter.dispose();
        adapter.dispose();
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let bundle = SharedBundle::default();
        let mut adapter = mount(&bundle);
        adapter.dispose();
        assert!(!adapter.is_live());
        adapter.dispose();
        assert_eq!(adapter.buffer_text(Language::Html), None);
    }
}

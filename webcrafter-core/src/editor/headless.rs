//! In-memory editor widget: plain string buffers and a fixed character grid
//! for coordinate lookup. Backs the CLI session and the test suite.

use super::loader::WidgetModule;
use super::{
    BufferId, ChangeListener, EditorOptions, EditorTheme, EditorWidget, InstanceId, Position, TextRange,
};
use crate::error::{PlaygroundError, PlaygroundResult};
use std::collections::HashMap;

/// Pixel height of one line in the grid.
pub const LINE_HEIGHT: f64 = 19.0;

/// Pixel width of one character cell.
pub const CHAR_WIDTH: f64 = 8.0;

struct HeadlessBuffer {
    text: String,
    language: String,
    listeners: Vec<ChangeListener>,
}

struct HeadlessInstance {
    container: String,
    model: BufferId,
    selection: Option<TextRange>,
}

/// Editor widget without a screen.
pub struct HeadlessWidget {
    buffers: HashMap<u64, HeadlessBuffer>,
    instances: HashMap<u64, HeadlessInstance>,
    next_id: u64,
    theme: EditorTheme,
    focused: Option<InstanceId>,
}

impl Default for HeadlessWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessWidget {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            instances: HashMap::new(),
            next_id: 1,
            theme: EditorTheme::default(),
            focused: None,
        }
    }

    pub fn theme(&self) -> EditorTheme {
        self.theme
    }

    pub fn focused(&self) -> Option<InstanceId> {
        self.focused
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn buffer_language(&self, buffer: BufferId) -> Option<&str> {
        self.buffers.get(&buffer.0).map(|b| b.language.as_str())
    }

    pub fn container(&self, instance: InstanceId) -> Option<&str> {
        self.instances.get(&instance.0).map(|i| i.container.as_str())
    }

    pub fn model(&self, instance: InstanceId) -> Option<BufferId> {
        self.instances.get(&instance.0).map(|i| i.model)
    }

    /// Client coordinates of the cell at `position` (top-left corner plus half a cell).
    pub fn point_for(position: Position) -> (f64, f64) {
        (
            (position.column as f64 - 1.0) * CHAR_WIDTH + CHAR_WIDTH / 2.0,
            (position.line as f64 - 1.0) * LINE_HEIGHT + LINE_HEIGHT / 2.0,
        )
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn buffer(&self, buffer: BufferId) -> PlaygroundResult<&HeadlessBuffer> {
        self.buffers
            .get(&buffer.0)
            .ok_or(PlaygroundError::UnknownBuffer { id: buffer.0 })
    }

    fn instance(&self, instance: InstanceId) -> PlaygroundResult<&HeadlessInstance> {
        self.instances
            .get(&instance.0)
            .ok_or(PlaygroundError::UnknownInstance { id: instance.0 })
    }

    /// Stores `text` and notifies listeners when it changed.
    fn write(&mut self, buffer: BufferId, text: String) -> PlaygroundResult<()> {
        let buf = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or(PlaygroundError::UnknownBuffer { id: buffer.0 })?;
        if buf.text == text {
            return Ok(());
        }
        buf.text = text;
        for listener in buf.listeners.iter_mut() {
            listener(&buf.text);
        }
        Ok(())
    }
}

/// Byte offset of `position` in `text`, or None when it lies outside.
pub fn offset_of(text: &str, position: Position) -> Option<usize> {
    if position.line == 0 || position.column == 0 {
        return None;
    }
    let mut line_start = 0;
    for (index, line) in text.split('\n').enumerate() {
        if index + 1 == position.line {
            let chars = line.chars().count();
            if position.column > chars + 1 {
                return None;
            }
            let within = line
                .char_indices()
                .nth(position.column - 1)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            return Some(line_start + within);
        }
        line_start += line.len() + 1;
    }
    None
}

fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

impl EditorWidget for HeadlessWidget {
    fn create_buffer(&mut self, content: &str, language: &str) -> PlaygroundResult<BufferId> {
        let id = self.allocate();
        self.buffers.insert(
            id,
            HeadlessBuffer {
                text: content.to_string(),
                language: language.to_string(),
                listeners: Vec::new(),
            },
        );
        Ok(BufferId(id))
    }

    fn on_content_change(&mut self, buffer: BufferId, listener: ChangeListener) -> PlaygroundResult<()> {
        self.buffers
            .get_mut(&buffer.0)
            .ok_or(PlaygroundError::UnknownBuffer { id: buffer.0 })?
            .listeners
            .push(listener);
        Ok(())
    }

    fn create_instance(
        &mut self,
        container: &str,
        model: BufferId,
        theme: EditorTheme,
        _options: &EditorOptions,
    ) -> PlaygroundResult<InstanceId> {
        self.buffer(model)?;
        let id = self.allocate();
        self.instances.insert(
            id,
            HeadlessInstance {
                container: container.to_string(),
                model,
                selection: None,
            },
        );
        self.theme = theme;
        Ok(InstanceId(id))
    }

    fn set_model(&mut self, instance: InstanceId, buffer: BufferId) -> PlaygroundResult<()> {
        self.buffer(buffer)?;
        let inst = self
            .instances
            .get_mut(&instance.0)
            .ok_or(PlaygroundError::UnknownInstance { id: instance.0 })?;
        inst.model = buffer;
        inst.selection = None;
        Ok(())
    }

    fn set_theme(&mut self, theme: EditorTheme) {
        self.theme = theme;
    }

    fn get_value(&self, buffer: BufferId) -> PlaygroundResult<String> {
        Ok(self.buffer(buffer)?.text.clone())
    }

    fn set_value(&mut self, buffer: BufferId, text: &str) -> PlaygroundResult<()> {
        self.write(buffer, text.to_string())
    }

    fn get_selection(&self, instance: InstanceId) -> PlaygroundResult<Option<TextRange>> {
        Ok(self.instance(instance)?.selection)
    }

    fn set_selection(&mut self, instance: InstanceId, selection: Option<TextRange>) -> PlaygroundResult<()> {
        self.instances
            .get_mut(&instance.0)
            .ok_or(PlaygroundError::UnknownInstance { id: instance.0 })?
            .selection = selection;
        Ok(())
    }

    fn get_value_in_range(&self, buffer: BufferId, range: TextRange) -> PlaygroundResult<String> {
        let text = &self.buffer(buffer)?.text;
        let start = offset_of(text, range.start).ok_or(PlaygroundError::PositionOutOfRange {
            line: range.start.line,
            column: range.start.column,
        })?;
        let end = offset_of(text, range.end).ok_or(PlaygroundError::PositionOutOfRange {
            line: range.end.line,
            column: range.end.column,
        })?;
        Ok(text[start..end].to_string())
    }

    fn execute_edit(&mut self, instance: InstanceId, range: TextRange, text: &str) -> PlaygroundResult<()> {
        let model = self.instance(instance)?.model;
        let current = &self.buffer(model)?.text;
        let start = offset_of(current, range.start).ok_or(PlaygroundError::PositionOutOfRange {
            line: range.start.line,
            column: range.start.column,
        })?;
        let end = offset_of(current, range.end).ok_or(PlaygroundError::PositionOutOfRange {
            line: range.end.line,
            column: range.end.column,
        })?;
        let mut next = String::with_capacity(current.len() + text.len());
        next.push_str(&current[..start]);
        next.push_str(text);
        next.push_str(&current[end..]);
        self.write(model, next)
    }

    fn resolve_position(&self, instance: InstanceId, x: f64, y: f64) -> Option<Position> {
        if x < 0.0 || y < 0.0 || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let model = self.instances.get(&instance.0)?.model;
        let text = &self.buffers.get(&model.0)?.text;
        let line = (y / LINE_HEIGHT).floor() as usize + 1;
        if line > line_count(text) {
            return None;
        }
        let line_len = text.split('\n').nth(line - 1).map(|l| l.chars().count()).unwrap_or(0);
        // Past the end of a line snaps to the line end, as real editors do.
        let column = ((x / CHAR_WIDTH).floor() as usize + 1).min(line_len + 1);
        Some(Position::new(line, column))
    }

    fn focus(&mut self, instance: InstanceId) {
        if self.instances.contains_key(&instance.0) {
            self.focused = Some(instance);
        }
    }

    fn dispose_instance(&mut self, instance: InstanceId) -> PlaygroundResult<()> {
        self.instances
            .remove(&instance.0)
            .ok_or(PlaygroundError::AlreadyDisposed { id: instance.0 })?;
        if self.focused == Some(instance) {
            self.focused = None;
        }
        Ok(())
    }

    fn dispose_buffer(&mut self, buffer: BufferId) -> PlaygroundResult<()> {
        if self.instances.values().any(|i| i.model == buffer) {
            return Err(PlaygroundError::WidgetUnavailable(format!(
                "buffer #{} is still attached to a live instance",
                buffer.0
            )));
        }
        self.buffers
            .remove(&buffer.0)
            .map(|_| ())
            .ok_or(PlaygroundError::AlreadyDisposed { id: buffer.0 })
    }
}

/// Module handing out headless widgets.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessModule;

impl WidgetModule for HeadlessModule {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_widget(&self) -> Box<dyn EditorWidget> {
        Box::new(HeadlessWidget::new())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

//! Interactive session: the event loop around a [`Playground`].
//!
//! One task owns the playground. It wakes for the next command, for a
//! finished gateway call, or for the earliest debounce/notification
//! deadline, and never blocks on the gateway itself: requests run on their
//! own tasks and report back over a channel.

use crate::error::{StudioError, StudioResult};
use crate::gateway::Gateway;
use crate::notify::{Notification, Notifier};
use crate::project::read_project;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::BroadcastStream;
use webcrafter_core::partition::validate_prompt;
use webcrafter_core::{
    CodeBundle, DragData, DropOutcome, EditorTheme, HeadlessWidget, KeyValueStore, Language,
    PaletteEntry, Playground, PlaygroundError, Position, TextRange,
};

/// Independent request slots: one generation and one refinement may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Generate,
    Refine,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Generate => "generation",
            Slot::Refine => "refinement",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InFlight {
    pub prompt: String,
    pub started_at: DateTime<Utc>,
}

/// Busy slots, shared with the request tasks that free them.
pub type SlotTable = Arc<DashMap<Slot, InFlight>>;

/// A parsed session command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replace the active buffer's text. `\n` in the argument is a newline.
    Edit(String),
    Undo,
    Redo,
    Lang(Language),
    /// Set a theme, or toggle with None.
    Theme(Option<EditorTheme>),
    Select(Position, Position),
    Drop(Position, String),
    Show(View),
    Template(PathBuf),
    Generate(String),
    Refine(String),
    RefineFile(String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Bundle,
    Preview,
    History,
    Notifications,
}

fn parse_position(raw: &str) -> StudioResult<Position> {
    let (line, column) = raw
        .split_once(':')
        .ok_or_else(|| {
            StudioError::InvalidArgument(format!("expected line:column, got '{}'", raw))
        })?;
    let parse = |s: &str| {
        s.parse::<usize>()
            .map_err(|_| StudioError::InvalidArgument(format!("bad position '{}'", raw)))
    };
    Ok(Position::new(parse(line)?, parse(column)?))
}

fn required(rest: &str, usage: &str) -> StudioResult<String> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(StudioError::InvalidArgument(format!("usage: {}", usage)))
    } else {
        Ok(rest.to_string())
    }
}

impl FromStr for Command {
    type Err = StudioError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim_start();

        match word {
            "edit" => Ok(Command::Edit(rest.replace("\\n", "\n"))),
            "undo" => Ok(Command::Undo),
            "redo" => Ok(Command::Redo),
            "lang" => required(rest, "lang <html|css|js>")?
                .parse()
                .map(Command::Lang)
                .map_err(StudioError::InvalidArgument),
            "theme" if rest.is_empty() => Ok(Command::Theme(None)),
            "theme" => rest
                .parse()
                .map(|t| Command::Theme(Some(t)))
                .map_err(StudioError::InvalidArgument),
            "select" => {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(a), Some(b)) => {
                        Ok(Command::Select(parse_position(a)?, parse_position(b)?))
                    }
                    _ => Err(StudioError::InvalidArgument("usage: select <l:c> <l:c>".into())),
                }
            }
            "drop" => {
                let (at, snippet) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| {
                        StudioError::InvalidArgument("usage: drop <l:c> <snippet>".into())
                    })?;
                Ok(Command::Drop(parse_position(at)?, snippet.trim().to_string()))
            }
            "show" => match rest {
                "" | "bundle" => Ok(Command::Show(View::Bundle)),
                "preview" => Ok(Command::Show(View::Preview)),
                "history" => Ok(Command::Show(View::History)),
                "notifications" => Ok(Command::Show(View::Notifications)),
                other => Err(StudioError::InvalidArgument(format!("unknown view '{}'", other))),
            },
            "template" => Ok(Command::Template(PathBuf::from(required(rest, "template <dir>")?))),
            "generate" => Ok(Command::Generate(rest.to_string())),
            "refine" => Ok(Command::Refine(rest.to_string())),
            "refine-file" => Ok(Command::RefineFile(rest.to_string())),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(StudioError::UnknownCommand(other.to_string())),
        }
    }
}

pub enum Reply {
    Text(String),
    Quit,
}

enum Completion {
    Generated(StudioResult<CodeBundle>),
    Refined(StudioResult<CodeBundle>),
    RefinedFile(Language, StudioResult<String>),
}

/// A bundle with no html never replaces the project.
fn non_blank(result: StudioResult<CodeBundle>) -> StudioResult<CodeBundle> {
    match result {
        Ok(bundle) if bundle.html.trim().is_empty() => Err(PlaygroundError::EmptyResult.into()),
        other => other,
    }
}

/// Current time on the runtime clock, so paused-clock tests stay consistent.
fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub struct Session<S: KeyValueStore> {
    playground: Playground<S>,
    notifier: Notifier,
    gateway: Option<Arc<dyn Gateway>>,
    slots: SlotTable,
    done_tx: mpsc::Sender<Completion>,
    done_rx: mpsc::Receiver<Completion>,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(
        playground: Playground<S>,
        gateway: Option<Arc<dyn Gateway>>,
        notification_ttl: Duration,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::channel(8);
        Self {
            playground,
            notifier: Notifier::new(notification_ttl),
            gateway,
            slots: Arc::new(DashMap::new()),
            done_tx,
            done_rx,
        }
    }

    pub fn playground(&self) -> &Playground<S> {
        &self.playground
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifier.active()
    }

    pub fn subscribe(&self) -> BroadcastStream<Notification> {
        self.notifier.subscribe()
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn is_busy(&self, slot: Slot) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.playground.next_deadline(), self.notifier.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let outcome = self.playground.tick(now);
        if outcome.saved {
            tracing::debug!("session: autosaved");
        }
        self.notifier.prune(now);
    }

    /// Runs one command.
    pub async fn handle(&mut self, command: Command, now: Instant) -> StudioResult<Reply> {
        let text = match command {
            Command::Edit(text) => {
                self.playground.type_text(&text, now);
                String::new()
            }
            Command::Undo => {
                if !self.playground.undo(now) {
                    self.notifier.info("Nothing to undo", now);
                }
                String::new()
            }
            Command::Redo => {
                if !self.playground.redo(now) {
                    self.notifier.info("Nothing to redo", now);
                }
                String::new()
            }
            Command::Lang(language) => {
                self.playground.set_active_language(language);
                format!("editing {}", language.file_name())
            }
            Command::Theme(theme) => {
                let theme = match theme {
                    Some(theme) => {
                        self.playground.set_theme(theme);
                        theme
                    }
                    None => self.playground.toggle_theme(),
                };
                format!("theme: {}", theme.as_str())
            }
            Command::Select(from, to) => {
                self.playground.select(Some(TextRange::new(from, to)));
                String::new()
            }
            Command::Drop(at, snippet) => self.drop_snippet(at, snippet, now)?,
            Command::Show(view) => self.render_view(view),
            Command::Template(dir) => {
                let bundle = read_project(&dir).await?;
                self.playground.load_template(bundle, now);
                self.notifier.success("Template loaded", now);
                String::new()
            }
            Command::Generate(prompt) => {
                self.start_generate(&prompt, now)?;
                "generating...".to_string()
            }
            Command::Refine(prompt) => {
                self.start_refine(&prompt, now)?;
                "refining...".to_string()
            }
            Command::RefineFile(prompt) => {
                self.start_refine_file(&prompt, now)?;
                "refining...".to_string()
            }
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    fn drop_snippet(
        &mut self,
        at: Position,
        snippet: String,
        now: Instant,
    ) -> StudioResult<String> {
        let mut entry = PaletteEntry::new("html", snippet);
        let mut data = DragData::new();
        entry.drag_start(&mut data)?;
        let (x, y) = HeadlessWidget::point_for(at);
        let outcome = self.playground.drop_snippet(&data, x, y, now);
        entry.drag_end();
        Ok(match outcome {
            DropOutcome::Inserted { position, .. } => format!("inserted at {}", position),
            DropOutcome::Unresolved => format!("nothing at {}", at),
            DropOutcome::Inert => "editor unavailable".to_string(),
            DropOutcome::NoPayload | DropOutcome::Malformed => "drop ignored".to_string(),
        })
    }

    fn render_view(&self, view: View) -> String {
        let mut out = String::new();
        match view {
            View::Bundle => {
                let bundle = self.playground.snapshot();
                for language in Language::ALL {
                    let _ = writeln!(out, "── {} ──\n{}", language.file_name(), bundle.get(language));
                }
            }
            View::Preview => {
                if let Some(frame) = self.playground.preview() {
                    out.push_str(&frame.srcdoc);
                }
            }
            View::History => {
                let history = self.playground.history();
                let _ = write!(
                    out,
                    "entry {}/{} (undo: {}, redo: {})",
                    history.index() + 1,
                    history.len(),
                    history.can_undo(),
                    history.can_redo()
                );
            }
            View::Notifications => {
                for n in self.notifier.active() {
                    let _ = writeln!(out, "[{:?}] {}", n.level, n.message);
                }
            }
        }
        out
    }

    fn gateway(&mut self, now: Instant) -> StudioResult<Arc<dyn Gateway>> {
        match &self.gateway {
            Some(gateway) => Ok(gateway.clone()),
            None => {
                self.notifier.error("AI is not configured: set OPENROUTER_API_KEY", now);
                Err(StudioError::MissingApiKey)
            }
        }
    }

    /// Marks `slot` busy, or notifies and fails if it already is.
    fn claim(&mut self, slot: Slot, prompt: &str, now: Instant) -> StudioResult<()> {
        if self.slots.contains_key(&slot) {
            self.notifier
                .error(format!("A {} is already running", slot.as_str()), now);
            return Err(StudioError::SlotBusy(slot.as_str()));
        }
        self.slots.insert(
            slot,
            InFlight {
                prompt: prompt.to_string(),
                started_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Runs `request` on its own task. A panicking request still frees the
    /// slot and reports back, through `failed`.
    fn spawn_request<F, E>(&self, slot: Slot, request: F, failed: E)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
        E: FnOnce(StudioError) -> Completion + Send + 'static,
    {
        let done = self.done_tx.clone();
        let slots = self.slots.clone();
        tokio::spawn(async move {
            let completion = match tokio::spawn(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::error!(
                        slot = slot.as_str(),
                        error = %e,
                        "session: request task failed"
                    );
                    failed(StudioError::TaskFailed(e.to_string()))
                }
            };
            slots.remove(&slot);
            let _ = done.send(completion).await;
        });
    }

    fn start_generate(&mut self, prompt: &str, now: Instant) -> StudioResult<()> {
        let prompt = validate_prompt(prompt)?.to_string();
        let gateway = self.gateway(now)?;
        self.claim(Slot::Generate, &prompt, now)?;
        self.playground.set_generating(true);
        tracing::info!(%prompt, "session: generation started");
        self.spawn_request(
            Slot::Generate,
            async move { Completion::Generated(gateway.generate(&prompt).await) },
            |e| Completion::Generated(Err(e)),
        );
        Ok(())
    }

    fn start_refine(&mut self, prompt: &str, now: Instant) -> StudioResult<()> {
        let prompt = validate_prompt(prompt)?.to_string();
        let gateway = self.gateway(now)?;
        self.claim(Slot::Refine, &prompt, now)?;
        let bundle = self.playground.snapshot();
        self.spawn_request(
            Slot::Refine,
            async move { Completion::Refined(gateway.refine(&prompt, &bundle).await) },
            |e| Completion::Refined(Err(e)),
        );
        Ok(())
    }

    fn start_refine_file(&mut self, prompt: &str, now: Instant) -> StudioResult<()> {
        let prompt = validate_prompt(prompt)?.to_string();
        let gateway = self.gateway(now)?;
        self.claim(Slot::Refine, &prompt, now)?;

        let language = self.playground.active_language();
        let bundle = self.playground.snapshot();
        let context = self.playground.refinement_context();
        let request = if context == bundle.get(language) {
            prompt
        } else {
            format!(
                "{}\n\nOnly change this part of {}:\n{}",
                prompt,
                language.file_name(),
                context
            )
        };
        self.spawn_request(
            Slot::Refine,
            async move {
                let result = gateway.refine_file(&request, language, &bundle).await;
                Completion::RefinedFile(language, result)
            },
            move |e| Completion::RefinedFile(language, Err(e)),
        );
        Ok(())
    }

    fn complete(&mut self, completion: Completion, now: Instant) {
        match completion {
            Completion::Generated(result) => {
                self.playground.set_generating(false);
                match non_blank(result) {
                    Ok(bundle) => {
                        self.playground.replace(bundle, now);
                        self.notifier.success("Code generated!", now);
                    }
                    Err(e) => {
                        self.notifier.error(format!("Generation failed: {}", e), now);
                    }
                }
            }
            Completion::Refined(result) => match non_blank(result) {
                Ok(bundle) => {
                    self.playground.replace(bundle, now);
                    self.notifier.success("Code refined!", now);
                }
                Err(e) => {
                    self.notifier.error(format!("Refinement failed: {}", e), now);
                }
            },
            Completion::RefinedFile(language, result) => match result {
                Ok(text) => {
                    self.playground.apply_refined_file(language, &text, now);
                    self.notifier
                        .success(format!("{} refined!", language.file_name()), now);
                }
                Err(e) => {
                    self.notifier.error(format!("Refinement failed: {}", e), now);
                }
            },
        }
    }

    /// Waits for the next gateway result and applies it.
    pub async fn apply_next_completion(&mut self) -> bool {
        match self.done_rx.recv().await {
            Some(completion) => {
                self.complete(completion, clock());
                true
            }
            None => false,
        }
    }

    /// Runs until `quit` or until the command channel closes, then flushes
    /// pending history and autosave work.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        replies: mpsc::Sender<String>,
    ) -> Self {
        loop {
            let deadline = self.next_deadline();
            let wake = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match self.handle(command, clock()).await {
                        Ok(Reply::Quit) => break,
                        Ok(Reply::Text(text)) if text.is_empty() => {}
                        Ok(Reply::Text(text)) => {
                            let _ = replies.send(text).await;
                        }
                        Err(e) => {
                            let _ = replies.send(format!("error: {}", e)).await;
                        }
                    }
                }
                Some(completion) = self.done_rx.recv() => {
                    self.complete(completion, clock());
                }
                _ = wake => {
                    self.tick(clock());
                }
            }
        }
        self.playground.shutdown(clock());
        tracing::info!("session: closed");
        self
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

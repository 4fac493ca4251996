//! Application page host and event loop
//!
//! A single render thread owns the screen, the [`TabRegistry`], and every
//! screen buffer. Pty reader tasks run concurrently but only post events
//! over a channel; all state mutation happens here, inside the
//! `tokio::select!` loop. The loop multiplexes three sources:
//! - crossterm input events (polled off-thread so the loop never blocks)
//! - session events from pty reader tasks (output bytes, close notices)
//! - the render tick
//!
//! Nothing in this module is fatal to the host: spawn failures degrade to a
//! status-line message, stale events are dropped, and only an explicit quit
//! (or closing the last tab) terminates the process.

use anyhow::{Context, Result};
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Text},
    widgets::Paragraph,
    Terminal as RatatuiTerminal,
};
use std::io;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::input::{encode_key, InputRouter, Routed};
use crate::navbar::{NavigationBar, StatusFooter};
use crate::registry::{
    CreateOutcome, NavDirection, RemoveOutcome, StaticView, TabContent, TabRegistry,
};
use crate::session::{Session, SessionEvent, SpawnError, SpawnSpec};

/// Render tick rate; redraws only happen when state changed
const TARGET_FPS: u64 = 60;

/// Rows reserved under the content area: navigation bar + status footer
const CHROME_ROWS: u16 = 2;

/// Title of the shell tabs opened with the new-shell hotkey
const SHELL_TAB_TITLE: &str = "shell";

/// Title of the home tab that is always present at startup
const HOME_TAB_TITLE: &str = "home";

/// The incident-response terminal application
pub struct App {
    config: Config,
    registry: TabRegistry,
    router: InputRouter,
    navbar: NavigationBar,
    footer: StatusFooter,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    should_quit: bool,
    dirty: bool,
    content_cols: u16,
    content_rows: u16,
}

impl App {
    /// Create the application with its home tab already in place. The home
    /// tab guarantees the registry is never empty, which is what makes
    /// "closing the last tab" a well-defined quit.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            config,
            registry: TabRegistry::new(),
            router: InputRouter::new(),
            navbar: NavigationBar::new(),
            footer: StatusFooter::new(),
            events_tx,
            events_rx,
            should_quit: false,
            dirty: true,
            content_cols: 80,
            content_rows: 24,
        };

        app.registry.create(HOME_TAB_TITLE, false, |_| {
            TabContent::Static(StaticView::new(home_view()))
        });
        app.sync_navbar();
        app
    }

    /// Main event loop
    ///
    /// # Errors
    /// Returns an error if terminal setup or drawing fails.
    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode().context(
            "Failed to enable raw mode. Ensure you're running in a proper terminal emulator.",
        )?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal =
            RatatuiTerminal::new(backend).context("Failed to create terminal backend")?;

        let size = terminal.size()?;
        self.set_geometry(size.width, size.height);

        info!("opsdeck started at {}x{}", size.width, size.height);

        let frame_duration = Duration::from_micros(1_000_000 / TARGET_FPS);
        let mut render_interval = interval(frame_duration);
        render_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.should_quit {
            tokio::select! {
                // User input, polled off-thread so the loop never blocks
                Ok(Ok(has_event)) = tokio::task::spawn_blocking(|| {
                    event::poll(Duration::from_millis(1))
                }) => {
                    if has_event {
                        match event::read() {
                            Ok(Event::Key(key)) => {
                                self.handle_key(key);
                                self.dirty = true;
                            }
                            Ok(Event::Resize(cols, rows)) => {
                                self.set_geometry(cols, rows);
                                self.dirty = true;
                            }
                            Ok(Event::Paste(text)) => {
                                self.deliver_to_active(text.as_bytes());
                                self.dirty = true;
                            }
                            _ => {}
                        }
                    }
                }

                // Output and close notices from session reader tasks,
                // marshaled onto this thread before touching any state
                Some(event) = self.events_rx.recv() => {
                    self.handle_session_event(event);
                }

                _ = render_interval.tick() => {
                    if self.dirty {
                        self.prepare_active_session();
                        terminal.draw(|f| self.render(f))?;
                        self.dirty = false;
                    }
                }
            }
        }

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
        terminal.show_cursor()?;

        info!("opsdeck shutdown complete");
        Ok(())
    }

    fn set_geometry(&mut self, cols: u16, rows: u16) {
        self.content_cols = cols;
        self.content_rows = rows.saturating_sub(CHROME_ROWS).max(1);
    }

    /// Dispatch a routed key event. The router decides; this only mutates.
    fn handle_key(&mut self, key: KeyEvent) {
        let routed = self.router.route(key);

        match routed {
            Routed::NewShellTab => self.open_shell_tab(),
            Routed::NewClusterTab => self.open_cluster_tab(),
            Routed::CloseActiveTab | Routed::CloseViaExitPhrase => {
                if let Some(region_id) = self.registry.active_region_id() {
                    self.remove_tab(region_id);
                }
            }
            Routed::NextTab => {
                self.registry.navigate(NavDirection::Next);
                self.after_mutation();
            }
            Routed::PreviousTab => {
                self.registry.navigate(NavDirection::Previous);
                self.after_mutation();
            }
            Routed::CommandModeArmed => {}
            Routed::JumpToOrdinal(ordinal) => {
                if self.registry.navigate_to_ordinal(ordinal).is_some() {
                    self.after_mutation();
                } else {
                    debug!("Ignoring jump to out-of-range tab {}", ordinal);
                }
            }
            Routed::Quit => {
                info!("Quit requested");
                self.should_quit = true;
            }
            Routed::Forward(key) => {
                if let Some(bytes) = encode_key(&key) {
                    self.deliver_to_active(&bytes);
                }
            }
            Routed::Ignored => {}
        }

        self.footer.set_command_mode(self.router.command_mode());
    }

    /// Open a new shell tab from the configured shell. Spawn failure is
    /// inline-reported; no tab is created.
    fn open_shell_tab(&mut self) {
        let program = self.config.shell.program.clone();
        match SpawnSpec::resolve(&program, vec![], SHELL_TAB_TITLE) {
            Ok(spec) => {
                self.create_session_tab(spec, false);
            }
            Err(e) => self.report_spawn_failure(&e, None),
        }
    }

    /// Open (or refocus) the cluster-login tool tab. A missing tool shows
    /// the configured install hint instead of an error trace.
    fn open_cluster_tab(&mut self) {
        let command = self.config.cluster.login_command.clone();
        let title = command.clone();
        match SpawnSpec::resolve(&command, vec![], title) {
            Ok(spec) => {
                self.create_session_tab(spec, true);
            }
            Err(e) => {
                let hint = self.config.cluster.install_hint.clone();
                self.report_spawn_failure(&e, Some(&hint));
            }
        }
    }

    /// Open (or refocus) a login tab for one specific cluster. This is the
    /// inbound surface the alert views call with a cluster identifier.
    pub fn open_cluster_login(&mut self, cluster_id: &str) {
        let command = self.config.cluster.login_command.clone();
        let title = format!("cluster-{cluster_id}");
        match SpawnSpec::resolve(&command, vec![cluster_id.to_string()], title) {
            Ok(spec) => {
                self.create_session_tab(spec, true);
            }
            Err(e) => {
                let hint = self.config.cluster.install_hint.clone();
                self.report_spawn_failure(&e, Some(&hint));
            }
        }
    }

    /// Open (or refocus) a read-only document tab, e.g. an operating
    /// procedure linked from an alert.
    pub fn open_document(&mut self, title: &str, body: impl Into<Text<'static>>) {
        let view = StaticView::new(body);
        let outcome = self
            .registry
            .create(title, true, move |_| TabContent::Static(view));
        self.log_create(outcome);
        self.after_mutation();
    }

    fn create_session_tab(&mut self, spec: SpawnSpec, is_resource_tab: bool) {
        let (cols, rows) = (self.content_cols, self.content_rows);
        let events = self.events_tx.clone();
        let title = spec.title.clone();

        let outcome = self.registry.create(title, is_resource_tab, move |region_id| {
            TabContent::Interactive(Session::new(spec, region_id, cols, rows, events))
        });
        self.log_create(outcome);
        self.after_mutation();
    }

    fn log_create(&mut self, outcome: CreateOutcome) {
        match outcome {
            CreateOutcome::Created(region_id) => debug!("Created tab region {}", region_id),
            CreateOutcome::FocusExisting(region_id) => {
                debug!("Refocused existing tab region {}", region_id);
            }
            CreateOutcome::AtCapacity => {
                // Soft cap, not an error; the operator closes tabs first
                debug!("Tab capacity reached, create ignored");
            }
        }
    }

    fn report_spawn_failure(&mut self, error: &SpawnError, hint: Option<&str>) {
        warn!("Spawn failed: {}", error);
        match hint {
            Some(hint) => self.footer.set_message(format!("{error} - install via {hint}")),
            None => self.footer.set_message(error.to_string()),
        }
    }

    /// Remove a tab by region id; quitting when it was the last one.
    /// Stale ids (process exit racing a manual close) are a no-op.
    fn remove_tab(&mut self, region_id: u64) {
        match self.registry.remove(region_id) {
            RemoveOutcome::Removed => self.after_mutation(),
            RemoveOutcome::Quit => {
                info!("Last tab closed, quitting");
                self.should_quit = true;
            }
            RemoveOutcome::Stale => {}
        }
    }

    /// Registry mutated: clear transient input state and re-sync the bar
    fn after_mutation(&mut self) {
        self.router.reset_typed();
        self.footer.clear_message();
        self.sync_navbar();
        self.dirty = true;
    }

    /// Rebuild the bar and move the highlight to the active tab. The
    /// highlight-changed signal is what swaps the visible content.
    fn sync_navbar(&mut self) {
        self.navbar.rebuild(&self.registry);
        if let Some(region_id) = self.registry.active_region_id() {
            if self.navbar.highlight(region_id) {
                self.dirty = true;
            }
        }
    }

    /// Events posted by reader tasks. A registry miss means the tab is
    /// already gone and the event is dropped.
    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Output { region_id, bytes } => {
                if let Some(tab) = self.registry.tab_by_region_mut(region_id) {
                    if let TabContent::Interactive(ref mut session) = tab.content {
                        session.handle_output(&bytes);
                        self.dirty = true;
                    }
                }
            }
            SessionEvent::Closed { region_id } => {
                debug!("Session closed for region {}", region_id);
                self.remove_tab(region_id);
                self.dirty = true;
            }
        }
    }

    /// Forward raw bytes to the active session, starting it first if its
    /// pty has not attached yet - input must never be dropped or delivered
    /// to an unstarted session.
    fn deliver_to_active(&mut self, bytes: &[u8]) {
        let (cols, rows) = (self.content_cols, self.content_rows);

        let mut failed = None;
        if let Some(tab) = self.registry.active_tab_mut() {
            if let TabContent::Interactive(ref mut session) = tab.content {
                session.resize(cols, rows);
                match session.ensure_started() {
                    Ok(()) => session.deliver_input(bytes),
                    Err(e) => failed = Some(e),
                }
            }
        }

        if let Some(e) = failed {
            self.handle_start_failure(&e);
        }
    }

    /// Lazy start for the active tab, run just before drawing so the first
    /// frame of a new tab already shows its process output geometry.
    fn prepare_active_session(&mut self) {
        let (cols, rows) = (self.content_cols, self.content_rows);

        let mut failed = None;
        if let Some(tab) = self.registry.active_tab_mut() {
            if let TabContent::Interactive(ref mut session) = tab.content {
                session.resize(cols, rows);
                failed = session.ensure_started().err();
            }
        }

        if let Some(e) = failed {
            self.handle_start_failure(&e);
        }
    }

    /// A pty attach failed after the tab was created. Degrade: report
    /// inline and take the broken tab down.
    fn handle_start_failure(&mut self, error: &SpawnError) {
        warn!("Session start failed: {}", error);
        self.footer.set_message(error.to_string());
        if let Some(region_id) = self.registry.active_region_id() {
            match self.registry.remove(region_id) {
                RemoveOutcome::Removed => {
                    self.router.reset_typed();
                    self.sync_navbar();
                }
                RemoveOutcome::Quit => self.should_quit = true,
                RemoveOutcome::Stale => {}
            }
        }
    }

    fn render(&mut self, f: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(f.size());

        self.render_content(f, chunks[0]);
        f.render_widget(Paragraph::new(self.navbar.line()), chunks[1]);
        f.render_widget(Paragraph::new(self.footer.line()), chunks[2]);
    }

    fn render_content(&self, f: &mut ratatui::Frame, area: Rect) {
        let Some(tab) = self.registry.active_tab() else {
            return;
        };

        match &tab.content {
            TabContent::Interactive(session) => {
                f.render_widget(Paragraph::new(session.screen().lines()), area);
                if session.running() {
                    let (col, row) = session.screen().cursor();
                    f.set_cursor(area.x + col.min(area.width.saturating_sub(1)),
                                 area.y + row.min(area.height.saturating_sub(1)));
                }
            }
            TabContent::Static(view) => {
                f.render_widget(
                    Paragraph::new(view.body.clone())
                        .wrap(ratatui::widgets::Wrap { trim: false }),
                    area,
                );
            }
        }
    }
}

/// Content of the always-present home tab
fn home_view() -> Text<'static> {
    Text::from(vec![
        Line::from("opsdeck - incident response console"),
        Line::from(""),
        Line::from("Open a shell with Ctrl+S, the cluster login tool with Ctrl+O."),
        Line::from("Cycle tabs with Ctrl+N / Ctrl+P, or press Ctrl+B then a tab number."),
        Line::from("Close the active tab with Ctrl+E, or type 'exit' inside a session."),
        Line::from("Ctrl+Q quits; closing the last remaining tab quits as well."),
    ])
}

//! Terminal console for monitoring and flying the vessel.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, Paragraph, Wrap},
    Terminal,
};
use smol_str::SmolStr;
use tracing::info;

use crate::config::PilotConfig;
use crate::pilot::{Pilot, PilotCommand, PilotEvent, Setpoint};
use crate::remote::RemoteApi;
use crate::telemetry::{
    AutopilotTarget, ConnectionState, ControlState, ModelView, TelemetrySnapshot,
};

mod commands;
mod input;
mod render;
mod state;

use commands::{execute_command, help_lines};
use input::handle_key;
use render::render_ui;
use state::apply_event;

const COLOR_TEAL: Color = Color::Rgb(0, 168, 150);
const COLOR_GREEN: Color = Color::Rgb(46, 204, 113);
const COLOR_AMBER: Color = Color::Rgb(243, 156, 18);
const COLOR_RED: Color = Color::Rgb(231, 76, 60);
const COLOR_INFO: Color = Color::Rgb(142, 142, 147);
const COLOR_YELLOW: Color = Color::Rgb(245, 196, 66);
const COLOR_CYAN: Color = Color::Rgb(64, 212, 255);
const COLOR_PROMPT_BG: Color = Color::Rgb(24, 24, 24);

const HEADING_STEP: f64 = 5.0;
const PITCH_STEP: f64 = 1.0;
const ROLL_STEP: f64 = 5.0;
const THROTTLE_STEP: f64 = 0.05;
const MAX_ALERTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelKind {
    Connection,
    Telemetry,
    Autopilot,
    Controls,
}

impl PanelKind {
    fn title(self) -> &'static str {
        match self {
            PanelKind::Connection => "Connection",
            PanelKind::Telemetry => "Telemetry",
            PanelKind::Autopilot => "Autopilot",
            PanelKind::Controls => "Controls",
        }
    }
}

/// Where `c` and a bare `/connect` go. Ports stay raw until the pilot
/// validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectTarget {
    address: SmolStr,
    rpc_port: i64,
    stream_port: i64,
}

impl ConnectTarget {
    fn command(&self) -> PilotCommand {
        PilotCommand::Connect {
            address: self.address.clone(),
            rpc_port: self.rpc_port,
            stream_port: self.stream_port,
        }
    }
}

/// Outcome of one key press or prompt submission.
#[derive(Debug, Clone, PartialEq)]
enum ConsoleAction {
    None,
    Send(PilotCommand),
    Quit,
}

#[derive(Debug, Clone)]
struct PromptLine {
    segments: Vec<(String, Style)>,
}

impl PromptLine {
    fn plain(text: impl Into<String>, style: Style) -> Self {
        Self {
            segments: vec![(text.into(), style)],
        }
    }

    fn from_segments<T: Into<String>>(segments: Vec<(T, Style)>) -> Self {
        Self {
            segments: segments
                .into_iter()
                .map(|(text, style)| (text.into(), style))
                .collect(),
        }
    }

    #[cfg(test)]
    fn text(&self) -> String {
        self.segments
            .iter()
            .map(|(text, _)| text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct PromptState {
    active: bool,
    input: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
    output: Vec<PromptLine>,
}

impl PromptState {
    fn activate_with(&mut self, text: &str) {
        self.active = true;
        self.input.clear();
        self.input.push_str(text);
        self.cursor = self.input.len();
        self.history_index = None;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.input.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    fn set_output(&mut self, lines: Vec<PromptLine>) {
        self.output = lines;
    }

    fn clear_output(&mut self) {
        self.output.clear();
    }

    fn push_history(&mut self, entry: String) {
        if !entry.trim().is_empty() && self.history.last() != Some(&entry) {
            self.history.push(entry);
        }
        self.history_index = None;
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let idx = match self.history_index {
            None => self.history.len() - 1,
            Some(idx) => idx.saturating_sub(1),
        };
        self.history_index = Some(idx);
        self.input = self.history[idx].clone();
        self.cursor = self.input.len();
    }

    fn history_next(&mut self) {
        let next = match self.history_index {
            Some(idx) if idx + 1 < self.history.len() => Some(idx + 1),
            _ => None,
        };
        self.history_index = next;
        match next {
            Some(idx) => {
                self.input = self.history[idx].clone();
                self.cursor = self.input.len();
            }
            None => {
                self.input.clear();
                self.cursor = 0;
            }
        }
    }
}

struct UiState {
    view: ModelView,
    target: ConnectTarget,
    source: &'static str,
    prompt: PromptState,
    alerts: VecDeque<PromptLine>,
}

impl UiState {
    fn new(target: ConnectTarget, source: &'static str) -> Self {
        Self {
            view: ModelView {
                state: ConnectionState::Disconnected,
                snapshot: None,
                ticks: 0,
                autopilot: AutopilotTarget::default(),
                controls: ControlState::default(),
                throttle_pending: false,
            },
            target,
            source,
            prompt: PromptState::default(),
            alerts: VecDeque::with_capacity(MAX_ALERTS),
        }
    }
}

/// Runs the console until the operator quits.
///
/// The pilot loop lives on its own thread; the console only sends commands
/// and renders the views it receives.
pub fn run_ui<A>(api: A, config: &PilotConfig, source: &'static str) -> anyhow::Result<()>
where
    A: RemoteApi + Send + 'static,
{
    let endpoint = &config.connection.endpoint;
    let target = ConnectTarget {
        address: endpoint.address.clone(),
        rpc_port: i64::from(endpoint.rpc_port),
        stream_port: i64::from(endpoint.stream_port),
    };
    let mut state = UiState::new(target, source);

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let (event_tx, event_rx) = crossbeam_channel::bounded(256);
    let pilot = Pilot::new(api, config.connection.name.clone(), config.autopilot)
        .with_events(event_tx);
    let tick_interval = config.console.tick_interval;
    let worker = thread::Builder::new()
        .name("kautopilly-pilot".into())
        .spawn(move || pilot.run(&command_rx, tick_interval))?;
    command_tx.send(state.target.command())?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(
        &mut terminal,
        &mut state,
        &command_tx,
        &event_rx,
        config.console.refresh,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let _ = command_tx.send(PilotCommand::Shutdown);
    drop(command_tx);
    drop(event_rx);
    if worker.join().is_err() {
        anyhow::bail!("pilot thread panicked");
    }
    info!("console closed");
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut UiState,
    commands: &Sender<PilotCommand>,
    events: &Receiver<PilotEvent>,
    refresh: Duration,
) -> anyhow::Result<()> {
    loop {
        for event in events.try_iter() {
            apply_event(state, event);
        }
        terminal.draw(|frame| render_ui(frame.size(), frame, state))?;

        if event::poll(refresh)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key(key, state) {
                    ConsoleAction::None => {}
                    ConsoleAction::Send(command) => commands.send(command)?,
                    ConsoleAction::Quit => return Ok(()),
                }
            }
        }
    }
}

fn panel_block(kind: PanelKind) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            format!(" {} ", kind.title()),
            Style::default()
                .fg(COLOR_YELLOW)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(COLOR_INFO))
}

fn label_style() -> Style {
    Style::default().fg(COLOR_CYAN)
}

fn value_style() -> Style {
    Style::default().fg(Color::White)
}

fn label_value_line(label: &str, value: &str, width: usize, value_style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<width$}"), label_style()),
        Span::raw(" "),
        Span::styled(value.to_string(), value_style),
    ])
}

fn seg(text: impl Into<String>, style: Style) -> (String, Style) {
    (text.into(), style)
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

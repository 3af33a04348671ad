//! # Terminal Reporter
//!
//! Redraws a fixed block of lines in place with `crossterm` cursor
//! commands. Renders at whatever cadence the controller polls (10 FPS by
//! default); some terminals cannot keep up with more.
//!
//! Log output that shares the terminal goes through a [`LogPane`]. The
//! reporter prints buffered log lines above the frame on each redraw, so
//! they scroll away instead of tearing the display.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::{
    cursor::MoveToPreviousLine,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

use super::Reporter;
use crate::config::ServerAddress;
use crate::swarm::SwarmSnapshot;

const BAR_WIDTH: usize = 30;

/// Progress bar for `value` out of `max`, e.g. `[#####-----]  5/10  50%`.
///
/// The fill ratio is clamped to `[0, 1]`; `max == 0` renders as complete.
pub fn progress_bar(value: u32, max: u32, width: usize) -> String {
    let ratio = if max == 0 {
        1.0
    } else {
        (f64::from(value) / f64::from(max)).clamp(0.0, 1.0)
    };
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!(
        "[{}{}] {}/{} {:>3}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        value,
        max,
        (ratio * 100.0).round() as u32
    )
}

#[derive(Debug, Default)]
struct PaneState {
    buffer: Vec<u8>,
    attached: bool,
}

/// Log sink shared between a log subscriber and a [`TerminalReporter`].
///
/// While a reporter is attached, writes are held until its next redraw.
/// Otherwise they go straight to stderr.
#[derive(Debug, Clone, Default)]
pub struct LogPane {
    state: Arc<Mutex<PaneState>>,
}

impl LogPane {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer for one log record
    pub fn writer(&self) -> LogPaneWriter {
        LogPaneWriter { pane: self.clone() }
    }

    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    fn lock(&self) -> MutexGuard<'_, PaneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self) {
        self.lock().attached = true;
    }

    /// Detach and hand back whatever was still buffered
    fn detach(&self) -> Vec<String> {
        let mut state = self.lock();
        state.attached = false;
        let mut rest = std::mem::take(&mut state.buffer);
        if !rest.is_empty() && rest.last() != Some(&b'\n') {
            rest.push(b'\n');
        }
        split_lines(rest)
    }

    /// Complete lines buffered so far; a trailing partial line stays put
    fn take_lines(&self) -> Vec<String> {
        let mut state = self.lock();
        let Some(end) = state.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = state.buffer.drain(..=end).collect();
        split_lines(complete)
    }
}

fn split_lines(bytes: Vec<u8>) -> Vec<String> {
    String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Writer handed out by [`LogPane::writer`]
#[derive(Debug)]
pub struct LogPaneWriter {
    pane: LogPane,
}

impl Write for LogPaneWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.pane.lock();
        if state.attached {
            state.buffer.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            drop(state);
            io::stderr().write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pane.is_attached() {
            Ok(())
        } else {
            io::stderr().flush()
        }
    }
}

/// In-place terminal progress display
pub struct TerminalReporter<W: Write + Send + 'static> {
    out: W,
    target: ServerAddress,
    lines_drawn: u16,
    logs: Option<LogPane>,
}

impl TerminalReporter<io::Stdout> {
    /// Draw to standard output
    pub fn stdout(target: ServerAddress) -> Self {
        Self::new(io::stdout(), target)
    }
}

impl<W: Write + Send + 'static> TerminalReporter<W> {
    pub fn new(out: W, target: ServerAddress) -> Self {
        Self {
            out,
            target,
            lines_drawn: 0,
            logs: None,
        }
    }

    /// Print lines written to `pane` above the frame until closed
    pub fn with_log_pane(mut self, pane: LogPane) -> Self {
        pane.attach();
        self.logs = Some(pane);
        self
    }

    /// Consume the reporter and return its writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn frame(&self, snapshot: &SwarmSnapshot) -> Vec<String> {
        vec![
            format!("StressCraft ─ {}", self.target),
            format!("📦 Chunks      {}", snapshot.world_units_loaded),
            format!("✖  Failed      {}", snapshot.sessions_failed),
            String::new(),
            format!(
                "Connections  {}",
                progress_bar(snapshot.sessions_created, snapshot.target_count, BAR_WIDTH)
            ),
            format!(
                "Players      {}",
                progress_bar(snapshot.sessions_active, snapshot.target_count, BAR_WIDTH)
            ),
        ]
    }

    fn draw(&mut self, logs: Vec<String>, snapshot: &SwarmSnapshot) -> io::Result<()> {
        if self.lines_drawn > 0 {
            queue!(self.out, MoveToPreviousLine(self.lines_drawn))?;
        }
        let frame = self.frame(snapshot);
        for line in logs.iter().chain(&frame) {
            queue!(
                self.out,
                Clear(ClearType::UntilNewLine),
                Print(line),
                Print("\n")
            )?;
        }
        self.lines_drawn = frame.len() as u16;
        self.out.flush()
    }
}

impl<W: Write + Send + 'static> Reporter for TerminalReporter<W> {
    fn render(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        let logs = self.logs.as_ref().map(LogPane::take_lines).unwrap_or_default();
        self.draw(logs, snapshot)
    }

    fn close(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        let logs = self.logs.take().map(|pane| pane.detach()).unwrap_or_default();
        self.draw(logs, snapshot)?;
        // Leave the last frame on screen and write below it from now on.
        self.lines_drawn = 0;
        Ok(())
    }
}

//! Display pacing for streamed text
//!
//! Tokens arrive in bursts. The smoother keeps everything received so far
//! and reveals it on a fixed tick, advancing faster when the backlog grows.
//! A single loop drives the buffer through `Streaming -> Draining ->
//! Complete`; the loading indicator is `phase != Complete`.
//!
//! `displayed` is always a prefix of `received` and never shrinks.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// Characters to reveal for a backlog of `backlog` characters
pub fn chunk_size(backlog: usize) -> usize {
    match backlog {
        0..=10 => 1,
        11..=20 => 2,
        21..=50 => 3,
        _ => 5,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Tokens may still arrive
    Streaming,
    /// The stream ended; revealing the remaining backlog
    Draining,
    Complete,
}

#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    received: String,
    /// Byte offset into `received`, always on a char boundary
    cursor: usize,
    phase: Phase,
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self {
            received: String::new(),
            cursor: 0,
            phase: Phase::Streaming,
        }
    }

    /// Append received text. Ignored once the stream has finished.
    pub fn push(&mut self, text: &str) {
        if self.phase != Phase::Streaming {
            tracing::debug!(len = text.len(), "Dropping text received after finish");
            return;
        }
        self.received.push_str(text);
    }

    /// Mark the stream as ended
    pub fn finish(&mut self) {
        if self.phase == Phase::Streaming {
            self.phase = if self.backlog() == 0 {
                Phase::Complete
            } else {
                Phase::Draining
            };
        }
    }

    /// Advance the display by one step. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        let before = (self.cursor, self.phase);

        let backlog = self.backlog();
        if backlog > 0 {
            let rest = &self.received[self.cursor..];
            let step = rest
                .char_indices()
                .nth(chunk_size(backlog))
                .map(|(offset, _)| offset)
                .unwrap_or(rest.len());
            self.cursor += step;
        }

        if self.phase == Phase::Draining && self.backlog() == 0 {
            self.phase = Phase::Complete;
        }

        before != (self.cursor, self.phase)
    }

    pub fn received(&self) -> &str {
        &self.received
    }

    pub fn displayed(&self) -> &str {
        &self.received[..self.cursor]
    }

    /// Characters received but not yet displayed
    pub fn backlog(&self) -> usize {
        self.received[self.cursor..].chars().count()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Complete
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            displayed: self.displayed().to_string(),
            phase: self.phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmootherInput {
    Token(String),
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub displayed: String,
    pub phase: Phase,
}

impl DisplaySnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Complete
    }
}

/// Drives a [`DisplayBuffer`] from an input channel and a fixed tick
pub struct Smoother {
    buffer: DisplayBuffer,
    tick: Duration,
    input: mpsc::Receiver<SmootherInput>,
    output: watch::Sender<DisplaySnapshot>,
}

impl Smoother {
    pub fn new(
        tick: Duration,
        input: mpsc::Receiver<SmootherInput>,
    ) -> (Self, watch::Receiver<DisplaySnapshot>) {
        let buffer = DisplayBuffer::new();
        let (output, snapshots) = watch::channel(buffer.snapshot());
        (
            Self {
                buffer,
                tick,
                input,
                output,
            },
            snapshots,
        )
    }

    /// Run until everything received has been displayed. Returns the final
    /// text. A closed input channel counts as the end of the stream.
    pub async fn run(mut self) -> String {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut input_open = true;

        while self.buffer.phase() != Phase::Complete {
            let changed = tokio::select! {
                input = self.input.recv(), if input_open => match input {
                    Some(SmootherInput::Token(text)) => {
                        self.buffer.push(&text);
                        false
                    }
                    Some(SmootherInput::Finished) | None => {
                        input_open = false;
                        self.buffer.finish();
                        true
                    }
                },
                _ = ticker.tick() => self.buffer.tick(),
            };

            if changed {
                let snapshot = self.buffer.snapshot();
                self.output.send_if_modified(|current| {
                    if *current == snapshot {
                        return false;
                    }
                    *current = snapshot;
                    true
                });
            }
        }

        self.buffer.displayed().to_string()
    }
}

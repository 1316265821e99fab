//! Downstream collaborators of the detector: where actions go and what gets logged.

mod journal;

use agent::{Action, Decision};
use std::io::{self, Write};

pub use journal::{Event, EventJournal, LoggedReading};

pub trait ActionSink {
    fn send(&mut self, action: Action) -> io::Result<()>;
}

/// Forward every action of a decision, in order.
pub fn dispatch<S: ActionSink + ?Sized>(sink: &mut S, decision: &Decision) -> io::Result<()> {
    for &action in &decision.actions {
        sink.send(action)?;
    }
    Ok(())
}

/// No hardware attached: actions are only logged.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn send(&mut self, action: Action) -> io::Result<()> {
        tracing::info!(command = action.command(), "agent action");
        Ok(())
    }
}

/// Line-oriented command link, one `COMMAND\n` per action.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ActionSink for WriterSink<W> {
    fn send(&mut self, action: Action) -> io::Result<()> {
        writeln!(self.out, "{}", action.command())?;
        self.out.flush()?;
        tracing::debug!(command = action.command(), "sent");
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<Action>,
}

impl ActionSink for RecordingSink {
    fn send(&mut self, action: Action) -> io::Result<()> {
        self.sent.push(action);
        Ok(())
    }
}

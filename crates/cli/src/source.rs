use agent::Reading;
use anyhow::{Context, Result};
use sim::SimDevice;
use std::io::BufRead;

/// Anything that can hand the driver loop one reading per tick.
pub trait ReadingSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_reading(&mut self) -> Result<Option<Reading>>;
}

impl ReadingSource for SimDevice {
    fn next_reading(&mut self) -> Result<Option<Reading>> {
        Ok(Some(self.read()))
    }
}

/// Replays readings from JSON lines such as `{"temp": 45.1, "volt": 5.0, "curr": 1.2}`.
/// Blank lines are skipped.
pub struct JsonlSource<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> ReadingSource for JsonlSource<R> {
    fn next_reading(&mut self) -> Result<Option<Reading>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("reading input line {}", self.line_no))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let r = serde_json::from_str(line)
                .with_context(|| format!("parsing input line {}", self.line_no))?;
            return Ok(Some(r));
        }
        Ok(None)
    }
}

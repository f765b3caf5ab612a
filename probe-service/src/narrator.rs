//! Probe narration.
//!
//! The prober describes what it is doing through a [`Narrator`] instead of
//! printing, so callers choose where the lines go.

use std::sync::Mutex;

/// Receives human-readable status lines from the prober.
pub trait Narrator: Send + Sync {
    fn narrate(&self, line: String);
}

/// Emits every line as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNarrator;

impl Narrator for TracingNarrator {
    fn narrate(&self, line: String) {
        tracing::info!(target: "probe", "{}", line);
    }
}

/// Keeps every line in memory, and mirrors it to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct RecordingNarrator {
    lines: Mutex<Vec<String>>,
}

impl RecordingNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drains the recorded lines.
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(
            &mut *self
                .lines
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl Narrator for RecordingNarrator {
    fn narrate(&self, line: String) {
        tracing::debug!(target: "probe", "{}", line);
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_keeps_order_and_drains() {
        let narrator = RecordingNarrator::new();
        narrator.narrate("first".into());
        narrator.narrate("second".into());
        assert_eq!(narrator.lines(), vec!["first", "second"]);
        assert_eq!(narrator.take_lines(), vec!["first", "second"]);
        assert!(narrator.lines().is_empty());
    }
}

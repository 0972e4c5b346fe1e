/// Receives stage progress of a build.
pub trait ProgressSink {
    /// `fraction` is in `0.0..=1.0`.
    fn report(&self, stage: &str, fraction: f32);

    /// Called once when a run ends, whether it succeeded or not.
    fn clear(&self) {}
}

/// Discards progress; used for unattended builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _stage: &str, _fraction: f32) {}
}

/// Logs each stage at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, stage: &str, fraction: f32) {
        tracing::info!(progress = format_args!("{:.0}%", fraction * 100.0), "{stage}...");
    }
}

/// Clears the sink when dropped, so every exit path of a run clears it.
pub(crate) struct ClearOnDrop<'a>(pub &'a dyn ProgressSink);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

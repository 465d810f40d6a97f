//! routinely-notify: best-effort reminder delivery sinks.
//!
//! Two delivery channels: desktop notifications and speech. Both are modeled
//! as trait objects so the scheduler never branches on backend availability;
//! when no real backend is installed, `detect_*` hands back a log-only null
//! sink instead.

pub mod desktop;
pub mod speech;

pub use desktop::{CommandDesktopSink, NullDesktopSink};
pub use speech::{CommandSpeechSink, NullSpeechSink};

use std::path::Path;
use std::sync::Arc;

/// A desktop-notification backend.
#[async_trait::async_trait]
pub trait DesktopSink: Send + Sync {
    /// Backend identifier for logging.
    fn name(&self) -> &str;

    /// Whether this sink can actually deliver (null sinks return false).
    fn available(&self) -> bool;

    /// Show a notification. Best-effort; errors are logged by the caller.
    async fn send(&self, title: &str, body: &str, timeout_secs: u32) -> anyhow::Result<()>;
}

/// A text-to-speech backend.
#[async_trait::async_trait]
pub trait SpeechSink: Send + Sync {
    /// Backend identifier for logging.
    fn name(&self) -> &str;

    /// Whether this sink can actually deliver (null sinks return false).
    fn available(&self) -> bool;

    /// Speak the text, blocking until playback finishes. Best-effort.
    async fn say(&self, text: &str) -> anyhow::Result<()>;
}

/// Look up a binary in `$PATH`.
fn find_in_path(binary: &str) -> Option<std::path::PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| Path::new(candidate).is_file())
}

/// Pick the best desktop-notification sink for this machine.
///
/// Falls back to a log-only sink when no supported tool is installed.
pub fn detect_desktop() -> Arc<dyn DesktopSink> {
    for candidate in desktop::CANDIDATES {
        if find_in_path(candidate.binary).is_some() {
            tracing::info!(backend = candidate.binary, "Desktop notification backend found");
            return Arc::new(CommandDesktopSink::new(candidate));
        }
    }
    tracing::warn!("No desktop notification backend found, notifications will be log-only");
    Arc::new(NullDesktopSink)
}

/// Pick the best speech sink for this machine.
///
/// Falls back to a log-only sink when no supported tool is installed.
pub fn detect_speech() -> Arc<dyn SpeechSink> {
    for candidate in speech::CANDIDATES {
        if find_in_path(candidate.binary).is_some() {
            tracing::info!(backend = candidate.binary, "Speech backend found");
            return Arc::new(CommandSpeechSink::new(candidate));
        }
    }
    tracing::warn!("No speech backend found, reminders will not be spoken");
    Arc::new(NullSpeechSink)
}

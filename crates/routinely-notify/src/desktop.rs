//! Desktop notification delivery via external tools.

use anyhow::Context;
use tokio::process::Command;
use tracing::debug;

use crate::DesktopSink;

/// How to invoke one supported notification tool.
#[derive(Debug, Clone, Copy)]
pub struct DesktopCommand {
    pub binary: &'static str,
    kind: DesktopKind,
}

#[derive(Debug, Clone, Copy)]
enum DesktopKind {
    /// Linux `notify-send TITLE BODY -t MILLIS`.
    NotifySend,
    /// macOS `osascript -e 'display notification ...'`.
    Osascript,
}

/// Tools probed in order by `detect_desktop`.
pub const CANDIDATES: &[DesktopCommand] = &[
    DesktopCommand {
        binary: "notify-send",
        kind: DesktopKind::NotifySend,
    },
    DesktopCommand {
        binary: "osascript",
        kind: DesktopKind::Osascript,
    },
];

/// Desktop sink backed by an external command.
pub struct CommandDesktopSink {
    command: DesktopCommand,
}

impl CommandDesktopSink {
    pub fn new(command: &DesktopCommand) -> Self {
        Self { command: *command }
    }
}

#[async_trait::async_trait]
impl DesktopSink for CommandDesktopSink {
    fn name(&self) -> &str {
        self.command.binary
    }

    fn available(&self) -> bool {
        true
    }

    async fn send(&self, title: &str, body: &str, timeout_secs: u32) -> anyhow::Result<()> {
        let mut cmd = Command::new(self.command.binary);
        match self.command.kind {
            DesktopKind::NotifySend => {
                cmd.arg(title)
                    .arg(body)
                    .arg("-t")
                    .arg((timeout_secs * 1000).to_string());
            }
            DesktopKind::Osascript => {
                // osascript has no timeout knob; the system dismisses banners itself.
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    body.replace('"', "\\\""),
                    title.replace('"', "\\\"")
                );
                cmd.arg("-e").arg(script);
            }
        }

        let status = cmd
            .status()
            .await
            .with_context(|| format!("failed to spawn {}", self.command.binary))?;

        if !status.success() {
            anyhow::bail!("{} exited with {status}", self.command.binary);
        }
        debug!(backend = self.command.binary, title, "Desktop notification delivered");
        Ok(())
    }
}

/// Log-only sink used when no notification tool is installed.
pub struct NullDesktopSink;

#[async_trait::async_trait]
impl DesktopSink for NullDesktopSink {
    fn name(&self) -> &str {
        "null"
    }

    fn available(&self) -> bool {
        false
    }

    async fn send(&self, title: &str, body: &str, _timeout_secs: u32) -> anyhow::Result<()> {
        tracing::info!(title, body, "Desktop notification (no backend, log only)");
        Ok(())
    }
}

//! Speech delivery via external text-to-speech tools.

use anyhow::Context;
use tokio::process::Command;
use tracing::debug;

use crate::SpeechSink;

/// How to invoke one supported TTS tool. All candidates take the text to
/// speak as a single trailing argument.
#[derive(Debug, Clone, Copy)]
pub struct SpeechCommand {
    pub binary: &'static str,
    args: &'static [&'static str],
}

/// Tools probed in order by `detect_speech`.
pub const CANDIDATES: &[SpeechCommand] = &[
    SpeechCommand {
        binary: "espeak-ng",
        args: &[],
    },
    SpeechCommand {
        binary: "espeak",
        args: &[],
    },
    // macOS built-in
    SpeechCommand {
        binary: "say",
        args: &[],
    },
    // speech-dispatcher client; -w waits for playback to finish
    SpeechCommand {
        binary: "spd-say",
        args: &["-w"],
    },
];

/// Speech sink backed by an external command.
pub struct CommandSpeechSink {
    command: SpeechCommand,
}

impl CommandSpeechSink {
    pub fn new(command: &SpeechCommand) -> Self {
        Self { command: *command }
    }
}

#[async_trait::async_trait]
impl SpeechSink for CommandSpeechSink {
    fn name(&self) -> &str {
        self.command.binary
    }

    fn available(&self) -> bool {
        true
    }

    async fn say(&self, text: &str) -> anyhow::Result<()> {
        let status = Command::new(self.command.binary)
            .args(self.command.args)
            .arg(text)
            .status()
            .await
            .with_context(|| format!("failed to spawn {}", self.command.binary))?;

        if !status.success() {
            anyhow::bail!("{} exited with {status}", self.command.binary);
        }
        debug!(backend = self.command.binary, "Speech delivered");
        Ok(())
    }
}

/// Log-only sink used when no TTS tool is installed.
pub struct NullSpeechSink;

#[async_trait::async_trait]
impl SpeechSink for NullSpeechSink {
    fn name(&self) -> &str {
        "null"
    }

    fn available(&self) -> bool {
        false
    }

    async fn say(&self, text: &str) -> anyhow::Result<()> {
        tracing::info!(text, "Would speak (no TTS backend, log only)");
        Ok(())
    }
}

//! Text delivery via the system clipboard, with optional paste automation.
//!
//! Two mechanisms:
//! - Clipboard write: `pbcopy` fed over stdin
//! - Paste keystroke: `osascript` driving System Events to press Cmd+V
//!
//! The `CommandExecutor` trait enables full testability without touching the
//! real clipboard.

use crate::error::{Result, SottoError};
use std::io::Write;
use std::process::{Command, Stdio};

/// AppleScript that synthesizes a Cmd+V keystroke in the focused app.
const PASTE_SCRIPT: &str =
    r#"tell application "System Events" to keystroke "v" using command down"#;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command, optionally feeding `stdin` to it.
    ///
    /// Returns the command's stdout on success.
    fn run(&self, command: &str, args: &[&str], stdin: Option<&str>) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, command: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let mut builder = Command::new(command);
        builder.args(args);
        if stdin.is_some() {
            builder.stdin(Stdio::piped());
        }
        builder.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = builder.spawn().map_err(|e| map_spawn_error(command, &e))?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes())
                .map_err(|e| SottoError::ClipboardFailed {
                    message: format!("Failed to write to {} stdin: {}", command, e),
                })?;
            // Pipe must close so the command sees EOF.
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SottoError::Other(format!("Failed to wait for {}: {}", command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(map_failure(command, &stderr, output.status.code()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn map_spawn_error(command: &str, error: &std::io::Error) -> SottoError {
    match error.kind() {
        std::io::ErrorKind::NotFound => SottoError::OutputToolNotFound {
            tool: command.to_string(),
        },
        std::io::ErrorKind::PermissionDenied => SottoError::PastePermissionDenied {
            message: format!("Permission denied executing {}: {}", command, error),
        },
        _ => SottoError::Other(format!("Failed to execute {}: {}", command, error)),
    }
}

fn map_failure(command: &str, stderr: &str, code: Option<i32>) -> SottoError {
    // osascript reports a missing Accessibility grant as error -1719 or a
    // "not allowed to send keystrokes" message.
    if command == "osascript"
        && (stderr.contains("not allowed") || stderr.contains("1719"))
    {
        return SottoError::PastePermissionDenied {
            message: format!(
                "{}. Grant Accessibility access to your terminal in \
                 System Settings > Privacy & Security.",
                stderr.trim()
            ),
        };
    }
    SottoError::Other(format!(
        "{} failed with status {:?}: {}",
        command,
        code,
        stderr.trim()
    ))
}

/// Delivers text to the system via a CommandExecutor.
pub struct TextOutput<E: CommandExecutor> {
    executor: E,
}

impl<E: CommandExecutor> TextOutput<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Write text to the system clipboard.
    pub fn copy(&self, text: &str) -> Result<()> {
        self.executor
            .run("pbcopy", &[], Some(text))
            .map_err(|e| match e {
                SottoError::OutputToolNotFound { tool } => SottoError::ClipboardFailed {
                    message: format!("{} not found; is this a macOS host?", tool),
                },
                other => other,
            })?;
        Ok(())
    }

    /// Synthesize a paste keystroke in the focused application.
    ///
    /// Fails with `PastePermissionDenied` when the host has not granted the
    /// required Accessibility permission; callers are expected to degrade to
    /// clipboard-only delivery.
    pub fn paste(&self) -> Result<()> {
        self.executor
            .run("osascript", &["-e", PASTE_SCRIPT], None)
            .map_err(|e| match e {
                SottoError::Other(message) => SottoError::PasteFailed { message },
                other => other,
            })?;
        Ok(())
    }
}

impl TextOutput<SystemCommandExecutor> {
    /// TextOutput backed by real system commands.
    pub fn system() -> Self {
        Self::new(SystemCommandExecutor::new())
    }
}

#[allow(clippy::unwrap_used)]
pub mod testing {
    //! Recording executor shared by unit and integration tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Records every call; fails calls whose command has a queued error.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingExecutor {
        calls: Arc<Mutex<Vec<(String, Vec<String>, Option<String>)>>>,
        failures: Arc<Mutex<VecDeque<(String, SottoError)>>>,
    }

    impl RecordingExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue an error returned by the next call to `command`; other
        /// commands keep succeeding.
        pub fn with_failure_for(self, command: &str, error: SottoError) -> Self {
            self.failures
                .lock()
                .unwrap()
                .push_back((command.to_string(), error));
            self
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandExecutor for RecordingExecutor {
        fn run(&self, command: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
            self.calls.lock().unwrap().push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
                stdin.map(|s| s.to_string()),
            ));

            let mut failures = self.failures.lock().unwrap();
            if let Some(position) = failures.iter().position(|(cmd, _)| cmd == command) {
                let (_, error) = failures.remove(position).unwrap_or_else(|| unreachable!());
                return Err(error);
            }
            Ok(String::new())
        }
    }
}

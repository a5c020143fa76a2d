//! Terminal station that delivers transcribed text to the system.

use crate::output::clipboard::{CommandExecutor, TextOutput};
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::TranscriptionResult;

/// Station that applies transcription results in sequence order.
///
/// Successful results go to the clipboard (and optionally trigger a paste
/// keystroke); failed results are reported and write nothing. A single
/// consumer thread processes results one at a time, which is what keeps
/// utterance N+1 from landing before N.
pub struct ApplierStation<E: CommandExecutor> {
    output: TextOutput<E>,
    paste_enabled: bool,
    quiet: bool,
    applied: u64,
    last_sequence: Option<u64>,
}

impl<E: CommandExecutor> ApplierStation<E> {
    pub fn new(output: TextOutput<E>, paste_enabled: bool) -> Self {
        Self {
            output,
            paste_enabled,
            quiet: false,
            applied: 0,
            last_sequence: None,
        }
    }

    /// Suppresses transcription echo to stderr.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Number of results delivered to the clipboard.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl<E: CommandExecutor + Send + 'static> Station for ApplierStation<E> {
    type Input = TranscriptionResult;
    type Output = (); // Terminal station - doesn't produce output

    fn name(&self) -> &'static str {
        "applier"
    }

    fn process(&mut self, result: TranscriptionResult) -> Result<Option<()>, StationError> {
        // Single-worker transcription upstream guarantees order; this only
        // trips if that invariant is broken by a future change.
        if let Some(last) = self.last_sequence {
            debug_assert!(
                result.sequence >= last,
                "result {} arrived after {}",
                result.sequence,
                last
            );
        }
        self.last_sequence = Some(result.sequence);

        let text = match result.outcome {
            Ok(text) => text,
            Err(error) => {
                return Err(StationError::Recoverable(format!(
                    "utterance {} not transcribed: {}",
                    result.sequence, error
                )));
            }
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        if !self.quiet {
            eprintln!("\"{}\"", trimmed);
        }

        // Trailing space so consecutive utterances flow when pasted
        // back-to-back.
        self.output
            .copy(&format!("{} ", trimmed))
            .map_err(|e| StationError::Recoverable(format!("clipboard write failed: {}", e)))?;

        if self.paste_enabled
            && let Err(error) = self.output.paste()
        {
            // Degraded success: the text is on the clipboard either way.
            eprintln!("sotto: paste unavailable ({}); text left on clipboard", error);
        }

        self.applied += 1;
        Ok(None)
    }
}

//! Core station abstraction and runner for the dictation pipeline.

use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing station in the pipeline.
///
/// Each station receives input, processes it, and produces output.
/// Stations run in their own threads and are connected by bounded channels.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., filtered)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Called once when the input channel closes, before `shutdown`.
    ///
    /// A station holding partial state (e.g. a half-built utterance) can emit
    /// one final output here.
    fn flush(&mut self) -> Result<Option<Self::Output>, StationError> {
        Ok(None)
    }

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called when the station is shutting down.
    fn shutdown(&mut self) {}
}

/// Runs a station in a dedicated thread.
pub struct StationRunner<S: Station> {
    /// Handle to the spawned thread.
    handle: Option<JoinHandle<()>>,
    /// Name of the station (cached for error reporting).
    station_name: &'static str,
    /// Phantom data to mark the station type.
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Spawns a new station in a dedicated thread.
    ///
    /// # Arguments
    /// * `station` - The station implementation to run
    /// * `input_rx` - Channel to receive inputs from
    /// * `output_tx` - Channel to send outputs to
    /// * `error_reporter` - Reporter for handling errors
    pub fn spawn(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let station_name = station.name();

        let handle = thread::spawn(move || {
            Self::run_station(&mut station, input_rx, output_tx, error_reporter);
        });

        Self {
            handle: Some(handle),
            station_name,
            _phantom: PhantomData,
        }
    }

    /// Main processing loop for the station.
    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let station_name = station.name();
        let mut fatal = false;

        while let Ok(input) = input_rx.recv() {
            match station.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_err() {
                        // Output channel closed, shutdown
                        break;
                    }
                }
                Ok(None) => {
                    // No output produced (filtered), continue
                }
                Err(StationError::Recoverable(msg)) => {
                    // Report but continue processing
                    error_reporter.report(station_name, &StationError::Recoverable(msg));
                }
                Err(StationError::Fatal(msg)) => {
                    // Report and shutdown
                    error_reporter.report(station_name, &StationError::Fatal(msg));
                    fatal = true;
                    break;
                }
            }
        }

        // Input channel closed normally: give the station one chance to emit
        // whatever it was still holding.
        if !fatal {
            match station.flush() {
                Ok(Some(output)) => {
                    let _ = output_tx.send(output);
                }
                Ok(None) => {}
                Err(err) => {
                    error_reporter.report(station_name, &err);
                }
            }
        }

        // Cleanup on shutdown
        station.shutdown();
    }

    /// Waits for the station thread to complete.
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| format!("Station '{}' thread panicked", self.station_name))
        } else {
            Ok(())
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

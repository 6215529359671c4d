//! Record and playback session orchestration
//!
//! A [`Session`] owns the hardware line handles for one device and
//! coordinates the full paths:
//!
//! - record: subscribe to edges, run the capture machine per requested
//!   command (retrying after short codes), normalize, merge into the
//!   persisted library, re-normalize the whole library, rotate backups,
//!   save.
//! - playback: load the library, synthesize the chain, emit at the
//!   requested instant, wait out transmission, release segments.
//!
//! All line state is owned here; there is no ambient device singleton.
//! Edge events are consumed by the single session task in arrival order,
//! and handling one event never waits on I/O.

use irck_common::events::{EventBus, IrEvent};
use irck_common::{time, Code, Error, Result};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::capture::{CaptureMachine, WatchdogCmd};
use crate::config::TomlConfig;
use crate::hal::{EdgeSource, LineEvent, OutputLine};
use crate::normalize;
use crate::playback;
use crate::store;

/// Result of one command's capture within a recording session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A code was captured and stored for the command.
    Captured { command: String, pulses: usize },

    /// The edge subscription ended before a code arrived; the session
    /// stopped here.
    Cancelled { command: String },
}

/// One device session: owns the input and output line capabilities.
pub struct Session {
    config: TomlConfig,
    edges: Box<dyn EdgeSource>,
    output: Box<dyn OutputLine>,
    events: EventBus,
}

impl Session {
    /// Create a session, configuring the output line.
    pub fn new(
        config: TomlConfig,
        edges: Box<dyn EdgeSource>,
        mut output: Box<dyn OutputLine>,
        events: EventBus,
    ) -> Result<Self> {
        output.set_output_mode()?;
        Ok(Self {
            config,
            edges,
            output,
            events,
        })
    }

    /// Record one code per command name, in order.
    ///
    /// Short captures are absorbed and retried without surfacing; a closed
    /// subscription ends the session at the current command. Whatever was
    /// captured is merged into the persisted library, which is then
    /// normalized as a whole and saved with backup rotation.
    pub async fn record(&mut self, commands: &[String]) -> Result<Vec<CommandOutcome>> {
        self.events.emit_lossy(IrEvent::RecordStarted {
            commands: commands.to_vec(),
            timestamp: time::now(),
        });

        let mut library = store::load_or_new(&self.config.library_path).await;
        let mut outcomes = Vec::with_capacity(commands.len());
        let mut captured = 0usize;

        for command in commands {
            self.events.emit_lossy(IrEvent::AwaitingPress {
                command: command.clone(),
                timestamp: time::now(),
            });

            match self.capture_command(command).await? {
                Some(code) => {
                    let pulses = code.len();
                    info!(%command, pulses, "code captured");
                    self.events.emit_lossy(IrEvent::CodeCaptured {
                        command: command.clone(),
                        pulses,
                        timestamp: time::now(),
                    });
                    library.insert(command.clone(), code);
                    captured += 1;
                    outcomes.push(CommandOutcome::Captured {
                        command: command.clone(),
                        pulses,
                    });
                }
                None => {
                    warn!(%command, "capture cancelled");
                    self.events.emit_lossy(IrEvent::CaptureCancelled {
                        command: command.clone(),
                        timestamp: time::now(),
                    });
                    outcomes.push(CommandOutcome::Cancelled {
                        command: command.clone(),
                    });
                    break;
                }
            }
        }

        if captured > 0 {
            normalize::normalize_library(&mut library, self.config.capture.tolerance());
            store::save(&self.config.library_path, &library).await?;
            self.events.emit_lossy(IrEvent::LibrarySaved {
                commands: library.len(),
                timestamp: time::now(),
            });
        }

        Ok(outcomes)
    }

    /// Play back a stored command.
    ///
    /// `emit_at` in the future delays emission; `None` (or a past instant)
    /// emits immediately. Fails with [`Error::NotFound`] before touching
    /// the hardware when the command is not in the library, and with
    /// [`Error::SourceUnavailable`] when the library cannot be read.
    pub async fn play(&mut self, command: &str, emit_at: Option<Instant>) -> Result<()> {
        let library = store::load(&self.config.library_path).await?;
        let code = library
            .get(command)
            .ok_or_else(|| Error::NotFound(command.to_string()))?;

        self.events.emit_lossy(IrEvent::PlaybackStarted {
            command: command.to_string(),
            timestamp: time::now(),
        });

        playback::play_code(
            self.output.as_mut(),
            code,
            self.config.playback.carrier_khz,
            self.config.playback.busy_poll(),
            emit_at,
        )
        .await?;

        self.events.emit_lossy(IrEvent::PlaybackFinished {
            command: command.to_string(),
            timestamp: time::now(),
        });
        Ok(())
    }

    /// Re-run cross-library normalization on the persisted library and
    /// save it back.
    pub async fn tidy(&mut self) -> Result<usize> {
        let mut library = store::load(&self.config.library_path).await?;
        normalize::normalize_library(&mut library, self.config.capture.tolerance());
        store::save(&self.config.library_path, &library).await?;
        Ok(library.len())
    }

    /// Capture one code: `Ok(Some)` on success, `Ok(None)` when the
    /// subscription closed first.
    ///
    /// The subscription survives short-code retries; it is torn down on
    /// every exit path, along with the watchdog and glitch filter.
    async fn capture_command(&mut self, command: &str) -> Result<Option<Code>> {
        self.edges.configure(self.config.capture.glitch_us)?;
        let mut rx = self.edges.subscribe()?;
        let mut machine = CaptureMachine::new(&self.config.capture);

        let outcome: Result<Option<Code>> = loop {
            let Some(event) = rx.recv().await else {
                break Ok(None);
            };
            let step = match event {
                LineEvent::Edge { tick_us, .. } => machine.on_edge(tick_us),
                LineEvent::Timeout { .. } => machine.on_timeout(),
            };
            if let Some(cmd) = step.watchdog {
                if let Err(e) = self.apply_watchdog(cmd) {
                    break Err(e);
                }
            }
            match step.finished {
                Some(Ok(gaps)) => {
                    let mut code = Code::from_gaps(&gaps);
                    normalize::normalize_code(&mut code, self.config.capture.tolerance());
                    break Ok(Some(code));
                }
                Some(Err(Error::ShortCapture { pulses })) => {
                    info!(command, pulses, "short code, probably a repeat, try again");
                    self.events.emit_lossy(IrEvent::ShortCodeRetry {
                        command: command.to_string(),
                        pulses,
                        timestamp: time::now(),
                    });
                }
                Some(Err(e)) => break Err(e),
                None => {}
            }
        };

        self.teardown_capture();
        outcome
    }

    fn apply_watchdog(&mut self, cmd: WatchdogCmd) -> Result<()> {
        match cmd {
            WatchdogCmd::Arm(timeout_ms) => self.edges.set_watchdog(timeout_ms),
            WatchdogCmd::Disarm => self.edges.clear_watchdog(),
        }
    }

    /// Stop monitoring: disarm the watchdog, drop the subscription, clear
    /// the glitch filter. Safe to call repeatedly.
    fn teardown_capture(&mut self) {
        debug!("tearing down capture");
        if let Err(e) = self.edges.clear_watchdog() {
            warn!("failed to disarm watchdog: {}", e);
        }
        if let Err(e) = self.edges.cancel() {
            warn!("failed to cancel edge subscription: {}", e);
        }
        if let Err(e) = self.edges.configure(0) {
            warn!("failed to clear glitch filter: {}", e);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // A dropped session must not leave a watchdog armed.
        self.teardown_capture();
    }
}

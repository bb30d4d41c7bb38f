//! The tester: a script runner that passes a baton between the driver and
//! the delivery path.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Driver (run)                    Delivery (deliver)             │
//! │  ├── holds baton from creation                                  │
//! │  ├── INPUT: release baton ─────▶ may take baton, any output     │
//! │  │   sleep write_delay            here is a protocol violation  │
//! │  │   retake baton, write                                        │
//! │  └── OUTPUT: release baton ────▶ takes baton, checks output,    │
//! │      wait for output-ready ◀──── hands baton back to driver     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The baton is a logical token kept under a `parking_lot::Mutex`.
//! Releasing it wakes `baton_free` waiters; a delivery that matched (or
//! rejected) an expected output keeps it held and wakes the driver through
//! `output_ready` instead, so the driver only leaves its output wait because
//! a delivery was judged, never because of an unrelated release.
//!
//! Handler, producer and validator callbacks run with the baton held but the
//! mutex released, so they may read tester state (`state`, `position`,
//! `transcript`). The directive and handler in use are moved out of the
//! shared state for the duration of the call.
//!
//! Deliveries must be serialized by the caller: the modelled stream is a
//! single ordered channel, and overlapping `deliver` calls are undefined.

use std::fmt;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{info, trace};

use crate::directive::{Check, Directive, Produced};
use crate::error::{TesterError, TesterResult, Violation};
use crate::handler::{InputProducer, OutputValidator, StreamHandler};
use crate::log_level::LogLevel;
use crate::script::TestScript;
use crate::transcript::{EntryKind, Transcript};

/// Default race-detection window before each write
pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(20);

/// Tester configuration, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TesterConfig {
    /// How long to wait before each write, so that output the stream sends
    /// too early is caught as a violation instead of racing the write
    pub write_delay: Duration,
    /// Which categories of activity to log
    pub log_level: LogLevel,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            write_delay: DEFAULT_WRITE_DELAY,
            log_level: LogLevel::NONE,
        }
    }
}

impl TesterConfig {
    pub fn with_write_delay(mut self, write_delay: Duration) -> Self {
        self.write_delay = write_delay;
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }
}

/// Lifecycle of a tester. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TesterState {
    /// Accepting a handler and directives
    Preparing,
    /// `run` is executing the script
    Running,
    /// Finished, successfully or at the first violation
    Stopped,
}

impl fmt::Display for TesterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TesterState::Preparing => write!(f, "preparing"),
            TesterState::Running => write!(f, "running"),
            TesterState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every directive was satisfied
    Passed,
    /// The run stopped at this violation (already reported through `fail`)
    Failed(Violation),
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Passed => None,
            Verdict::Failed(violation) => Some(violation),
        }
    }
}

/// State guarded by the mutex. Everything except `baton_held` and
/// `output_ready` is only read or written by the baton holder.
struct Shared<I, O> {
    state: TesterState,
    script: TestScript<I, O>,
    handler: Option<Box<dyn StreamHandler<I>>>,
    /// Someone (driver or a delivery) holds the baton
    baton_held: bool,
    /// A delivery has handed the baton to the driver waiting on an output
    output_ready: bool,
    violation: Option<Violation>,
    transcript: Transcript,
}

impl<I, O> Shared<I, O> {
    fn verdict(&self) -> Verdict {
        match &self.violation {
            Some(violation) => Verdict::Failed(violation.clone()),
            None => Verdict::Passed,
        }
    }
}

/// Deterministic tester for a duplex stream.
///
/// Build a script with the `add_*` methods, give it a [`StreamHandler`],
/// then call [`run`](Tester::run) on one thread while another thread reports
/// everything the stream emits through [`deliver`](Tester::deliver).
///
/// # Example
///
/// ```ignore
/// let tester = Arc::new(Tester::<String, String>::new());
/// tester.set_handler(MySocketHandler::new(socket.try_clone()?))?;
/// tester.add_input_write("Hello".to_string())?;
/// tester.add_output_read("Good".to_string())?;
/// tester.add_input_write("Great".to_string())?;
///
/// let reader = Arc::clone(&tester);
/// thread::spawn(move || {
///     for line in BufReader::new(socket).lines().map_while(Result::ok) {
///         if reader.deliver(line).is_err() {
///             break;
///         }
///     }
/// });
///
/// assert!(tester.run()?.is_passed());
/// ```
pub struct Tester<I, O> {
    config: TesterConfig,
    shared: Mutex<Shared<I, O>>,
    /// Signalled when the baton is released
    baton_free: Condvar,
    /// Signalled when a delivery hands the baton to the driver
    output_ready: Condvar,
}

impl<I, O> Default for Tester<I, O>
where
    I: fmt::Display,
    O: fmt::Display + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> Tester<I, O>
where
    I: fmt::Display,
    O: fmt::Display + PartialEq,
{
    /// Create a tester with the default 20ms write delay and no logging
    pub fn new() -> Self {
        Self::with_config(TesterConfig::default())
    }

    pub fn with_write_delay(write_delay: Duration) -> Self {
        Self::with_config(TesterConfig::default().with_write_delay(write_delay))
    }

    pub fn with_config(config: TesterConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(Shared {
                state: TesterState::Preparing,
                script: TestScript::new(),
                handler: None,
                // The preparing phase holds the baton until `run` hands it out
                baton_held: true,
                output_ready: false,
                violation: None,
                transcript: Transcript::new(),
            }),
            baton_free: Condvar::new(),
            output_ready: Condvar::new(),
        }
    }

    pub fn state(&self) -> TesterState {
        self.shared.lock().state
    }

    /// Number of directives in the script
    pub fn len(&self) -> usize {
        self.shared.lock().script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().script.is_empty()
    }

    /// Index of the directive currently expected
    pub fn position(&self) -> usize {
        self.shared.lock().script.position()
    }

    /// Copy of everything recorded so far
    pub fn transcript(&self) -> Transcript {
        self.shared.lock().transcript.clone()
    }

    /// Set the handler that writes to the stream and receives failures.
    ///
    /// May only be called once, before `run`.
    pub fn set_handler(&self, handler: impl StreamHandler<I> + 'static) -> TesterResult<()> {
        let mut shared = self.shared.lock();
        Self::assert_preparing(&shared, "set handler")?;
        if shared.handler.is_some() {
            return Err(TesterError::HandlerAlreadySet);
        }
        shared.handler = Some(Box::new(handler));
        Ok(())
    }

    /// Append a directive to the script
    pub fn add(&self, directive: Directive<I, O>) -> TesterResult<()> {
        let mut shared = self.shared.lock();
        Self::assert_preparing(&shared, "add directives")?;
        shared.script.push(directive);
        Ok(())
    }

    /// Write `input` to the stream at this point
    pub fn add_input_write(&self, input: I) -> TesterResult<()> {
        self.add(Directive::InputLiteral(input))
    }

    /// Write whatever `producer` returns at this point
    pub fn add_input_write_with(&self, producer: impl InputProducer<I> + 'static) -> TesterResult<()> {
        self.add(Directive::InputProducer(Produced::new(Box::new(producer))))
    }

    /// Expect the stream to output exactly `output` at this point
    pub fn add_output_read(&self, output: O) -> TesterResult<()> {
        self.add(Directive::OutputLiteral(output))
    }

    /// Expect the stream to output something `validator` accepts at this point
    pub fn add_output_read_with(
        &self,
        validator: impl OutputValidator<O> + 'static,
    ) -> TesterResult<()> {
        self.add(Directive::OutputValidator(Box::new(validator)))
    }

    /// Run the script, blocking until it passes or hits its first violation.
    ///
    /// A violation is reported to the handler's `fail` and returned as
    /// [`Verdict::Failed`]; only misconfiguration is an `Err`.
    pub fn run(&self) -> TesterResult<Verdict> {
        let mut shared = self.shared.lock();
        Self::assert_preparing(&shared, "run")?;
        if shared.handler.is_none() {
            return Err(TesterError::HandlerMissing);
        }

        // Baton held since construction
        shared.state = TesterState::Running;
        let total = shared.script.len();
        shared
            .transcript
            .record(EntryKind::Started, 0, format!("{total} directives"));
        if self.logs(LogLevel::INFO) {
            info!(directives = total, "Running");
        }

        loop {
            let position = shared.script.position();
            let Some(directive) = shared.script.current() else {
                shared.state = TesterState::Stopped;
                shared
                    .transcript
                    .record(EntryKind::Finished, position, "success");
                if self.logs(LogLevel::INFO) {
                    info!("Finished (success)");
                }
                self.release_baton(&mut shared);
                return Ok(Verdict::Passed);
            };

            if self.logs(LogLevel::INTERNALS) {
                trace!(position, directive = %directive, "Next communication");
            }

            if directive.is_input() {
                // Give the stream a window to misbehave before writing
                self.release_baton(&mut shared);
                MutexGuard::unlocked(&mut shared, || thread::sleep(self.config.write_delay));
                self.take_baton(&mut shared);

                if shared.state == TesterState::Stopped {
                    self.release_baton(&mut shared);
                    return Ok(shared.verdict());
                }

                self.write_current(&mut shared);
            } else {
                self.release_baton(&mut shared);
                if self.logs(LogLevel::INTERNALS) {
                    trace!(position, "Waiting for output");
                }
                while !shared.output_ready {
                    self.output_ready.wait(&mut shared);
                }
                // Baton handed over by the delivery
                shared.output_ready = false;

                if shared.state == TesterState::Stopped {
                    self.release_baton(&mut shared);
                    return Ok(shared.verdict());
                }
            }

            shared.script.advance();
        }
    }

    /// Report output observed on the stream.
    ///
    /// Blocks only while another party holds the baton. Output that is out of
    /// order or wrong stops the run and is reported through the handler's
    /// `fail`; this still returns `Ok`. Output arriving after the run stopped
    /// returns [`TesterError::LateDelivery`] and has no other effect.
    ///
    /// A delivery made before `run` waits until the driver first hands out
    /// the baton.
    pub fn deliver(&self, output: O) -> TesterResult<()> {
        if self.logs(LogLevel::OUTPUT) {
            info!(output = %output, "Read");
        }

        let mut shared = self.shared.lock();
        self.take_baton(&mut shared);

        if shared.state == TesterState::Stopped {
            self.release_baton(&mut shared);
            return Err(TesterError::LateDelivery(output.to_string()));
        }

        let position = shared.script.position();
        let check = self.with_callbacks(&mut shared, |directive, _| {
            directive.map_or(Check::NotAnOutput, |directive| directive.check(&output))
        });

        match check {
            Check::NotAnOutput => {
                let expected_input = self
                    .with_callbacks(&mut shared, |directive, _| {
                        directive.and_then(|directive| directive.input().map(ToString::to_string))
                    })
                    .unwrap_or_else(|| "<end of script>".to_string());
                self.stop(
                    &mut shared,
                    Violation::UnexpectedOutput {
                        expected_input,
                        received: output.to_string(),
                    },
                );
                // The driver is in its write delay, not waiting on output-ready
                self.release_baton(&mut shared);
            }
            Check::Accepted => {
                shared
                    .transcript
                    .record(EntryKind::Matched, position, output.to_string());
                self.hand_off(&mut shared);
            }
            Check::Mismatch { expected } => {
                self.stop(
                    &mut shared,
                    Violation::IncorrectOutput {
                        expected,
                        received: output.to_string(),
                    },
                );
                self.hand_off(&mut shared);
            }
            Check::Rejected { validator } => {
                self.stop(
                    &mut shared,
                    Violation::ValidatorRejected {
                        validator,
                        received: output.to_string(),
                    },
                );
                self.hand_off(&mut shared);
            }
        }
        Ok(())
    }

    fn assert_preparing(shared: &Shared<I, O>, action: &'static str) -> TesterResult<()> {
        if shared.state != TesterState::Preparing {
            return Err(TesterError::NotPreparing(action));
        }
        Ok(())
    }

    fn logs(&self, level: LogLevel) -> bool {
        self.config.log_level.enables(level)
    }

    /// Wait until nobody holds the baton, then take it
    fn take_baton(&self, shared: &mut MutexGuard<'_, Shared<I, O>>) {
        while shared.baton_held {
            self.baton_free.wait(shared);
        }
        shared.baton_held = true;
    }

    fn release_baton(&self, shared: &mut Shared<I, O>) {
        shared.baton_held = false;
        self.baton_free.notify_all();
    }

    /// Pass the baton straight to the driver waiting on an output
    fn hand_off(&self, shared: &mut Shared<I, O>) {
        shared.output_ready = true;
        self.output_ready.notify_one();
    }

    /// Run user callbacks with the mutex released.
    ///
    /// Must only be called by the baton holder. The current directive and
    /// the handler are moved out while `f` runs and put back afterwards; a
    /// panic in `f` loses both and leaves the baton held.
    fn with_callbacks<R>(
        &self,
        shared: &mut MutexGuard<'_, Shared<I, O>>,
        f: impl FnOnce(Option<&mut Directive<I, O>>, Option<&dyn StreamHandler<I>>) -> R,
    ) -> R {
        let mut directive = shared.script.take_current();
        let handler = shared.handler.take();

        let result = MutexGuard::unlocked(shared, || f(directive.as_mut(), handler.as_deref()));

        shared.handler = handler;
        if let Some(directive) = directive {
            shared.script.restore_current(directive);
        }
        result
    }

    /// Write the current input directive through the handler
    fn write_current(&self, shared: &mut MutexGuard<'_, Shared<I, O>>) {
        let position = shared.script.position();
        let written = self.with_callbacks(shared, |directive, handler| {
            let (Some(input), Some(handler)) = (directive.and_then(Directive::input), handler)
            else {
                return None;
            };
            if self.logs(LogLevel::INPUT) {
                info!(position, input = %input, "Writing");
            }
            handler.write_to_stream(input);
            Some(input.to_string())
        });

        if let Some(written) = written {
            shared.transcript.record(EntryKind::Write, position, written);
        }
    }

    /// Stop the run at a violation and report it through `fail`
    fn stop(&self, shared: &mut MutexGuard<'_, Shared<I, O>>, violation: Violation) {
        let position = shared.script.position();
        let message = violation.to_string();

        if self.logs(LogLevel::INFO) {
            info!(position, %message, "Finished (failure)");
        }
        shared
            .transcript
            .record(EntryKind::Violation, position, message.clone());
        shared.violation = Some(violation);
        shared.state = TesterState::Stopped;

        self.with_callbacks(shared, |_, handler| {
            if let Some(handler) = handler {
                handler.fail(&message);
            }
        });
    }
}

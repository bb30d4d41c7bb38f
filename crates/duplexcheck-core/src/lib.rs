//! duplexcheck core library
//!
//! Deterministic scripted testing of duplex streams whose output arrives on
//! a different thread than the one driving the test.
//!
//! ## Overview
//!
//! A test is a script of [`Directive`]s: values to write to the stream and
//! outputs the stream must produce, in order. The [`Tester`] runs the script
//! on the calling thread and accepts observed output from any other thread
//! through [`Tester::deliver`]. A baton passed between the two sides makes
//! every decision happen in one total order, and a short delay before each
//! write catches output that arrives too early.
//!
//! The first violation stops the run and is reported through the
//! [`StreamHandler::fail`] callback. Nothing is retried.
//!
//! ## Quick Start
//!
//! ```ignore
//! use duplexcheck_core::{StreamHandler, Tester};
//!
//! struct Handler { /* socket, channel, ... */ }
//!
//! impl StreamHandler<String> for Handler {
//!     fn fail(&self, message: &str) {
//!         eprintln!("Error: {message}");
//!     }
//!
//!     fn write_to_stream(&self, input: &String) {
//!         // send `input` to the stream under test
//!     }
//! }
//!
//! let tester = Arc::new(Tester::<String, String>::new());
//! tester.set_handler(Handler { /* ... */ })?;
//! tester.add_input_write("Hello".into())?;
//! tester.add_output_read("Good".into())?;
//! tester.add_output_read_with(|out: &String| out.ends_with('?'))?;
//!
//! // elsewhere, for every line the stream emits:
//! //     tester.deliver(line)?;
//!
//! let verdict = tester.run()?;
//! ```

pub mod directive;
pub mod engine;
pub mod error;
pub mod handler;
pub mod log_level;
pub mod script;
pub mod transcript;

// Re-exports
pub use directive::{Directive, Produced};
pub use engine::{Tester, TesterConfig, TesterState, Verdict, DEFAULT_WRITE_DELAY};
pub use error::{TesterError, TesterResult, Violation};
pub use handler::{InputProducer, OutputValidator, StreamHandler};
pub use log_level::{LogLevel, ParseLogLevelError};
pub use script::TestScript;
pub use transcript::{EntryKind, Transcript, TranscriptEntry};

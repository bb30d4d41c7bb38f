//! Scripted steps
//!
//! A [`Directive`] is one step of a test script: either something the tester
//! writes to the stream, or something it expects the stream to emit. Each
//! side comes as a literal value or as deferred behaviour.

use std::fmt;

use crate::handler::{InputProducer, OutputValidator};

/// A single scripted communication
pub enum Directive<I, O> {
    /// Write this value
    InputLiteral(I),
    /// Write whatever the producer returns (resolved once, on first use)
    InputProducer(Produced<I>),
    /// Expect exactly this value
    OutputLiteral(O),
    /// Expect any value the validator accepts
    OutputValidator(Box<dyn OutputValidator<O>>),
}

/// Outcome of checking a delivered output against a directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Check {
    Accepted,
    /// Literal comparison failed
    Mismatch { expected: String },
    /// The validator returned false
    Rejected { validator: String },
    /// The directive is an input, so no output was expected here
    NotAnOutput,
}

impl<I, O> Directive<I, O> {
    pub fn is_input(&self) -> bool {
        matches!(self, Directive::InputLiteral(_) | Directive::InputProducer(_))
    }

    pub fn is_output(&self) -> bool {
        !self.is_input()
    }

    /// The value to write, resolving a producer on first call.
    ///
    /// Returns `None` for output directives, and for a producer that
    /// panicked on an earlier call.
    pub fn input(&mut self) -> Option<&I> {
        match self {
            Directive::InputLiteral(value) => Some(value),
            Directive::InputProducer(produced) => produced.resolve(),
            _ => None,
        }
    }

    /// Check a delivered output. Calls a validator exactly once.
    pub(crate) fn check(&self, output: &O) -> Check
    where
        O: PartialEq + fmt::Display,
    {
        match self {
            Directive::OutputLiteral(expected) if expected == output => Check::Accepted,
            Directive::OutputLiteral(expected) => Check::Mismatch {
                expected: expected.to_string(),
            },
            Directive::OutputValidator(validator) => {
                if validator.read(output) {
                    Check::Accepted
                } else {
                    Check::Rejected {
                        validator: validator.describe(),
                    }
                }
            }
            _ => Check::NotAnOutput,
        }
    }
}

impl<I: fmt::Display, O: fmt::Display> fmt::Display for Directive<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::InputLiteral(value) => write!(f, "INPUT ({value})"),
            Directive::InputProducer(produced) => write!(f, "INPUT ({produced})"),
            Directive::OutputLiteral(value) => write!(f, "OUTPUT ({value})"),
            Directive::OutputValidator(validator) => write!(f, "OUTPUT ({})", validator.describe()),
        }
    }
}

impl<I: fmt::Debug, O: fmt::Debug> fmt::Debug for Directive<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::InputLiteral(value) => f.debug_tuple("InputLiteral").field(value).finish(),
            Directive::InputProducer(produced) => {
                f.debug_tuple("InputProducer").field(produced).finish()
            }
            Directive::OutputLiteral(value) => f.debug_tuple("OutputLiteral").field(value).finish(),
            Directive::OutputValidator(validator) => f
                .debug_tuple("OutputValidator")
                .field(&validator.describe())
                .finish(),
        }
    }
}

/// A lazily produced input value
///
/// The producer is consumed on first [`resolve`](Produced::resolve); later
/// calls return the cached value.
pub struct Produced<I> {
    label: String,
    slot: Slot<I>,
}

enum Slot<I> {
    Pending(Box<dyn InputProducer<I>>),
    Resolved(I),
    /// Only observable if a producer panicked mid-resolve
    Taken,
}

impl<I> Produced<I> {
    pub fn new(producer: Box<dyn InputProducer<I>>) -> Self {
        Self {
            label: producer.describe(),
            slot: Slot::Pending(producer),
        }
    }

    /// Run the producer if it has not run yet and return its value.
    ///
    /// `None` only if the producer panicked during an earlier call; it is
    /// never run twice.
    pub fn resolve(&mut self) -> Option<&I> {
        if let Slot::Pending(_) = self.slot {
            if let Slot::Pending(producer) = std::mem::replace(&mut self.slot, Slot::Taken) {
                self.slot = Slot::Resolved(producer.write());
            }
        }
        self.value()
    }

    /// The resolved value, or `None` before the first resolve
    pub fn value(&self) -> Option<&I> {
        match &self.slot {
            Slot::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

impl<I: fmt::Display> fmt::Display for Produced<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "{}", self.label),
        }
    }
}

impl<I: fmt::Debug> fmt::Debug for Produced<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Produced")
            .field("label", &self.label)
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type D = Directive<String, String>;

    #[test]
    fn test_literal_directives() {
        let mut input: D = Directive::InputLiteral("Hello".into());
        let output: D = Directive::OutputLiteral("Good".into());

        assert!(input.is_input());
        assert!(output.is_output());
        assert_eq!(input.input().map(String::as_str), Some("Hello"));
        assert_eq!(input.to_string(), "INPUT (Hello)");
        assert_eq!(output.to_string(), "OUTPUT (Good)");
    }

    #[test]
    fn test_literal_check_uses_equality() {
        let output: D = Directive::OutputLiteral("Good".into());
        assert_eq!(output.check(&"Good".into()), Check::Accepted);
        assert_eq!(
            output.check(&"good".into()),
            Check::Mismatch {
                expected: "Good".into()
            }
        );

        let input: D = Directive::InputLiteral("Hello".into());
        assert_eq!(input.check(&"Hello".into()), Check::NotAnOutput);
    }

    #[test]
    fn test_validator_directive() {
        let output: D = Directive::OutputValidator(Box::new(|s: &String| s.ends_with('?')));
        assert!(output.is_output());
        assert_eq!(output.check(&"Yourself?".into()), Check::Accepted);
        assert_eq!(
            output.check(&"Yourself".into()),
            Check::Rejected {
                validator: "validator".into()
            }
        );
        assert_eq!(output.to_string(), "OUTPUT (validator)");
    }

    #[test]
    fn test_producer_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut input: D = Directive::InputProducer(Produced::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "made".to_string()
        })));

        assert_eq!(input.to_string(), "INPUT (producer)");
        assert_eq!(input.input().map(String::as_str), Some("made"));
        assert_eq!(input.input().map(String::as_str), Some("made"));
        assert_eq!(input.to_string(), "INPUT (made)");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicked_producer_is_not_retried() {
        let mut produced: Produced<String> =
            Produced::new(Box::new(|| -> String { panic!("no value") }));

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            produced.resolve().cloned()
        }));
        assert!(unwound.is_err());
        assert!(produced.resolve().is_none());
        assert_eq!(produced.to_string(), "producer");
    }

    #[test]
    fn test_output_has_no_input() {
        let mut output: D = Directive::OutputLiteral("x".into());
        assert!(output.input().is_none());
    }
}

//! Adapter contracts supplied by the code that owns the stream under test
//!
//! The tester never touches a transport itself. It writes through a
//! [`StreamHandler`], asks an [`InputProducer`] for values it could not know
//! up front, and checks output with an [`OutputValidator`] when a literal
//! comparison is not enough.
//!
//! Closures implement the producer and validator traits directly:
//!
//! ```ignore
//! tester.add_input_write_with(|| format!("nonce-{}", 42))?;
//! tester.add_output_read_with(|out: &String| out.starts_with("OK"))?;
//! ```

/// Write-sink for the stream under test.
///
/// Both methods are called while the tester holds its control token, so
/// neither may call back into [`Tester::run`](crate::Tester::run) or
/// [`Tester::deliver`](crate::Tester::deliver) on the same thread. Read-only
/// accessors such as [`Tester::state`](crate::Tester::state) are fine.
///
/// # Panics
///
/// A panic in either method (or in a producer or validator) unwinds out of
/// `run` or `deliver` with the control token still held, so every later
/// `deliver` blocks. Treat a panicking callback as fatal for the tester.
pub trait StreamHandler<I>: Send {
    /// The run has failed with `message`.
    ///
    /// Called at most once per run. Closing sockets or other resources is up
    /// to the implementation.
    fn fail(&self, message: &str);

    /// Write `input` to the stream. Expected to return promptly.
    fn write_to_stream(&self, input: &I);
}

/// Produces an input value on demand rather than when the script is built.
///
/// Consumed on first use; the produced value is cached by the directive.
pub trait InputProducer<I>: Send {
    fn write(self: Box<Self>) -> I;

    /// Label used in logs and failure messages before the value is known
    fn describe(&self) -> String {
        "producer".to_string()
    }
}

impl<I, F> InputProducer<I> for F
where
    F: FnOnce() -> I + Send,
{
    fn write(self: Box<Self>) -> I {
        (*self)()
    }
}

/// Checks a delivered output when a literal comparison isn't enough.
///
/// Must be a pure predicate: it is called exactly once per delivered
/// candidate, with the control token held.
pub trait OutputValidator<O>: Send {
    fn read(&self, output: &O) -> bool;

    /// Label used in logs and failure messages
    fn describe(&self) -> String {
        "validator".to_string()
    }
}

impl<O, F> OutputValidator<O> for F
where
    F: Fn(&O) -> bool + Send,
{
    fn read(&self, output: &O) -> bool {
        self(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefix(&'static str);

    impl OutputValidator<String> for Prefix {
        fn read(&self, output: &String) -> bool {
            output.starts_with(self.0)
        }

        fn describe(&self) -> String {
            format!("prefix {:?}", self.0)
        }
    }

    #[test]
    fn test_closure_validator() {
        let validator: Box<dyn OutputValidator<String>> = Box::new(|s: &String| s.len() == 2);
        assert!(validator.read(&"ok".to_string()));
        assert!(!validator.read(&"nope".to_string()));
        assert_eq!(validator.describe(), "validator");
    }

    #[test]
    fn test_custom_validator_description() {
        let validator: Box<dyn OutputValidator<String>> = Box::new(Prefix("OK"));
        assert!(validator.read(&"OK 200".to_string()));
        assert_eq!(validator.describe(), "prefix \"OK\"");
    }

    #[test]
    fn test_closure_producer() {
        let name = String::from("world");
        let producer: Box<dyn InputProducer<String>> = Box::new(move || format!("hello {name}"));
        assert_eq!(producer.describe(), "producer");
        assert_eq!(producer.write(), "hello world");
    }
}

//! Plain-text test scripts
//!
//! ```text
//! # comments and blank lines are ignored
//! > Hello              write "Hello"
//! < Good               expect exactly "Good"
//! ~ thanks             expect any line containing "thanks"
//! ```
//!
//! One space after the marker is optional and stripped; everything after it
//! is the value, trailing whitespace included.

use std::fmt;
use std::path::Path;

use duplexcheck_core::{OutputValidator, Tester, TesterResult};
use thiserror::Error;

/// The script used when `serve` is given no `--script`
pub const DEFAULT_SCRIPT: &str = "\
> Hello
> How are you today?
< Good
> Great
< Yourself?
> Great, thanks for asking!
";

/// One parsed script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Write(String),
    Expect(String),
    ExpectContaining(String),
}

impl fmt::Display for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptStep::Write(value) => write!(f, "INPUT ({value})"),
            ScriptStep::Expect(value) => write!(f, "OUTPUT ({value})"),
            ScriptStep::ExpectContaining(value) => write!(f, "OUTPUT (containing {value:?})"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("line {line}: unknown marker '{marker}', expected '>', '<' or '~'")]
    UnknownMarker { line: usize, marker: char },

    #[error("line {line}: '~' needs some text to look for")]
    EmptyPattern { line: usize },

    #[error("could not read script: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts any output containing the pattern
struct Containing(String);

impl OutputValidator<String> for Containing {
    fn read(&self, output: &String) -> bool {
        output.contains(&self.0)
    }

    fn describe(&self) -> String {
        format!("containing {:?}", self.0)
    }
}

/// A parsed script, ready to load into a tester
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptFile {
    steps: Vec<ScriptStep>,
}

impl ScriptFile {
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut steps = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim_end_matches('\r');
            if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
                continue;
            }

            let mut chars = raw.chars();
            let Some(marker) = chars.next() else {
                continue;
            };
            let rest = chars.as_str();
            let value = rest.strip_prefix(' ').unwrap_or(rest).to_string();

            steps.push(match marker {
                '>' => ScriptStep::Write(value),
                '<' => ScriptStep::Expect(value),
                '~' if value.is_empty() => return Err(ScriptError::EmptyPattern { line }),
                '~' => ScriptStep::ExpectContaining(value),
                other => return Err(ScriptError::UnknownMarker { line, marker: other }),
            });
        }
        Ok(Self { steps })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Append every step to the tester's script
    pub fn apply(&self, tester: &Tester<String, String>) -> TesterResult<()> {
        for step in &self.steps {
            match step {
                ScriptStep::Write(value) => tester.add_input_write(value.clone())?,
                ScriptStep::Expect(value) => tester.add_output_read(value.clone())?,
                ScriptStep::ExpectContaining(pattern) => {
                    tester.add_output_read_with(Containing(pattern.clone()))?
                }
            }
        }
        Ok(())
    }
}

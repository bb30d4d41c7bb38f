//! Ordered list of directives plus the cursor the engine advances

use crate::directive::Directive;

/// The script a tester runs.
///
/// Append-only while preparing; once the run starts only the cursor moves,
/// and only forward.
pub struct TestScript<I, O> {
    /// `None` while the current directive is lent out to a callback
    directives: Vec<Option<Directive<I, O>>>,
    cursor: usize,
}

impl<I, O> Default for TestScript<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> TestScript<I, O> {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn push(&mut self, directive: Directive<I, O>) {
        self.directives.push(Some(directive));
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Index of the directive currently expected
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.directives.len()
    }

    pub fn current(&self) -> Option<&Directive<I, O>> {
        self.directives.get(self.cursor).and_then(Option::as_ref)
    }

    /// Move the current directive out, leaving its slot empty until
    /// [`restore_current`](Self::restore_current). The length is unchanged.
    pub(crate) fn take_current(&mut self) -> Option<Directive<I, O>> {
        self.directives.get_mut(self.cursor).and_then(Option::take)
    }

    pub(crate) fn restore_current(&mut self, directive: Directive<I, O>) {
        if let Some(slot) = self.directives.get_mut(self.cursor) {
            *slot = Some(directive);
        }
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_exhausted() {
            self.cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_walks_forward_and_stops() {
        let mut script: TestScript<&str, &str> = TestScript::new();
        script.push(Directive::InputLiteral("a"));
        script.push(Directive::OutputLiteral("b"));

        assert_eq!(script.len(), 2);
        assert!(script.current().is_some_and(Directive::is_input));

        script.advance();
        assert_eq!(script.position(), 1);
        assert!(script.current().is_some_and(Directive::is_output));

        script.advance();
        script.advance();
        assert!(script.is_exhausted());
        assert_eq!(script.position(), 2);
        assert!(script.current().is_none());
    }

    #[test]
    fn test_take_and_restore_current() {
        let mut script: TestScript<&str, &str> = TestScript::new();
        script.push(Directive::OutputLiteral("b"));

        let taken = script.take_current();
        assert!(taken.is_some());
        assert!(script.current().is_none());
        assert_eq!(script.len(), 1);
        assert!(!script.is_exhausted());

        script.restore_current(taken.unwrap());
        assert!(script.current().is_some_and(Directive::is_output));
    }

    #[test]
    fn test_empty_script_is_exhausted() {
        let script: TestScript<String, String> = TestScript::default();
        assert!(script.is_empty());
        assert!(script.is_exhausted());
    }
}

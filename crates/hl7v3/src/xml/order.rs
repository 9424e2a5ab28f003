//! Schema order checks for child elements.

use crate::error::{FormatError, Result};

/// Tracks the position of children against a fixed schema sequence.
///
/// Names not in the sequence are reported as unknown so the caller can skip
/// them; known names must not go backwards and only repeatable names may
/// appear more than once.
pub(crate) struct ChildOrder<'a> {
    parent: &'a str,
    sequence: &'static [&'static str],
    repeatable: &'static [&'static str],
    last: Option<usize>,
}

impl<'a> ChildOrder<'a> {
    pub(crate) fn new(
        parent: &'a str,
        sequence: &'static [&'static str],
        repeatable: &'static [&'static str],
    ) -> Self {
        Self {
            parent,
            sequence,
            repeatable,
            last: None,
        }
    }

    /// Records `local_name`, returning `false` for names outside the sequence.
    pub(crate) fn advance(&mut self, local_name: &str) -> Result<bool> {
        let Some(index) = self.sequence.iter().position(|n| *n == local_name) else {
            return Ok(false);
        };
        if let Some(last) = self.last {
            let repeat = index == last && self.repeatable.contains(&local_name);
            if index < last || (index == last && !repeat) {
                return Err(FormatError::OutOfOrder {
                    element: local_name.to_string(),
                    parent: self.parent.to_string(),
                }
                .into());
            }
        }
        self.last = Some(index);
        Ok(true)
    }
}

//! Structured reconciliation problems.
//!
//! The reconciler never fails fast: it collects every [`Problem`] it finds so
//! the driver can report them together, grouped by configuration path.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a reconciliation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemKind {
    /// No flag definition matches the argument.
    UnknownArgument,
    /// A path segment addresses an array but found something else.
    UnexpectedNonArrayInPath,
    /// A path segment addresses an object but found something else.
    UnexpectedNonObjectInPath,
    /// Several values were given to a single-valued config.
    MultipleValuesUnexpected,
    /// The value does not parse as the config's type.
    InvalidValue,
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemKind::UnknownArgument => "unknown-argument",
            ProblemKind::UnexpectedNonArrayInPath => "unexpected-non-array-in-path",
            ProblemKind::UnexpectedNonObjectInPath => "unexpected-non-object-in-path",
            ProblemKind::MultipleValuesUnexpected => "multiple-values-unexpected",
            ProblemKind::InvalidValue => "invalid-value",
        }
    }

    /// Sentence-case label, e.g. `Invalid value`.
    pub fn label(&self) -> String {
        let spaced = self.as_str().replace('-', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// One reconciliation problem.
///
/// # Examples
///
/// ```
/// use packcli_core::{Problem, ProblemKind};
/// use serde_json::json;
///
/// let problem = Problem::new(ProblemKind::InvalidValue, "mode", "mode")
///     .with_value(json!("fast"))
///     .with_expected("development | production | none");
/// assert_eq!(
///     problem.to_string(),
///     "Invalid value 'fast' for the '--mode' option\nExpected: 'development | production | none'"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: ProblemKind,
    /// Configuration path the problem was found at.
    pub path: String,
    /// Flag name, without leading dashes.
    pub argument: String,
    pub value: Option<Value>,
    /// Position of the value when the flag was given several times.
    pub index: Option<usize>,
    pub expected: Option<String>,
}

impl Problem {
    pub fn new(kind: ProblemKind, path: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            argument: argument.into(),
            value: None,
            index: None,
            expected: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_index(mut self, index: Option<usize>) -> Self {
        self.index = index;
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// First line of the report, without the `Expected:` line.
    pub fn headline(&self) -> String {
        let mut line = self.kind.label();
        if let Some(value) = &self.value {
            line.push_str(&format!(" '{}'", crate::display_scalar(value)));
        }
        line.push_str(&format!(" for the '--{}' option", self.argument));
        if let Some(index) = self.index {
            line.push_str(&format!(" by index '{index}'"));
        }
        line
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headline())?;
        if let Some(expected) = &self.expected {
            write!(f, "\nExpected: '{expected}'")?;
        }
        Ok(())
    }
}

/// Groups problems by path, keeping first-seen path order.
///
/// # Examples
///
/// ```
/// use packcli_core::{Problem, ProblemKind, group_by_path};
///
/// let problems = vec![
///     Problem::new(ProblemKind::InvalidValue, "mode", "mode"),
///     Problem::new(ProblemKind::InvalidValue, "entry", "entry"),
///     Problem::new(ProblemKind::MultipleValuesUnexpected, "mode", "mode"),
/// ];
/// let groups = group_by_path(&problems);
/// assert_eq!(groups[0].0, "mode");
/// assert_eq!(groups[0].1.len(), 2);
/// assert_eq!(groups[1].0, "entry");
/// ```
pub fn group_by_path(problems: &[Problem]) -> Vec<(&str, Vec<&Problem>)> {
    let mut groups: Vec<(&str, Vec<&Problem>)> = Vec::new();
    for problem in problems {
        match groups.iter_mut().find(|(path, _)| *path == problem.path) {
            Some((_, members)) => members.push(problem),
            None => groups.push((problem.path.as_str(), vec![problem])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_capitalizes_and_spaces() {
        assert_eq!(
            ProblemKind::UnexpectedNonArrayInPath.label(),
            "Unexpected non array in path"
        );
    }

    #[test]
    fn test_display_with_index() {
        let problem = Problem::new(ProblemKind::InvalidValue, "entry[]", "entry")
            .with_value(json!(5))
            .with_index(Some(1));
        assert_eq!(
            problem.to_string(),
            "Invalid value '5' for the '--entry' option by index '1'"
        );
    }

    #[test]
    fn test_display_without_value() {
        let problem = Problem::new(ProblemKind::UnknownArgument, "foo", "foo");
        assert_eq!(problem.to_string(), "Unknown argument for the '--foo' option");
    }

    #[test]
    fn test_serializes_kind_as_type() {
        let problem = Problem::new(ProblemKind::InvalidValue, "mode", "mode");
        let json = serde_json::to_value(&problem).unwrap();
        assert_eq!(json["type"], "invalid-value");
    }
}

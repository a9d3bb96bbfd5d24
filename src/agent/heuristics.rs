//! Heuristic code checks
//!
//! These checks are not a parser. They look for the landmarks each
//! recognized language must contain and verify that delimiters balance.

use regex::Regex;
use std::sync::OnceLock;

/// Marker the validator places in its content when the code passed
pub const SUCCESS_SENTINEL: &str = "::success::";

/// Languages with structural checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DslLanguage {
    /// The Classroom teaching DSL
    Classroom,
    /// C#
    CSharp,
    /// The arithmetic sample DSL
    SampleDsl,
    /// Anything else; only delimiter checks apply
    Other,
}

impl DslLanguage {
    /// Recognize a language from its identifier
    ///
    /// Matching is by case-insensitive substring, so `classroom-v2` is
    /// treated as Classroom.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("classroom") {
            DslLanguage::Classroom
        } else if name.contains("csharp") || name == "c#" || name == "cs" {
            DslLanguage::CSharp
        } else if name.contains("sampledsl") {
            DslLanguage::SampleDsl
        } else {
            DslLanguage::Other
        }
    }
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:\w+)?\n(.*?)\n```").ok())
        .as_ref()
}

/// Pull the code out of an assistant message
///
/// The first fenced block wins; otherwise the whole message is the code.
/// The result is trimmed and may be empty.
///
/// # Examples
///
/// ```
/// use dslsmith::agent::heuristics::extract_code;
///
/// let reply = "Here you go:\n```classroom\nprogram P { }\n```\nEnjoy";
/// assert_eq!(extract_code(reply), "program P { }");
/// assert_eq!(extract_code("  value x = 1;  "), "value x = 1;");
/// ```
pub fn extract_code(content: &str) -> String {
    let block = fence_regex()
        .and_then(|re| re.captures(content))
        .and_then(|c| c.get(1));
    match block {
        Some(block) => block.as_str().trim().to_string(),
        None => content.trim().to_string(),
    }
}

/// Report unbalanced `{}`, `()` and `[]`
///
/// At most one error per delimiter kind. A closer that appears before its
/// opener counts as mismatched even when the totals agree.
///
/// # Examples
///
/// ```
/// use dslsmith::agent::heuristics::validate_generic;
///
/// assert!(validate_generic("{ ( ) }").is_empty());
/// assert_eq!(validate_generic("{ ( ) ").len(), 1);
/// assert_eq!(validate_generic("foo { bar ( baz").len(), 2);
/// ```
pub fn validate_generic(code: &str) -> Vec<String> {
    [
        ('{', '}', "Mismatched braces"),
        ('(', ')', "Mismatched parentheses"),
        ('[', ']', "Mismatched brackets"),
    ]
    .iter()
    .filter(|(open, close, _)| !is_balanced(code, *open, *close))
    .map(|(_, _, message)| message.to_string())
    .collect()
}

fn is_balanced(code: &str, open: char, close: char) -> bool {
    let mut depth: i64 = 0;
    for c in code.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

fn check_classroom(code: &str, errors: &mut Vec<String>) {
    if !code.contains("program") {
        errors.push("Missing 'program' declaration".to_string());
    }
    if !code.contains("action main") {
        errors.push("Missing 'action main'".to_string());
    }
}

fn check_csharp(code: &str, errors: &mut Vec<String>) {
    if !code.contains("using") && !code.contains("namespace") {
        errors.push("Missing using statements or namespace".to_string());
    }
    if !code.contains("class") {
        errors.push("Missing class declaration".to_string());
    }
}

fn check_sample_dsl(code: &str, errors: &mut Vec<String>) {
    if !code.contains(';') {
        errors.push("Missing semicolons".to_string());
    }
}

/// Run the structural checks for `language` followed by the delimiter checks
///
/// An empty list means the code is valid.
pub fn validate_code(language: &str, code: &str) -> Vec<String> {
    let mut errors = Vec::new();
    match DslLanguage::from_name(language) {
        DslLanguage::Classroom => check_classroom(code, &mut errors),
        DslLanguage::CSharp => check_csharp(code, &mut errors),
        DslLanguage::SampleDsl => check_sample_dsl(code, &mut errors),
        DslLanguage::Other => {}
    }
    errors.extend(validate_generic(code));
    errors
}

/// Validator content for a failed check
pub fn failure_summary(errors: &[String]) -> String {
    format!("Validation failed: {}", errors.join("; "))
}

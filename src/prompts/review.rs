//! Review prompt for the LLM-backed validator

use crate::agent::AgentContext;
use std::fmt::Write;

/// Build the request asking the LLM to review `code`
///
/// The validator instructions travel as a separate system message; this
/// is the user turn that follows the conversation history.
pub fn build_review_prompt(context: &AgentContext, code: &str) -> String {
    let mut prompt = String::new();

    if let Some(grammar) = &context.grammar {
        let _ = write!(prompt, "Grammar:\n{}\n\n", grammar.trim_end());
    }

    let _ = writeln!(prompt, "Language: {}", context.language);
    let _ = writeln!(prompt, "Original request: {}", context.user_message);
    let _ = write!(prompt, "\nValidate this code:\n```\n{}\n```\n", code);

    prompt
}

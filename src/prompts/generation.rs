//! Generation prompt
//!
//! Layout, in order: agent instructions, grammar, examples, target
//! language and request, then the numbered output rules.

use crate::agent::AgentContext;
use crate::storage::Role;
use std::fmt::Write;

/// Prefix of the system turns the orchestrator adds after a failed check
pub const FEEDBACK_PREFIX: &str = "Validation feedback: ";

/// Build the composite prompt sent to the LLM
///
/// Grammar and examples are included only when present on the context.
///
/// # Examples
///
/// ```
/// use dslsmith::agent::AgentContext;
/// use dslsmith::prompts::build_generation_prompt;
///
/// let ctx = AgentContext::new("s1", "classroom", "Create a program", 6)
///     .with_grammar("grammar Classroom;");
/// let prompt = build_generation_prompt("Write code.", &ctx);
/// assert!(prompt.starts_with("Write code.\n\nGrammar:\ngrammar Classroom;"));
/// assert!(prompt.contains("Language: classroom\nUser Message: Create a program\n"));
/// ```
pub fn build_generation_prompt(instructions: &str, context: &AgentContext) -> String {
    let mut prompt = format!("{}\n\n", instructions);

    if let Some(grammar) = &context.grammar {
        let _ = write!(prompt, "Grammar:\n{}\n\n", grammar.trim_end());
    }

    if let Some(examples) = context.examples.as_ref().filter(|e| !e.is_empty()) {
        prompt.push_str("Examples:\n");
        for example in examples {
            let _ = write!(
                prompt,
                "Prompt: {}\nResponse: {}\n\n",
                example.prompt, example.response
            );
        }
    }

    let _ = writeln!(prompt, "Language: {}", context.language);
    let _ = writeln!(prompt, "User Message: {}", context.user_message);

    prompt.push_str("\nInstructions:\n");
    prompt.push_str("1. Generate only the code, no explanations\n");
    prompt.push_str("2. Follow the language syntax and conventions\n");
    prompt.push_str("3. Use the provided examples as reference\n");
    prompt.push_str("4. Ensure the code is complete and executable\n");

    let has_feedback = context
        .chat_history()
        .iter()
        .any(|turn| turn.role == Role::System && turn.content.starts_with(FEEDBACK_PREFIX));
    if has_feedback {
        prompt.push_str("5. Fix every problem reported in the validation feedback above\n");
    }

    prompt
}

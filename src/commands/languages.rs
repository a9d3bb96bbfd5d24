//! `dslsmith languages`: list what the library knows about.

use crate::config::Config;
use crate::error::Result;
use crate::library::{language_description, DslLibrary, FileLibrary};
use colored::Colorize;
use prettytable::{row, Table};

/// One row of the language listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSummary {
    pub name: String,
    pub description: String,
    pub examples: usize,
    pub has_grammar: bool,
}

/// Summaries for every language in `library`, sorted by name
pub fn summarize(library: &dyn DslLibrary) -> Result<Vec<LanguageSummary>> {
    let mut summaries = Vec::new();
    for name in library.languages() {
        summaries.push(LanguageSummary {
            description: language_description(&name),
            examples: library.examples_for(&name)?.len(),
            has_grammar: library.grammar_for(&name)?.is_some(),
            name,
        });
    }
    Ok(summaries)
}

/// Print the language table
pub fn run_languages(config: &Config) -> Result<()> {
    let library = FileLibrary::from_config(&config.library)?;
    let summaries = summarize(&library)?;

    if summaries.is_empty() {
        println!("{}", "No languages available".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Language", "Description", "Examples", "Grammar"]);
    for summary in &summaries {
        let grammar = if summary.has_grammar { "yes" } else { "no" };
        table.add_row(row![
            summary.name,
            summary.description,
            summary.examples,
            grammar
        ]);
    }

    println!("\nAvailable languages:\n");
    table.printstd();
    println!();
    Ok(())
}

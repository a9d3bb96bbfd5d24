//! Example and grammar lookup
//!
//! Maps a language identifier to its few-shot examples and its grammar
//! text. Lookups are read-only; language keys are case-insensitive.

pub mod defaults;

use crate::config::LibraryConfig;
use crate::error::{DslsmithError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One prompt/response pair shown to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Natural-language request
    pub prompt: String,
    /// Extra hints for the request
    #[serde(
        rename = "additionalDetails",
        alias = "additional_details",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_details: Option<String>,
    /// Code answering the request
    pub response: String,
}

/// On-disk layout of `<language>.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleFile {
    /// Language the examples are written in
    #[serde(default)]
    pub language: String,
    /// Example pairs in display order
    #[serde(default)]
    pub prompts: Vec<Example>,
}

const STOP_WORDS: &[&str] = &["the", "and", "for", "with", "that", "this", "from", "into"];

/// Rank examples by how many words of `message` they mention
///
/// Examples whose prompt or additional details contain the whole message
/// rank first. Ties keep their original order. When nothing matches, the
/// first `max` examples are returned.
pub fn select_relevant(examples: &[Example], message: &str, max: usize) -> Vec<Example> {
    let query = message.trim().to_lowercase();
    let words: BTreeSet<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(w))
        .collect();

    let mut scored: Vec<(usize, usize)> = examples
        .iter()
        .enumerate()
        .map(|(index, example)| {
            let haystack = format!(
                "{} {}",
                example.prompt.to_lowercase(),
                example
                    .additional_details
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
            );
            let mut score = words.iter().filter(|w| haystack.contains(*w)).count();
            if !query.is_empty() && haystack.contains(&query) {
                score += words.len() + 1;
            }
            (index, score)
        })
        .filter(|(_, score)| *score > 0)
        .collect();

    if scored.is_empty() {
        return examples.iter().take(max).cloned().collect();
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(max)
        .map(|(index, _)| examples[index].clone())
        .collect()
}

/// Human-readable description of a language identifier
pub fn language_description(language: &str) -> String {
    match language.to_lowercase().as_str() {
        "classroom" => "Classroom DSL for educational programming".to_string(),
        "csharp" => "C# programming language".to_string(),
        "sampledsl" => "Sample DSL of assignments and print statements".to_string(),
        other => format!("{} language", other),
    }
}

/// Read-only lookup of examples and grammars
pub trait DslLibrary: Send + Sync {
    /// All examples for a language, in file order; empty when unknown
    fn examples_for(&self, language: &str) -> Result<Vec<Example>>;

    /// Up to `max` examples most related to `message`
    fn relevant_examples(&self, language: &str, message: &str, max: usize) -> Result<Vec<Example>> {
        Ok(select_relevant(&self.examples_for(language)?, message, max))
    }

    /// Grammar text for a language, `None` when unknown
    fn grammar_for(&self, language: &str) -> Result<Option<String>>;

    /// Languages with examples or a grammar, sorted
    fn languages(&self) -> Vec<String>;

    /// Languages with a grammar, sorted
    fn grammar_languages(&self) -> Vec<String>;
}

/// Library loaded from example and grammar directories
#[derive(Debug, Clone, Default)]
pub struct FileLibrary {
    examples: BTreeMap<String, Vec<Example>>,
    grammars: BTreeMap<String, String>,
}

impl FileLibrary {
    /// Library holding only the built-in examples and grammars
    pub fn builtin() -> Self {
        let mut library = Self::default();
        library.add_builtin_examples();
        library.add_builtin_grammars();
        library
    }

    /// Load from the configured directories
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be listed
    pub fn from_config(config: &LibraryConfig) -> Result<Self> {
        Self::load(&config.examples_dir, &config.grammars_dir)
    }

    /// Load `*.yaml`/`*.yml` examples and `*.g4` grammars
    ///
    /// A missing directory falls back to the built-in set for that kind.
    /// Files that cannot be read or parsed are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns error if a directory path cannot be turned into a glob
    pub fn load(examples_dir: &Path, grammars_dir: &Path) -> Result<Self> {
        let mut library = Self::default();

        if examples_dir.is_dir() {
            for pattern in ["*.yaml", "*.yml"] {
                for path in list_files(examples_dir, pattern)? {
                    match load_example_file(&path) {
                        Ok(file) => {
                            let language = if file.language.trim().is_empty() {
                                file_stem(&path)
                            } else {
                                file.language.clone()
                            };
                            tracing::info!(
                                "Loaded {} examples for {}",
                                file.prompts.len(),
                                language
                            );
                            library.add_examples(&language, file.prompts);
                        }
                        Err(e) => {
                            tracing::error!("Error loading examples from {}: {:#}", path.display(), e)
                        }
                    }
                }
            }
        } else {
            tracing::warn!(
                "Examples directory {} not found, using built-in examples",
                examples_dir.display()
            );
            library.add_builtin_examples();
        }

        if grammars_dir.is_dir() {
            for path in list_files(grammars_dir, "*.g4")? {
                match std::fs::read_to_string(&path) {
                    Ok(text) => {
                        let language = file_stem(&path);
                        tracing::info!("Loaded grammar for {}", language);
                        library.add_grammar(&language, text);
                    }
                    Err(e) => {
                        tracing::error!("Error loading grammar {}: {}", path.display(), e)
                    }
                }
            }
        } else {
            tracing::warn!(
                "Grammars directory {} not found, using built-in grammars",
                grammars_dir.display()
            );
            library.add_builtin_grammars();
        }

        Ok(library)
    }

    /// Append examples for a language
    pub fn add_examples(&mut self, language: &str, examples: Vec<Example>) {
        self.examples
            .entry(language.trim().to_lowercase())
            .or_default()
            .extend(examples);
    }

    /// Set the grammar of a language
    pub fn add_grammar(&mut self, language: &str, grammar: impl Into<String>) {
        self.grammars
            .insert(language.trim().to_lowercase(), grammar.into());
    }

    /// Total number of examples across languages
    pub fn example_count(&self) -> usize {
        self.examples.values().map(Vec::len).sum()
    }

    fn add_builtin_examples(&mut self) {
        for file in defaults::example_files() {
            self.add_examples(&file.language, file.prompts);
        }
    }

    fn add_builtin_grammars(&mut self) {
        for (stem, grammar) in defaults::grammar_files() {
            self.add_grammar(stem, grammar);
        }
    }
}

impl DslLibrary for FileLibrary {
    fn examples_for(&self, language: &str) -> Result<Vec<Example>> {
        Ok(self
            .examples
            .get(&language.trim().to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    fn grammar_for(&self, language: &str) -> Result<Option<String>> {
        Ok(self.grammars.get(&language.trim().to_lowercase()).cloned())
    }

    fn languages(&self) -> Vec<String> {
        self.examples
            .keys()
            .chain(self.grammars.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn grammar_languages(&self) -> Vec<String> {
        self.grammars.keys().cloned().collect()
    }
}

fn list_files(dir: &Path, pattern: &str) -> Result<Vec<std::path::PathBuf>> {
    let pattern = dir.join(pattern);
    let pattern = pattern.to_str().ok_or_else(|| {
        DslsmithError::Library(format!("Non UTF-8 path: {}", dir.display()))
    })?;
    let paths = glob::glob(pattern)
        .map_err(|e| DslsmithError::Library(format!("Invalid pattern {}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

fn load_example_file(path: &Path) -> Result<ExampleFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let file: ExampleFile = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(file)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_file, temp_dir};

    fn sample(prompt: &str, details: Option<&str>) -> Example {
        Example {
            prompt: prompt.to_string(),
            additional_details: details.map(str::to_string),
            response: String::new(),
        }
    }

    #[test]
    fn test_builtin_library_contents() {
        let library = FileLibrary::builtin();
        assert_eq!(library.examples_for("csharp").unwrap().len(), 2);
        assert_eq!(library.examples_for("classroom").unwrap().len(), 2);
        assert!(library.grammar_for("classroom").unwrap().is_some());
        assert!(library.grammar_for("sampledsl").unwrap().is_some());
        assert_eq!(
            library.languages(),
            vec!["classroom", "csharp", "sampledsl"]
        );
        assert_eq!(library.grammar_languages(), vec!["classroom", "sampledsl"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let library = FileLibrary::builtin();
        assert_eq!(
            library.examples_for("CSharp").unwrap(),
            library.examples_for("csharp").unwrap()
        );
        assert!(library.grammar_for("Classroom").unwrap().is_some());
    }

    #[test]
    fn test_unknown_language_is_empty() {
        let library = FileLibrary::builtin();
        assert!(library.examples_for("cobol").unwrap().is_empty());
        assert!(library.grammar_for("cobol").unwrap().is_none());
    }

    #[test]
    fn test_select_relevant_prefers_more_matches() {
        let examples = vec![
            sample("Create a person POCO", None),
            sample("Create a person with a greeting method", Some("greeting")),
        ];
        let picked = select_relevant(&examples, "person greeting", 5);
        assert_eq!(picked[0].prompt, "Create a person with a greeting method");
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_select_relevant_matches_details() {
        let examples = vec![
            sample("First", Some("prints with Notes.take")),
            sample("Second", None),
        ];
        let picked = select_relevant(&examples, "use notes", 5);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].prompt, "First");
    }

    #[test]
    fn test_select_relevant_falls_back_and_caps() {
        let examples = vec![sample("a", None), sample("b", None), sample("c", None)];
        let picked = select_relevant(&examples, "zzz qqq", 2);
        let prompts: Vec<&str> = picked.iter().map(|e| e.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["a", "b"]);
    }

    #[test]
    fn test_load_from_directories() {
        let dir = temp_dir();
        create_test_file(
            &dir,
            "examples/rules.yaml",
            "language: Rules\nprompts:\n  - prompt: Create a rule\n    additionalDetails: A discount rule\n    response: rule r { }\n",
        );
        create_test_file(&dir, "examples/broken.yaml", "language: [unclosed\n");
        create_test_file(&dir, "grammars/Rules.g4", "grammar Rules;\n");

        let library =
            FileLibrary::load(&dir.path().join("examples"), &dir.path().join("grammars")).unwrap();

        let examples = library.examples_for("rules").unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].additional_details.as_deref(), Some("A discount rule"));
        assert_eq!(
            library.grammar_for("RULES").unwrap().as_deref(),
            Some("grammar Rules;\n")
        );
        assert!(library.examples_for("classroom").unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_directories_uses_builtins_without_writing() {
        let dir = temp_dir();
        let examples_dir = dir.path().join("missing-examples");
        let grammars_dir = dir.path().join("missing-grammars");
        let library = FileLibrary::load(&examples_dir, &grammars_dir).unwrap();

        assert_eq!(library.example_count(), 4);
        assert!(!examples_dir.exists());
        assert!(!grammars_dir.exists());
    }

    #[test]
    fn test_language_falls_back_to_file_stem() {
        let dir = temp_dir();
        create_test_file(
            &dir,
            "ex/Widgets.yml",
            "prompts:\n  - prompt: Make a widget\n    response: widget w;\n",
        );
        let library = FileLibrary::load(&dir.path().join("ex"), &dir.path().join("gr")).unwrap();
        assert_eq!(library.examples_for("widgets").unwrap().len(), 1);
    }

    #[test]
    fn test_language_description() {
        assert_eq!(language_description("CSharp"), "C# programming language");
        assert_eq!(language_description("python"), "python language");
    }
}

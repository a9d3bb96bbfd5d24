//! `dslsmith init`: write the default config, examples and grammars.
//!
//! Files that already exist are left alone, so running the command twice is
//! harmless.

use crate::config::Config;
use crate::error::Result;
use crate::library::defaults::{example_files, grammar_files};
use anyhow::Context;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Files touched by a seeding run
#[derive(Debug, Default)]
pub struct InitReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

fn write_once(path: PathBuf, contents: &str, report: &mut InitReport) -> Result<()> {
    if path.exists() {
        tracing::debug!("Keeping existing {}", path.display());
        report.skipped.push(path);
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    report.written.push(path);
    Ok(())
}

/// Seed `dir` with `config/config.yaml`, `data/examples` and `data/grammars`
pub fn seed_defaults(dir: &Path) -> Result<InitReport> {
    let mut report = InitReport::default();

    write_once(
        dir.join("config").join("config.yaml"),
        &Config::default().to_yaml()?,
        &mut report,
    )?;

    for file in example_files() {
        let path = dir
            .join("data")
            .join("examples")
            .join(format!("{}.yaml", file.language));
        write_once(path, &serde_yaml::to_string(&file)?, &mut report)?;
    }

    for (stem, grammar) in grammar_files() {
        let path = dir.join("data").join("grammars").join(format!("{}.g4", stem));
        write_once(path, grammar, &mut report)?;
    }

    Ok(report)
}

/// Seed `dir` and report what happened
pub fn run_init(dir: &Path) -> Result<()> {
    let report = seed_defaults(dir)?;
    for path in &report.written {
        println!("{} {}", "created".green(), path.display());
    }
    for path in &report.skipped {
        println!("{} {} (already exists)", "skipped".yellow(), path.display());
    }
    Ok(())
}

// CLI commands for grading locally and inspecting harness configuration
use anyhow::{bail, Context, Result};
use senpai_common::checker::CheckerSpec;
use senpai_common::types::Report;
use senpai_harness::defaults::{catalog_for, loading_catalog};
use senpai_harness::{run_checker, CheckRequest, LanguageConfigManager, MessageCatalog, TestMode};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::CatalogKind;

const FALLBACK_LANGUAGE: &str = "python";

fn load_languages(path: Option<&Path>) -> Result<LanguageConfigManager> {
    let manager = match path {
        Some(path) => LanguageConfigManager::load(path),
        None => LanguageConfigManager::load_default(),
    };
    manager.context("Failed to load language configuration")
}

fn read_checker(path: &Path) -> Result<CheckerSpec> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read checker {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid checker definition {}", path.display()))
}

/// Flag, then the checker's own language, then python.
fn resolve_language<'a>(flag: Option<&'a str>, checker: &'a CheckerSpec) -> &'a str {
    flag.or(checker.language.as_deref()).unwrap_or(FALLBACK_LANGUAGE)
}

fn render_report(report: &Report, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        report.to_json()?
    };
    Ok(rendered)
}

pub fn check(
    checker_path: &Path,
    submission: &Path,
    locale: &str,
    language: Option<&str>,
    languages: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    if !submission.is_file() {
        bail!("Submission {} does not exist", submission.display());
    }

    let checker = read_checker(checker_path)?;
    let manager = load_languages(languages)?;
    let language = resolve_language(language, &checker);
    let language_config = manager
        .get_config(language)
        .with_context(|| format!("Available languages: {:?}", manager.list_languages()))?;

    let base_dir = checker_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    info!(
        checker = %checker_path.display(),
        submission = %submission.display(),
        language = %language,
        locale = %locale,
        "Checking submission"
    );

    let outcome = run_checker(&CheckRequest {
        checker: &checker,
        submission,
        locale,
        language: language_config,
        base_dir,
    })
    .context("Checker could not run")?;

    // The report is printed exactly once, after every group has closed
    println!("{}", render_report(&outcome.report, pretty)?);

    let passed_groups = outcome.groups.iter().filter(|g| g.all_passed()).count();
    if outcome.passed() {
        eprintln!("✅ Passed ({} / {} groups)", passed_groups, outcome.groups.len());
    } else if !outcome.loaded {
        eprintln!("❌ Submission could not be loaded");
    } else {
        eprintln!("❌ Failed ({} / {} groups)", passed_groups, outcome.groups.len());
    }

    Ok(())
}

pub fn list_languages(languages: Option<&Path>) -> Result<()> {
    let manager = load_languages(languages)?;
    let names = manager.list_languages();

    if names.is_empty() {
        println!("No languages configured.");
        return Ok(());
    }

    println!("📋 Configured Languages:\n");
    println!("{:<12} {:<8} {:<40} {:<10}", "NAME", "EXT", "RUNNER", "RESERVED");
    println!("{}", "─".repeat(74));

    for name in &names {
        let config = manager.get_config(name)?;
        let runner = std::iter::once(config.runner.command.as_str())
            .chain(config.runner.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:<12} {:<8} {:<40} {:<10}",
            config.name,
            config.file_extension,
            runner,
            config.reserved_names.len()
        );
    }

    println!("\n✅ Total: {} language(s)", names.len());
    Ok(())
}

fn default_catalog(kind: CatalogKind) -> MessageCatalog {
    match kind {
        CatalogKind::Load => loading_catalog(),
        CatalogKind::Function => catalog_for(TestMode::Function),
        CatalogKind::Program => catalog_for(TestMode::Program),
        CatalogKind::Snippet => catalog_for(TestMode::Snippet),
    }
}

/// Catalog entries for one locale as a JSON object, keyed by message key.
///
/// Hints and triggers are included only when an entry has them, so the
/// output doubles as a starting point for checker `messages` overrides.
fn catalog_json(catalog: &MessageCatalog, locale: &str) -> Result<Value> {
    let keys = catalog.keys(locale);
    if keys.is_empty() {
        bail!("No messages for locale '{}'", locale);
    }

    let mut entries = Map::new();
    for key in keys {
        let Some(entry) = catalog.get(key, locale) else {
            continue;
        };
        let value = if entry.hints.is_empty() && entry.triggers.is_empty() {
            Value::String(entry.content.clone())
        } else {
            json!({
                "content": entry.content,
                "hints": entry.hints,
                "triggers": entry.triggers,
            })
        };
        entries.insert(key.to_string(), value);
    }
    Ok(Value::Object(entries))
}

pub fn print_messages(kind: CatalogKind, locale: &str) -> Result<()> {
    let catalog = default_catalog(kind);
    let rendered = catalog_json(&catalog, locale)?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

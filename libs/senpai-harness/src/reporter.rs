/// Diagnostic Reporter
///
/// **Core Responsibility:**
/// Append rendered events to the report: session → group → run → event.
///
/// **Critical Properties:**
/// - Append only; events are never reordered or removed
/// - An empty template is skipped, which is how exercises silence messages
/// - Runs that received no events are dropped when their group closes
/// - The report leaves the reporter once, through `finish`

use crate::catalog::{render, FormatArgs, MessageCatalog, MessageEntry};
use senpai_common::types::{Message, Report, Run, Severity, TestGroup};
use tracing::{debug, warn};

pub struct Reporter {
    report: Report,
    catalog: MessageCatalog,
    locale: String,
}

impl Reporter {
    pub fn new(tester: &str) -> Self {
        Self {
            report: Report::new(tester),
            catalog: MessageCatalog::new(),
            locale: "en".to_string(),
        }
    }

    /// Catalog and locale used by subsequent appends.
    pub fn use_catalog(&mut self, catalog: MessageCatalog, locale: &str) {
        self.catalog = catalog;
        self.locale = locale.to_string();
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn open_group(&mut self, title: impl Into<String>) {
        self.close_group();
        let title = title.into();
        debug!(title = %title, "Opening test group");
        self.report.groups.push(TestGroup {
            title,
            runs: Vec::new(),
        });
    }

    /// Open a group titled by a rendered catalog entry.
    pub fn open_group_from(&mut self, key: &str, args: &FormatArgs) {
        let title = self
            .catalog
            .resolve(key, &self.locale, None)
            .map(|entry| render(&entry.content, args))
            .unwrap_or_else(|| key.to_string());
        self.open_group(title);
    }

    pub fn open_run(&mut self) {
        let group = self.current_group();
        group.runs.push(Run::default());
    }

    /// Append the entry for `key`. Returns false when nothing was emitted.
    pub fn append(&mut self, key: &str, severity: Severity, args: &FormatArgs) -> bool {
        self.append_or(key, None, severity, args)
    }

    /// Append `key`, falling back to `fallback` when the catalog lacks it.
    pub fn append_or(
        &mut self,
        key: &str,
        fallback: Option<&str>,
        severity: Severity,
        args: &FormatArgs,
    ) -> bool {
        let entry = match self.catalog.resolve(key, &self.locale, fallback) {
            Some(entry) => entry.clone(),
            None => {
                warn!(key, locale = %self.locale, "Message key missing from catalog");
                MessageEntry::new(key)
            }
        };
        if entry.content.is_empty() {
            return false;
        }
        let message = Message {
            content: render(&entry.content, args),
            severity,
            triggers: entry.triggers,
            hints: entry.hints,
        };
        self.push(message);
        true
    }

    /// Append literal text that bypasses the catalog.
    pub fn append_text(&mut self, content: impl Into<String>, severity: Severity) {
        self.push(Message {
            content: content.into(),
            severity,
            triggers: Vec::new(),
            hints: Vec::new(),
        });
    }

    fn push(&mut self, message: Message) {
        let group = self.current_group();
        if group.runs.is_empty() {
            group.runs.push(Run::default());
        }
        if let Some(run) = group.runs.last_mut() {
            run.output.push(message);
        }
    }

    fn current_group(&mut self) -> &mut TestGroup {
        if self.report.groups.is_empty() {
            warn!("Event appended before any group was opened");
            self.report.groups.push(TestGroup {
                title: String::new(),
                runs: Vec::new(),
            });
        }
        let last = self.report.groups.len() - 1;
        &mut self.report.groups[last]
    }

    fn close_group(&mut self) {
        if let Some(group) = self.report.groups.last_mut() {
            group.runs.retain(|run| !run.output.is_empty());
        }
    }

    /// Read-only view of what has been appended so far.
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn finish(mut self) -> Report {
        self.close_group();
        self.report
    }
}

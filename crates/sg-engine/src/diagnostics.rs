//! Diagnostics
//!
//! Per-node message logs with configurable warning categories and severity
//! escalation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::graph::Node;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "NOTE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// Group of related warning categories, toggled together
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningGroup {
    Cache,
    Geometry,
    Parameters,
}

/// Individually toggleable warning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningCategory {
    /// An on-disk artifact existed but could not be read
    CacheLoad,
    /// A computed value could not be persisted
    CacheStore,
    /// A node evaluated to an empty value
    EmptyResult,
    /// A result contains degenerate faces
    DegenerateGeometry,
    /// A parameter is legal but probably unintended
    SuspiciousParameter,
}

impl WarningCategory {
    pub const ALL: [WarningCategory; 5] = [
        WarningCategory::CacheLoad,
        WarningCategory::CacheStore,
        WarningCategory::EmptyResult,
        WarningCategory::DegenerateGeometry,
        WarningCategory::SuspiciousParameter,
    ];

    /// Group this category belongs to
    pub fn group(self) -> WarningGroup {
        match self {
            WarningCategory::CacheLoad | WarningCategory::CacheStore => WarningGroup::Cache,
            WarningCategory::EmptyResult | WarningCategory::DegenerateGeometry => {
                WarningGroup::Geometry
            }
            WarningCategory::SuspiciousParameter => WarningGroup::Parameters,
        }
    }

    /// Name shown in messages
    pub fn name(self) -> &'static str {
        match self {
            WarningCategory::CacheLoad => "cache-load",
            WarningCategory::CacheStore => "cache-store",
            WarningCategory::EmptyResult => "empty-result",
            WarningCategory::DegenerateGeometry => "degenerate-geometry",
            WarningCategory::SuspiciousParameter => "suspicious-parameter",
        }
    }
}

/// One entry in a node's message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub severity: Severity,
    pub category: Option<WarningCategory>,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Some(category) => write!(f, "{} [{}]: {}", self.severity, category.name(), self.text),
            None => write!(f, "{}: {}", self.severity, self.text),
        }
    }
}

/// Warning toggles and escalation settings
///
/// A category's own setting wins over its group's; anything unset is
/// enabled. Disabled categories are dropped before escalation, so
/// `warnings_as_errors` only promotes warnings that would have been shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningPolicy {
    pub groups: BTreeMap<WarningGroup, bool>,
    pub categories: BTreeMap<WarningCategory, bool>,
    /// Promote every enabled warning to an error
    pub warnings_as_errors: bool,
    /// Abort the run on the first error
    pub fatal_errors: bool,
}

impl WarningPolicy {
    /// Whether `category` is reported at all
    pub fn is_enabled(&self, category: WarningCategory) -> bool {
        self.categories
            .get(&category)
            .or_else(|| self.groups.get(&category.group()))
            .copied()
            .unwrap_or(true)
    }

    /// Enable or disable a whole group
    pub fn set_group(&mut self, group: WarningGroup, enabled: bool) {
        self.groups.insert(group, enabled);
    }

    /// Override one category
    pub fn set_category(&mut self, category: WarningCategory, enabled: bool) {
        self.categories.insert(category, enabled);
    }

    /// Severity a message is recorded at, `None` when it is suppressed
    pub fn effective_severity(
        &self,
        severity: Severity,
        category: Option<WarningCategory>,
    ) -> Option<Severity> {
        match severity {
            Severity::Warning => {
                if category.is_some_and(|c| !self.is_enabled(c)) {
                    None
                } else if self.warnings_as_errors {
                    Some(Severity::Error)
                } else {
                    Some(Severity::Warning)
                }
            }
            other => Some(other),
        }
    }
}

/// Expand a message template
///
/// `%D` becomes `descriptor` and `%%` a literal `%`. Any other `%` is kept.
pub fn format_message(template: &str, descriptor: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('D') => {
                chars.next();
                out.push_str(descriptor);
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    out
}

/// Escape free text so it survives [`format_message`] unchanged
pub fn escape(text: &str) -> String {
    text.replace('%', "%%")
}

/// Run-wide message sink
#[derive(Debug, Default)]
pub struct Diagnostics {
    policy: WarningPolicy,
    aborted: AtomicBool,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl Diagnostics {
    /// Create a collector for one run
    pub fn new(policy: WarningPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The active policy
    pub fn policy(&self) -> &WarningPolicy {
        &self.policy
    }

    /// Record a message on `node`, returning the severity it was logged at
    pub fn message(
        &self,
        node: &Node,
        severity: Severity,
        category: Option<WarningCategory>,
        template: &str,
    ) -> Option<Severity> {
        let severity = self.policy.effective_severity(severity, category)?;
        let text = format_message(template, node.descriptor());

        match severity {
            Severity::Note => tracing::debug!(node = %node.id(), "{}", text),
            Severity::Warning => {
                self.warnings.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(node = %node.id(), "{}", text);
            }
            Severity::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(node = %node.id(), "{}", text);
                if self.policy.fatal_errors && !self.aborted.swap(true, Ordering::AcqRel) {
                    tracing::warn!("Fatal error reported, no further nodes will be started");
                }
            }
        }

        node.push_message(Message {
            severity,
            category,
            text,
        });
        Some(severity)
    }

    /// Whether a fatal error stopped new work
    pub fn should_abort(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Errors recorded so far
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Warnings recorded so far
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }
}

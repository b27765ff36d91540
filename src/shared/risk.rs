//! Keyword Risk Scanner
//!
//! Flags schedule, compliance and material risks in free report text. Each
//! non-empty line is scanned once per category; the first matching keyword of
//! a category produces one issue for that line.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::report::{CapturedData, ComponentKind};

/// Risk category of a detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Schedule,
    Compliance,
    Material,
}

/// Issue severity, derived from the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Categories in scan order
    pub const ALL: [RiskCategory; 3] = [
        RiskCategory::Schedule,
        RiskCategory::Compliance,
        RiskCategory::Material,
    ];

    /// Lowercase phrases that mark a line as belonging to this category
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            RiskCategory::Schedule => &[
                "delayed",
                "rescheduled",
                "postponed",
                "behind schedule",
                "overdue",
            ],
            RiskCategory::Compliance => &[
                "pending",
                "non-compliant",
                "violation",
                "missing",
                "expired",
                "incomplete",
            ],
            RiskCategory::Material => &[
                "shortage",
                "out of stock",
                "unavailable",
                "insufficient",
                "low supply",
            ],
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RiskCategory::Schedule => Severity::Medium,
            RiskCategory::Compliance => Severity::High,
            RiskCategory::Material => Severity::Low,
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords().iter().any(|keyword| lowered.contains(keyword))
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskCategory::Schedule => "Schedule",
            RiskCategory::Compliance => "Compliance",
            RiskCategory::Material => "Material",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(name)
    }
}

/// One flagged risk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedIssue {
    /// Sequential, starting at 1
    pub id: u32,
    /// 1-based position among the non-empty lines
    pub line: usize,
    /// First four words of the line
    pub title: String,
    /// The full trimmed line
    pub description: String,
    pub severity: Severity,
    pub category: RiskCategory,
}

/// Scan free text and return the issues it contains, in line order
pub fn analyze_report_text(text: &str) -> Vec<DetectedIssue> {
    let mut issues = Vec::new();
    let mut next_id = 1;

    let lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    for (index, line) in lines.enumerate() {
        let lowered = line.to_lowercase();
        for category in RiskCategory::ALL {
            if !category.matches(&lowered) {
                continue;
            }
            issues.push(DetectedIssue {
                id: next_id,
                line: index + 1,
                title: short_title(line),
                description: line.to_string(),
                severity: category.severity(),
                category,
            });
            next_id += 1;
        }
    }

    issues
}

fn short_title(line: &str) -> String {
    let words: Vec<&str> = line.split(' ').collect();
    let mut title = words.iter().take(4).copied().collect::<Vec<_>>().join(" ");
    if words.len() > 4 {
        title.push_str("...");
    }
    title
}

/// Flatten captured data into scannable text
///
/// Titles and text values are emitted one per line in key order. Image data is
/// skipped.
pub fn report_text(captured: &CapturedData) -> String {
    let mut lines = Vec::new();
    for component in captured.values() {
        let title = component.title().trim();
        if !title.is_empty() {
            lines.push(title);
        }
        if component.kind() != ComponentKind::Image {
            let value = component.value().trim();
            if !value.is_empty() {
                lines.push(value);
            }
        }
    }
    lines.join("\n")
}

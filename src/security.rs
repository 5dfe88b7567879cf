//! Input screening for malicious prompt content.
//!
//! The validator holds an ordered list of `(category, matcher)` rules. Rules are
//! evaluated in sequence and the first match is reported, so identical input
//! always yields the identical finding.

use crate::config::SecuritySettings;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Attack classes the validator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    EmptyInput,
    ExcessiveLength,
    ExcessiveUrlLength,
    RepeatedCharacters,
    NullByte,
    SqlInjection,
    CommandInjection,
    PathTraversal,
    ScriptInjection,
}

impl ThreatCategory {
    /// Human-readable description used in caller-facing messages.
    pub fn describe(&self) -> &'static str {
        match self {
            ThreatCategory::EmptyInput => "empty input",
            ThreatCategory::ExcessiveLength => "input exceeds maximum length",
            ThreatCategory::ExcessiveUrlLength => "URL exceeds maximum length",
            ThreatCategory::RepeatedCharacters => "excessive character repetition",
            ThreatCategory::NullByte => "null bytes in input",
            ThreatCategory::SqlInjection => "potential SQL injection",
            ThreatCategory::CommandInjection => "potential command injection",
            ThreatCategory::PathTraversal => "potential path traversal",
            ThreatCategory::ScriptInjection => "potential script injection",
        }
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single positive result from [`SecurityValidator::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityFinding {
    pub category: ThreatCategory,
    /// The offending fragment, already sanitized for logging.
    pub pattern: String,
}

impl std::fmt::Display for SecurityFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.category, self.pattern)
    }
}

type CheckFn = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

enum Matcher {
    /// Any of the patterns matching is a hit.
    Patterns(Vec<Regex>),
    /// Structural check returning the offending fragment.
    Check(CheckFn),
}

impl Matcher {
    fn patterns(sources: &[&str]) -> Self {
        let compiled = sources
            .iter()
            .filter_map(|src| {
                RegexBuilder::new(src)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| tracing::error!("Skipping invalid security pattern {}: {}", src, e))
                    .ok()
            })
            .collect();
        Matcher::Patterns(compiled)
    }

    fn find(&self, text: &str) -> Option<String> {
        match self {
            Matcher::Patterns(patterns) => patterns
                .iter()
                .find_map(|re| re.find(text).map(|m| m.as_str().to_string())),
            Matcher::Check(check) => check(text),
        }
    }
}

const SQL_INJECTION_PATTERNS: &[&str] = &[
    r"\bunion\s+(all\s+)?select\b",
    r"\bselect\b.+\bfrom\b",
    r"\binsert\s+into\b",
    r"\bdelete\s+from\b",
    r"\bdrop\s+(table|database|schema)\b",
    r"\bupdate\s+\w+\s+set\b",
    r"\balter\s+table\b",
    r"\bexec(ute)?\s*\(",
    r"\bdeclare\s+@",
    r";\s*(select|insert|update|delete|drop)\b",
    r"'\s*(or|and)\s+'?\w+'?\s*=",
    r"\b(or|and)\s+\d+\s*=\s*\d+",
    r"--\s|/\*|\*/",
    r"\bxp_\w+",
    r"\bsp_\w+",
];

const COMMAND_INJECTION_PATTERNS: &[&str] = &[
    r"&&|\|\||;|\||`",
    r"\$\(.*\)",
    r"\b(wget|curl|chmod|chown)\b",
    r"\brm\b.*-rf",
    r"\bcat\b.*/etc",
];

const PATH_TRAVERSAL_PATTERNS: &[&str] = &[
    r"\.\./|\.\.\\",
    r"/etc/(passwd|shadow)",
    r"\\windows\\system32",
];

const SCRIPT_INJECTION_PATTERNS: &[&str] = &[
    r"<script\b",
    r"javascript:",
    r"\bonerror\s*=",
    r"\bonload\s*=",
    r"\beval\s*\(",
    r"<iframe\b",
];

/// Stateless, ordered input screener.
pub struct SecurityValidator {
    rules: Vec<(ThreatCategory, Matcher)>,
}

impl SecurityValidator {
    /// Create a validator with default limits.
    pub fn new() -> Self {
        Self::with_settings(&SecuritySettings::default())
    }

    /// Create a validator with the given length and repetition limits.
    pub fn with_settings(settings: &SecuritySettings) -> Self {
        let max_prompt = settings.max_prompt_length;
        let max_url = settings.max_url_length;
        let max_repeat = settings.max_repeated_chars;

        let url_re = Regex::new(r"https?://\S+").ok();

        let rules: Vec<(ThreatCategory, Matcher)> = vec![
            (
                ThreatCategory::EmptyInput,
                Matcher::Check(Box::new(|text: &str| {
                    text.trim().is_empty().then(String::new)
                })),
            ),
            (
                ThreatCategory::ExcessiveLength,
                Matcher::Check(Box::new(move |text: &str| {
                    let len = text.chars().count();
                    (len > max_prompt).then(|| format!("{} characters", len))
                })),
            ),
            (
                ThreatCategory::ExcessiveUrlLength,
                Matcher::Check(Box::new(move |text: &str| {
                    url_re.as_ref().and_then(|re| {
                        re.find_iter(text)
                            .find(|m| m.as_str().chars().count() > max_url)
                            .map(|m| format!("{} character URL", m.as_str().chars().count()))
                    })
                })),
            ),
            (
                ThreatCategory::RepeatedCharacters,
                Matcher::Check(Box::new(move |text: &str| first_long_run(text, max_repeat))),
            ),
            (
                ThreatCategory::NullByte,
                Matcher::Check(Box::new(|text: &str| {
                    text.contains('\0').then(|| "\\0".to_string())
                })),
            ),
            (ThreatCategory::SqlInjection, Matcher::patterns(SQL_INJECTION_PATTERNS)),
            (ThreatCategory::CommandInjection, Matcher::patterns(COMMAND_INJECTION_PATTERNS)),
            (ThreatCategory::PathTraversal, Matcher::patterns(PATH_TRAVERSAL_PATTERNS)),
            (ThreatCategory::ScriptInjection, Matcher::patterns(SCRIPT_INJECTION_PATTERNS)),
        ];

        Self { rules }
    }

    /// Scan text and return the first finding, if any.
    pub fn check(&self, text: &str) -> Option<SecurityFinding> {
        self.rules.iter().find_map(|(category, matcher)| {
            matcher.find(text).map(|fragment| SecurityFinding {
                category: *category,
                pattern: sanitize_for_log(&fragment, 64),
            })
        })
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Report the first run of one character longer than `max`.
fn first_long_run(text: &str, max: usize) -> Option<String> {
    let mut prev: Option<char> = None;
    let mut run = 0usize;

    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run > max {
            return Some(format!("'{}' x{}+", c.escape_default(), run));
        }
    }

    None
}

/// Strip control characters and truncate text for safe logging.
pub fn sanitize_for_log(text: &str, max_length: usize) -> String {
    let cleaned: String = text.chars().filter(|c| !c.is_control()).collect();

    if cleaned.chars().count() > max_length {
        let truncated: String = cleaned.chars().take(max_length).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

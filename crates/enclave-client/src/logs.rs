//! Log retrieval options and line filtering

use crate::error::Result;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Options for fetching service logs
///
/// `since` and `follow` are handed to the orchestrator. The remaining
/// fields are applied locally by [`LineFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogOptions {
    /// Keep only the last N matching lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,

    /// Keep lines containing this substring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grep: Option<String>,

    /// Only lines logged after this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,

    /// Keep the stream open for new lines
    #[serde(default)]
    pub follow: bool,

    /// Keep lines matching this regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_regex: Option<String>,

    /// Drop lines matching this regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_regex: Option<String>,

    /// Whether `grep` and the regexes are case sensitive
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            lines: None,
            grep: None,
            since: None,
            follow: false,
            include_regex: None,
            exclude_regex: None,
            case_sensitive: true,
        }
    }
}

impl LogOptions {
    /// Keep only the last `lines` lines
    pub fn tail(mut self, lines: usize) -> Self {
        self.lines = Some(lines);
        self
    }

    /// Keep lines containing `pattern`
    pub fn grep(mut self, pattern: impl Into<String>) -> Self {
        self.grep = Some(pattern.into());
        self
    }

    /// Keep lines matching `regex`
    pub fn include(mut self, regex: impl Into<String>) -> Self {
        self.include_regex = Some(regex.into());
        self
    }

    /// Drop lines matching `regex`
    pub fn exclude(mut self, regex: impl Into<String>) -> Self {
        self.exclude_regex = Some(regex.into());
        self
    }

    /// Match case-insensitively
    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Compile the local filter
    pub fn compile(&self) -> Result<LineFilter> {
        let build = |pattern: &str| -> Result<Regex> {
            Ok(RegexBuilder::new(pattern)
                .case_insensitive(!self.case_sensitive)
                .build()?)
        };

        Ok(LineFilter {
            grep: self.grep.as_ref().map(|g| {
                if self.case_sensitive {
                    g.clone()
                } else {
                    g.to_lowercase()
                }
            }),
            include: self.include_regex.as_deref().map(build).transpose()?,
            exclude: self.exclude_regex.as_deref().map(build).transpose()?,
            case_sensitive: self.case_sensitive,
            lines: self.lines,
        })
    }
}

/// Compiled form of [`LogOptions`]
#[derive(Debug, Clone)]
pub struct LineFilter {
    grep: Option<String>,
    include: Option<Regex>,
    exclude: Option<Regex>,
    case_sensitive: bool,
    lines: Option<usize>,
}

impl LineFilter {
    /// Whether a single line passes grep, include and exclude
    pub fn matches(&self, line: &str) -> bool {
        if let Some(grep) = &self.grep {
            let hit = if self.case_sensitive {
                line.contains(grep.as_str())
            } else {
                line.to_lowercase().contains(grep.as_str())
            };
            if !hit {
                return false;
            }
        }

        if let Some(include) = &self.include {
            if !include.is_match(line) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(line) {
                return false;
            }
        }

        true
    }

    /// Filter lines, then keep the tail
    pub fn apply(&self, lines: Vec<String>) -> Vec<String> {
        let mut kept: Vec<String> = lines.into_iter().filter(|l| self.matches(l)).collect();
        if let Some(n) = self.lines {
            if kept.len() > n {
                let start = kept.len() - n;
                kept.drain(..start);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<String> {
        vec![
            "INFO Starting geth".to_string(),
            "WARN peer dropped".to_string(),
            "ERROR engine api unreachable".to_string(),
            "INFO Imported new chain segment".to_string(),
            "error: retrying".to_string(),
        ]
    }

    #[test]
    fn test_default_keeps_everything() {
        let filter = LogOptions::default().compile().unwrap();
        assert_eq!(filter.apply(sample()).len(), 5);
    }

    #[test]
    fn test_grep_respects_case() {
        let filter = LogOptions::default().grep("error").compile().unwrap();
        assert_eq!(filter.apply(sample()), vec!["error: retrying"]);

        let filter = LogOptions::default().grep("error").ignore_case().compile().unwrap();
        assert_eq!(filter.apply(sample()).len(), 2);
    }

    #[test]
    fn test_include_exclude_and_tail() {
        let filter = LogOptions::default()
            .include("^(INFO|WARN)")
            .exclude("peer")
            .compile()
            .unwrap();
        assert_eq!(
            filter.apply(sample()),
            vec!["INFO Starting geth", "INFO Imported new chain segment"]
        );

        let filter = LogOptions::default().include("^INFO").tail(1).compile().unwrap();
        assert_eq!(filter.apply(sample()), vec!["INFO Imported new chain segment"]);
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        assert!(LogOptions::default().include("(").compile().is_err());
    }

    #[test]
    fn test_case_sensitive_defaults_to_true_when_absent() {
        let options: LogOptions = serde_json::from_str(r#"{"grep": "x"}"#).unwrap();
        assert!(options.case_sensitive);
        assert!(!options.follow);
    }
}

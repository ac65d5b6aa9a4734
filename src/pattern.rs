//! Regex engine
//!
//! An ordered list of find-and-replace rules applied to the whole file, each
//! rule seeing the output of the previous one.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rewriter::RuleHits;

/// One configured substitution. `replacement` uses the regex crate's
/// syntax (`$1`, `${name}`, `$$` for a literal dollar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub name: String,
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    regex: Regex,
    replacement: String,
}

impl CompiledPattern {
    pub fn compile(rule: &PatternRule) -> Result<Self> {
        let regex = Regex::new(&rule.pattern).with_context(|| {
            format!("Invalid regex in rule '{}': {}", rule.name, rule.pattern)
        })?;

        Ok(Self {
            name: rule.name.clone(),
            regex,
            replacement: rule.replacement.clone(),
        })
    }

    /// Replace every match, returning the new text and the match count
    pub fn apply(&self, text: &str) -> (String, usize) {
        let count = self.regex.find_iter(text).count();
        if count == 0 {
            return (text.to_string(), 0);
        }
        let replaced = self.regex.replace_all(text, self.replacement.as_str());
        (replaced.into_owned(), count)
    }
}

pub struct PatternRewriter {
    patterns: Vec<CompiledPattern>,
}

impl PatternRewriter {
    pub fn new(rules: &[PatternRule]) -> Result<Self> {
        let patterns = rules
            .iter()
            .map(CompiledPattern::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn rewrite(&self, source: &str) -> (String, Vec<RuleHits>) {
        let mut text = source.to_string();
        let mut hits = Vec::with_capacity(self.patterns.len());

        for pattern in &self.patterns {
            let (next, count) = pattern.apply(&text);
            debug!(rule = %pattern.name, matches = count, "applied pattern");
            hits.push(RuleHits {
                rule: pattern.name.clone(),
                count,
            });
            text = next;
        }

        (text, hits)
    }
}

//! Rewrite rule parameters
//!
//! Both engines read the same `RuleSet`. The syntax engine matches nodes by
//! these identifiers; the regex engine derives its default pattern list
//! from them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pattern::PatternRule;

/// The two rewrites retfix knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `return res.status(..).json(..);` -> `res.status(..).json(..)` + `return;`
    ReturnStatement,
    /// `router.get(path, mw, async (req, res) => {` -> `...: Promise<void> => {`
    HandlerSignature,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::ReturnStatement => "return-statement",
            RuleKind::HandlerSignature => "handler-signature",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Identifier of the response object (`res`)
    pub response: String,

    /// First call of the chain (`status`)
    pub status_method: String,

    /// Second call of the chain (`json`)
    pub send_method: String,

    /// Indentation written before the bare `return;`
    pub return_indent: String,

    /// Reuse the rewritten statement's own indentation instead of `return_indent`
    pub match_statement_indent: bool,

    /// Write `expr;` instead of `expr` on the expression line
    pub keep_terminator: bool,

    /// Router objects whose handler registrations get annotated
    pub routers: Vec<String>,

    /// Middleware identifier expected as the second argument
    pub middleware: String,

    /// Return type inserted after the handler's parameter list
    pub return_type: String,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            response: "res".to_string(),
            status_method: "status".to_string(),
            send_method: "json".to_string(),
            return_indent: " ".repeat(12),
            match_statement_indent: false,
            keep_terminator: false,
            routers: vec!["cart_items".to_string()],
            middleware: "authMiddleware".to_string(),
            return_type: "Promise<void>".to_string(),
        }
    }
}

impl RuleSet {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("response", &self.response),
            ("status_method", &self.status_method),
            ("send_method", &self.send_method),
            ("middleware", &self.middleware),
        ] {
            if !is_identifier(value) {
                anyhow::bail!("Invalid {}: '{}' (must be a JavaScript identifier)", field, value);
            }
        }

        if self.routers.is_empty() {
            anyhow::bail!("Invalid routers: at least one router identifier is required");
        }
        for router in &self.routers {
            if !is_identifier(router) {
                anyhow::bail!("Invalid router: '{}' (must be a JavaScript identifier)", router);
            }
        }

        if !self.return_indent.chars().all(|c| c == ' ' || c == '\t') {
            anyhow::bail!(
                "Invalid return_indent: {:?} (only spaces and tabs allowed)",
                self.return_indent
            );
        }

        if self.return_type.trim().is_empty() {
            anyhow::bail!("Invalid return_type: must not be empty");
        }

        Ok(())
    }

    /// Whether `name` is one of the configured routers
    pub fn is_router(&self, name: &str) -> bool {
        self.routers.iter().any(|r| r == name)
    }

    /// Text that replaces a matched `return <expr>;` statement
    pub fn return_replacement(&self, expr: &str, statement_indent: &str, eol: &str) -> String {
        let indent = if self.match_statement_indent {
            statement_indent
        } else {
            self.return_indent.as_str()
        };
        let terminator = if self.keep_terminator { ";" } else { "" };
        format!("{}{}{}{}return;", expr, terminator, eol, indent)
    }

    /// Text that replaces a `return <expr>;` that is the unbraced body of
    /// an `if`, `else` or loop
    pub fn braced_return_replacement(&self, expr: &str) -> String {
        format!("{{ {}; return; }}", expr)
    }

    /// Text inserted after a matched handler's parameter list
    pub fn signature_insertion(&self) -> String {
        format!(": {}", self.return_type)
    }

    /// The regex rendition of both rules, used by the regex engine when no
    /// custom pattern list is configured.
    ///
    /// These keep the line-oriented shape of the rules: arguments may not
    /// contain `)` (status) or `;` (json), and the statement-indent option
    /// is not available.
    pub fn default_patterns(&self, eol: &str) -> Vec<PatternRule> {
        let terminator = if self.keep_terminator { ";" } else { "" };
        let routers = self
            .routers
            .iter()
            .map(|r| regex::escape(r))
            .collect::<Vec<_>>()
            .join("|");

        vec![
            PatternRule {
                name: RuleKind::ReturnStatement.name().to_string(),
                pattern: format!(
                    r"return\s+(?P<expr>{}\.{}\([^)]+\)\.{}\([^;]+\));",
                    regex::escape(&self.response),
                    regex::escape(&self.status_method),
                    regex::escape(&self.send_method),
                ),
                replacement: format!(
                    "${{expr}}{}{}{}return;",
                    terminator,
                    eol,
                    self.return_indent
                ),
            },
            PatternRule {
                name: RuleKind::HandlerSignature.name().to_string(),
                pattern: format!(
                    r"(?P<head>(?:{})\.[a-z]+\([^,]+,\s*{},\s*async\s*\([^,()]+,[^,()]+\))\s*=>",
                    routers,
                    regex::escape(&self.middleware),
                ),
                replacement: format!(
                    "${{head}}: {} =>",
                    self.return_type.replace('$', "$$")
                ),
            },
        ]
    }
}

/// Plain JavaScript identifier (ASCII subset)
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

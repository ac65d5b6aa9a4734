//! Syntax engine
//!
//! Parses the handler file as TypeScript with tree-sitter and turns every
//! node matching one of the two rule shapes into a byte-span [`Edit`].
//! Argument lists are never inspected textually, so nested parentheses,
//! semicolons inside strings and multi-line call chains are safe.

use anyhow::{Context, Result};
use tracing::{debug, warn};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::edit::Edit;
use crate::rules::{RuleKind, RuleSet};

pub struct SyntaxRewriter {
    parser: Parser,
    rules: RuleSet,
}

impl SyntaxRewriter {
    pub fn new(rules: RuleSet) -> Result<Self> {
        let language: Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .context("Failed to load the TypeScript grammar")?;
        Ok(Self { parser, rules })
    }

    fn parse(&mut self, source: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(source, None)
            .context("TypeScript parser returned no tree")?;

        let root = tree.root_node();
        if root.has_error() {
            if let Some(node) = first_error(root) {
                let pos = node.start_position();
                warn!(
                    line = pos.row + 1,
                    column = pos.column + 1,
                    "source has syntax errors; rewriting the parts that parsed"
                );
            }
        }

        Ok(tree)
    }

    /// Collect the edits for both rules without applying them
    pub fn collect_edits(&mut self, source: &str) -> Result<Vec<Edit>> {
        let tree = self.parse(source)?;
        let eol = line_ending(source);
        let mut edits = Vec::new();

        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "return_statement" => {
                    if let Some(edit) = self.match_return(node, source, eol) {
                        edits.push(edit);
                    }
                }
                "call_expression" => {
                    if let Some(edit) = self.match_registration(node, source) {
                        edits.push(edit);
                    }
                }
                _ => {}
            }

            let mut cursor = node.walk();
            stack.extend(node.named_children(&mut cursor));
        }

        debug!(edits = edits.len(), "collected syntax edits");
        Ok(edits)
    }

    /// `return <response>.<status>(..).<send>(..);`
    fn match_return(&self, node: Node<'_>, source: &str, eol: &str) -> Option<Edit> {
        let expr = single_named_child(node)?;
        if !self.is_response_chain(expr, source) {
            return None;
        }

        let start = node.start_byte();
        let replacement = if in_statement_list(node) {
            self.rules
                .return_replacement(text(expr, source), line_indent(source, start), eol)
        } else {
            // Unbraced body of `if`, `else` or a loop: two statements need a block
            debug!(
                line = node.start_position().row + 1,
                "wrapping unbraced return in a block"
            );
            self.rules.braced_return_replacement(text(expr, source))
        };
        Some(Edit::replace(
            start,
            node.end_byte(),
            replacement,
            RuleKind::ReturnStatement,
        ))
    }

    fn is_response_chain(&self, expr: Node<'_>, source: &str) -> bool {
        let Some((outer_object, send)) = call_member(expr, source) else {
            return false;
        };
        if send != self.rules.send_method {
            return false;
        }
        let Some((receiver, status)) = call_member(outer_object, source) else {
            return false;
        };
        status == self.rules.status_method
            && receiver.kind() == "identifier"
            && text(receiver, source) == self.rules.response
    }

    /// `<router>.<method>(<path>, <middleware>, async (a, b) => { .. })`
    fn match_registration(&self, node: Node<'_>, source: &str) -> Option<Edit> {
        let function = node.child_by_field_name("function")?;
        if function.kind() != "member_expression" {
            return None;
        }
        let router = function.child_by_field_name("object")?;
        let method = function.child_by_field_name("property")?;
        if router.kind() != "identifier" || !self.rules.is_router(text(router, source)) {
            return None;
        }
        let method = text(method, source);
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_lowercase()) {
            return None;
        }

        let args = named_children(node.child_by_field_name("arguments")?);
        let [_, middleware, handler] = args.as_slice() else {
            return None;
        };
        if middleware.kind() != "identifier" || text(*middleware, source) != self.rules.middleware {
            return None;
        }
        if handler.kind() != "arrow_function" || !is_async(*handler) {
            return None;
        }
        if handler.child_by_field_name("return_type").is_some() {
            return None;
        }
        let params = handler.child_by_field_name("parameters")?;
        if named_children(params).len() != 2 {
            return None;
        }

        debug!(router = text(router, source), method, "annotating handler registration");
        Some(Edit::insert(
            params.end_byte(),
            self.rules.signature_insertion(),
            RuleKind::HandlerSignature,
        ))
    }
}

/// For `<object>.<name>(..)` return `(object, name)`
fn call_member<'t, 's>(node: Node<'t>, source: &'s str) -> Option<(Node<'t>, &'s str)> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    if function.kind() != "member_expression" {
        return None;
    }
    let object = function.child_by_field_name("object")?;
    let property = function.child_by_field_name("property")?;
    Some((object, text(property, source)))
}

fn is_async(node: Node<'_>) -> bool {
    node.child(0).is_some_and(|c| c.kind() == "async")
}

/// Named children, comments excluded
fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Whether `node` sits directly in a list of statements, where replacing
/// it with two statements keeps the control flow
fn in_statement_list(node: Node<'_>) -> bool {
    node.parent().is_none_or(|parent| {
        matches!(
            parent.kind(),
            "program" | "statement_block" | "switch_case" | "switch_default"
        )
    })
}

fn single_named_child(node: Node<'_>) -> Option<Node<'_>> {
    match named_children(node).as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.start_byte()..node.end_byte()]
}

/// Leading whitespace of the line containing `offset`
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..offset];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// `\r\n` when the file already uses it, `\n` otherwise
pub fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") { "\r\n" } else { "\n" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply_edits;

    fn rewrite(source: &str) -> String {
        rewrite_with(RuleSet::default(), source)
    }

    fn rewrite_with(rules: RuleSet, source: &str) -> String {
        let mut rewriter = SyntaxRewriter::new(rules).unwrap();
        let edits = rewriter.collect_edits(source).unwrap();
        apply_edits(source, edits).unwrap().0
    }

    #[test]
    fn test_return_statement_split() {
        let src = "function f(req, res) {\n            return res.status(404).json({ error: \"Not found\" });\n}\n";
        let out = rewrite(src);
        assert_eq!(
            out,
            "function f(req, res) {\n            res.status(404).json({ error: \"Not found\" })\n            return;\n}\n"
        );
        assert!(!out.contains("return res.status("));
    }

    #[test]
    fn test_nested_parens_and_semicolons_in_arguments() {
        let src = "function f(req, res) {\n  return res.status(code(1, (2))).json({ msg: \"a; b)\", n: g(h()) });\n}\n";
        let out = rewrite(src);
        assert!(out.contains("  res.status(code(1, (2))).json({ msg: \"a; b)\", n: g(h()) })\n            return;"));
    }

    #[test]
    fn test_multiline_chain() {
        let src = "function f(req, res) {\n  return res\n    .status(500)\n    .json({\n      error: err.message,\n    });\n}\n";
        let out = rewrite(src);
        assert!(out.contains("  res\n    .status(500)\n    .json({\n      error: err.message,\n    })\n            return;\n}"));
    }

    #[test]
    fn test_other_returns_untouched() {
        let src = "function f(req, res) {\n  if (a) return;\n  return res.json({});\n  return other.status(1).json(2);\n  return res.status(1).send(2);\n}\n";
        assert_eq!(rewrite(src), src);
    }

    #[test]
    fn test_statement_indent_option() {
        let rules = RuleSet {
            match_statement_indent: true,
            ..RuleSet::default()
        };
        let src = "function f(req, res) {\n\treturn res.status(200).json(items);\n}\n";
        let out = rewrite_with(rules, src);
        assert_eq!(out, "function f(req, res) {\n\tres.status(200).json(items)\n\treturn;\n}\n");
    }

    #[test]
    fn test_crlf_preserved() {
        let src = "function f(req, res) {\r\n  return res.status(200).json(items);\r\n}\r\n";
        let out = rewrite(src);
        assert!(out.contains("res.status(200).json(items)\r\n            return;\r\n"));
    }

    #[test]
    fn test_handler_signature_annotated() {
        let src = "cart_items.post(path, authMiddleware, async (req, res) => {\n});\n";
        assert_eq!(
            rewrite(src),
            "cart_items.post(path, authMiddleware, async (req, res): Promise<void> => {\n});\n"
        );
    }

    #[test]
    fn test_handler_signature_requires_shape() {
        let cases = [
            // already annotated
            "cart_items.get(\"/\", authMiddleware, async (req, res): Promise<void> => {\n});\n",
            // not async
            "cart_items.get(\"/\", authMiddleware, (req, res) => {\n});\n",
            // wrong middleware
            "cart_items.get(\"/\", adminMiddleware, async (req, res) => {\n});\n",
            // other router
            "products.get(\"/\", authMiddleware, async (req, res) => {\n});\n",
            // two arguments only
            "cart_items.get(\"/\", async (req, res) => {\n});\n",
            // three parameters
            "cart_items.get(\"/\", authMiddleware, async (req, res, next) => {\n});\n",
        ];
        for src in cases {
            assert_eq!(rewrite(src), src, "should not change: {}", src);
        }
    }

    #[test]
    fn test_configured_routers_and_return_type() {
        let rules = RuleSet {
            routers: vec!["orders".to_string()],
            return_type: "Promise<Response | void>".to_string(),
            ..RuleSet::default()
        };
        let src = "orders.delete(\"/:id\", authMiddleware, async (req, res) => {});\n";
        assert_eq!(
            rewrite_with(rules, src),
            "orders.delete(\"/:id\", authMiddleware, async (req, res): Promise<Response | void> => {});\n"
        );
    }

    #[test]
    fn test_full_handler_and_second_pass() {
        let src = r#"cart_items.get("/:id", authMiddleware, async (req, res) => {
    try {
        const item = await find(req.params.id);
        if (!item) {
            return res.status(404).json({ error: "Not found" });
        }
        res.json(item);
    } catch (err) {
        return res.status(500).json({ error: "Server error; try again" });
    }
});
"#;
        let once = rewrite(src);
        assert!(once.starts_with(
            "cart_items.get(\"/:id\", authMiddleware, async (req, res): Promise<void> => {"
        ));
        assert!(once.contains(
            "            res.status(404).json({ error: \"Not found\" })\n            return;\n"
        ));
        assert!(once.contains(
            "        res.status(500).json({ error: \"Server error; try again\" })\n            return;\n"
        ));
        assert_eq!(rewrite(&once), once);
    }

    #[test]
    fn test_unbraced_bodies_get_a_block() {
        let src = "function f(req, res) {\n    if (!item) return res.status(404).json({ e: 1 });\n    res.json(item);\n}\n";
        let out = rewrite(src);
        assert_eq!(
            out,
            "function f(req, res) {\n    if (!item) { res.status(404).json({ e: 1 }); return; }\n    res.json(item);\n}\n"
        );
        assert_eq!(rewrite(&out), out);

        let src = "function f(req, res) {\n  if (a) res.json(1);\n  else return res.status(400).json(2);\n  for (const x of xs) return res.status(500).json(x);\n}\n";
        assert_eq!(
            rewrite(src),
            "function f(req, res) {\n  if (a) res.json(1);\n  else { res.status(400).json(2); return; }\n  for (const x of xs) { res.status(500).json(x); return; }\n}\n"
        );
    }

    #[test]
    fn test_switch_case_return_is_split() {
        let src = "function f(req, res) {\n  switch (k) {\n    case 1:\n      return res.status(400).json(k);\n  }\n}\n";
        assert!(rewrite(src).contains("      res.status(400).json(k)\n            return;\n  }"));
    }

    #[test]
    fn test_parse_errors_do_not_block_rewrite() {
        let src = "function f(req, res) {\n  return res.status(400).json({ a: 1 });\n}\nconst = ;\n";
        let out = rewrite(src);
        assert!(out.contains("  res.status(400).json({ a: 1 })\n            return;\n}"));
        assert!(out.ends_with("const = ;\n"));
    }

    #[test]
    fn test_line_indent() {
        assert_eq!(line_indent("a\n    return x;", 6), "    ");
        assert_eq!(line_indent("  x = 1; return y;", 9), "  ");
        assert_eq!(line_indent("return", 0), "");
    }
}

//! Property-based tests for retfix
//!
//! Generates handler files with random status codes, messages, indentation
//! and statement mixes, and checks the invariants both engines promise.

use proptest::prelude::*;

use retfix::{EngineKind, Rewriter, RuleSet};

#[derive(Debug, Clone)]
enum Stmt {
    /// `return res.status(code).json({ error: "msg" });`
    Return(u16, String),
    /// `res.json({ ok: true });`
    Plain,
    /// `if (x) { return res.status(code).json(...); }`
    Guarded(u16, String),
}

fn stmt(msg: &'static str) -> impl Strategy<Value = Stmt> {
    prop_oneof![
        (100u16..600, msg).prop_map(|(c, m)| Stmt::Return(c, m)),
        Just(Stmt::Plain),
        (100u16..600, msg).prop_map(|(c, m)| Stmt::Guarded(c, m)),
    ]
}

fn render(method: &str, annotated_router: bool, stmts: &[Stmt]) -> String {
    let router = if annotated_router { "cart_items" } else { "products" };
    let mut out = format!("{}.{}(\"/\", authMiddleware, async (req, res) => {{\n", router, method);
    for s in stmts {
        match s {
            Stmt::Return(code, msg) => {
                out.push_str(&format!(
                    "    return res.status({}).json({{ error: \"{}\" }});\n",
                    code, msg
                ));
            }
            Stmt::Plain => out.push_str("    res.json({ ok: true });\n"),
            Stmt::Guarded(code, msg) => {
                out.push_str("    if (!req.body) {\n");
                out.push_str(&format!(
                    "            return res.status({}).json({{ error: \"{}\" }});\n",
                    code, msg
                ));
                out.push_str("    }\n");
            }
        }
    }
    out.push_str("});\n");
    out
}

fn returns_in(stmts: &[Stmt]) -> usize {
    stmts
        .iter()
        .filter(|s| matches!(s, Stmt::Return(..) | Stmt::Guarded(..)))
        .count()
}

fn rewrite(engine: EngineKind, source: &str) -> String {
    let mut rewriter = Rewriter::new(engine, RuleSet::default(), None).unwrap();
    rewriter.rewrite_str(source).unwrap().text
}

proptest! {
    /// Running on already-fixed output changes nothing
    #[test]
    fn prop_syntax_engine_is_idempotent(
        method in "(get|post|put|delete|patch)",
        annotated in any::<bool>(),
        stmts in prop::collection::vec(stmt("[a-zA-Z ;:()\\[\\]{}]{0,24}"), 0..12)
    ) {
        let source = render(&method, annotated, &stmts);
        let once = rewrite(EngineKind::Syntax, &source);
        let twice = rewrite(EngineKind::Syntax, &once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_regex_engine_is_idempotent(
        method in "(get|post|put|delete|patch)",
        annotated in any::<bool>(),
        stmts in prop::collection::vec(stmt("[a-zA-Z ]{0,24}"), 0..12)
    ) {
        let source = render(&method, annotated, &stmts);
        let once = rewrite(EngineKind::Regex, &source);
        let twice = rewrite(EngineKind::Regex, &once);
        prop_assert_eq!(once, twice);
    }

    /// Every `return res.status(..).json(..)` is split, none survive
    #[test]
    fn prop_every_return_is_split(
        stmts in prop::collection::vec(stmt("[a-zA-Z ;:()]{0,24}"), 0..12)
    ) {
        let source = render("post", true, &stmts);
        let out = rewrite(EngineKind::Syntax, &source);

        prop_assert!(!out.contains("return res.status("));
        prop_assert_eq!(out.matches("\n            return;\n").count(), returns_in(&stmts));
        prop_assert_eq!(out.matches("): Promise<void> => {").count(), 1);
    }

    /// On the shapes both can handle the engines agree
    #[test]
    fn prop_engines_agree_on_simple_handlers(
        method in "(get|post|put|delete)",
        annotated in any::<bool>(),
        stmts in prop::collection::vec(stmt("[a-zA-Z ]{0,24}"), 0..12)
    ) {
        let source = render(&method, annotated, &stmts);
        prop_assert_eq!(
            rewrite(EngineKind::Syntax, &source),
            rewrite(EngineKind::Regex, &source)
        );
    }

    /// Text without any rule shape comes back byte-identical
    #[test]
    fn prop_no_match_is_byte_identical(text in "[a-z0-9 =;{}\n]{0,200}") {
        for engine in [EngineKind::Syntax, EngineKind::Regex] {
            let out = rewrite(engine, &text);
            prop_assert_eq!(&out, &text);
        }
    }
}

//! Static dependency analysis over configuration statements.
//!
//! The analyzer computes the free variable references of each top-level
//! statement and batches the statements into generations: generation 0 has
//! no outstanding dependencies, generation n depends only on earlier ones.
//! The free-variable walk is the static twin of the evaluator's runtime
//! variable trace and shares its [`KeyPath`] representation.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::ast::{Body, Expr, ExprKind, LitValue, Stmt, TemplatePart, Trailer};
use crate::trace::{KeyPath, PathSeg};

/// The dependency graph contains a cycle; listed in source order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Dependency cycle involving: {}", statements.join(", "))]
pub struct CycleError {
    /// Dotted key paths of the statements stuck in the cycle.
    pub statements: Vec<String>,
}

/// Free variable key paths of an expression.
///
/// Free means: not bound by an enclosing for-comprehension and not a
/// function name (literals never produce references). Chains of attribute
/// and literal-index projections extend the path; a dynamic projection
/// falls back to the paths of its parts.
pub fn expr_variable_paths(expr: &Expr) -> BTreeSet<KeyPath> {
    let mut out = BTreeSet::new();
    let mut bound = Vec::new();
    collect_expr(expr, &mut bound, &mut out);
    out
}

/// Free variable key paths of a statement, nested blocks included.
pub fn free_variable_paths(stmt: &Stmt) -> BTreeSet<KeyPath> {
    let mut out = BTreeSet::new();
    let mut bound = Vec::new();
    collect_stmt(stmt, &mut bound, &mut out);
    out
}

/// Batch the top-level statements of a body into evaluation generations.
///
/// Statement A depends on statement B when one of A's reference paths and
/// B's defined key path (attribute name, or block type+labels) address
/// overlapping data. Ties inside a generation keep source order; a
/// statement that can never become ready reports a [`CycleError`].
pub fn topological_generations(body: &Body) -> Result<Vec<Vec<&Stmt>>, CycleError> {
    let stmts = &body.stmts;
    let defined: Vec<KeyPath> = stmts
        .iter()
        .map(|stmt| {
            stmt.key_path()
                .into_iter()
                .map(|part| PathSeg::Name(part.to_string()))
                .collect()
        })
        .collect();
    let references: Vec<BTreeSet<KeyPath>> = stmts.iter().map(free_variable_paths).collect();

    let deps: Vec<Vec<usize>> = (0..stmts.len())
        .map(|i| {
            (0..stmts.len())
                .filter(|&j| references[i].iter().any(|path| path.overlaps(&defined[j])))
                .collect()
        })
        .collect();

    let mut placed = vec![false; stmts.len()];
    let mut placed_count = 0;
    let mut generations = Vec::new();

    while placed_count < stmts.len() {
        let ready: Vec<usize> = (0..stmts.len())
            .filter(|&i| !placed[i] && deps[i].iter().all(|&j| placed[j]))
            .collect();
        if ready.is_empty() {
            let statements = (0..stmts.len())
                .filter(|&i| !placed[i])
                .map(|i| stmts[i].key_path().join("."))
                .collect();
            return Err(CycleError { statements });
        }
        for &i in &ready {
            placed[i] = true;
        }
        placed_count += ready.len();
        generations.push(ready.into_iter().map(|i| &stmts[i]).collect());
    }

    Ok(generations)
}

fn collect_stmt(stmt: &Stmt, bound: &mut Vec<String>, out: &mut BTreeSet<KeyPath>) {
    match stmt {
        Stmt::Attribute(attr) => collect_expr(&attr.value, bound, out),
        Stmt::Block(block) => {
            for stmt in &block.body {
                collect_stmt(stmt, bound, out);
            }
        }
    }
}

fn collect_expr(expr: &Expr, bound: &mut Vec<String>, out: &mut BTreeSet<KeyPath>) {
    match &expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::Template(parts) => {
            for part in parts {
                if let TemplatePart::Interp(inner) = part {
                    collect_expr(inner, bound, out);
                }
            }
        }
        ExprKind::Identifier(name) => {
            if !is_bound(bound, name) {
                out.insert(KeyPath::root(name.clone()));
            }
        }
        ExprKind::Array(items) => {
            for item in items {
                collect_expr(item, bound, out);
            }
        }
        ExprKind::Object(items) => {
            for (key, value) in items {
                collect_expr(key, bound, out);
                collect_expr(value, bound, out);
            }
        }
        ExprKind::GetAttr { on, .. } => {
            if let Some(path) = chain_path(expr, bound) {
                out.insert(path);
            } else {
                collect_expr(on, bound, out);
            }
        }
        ExprKind::GetIndex { on, key } => {
            if let Some(path) = chain_path(expr, bound) {
                out.insert(path);
            } else {
                collect_expr(on, bound, out);
                collect_expr(key, bound, out);
            }
        }
        ExprKind::AttrSplat { on, trailers } | ExprKind::IndexSplat { on, trailers } => {
            collect_expr(on, bound, out);
            for trailer in trailers {
                if let Trailer::Index(key) = trailer {
                    collect_expr(key, bound, out);
                }
            }
        }
        ExprKind::FunctionCall { args, .. } => {
            // The function name resolves through the function table, not
            // the variable scope.
            for arg in args {
                collect_expr(arg, bound, out);
            }
        }
        ExprKind::Unary { expr: operand, .. } => collect_expr(operand, bound, out),
        ExprKind::Binary { left, right, .. } => {
            collect_expr(left, bound, out);
            collect_expr(right, bound, out);
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            collect_expr(cond, bound, out);
            collect_expr(then_expr, bound, out);
            collect_expr(else_expr, bound, out);
        }
        ExprKind::Parenthesis(inner) => collect_expr(inner, bound, out),
        ExprKind::ForTuple {
            key_var,
            value_var,
            collection,
            value,
            cond,
        } => {
            collect_expr(collection, bound, out);
            let depth = bound.len();
            bound.push(value_var.name.clone());
            if let Some(key_ident) = key_var {
                bound.push(key_ident.name.clone());
            }
            collect_expr(value, bound, out);
            if let Some(cond) = cond {
                collect_expr(cond, bound, out);
            }
            bound.truncate(depth);
        }
        ExprKind::ForObject {
            key_var,
            value_var,
            collection,
            key,
            value,
            cond,
            ..
        } => {
            collect_expr(collection, bound, out);
            let depth = bound.len();
            bound.push(value_var.name.clone());
            if let Some(key_ident) = key_var {
                bound.push(key_ident.name.clone());
            }
            collect_expr(key, bound, out);
            collect_expr(value, bound, out);
            if let Some(cond) = cond {
                collect_expr(cond, bound, out);
            }
            bound.truncate(depth);
        }
    }
}

fn is_bound(bound: &[String], name: &str) -> bool {
    bound.iter().any(|binding| binding == name)
}

/// The key path of a pure projection chain: an unbound identifier followed
/// by attribute accesses and literal index keys. Anything else (a bound
/// root, a dynamic key, a computed base) has no single path.
fn chain_path(expr: &Expr, bound: &[String]) -> Option<KeyPath> {
    match &expr.kind {
        ExprKind::Identifier(name) => {
            (!is_bound(bound, name)).then(|| KeyPath::root(name.clone()))
        }
        ExprKind::GetAttr { on, name } => {
            Some(chain_path(on, bound)?.child(PathSeg::Name(name.name.clone())))
        }
        ExprKind::GetIndex { on, key } => {
            let parent = chain_path(on, bound)?;
            match &key.kind {
                ExprKind::Literal(LitValue::Int(index)) => {
                    Some(parent.child(PathSeg::Index(*index)))
                }
                ExprKind::Literal(LitValue::String(key)) => {
                    Some(parent.child(PathSeg::Name(key.clone())))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_file};
    use indoc::indoc;

    fn paths(input: &str) -> Vec<String> {
        expr_variable_paths(&parse_expression(input).expect("parse failed"))
            .into_iter()
            .map(|path| path.to_string())
            .collect()
    }

    fn generation_keys(body: &crate::ast::Body) -> Vec<Vec<String>> {
        topological_generations(body)
            .expect("expected acyclic body")
            .into_iter()
            .map(|generation| {
                generation
                    .into_iter()
                    .map(|stmt| stmt.key_path().join("."))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn finds_free_identifiers() {
        assert_eq!(paths("a + b"), ["a", "b"]);
        assert_eq!(paths("a + a"), ["a"]);
        assert_eq!(paths("1 + 2"), Vec::<String>::new());
    }

    #[test]
    fn projection_chains_extend_paths() {
        assert_eq!(paths("a.b.c"), ["a.b.c"]);
        assert_eq!(paths("a.b[0].c"), ["a.b[0].c"]);
        assert_eq!(paths(r#"a["k"]"#), ["a.k"]);
        // A dynamic key breaks the chain into its parts.
        assert_eq!(paths("a[k]"), ["a", "k"]);
    }

    #[test]
    fn keyword_literals_are_not_references() {
        assert_eq!(paths("true || false"), Vec::<String>::new());
        assert_eq!(paths("null == x"), ["x"]);
    }

    #[test]
    fn function_names_are_not_references() {
        assert_eq!(paths("foo(a, 1)"), ["a"]);
    }

    #[test]
    fn for_comprehension_bindings_are_not_free() {
        assert_eq!(paths("[for v in items: v + extra]"), ["extra", "items"]);
        assert_eq!(paths("[for k, v in items: v if k != skip]"), ["items", "skip"]);
        assert_eq!(paths("{for k, v in items: k => other[v]}"), ["items", "other"]);
        // The binding shadows an outer name only inside the loop body.
        assert_eq!(paths("[for v in v: v]"), ["v"]);
    }

    #[test]
    fn template_interpolations_are_walked() {
        assert_eq!(paths(r#""${a}:${b.c}""#), ["a", "b.c"]);
    }

    #[test]
    fn splat_bases_and_index_keys_are_walked() {
        assert_eq!(paths("a.*.name"), ["a"]);
        assert_eq!(paths("a[*].b[i]"), ["a", "i"]);
    }

    #[test]
    fn orders_attributes_by_dependency() {
        let body = parse_file("b = a + 1\na = 2\nc = b + a\n").expect("parse failed");
        assert_eq!(generation_keys(&body), [["a"], ["b"], ["c"]]);
    }

    #[test]
    fn independent_statements_share_a_generation_in_source_order() {
        let body = parse_file("b = 1\na = 2\nc = a + 1\n").expect("parse failed");
        assert_eq!(generation_keys(&body), vec![vec!["b", "a"], vec!["c"]]);
    }

    #[test]
    fn block_references_create_edges() {
        let body = parse_file(indoc! {r#"
            service "web" {
                port = service.db.port + 1
            }
            service "db" {
                port = 5432
            }
        "#})
        .expect("parse failed");
        assert_eq!(
            generation_keys(&body),
            vec![vec!["service.db"], vec!["service.web"]]
        );
    }

    #[test]
    fn reading_a_whole_attribute_depends_on_block_subtrees() {
        let body = parse_file(indoc! {r#"
            all = service
            service "db" { port = 5432 }
        "#})
        .expect("parse failed");
        assert_eq!(generation_keys(&body), vec![vec!["service.db"], vec!["all"]]);
    }

    #[test]
    fn reports_cycles() {
        let body = parse_file("a = b\nb = a\n").expect("parse failed");
        let error = topological_generations(&body).expect_err("expected cycle");
        assert_eq!(
            error,
            CycleError {
                statements: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let body = parse_file("a = a + 1\n").expect("parse failed");
        let error = topological_generations(&body).expect_err("expected cycle");
        assert_eq!(error.statements, ["a"]);
    }

    #[test]
    fn cycle_reports_only_the_stuck_statements() {
        let body = parse_file("ok = 1\na = b\nb = a\n").expect("parse failed");
        let error = topological_generations(&body).expect_err("expected cycle");
        assert_eq!(error.statements, ["a", "b"]);
    }
}

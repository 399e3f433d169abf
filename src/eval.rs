//! Tree-walking evaluation of expressions and bodies.
//!
//! Evaluation reduces AST nodes to [`Value`]s against a caller-supplied
//! [`Scope`]. While it runs, the evaluator records which key paths were
//! resolved through the outermost scope (the variable trace); references
//! bound by for-comprehensions never appear in the trace.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::ast::{
    Attribute, BinOp, Block, Body, Expr, ExprKind, Ident, LitValue, Stmt, TemplatePart, Trailer,
    UnaryOp,
};
use crate::token::Span;
use crate::trace::{KeyPath, PathSeg};
use crate::value::Value;

mod error;
mod scope;

pub use error::EvalError;
pub use scope::{FuncError, FuncImpl, Scope};

type EvalResult<T> = Result<T, EvalError>;

/// Evaluate a single expression under a scope.
pub fn evaluate_expr(expr: &Expr, scope: &Scope) -> EvalResult<Value> {
    Evaluator::new().eval_expr(expr, scope)
}

/// Evaluate a body of statements to an object under a scope.
pub fn evaluate_body(body: &Body, scope: &Scope) -> EvalResult<Value> {
    Evaluator::new().eval_body(body, scope)
}

/// Expression/body evaluator with a variable-trace side buffer.
///
/// One instance accumulates trace entries across calls; use a fresh
/// instance (or the free functions) when an isolated trace is wanted.
pub struct Evaluator {
    trace: BTreeSet<KeyPath>,
    /// Key path of the projection chain currently being extended, if its
    /// root identifier resolved through the outermost scope.
    pending: Option<KeyPath>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            trace: BTreeSet::new(),
            pending: None,
        }
    }

    /// Key paths read from the outermost scope so far, including the
    /// prefixes of longer chains.
    pub fn trace(&self) -> &BTreeSet<KeyPath> {
        &self.trace
    }

    pub fn into_trace(self) -> BTreeSet<KeyPath> {
        self.trace
    }

    pub fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        let result = self.eval(expr, scope);
        self.pending = None;
        result
    }

    pub fn eval_body(&mut self, body: &Body, scope: &Scope) -> EvalResult<Value> {
        self.eval_stmts(&body.stmts, scope)
    }

    fn eval(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Identifier(name) => self.eval_identifier(name, expr.span, scope),
            ExprKind::GetAttr { on, name } => self.eval_get_attr(on, name, scope),
            ExprKind::GetIndex { on, key } => self.eval_get_index(on, key, scope),
            _ => {
                let value = self.eval_other(expr, scope)?;
                self.pending = None;
                Ok(value)
            }
        }
    }

    fn eval_identifier(&mut self, name: &str, span: Span, scope: &Scope) -> EvalResult<Value> {
        match scope.lookup(name) {
            Some((value, from_outermost)) => {
                if from_outermost {
                    let path = KeyPath::root(name);
                    self.trace.insert(path.clone());
                    self.pending = Some(path);
                } else {
                    self.pending = None;
                }
                Ok(value.clone())
            }
            None => {
                self.pending = None;
                Err(EvalError::Name {
                    name: name.to_string(),
                    span,
                })
            }
        }
    }

    fn eval_get_attr(&mut self, on: &Expr, name: &Ident, scope: &Scope) -> EvalResult<Value> {
        let on_value = self.eval(on, scope)?;
        let pending = self.pending.take();
        let result = get_attr(&on_value, name)?;
        if let Some(path) = pending {
            let path = path.child(PathSeg::Name(name.name.clone()));
            self.trace.insert(path.clone());
            self.pending = Some(path);
        }
        Ok(result)
    }

    fn eval_get_index(&mut self, on: &Expr, key: &Expr, scope: &Scope) -> EvalResult<Value> {
        let on_value = self.eval(on, scope)?;
        let pending = self.pending.take();
        let key_value = self.eval(key, scope)?;
        self.pending = None;
        let result = get_index(&on_value, &key_value, key.span)?;
        if let Some(path) = pending {
            let seg = match (&on_value, &key_value) {
                (Value::Array(_), Value::Int(index)) => Some(PathSeg::Index(*index)),
                (Value::Object(_), key_value) => object_key(key_value).map(PathSeg::Name),
                _ => None,
            };
            if let Some(seg) = seg {
                let path = path.child(seg);
                self.trace.insert(path.clone());
                self.pending = Some(path);
            }
        }
        Ok(result)
    }

    fn eval_other(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(lit_value(lit)),
            ExprKind::Template(parts) => self.eval_template(parts, scope),
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(Value::Array(values))
            }
            ExprKind::Object(items) => self.eval_object(items, scope),
            ExprKind::Parenthesis(inner) => self.eval(inner, scope),
            ExprKind::Unary { op, expr: operand } => {
                let value = self.eval(operand, scope)?;
                unary_op(*op, &value).map_err(|message| EvalError::type_error(message, expr.span))
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, expr.span, scope),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let condition = self.eval(cond, scope)?;
                match condition {
                    Value::Bool(true) => self.eval(then_expr, scope),
                    Value::Bool(false) => self.eval(else_expr, scope),
                    other => Err(EvalError::type_error(
                        format!("condition must be a bool, got {}", other.type_name()),
                        cond.span,
                    )),
                }
            }
            ExprKind::FunctionCall {
                name,
                args,
                var_args,
            } => self.eval_call(name, args, *var_args, expr.span, scope),
            ExprKind::AttrSplat { on, trailers } | ExprKind::IndexSplat { on, trailers } => {
                self.eval_splat(on, trailers, scope)
            }
            ExprKind::ForTuple {
                key_var,
                value_var,
                collection,
                value,
                cond,
            } => self.eval_for_tuple(key_var.as_ref(), value_var, collection, value, cond.as_deref(), scope),
            ExprKind::ForObject {
                key_var,
                value_var,
                collection,
                key,
                value,
                grouping,
                cond,
            } => self.eval_for_object(
                key_var.as_ref(),
                value_var,
                collection,
                key,
                value,
                *grouping,
                cond.as_deref(),
                scope,
            ),
            ExprKind::Identifier(_) | ExprKind::GetAttr { .. } | ExprKind::GetIndex { .. } => {
                unreachable!("chain nodes are handled in eval")
            }
        }
    }

    fn eval_template(&mut self, parts: &[TemplatePart], scope: &Scope) -> EvalResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Lit(text) => out.push_str(text),
                TemplatePart::Interp(inner) => {
                    let value = self.eval(inner, scope)?;
                    match &value {
                        Value::String(text) => out.push_str(text),
                        Value::Int(int) => out.push_str(&int.to_string()),
                        Value::Float(float) => out.push_str(&float.to_string()),
                        Value::Bool(boolean) => out.push_str(&boolean.to_string()),
                        other => {
                            return Err(EvalError::type_error(
                                format!("cannot interpolate {} into a string", other.type_name()),
                                inner.span,
                            ));
                        }
                    }
                }
            }
        }
        Ok(Value::String(out))
    }

    fn eval_object(&mut self, items: &[(Expr, Expr)], scope: &Scope) -> EvalResult<Value> {
        let mut entries = IndexMap::with_capacity(items.len());
        for (key_expr, value_expr) in items {
            let key_value = self.eval(key_expr, scope)?;
            let Value::String(key) = key_value else {
                return Err(EvalError::type_error(
                    format!(
                        "object keys must be strings, got {}",
                        key_value.type_name()
                    ),
                    key_expr.span,
                ));
            };
            let value = self.eval(value_expr, scope)?;
            if entries.insert(key.clone(), value).is_some() {
                return Err(EvalError::DuplicateKey {
                    key,
                    span: key_expr.span,
                });
            }
        }
        Ok(Value::Object(entries))
    }

    /// `&&` and `||` evaluate the right operand only when needed; the
    /// skipped branch can never raise.
    fn eval_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        span: Span,
        scope: &Scope,
    ) -> EvalResult<Value> {
        if matches!(op, BinOp::And | BinOp::Or) {
            let left_value = self.eval(left, scope)?;
            match (op, &left_value) {
                (BinOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                (BinOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                (_, Value::Bool(_)) => {}
                (_, other) => {
                    return Err(EvalError::type_error(
                        format!("operands of `{op}` must be bools, got {}", other.type_name()),
                        left.span,
                    ));
                }
            }
            let right_value = self.eval(right, scope)?;
            return match right_value {
                Value::Bool(value) => Ok(Value::Bool(value)),
                other => Err(EvalError::type_error(
                    format!("operands of `{op}` must be bools, got {}", other.type_name()),
                    right.span,
                )),
            };
        }

        let left_value = self.eval(left, scope)?;
        let right_value = self.eval(right, scope)?;
        binary_op(op, &left_value, &right_value)
            .map_err(|message| EvalError::type_error(message, span))
    }

    fn eval_call(
        &mut self,
        name: &Ident,
        args: &[Expr],
        var_args: bool,
        span: Span,
        scope: &Scope,
    ) -> EvalResult<Value> {
        if scope.lookup_function(&name.name).is_none() {
            return Err(EvalError::Name {
                name: name.name.clone(),
                span: name.span,
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        if var_args {
            match values.pop() {
                Some(Value::Array(items)) => values.extend(items),
                Some(other) => {
                    return Err(EvalError::type_error(
                        format!(
                            "the `...` argument must be an array, got {}",
                            other.type_name()
                        ),
                        args.last().map(|arg| arg.span).unwrap_or(span),
                    ));
                }
                None => {}
            }
        }

        let function = scope
            .lookup_function(&name.name)
            .expect("function presence checked above");
        function(&values).map_err(|error| match error {
            FuncError::Arity { expected, found } => EvalError::Arity {
                function: name.name.clone(),
                expected,
                found,
                span,
            },
            FuncError::Message(message) => EvalError::User {
                function: name.name.clone(),
                message,
                span,
            },
        })
    }

    /// Splat semantics: null becomes `[]`, a non-array is wrapped into a
    /// one-element array, then the trailers apply to each element.
    fn eval_splat(&mut self, on: &Expr, trailers: &[Trailer], scope: &Scope) -> EvalResult<Value> {
        let on_value = self.eval(on, scope)?;
        let items = match on_value {
            Value::Null => return Ok(Value::Array(Vec::new())),
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut value = item;
            for trailer in trailers {
                value = match trailer {
                    Trailer::Attr(name) => get_attr(&value, name)?,
                    Trailer::Index(key_expr) => {
                        let key = self.eval(key_expr, scope)?;
                        get_index(&value, &key, key_expr.span)?
                    }
                };
            }
            out.push(value);
        }
        Ok(Value::Array(out))
    }

    fn eval_for_tuple(
        &mut self,
        key_var: Option<&Ident>,
        value_var: &Ident,
        collection: &Expr,
        value: &Expr,
        cond: Option<&Expr>,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let pairs = self.eval_collection(collection, scope)?;
        let mut out = Vec::new();
        for (k, v) in pairs {
            let mut child = scope.child();
            child.set(value_var.name.clone(), v);
            if let Some(key_ident) = key_var {
                child.set(key_ident.name.clone(), k);
            }
            if !self.eval_loop_cond(cond, &child)? {
                continue;
            }
            out.push(self.eval(value, &child)?);
        }
        Ok(Value::Array(out))
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_for_object(
        &mut self,
        key_var: Option<&Ident>,
        value_var: &Ident,
        collection: &Expr,
        key: &Expr,
        value: &Expr,
        grouping: bool,
        cond: Option<&Expr>,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let pairs = self.eval_collection(collection, scope)?;
        let mut entries: IndexMap<String, Value> = IndexMap::new();
        let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();

        for (k, v) in pairs {
            let mut child = scope.child();
            child.set(value_var.name.clone(), v);
            if let Some(key_ident) = key_var {
                child.set(key_ident.name.clone(), k);
            }
            if !self.eval_loop_cond(cond, &child)? {
                continue;
            }

            let key_value = self.eval(key, &child)?;
            let Value::String(key_string) = key_value else {
                return Err(EvalError::type_error(
                    format!("object keys must be strings, got {}", key_value.type_name()),
                    key.span,
                ));
            };
            let result = self.eval(value, &child)?;

            if grouping {
                groups.entry(key_string).or_default().push(result);
            } else if entries.insert(key_string.clone(), result).is_some() {
                return Err(EvalError::DuplicateKey {
                    key: key_string,
                    span: key.span,
                });
            }
        }

        if grouping {
            Ok(Value::Object(
                groups
                    .into_iter()
                    .map(|(key, values)| (key, Value::Array(values)))
                    .collect(),
            ))
        } else {
            Ok(Value::Object(entries))
        }
    }

    /// Key/value pairs a for-comprehension iterates: indices and elements
    /// for arrays, keys and values (insertion order) for objects.
    fn eval_collection(&mut self, collection: &Expr, scope: &Scope) -> EvalResult<Vec<(Value, Value)>> {
        let value = self.eval(collection, scope)?;
        match value {
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Value::Int(index as i64), item))
                .collect()),
            Value::Object(entries) => Ok(entries
                .into_iter()
                .map(|(key, value)| (Value::String(key), value))
                .collect()),
            other => Err(EvalError::type_error(
                format!("cannot iterate over {}", other.type_name()),
                collection.span,
            )),
        }
    }

    fn eval_loop_cond(&mut self, cond: Option<&Expr>, scope: &Scope) -> EvalResult<bool> {
        let Some(cond) = cond else {
            return Ok(true);
        };
        match self.eval(cond, scope)? {
            Value::Bool(value) => Ok(value),
            other => Err(EvalError::type_error(
                format!("loop condition must be a bool, got {}", other.type_name()),
                cond.span,
            )),
        }
    }

    // ------------------------------------------------------------------
    // Statements

    fn eval_stmts(&mut self, stmts: &[Stmt], scope: &Scope) -> EvalResult<Value> {
        // Blocks sharing a full key path collect into an array at the leaf;
        // a lone block stays an object. Count paths up front to know which.
        let mut block_counts: HashMap<Vec<String>, usize> = HashMap::new();
        for stmt in stmts {
            if let Stmt::Block(block) = stmt {
                *block_counts.entry(owned_path(block)).or_insert(0) += 1;
            }
        }

        let mut result: IndexMap<String, Value> = IndexMap::new();
        for stmt in stmts {
            match stmt {
                Stmt::Attribute(attr) => {
                    let value = self.eval(&attr.value, scope)?;
                    self.insert_attribute(&mut result, attr, value)?;
                }
                Stmt::Block(block) => {
                    let value = self.eval_stmts(&block.body, scope)?;
                    let path = owned_path(block);
                    let repeated = block_counts[&path] > 1;
                    insert_block(&mut result, &path, value, repeated, block.ident.span)?;
                }
            }
        }
        Ok(Value::Object(result))
    }

    fn insert_attribute(
        &mut self,
        result: &mut IndexMap<String, Value>,
        attr: &Attribute,
        value: Value,
    ) -> EvalResult<()> {
        if result.contains_key(&attr.key.name) {
            return Err(EvalError::DuplicateKey {
                key: attr.key.name.clone(),
                span: attr.key.span,
            });
        }
        result.insert(attr.key.name.clone(), value);
        Ok(())
    }
}

fn owned_path(block: &Block) -> Vec<String> {
    block
        .key_path()
        .into_iter()
        .map(|part| part.to_string())
        .collect()
}

/// Place an evaluated block under its key path. Intermediate path segments
/// descend into (or create) nested objects; the leaf accumulates an array
/// when the path repeats within the body.
fn insert_block(
    root: &mut IndexMap<String, Value>,
    path: &[String],
    value: Value,
    repeated: bool,
    span: Span,
) -> EvalResult<()> {
    let (leaf, parents) = path.split_last().expect("block path is never empty");

    let mut map = root;
    for key in parents {
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(IndexMap::new()));
        match entry {
            Value::Object(inner) => map = inner,
            _ => {
                return Err(EvalError::DuplicateKey {
                    key: key.clone(),
                    span,
                });
            }
        }
    }

    if repeated {
        let entry = map
            .entry(leaf.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value),
            _ => {
                return Err(EvalError::DuplicateKey {
                    key: leaf.clone(),
                    span,
                });
            }
        }
        return Ok(());
    }

    match map.get_mut(leaf) {
        None => {
            map.insert(leaf.clone(), value);
            Ok(())
        }
        // A block at a path another block already descended through:
        // merge the bodies, colliding keys fail.
        Some(Value::Object(existing)) => {
            let Value::Object(entries) = value else {
                unreachable!("block bodies evaluate to objects")
            };
            for (key, entry) in entries {
                if existing.insert(key.clone(), entry).is_some() {
                    return Err(EvalError::DuplicateKey { key, span });
                }
            }
            Ok(())
        }
        Some(_) => Err(EvalError::DuplicateKey {
            key: leaf.clone(),
            span,
        }),
    }
}

fn lit_value(lit: &LitValue) -> Value {
    match lit {
        LitValue::Null => Value::Null,
        LitValue::Bool(value) => Value::Bool(*value),
        LitValue::Int(value) => Value::Int(*value),
        LitValue::Float(value) => Value::Float(*value),
        LitValue::String(value) => Value::String(value.clone()),
    }
}

fn get_attr(value: &Value, name: &Ident) -> EvalResult<Value> {
    match value {
        Value::Object(entries) => entries.get(&name.name).cloned().ok_or_else(|| {
            EvalError::key_error(format!("key '{}' not found in object", name.name), name.span)
        }),
        other => Err(EvalError::type_error(
            format!(
                "cannot read attribute '{}' from {}",
                name.name,
                other.type_name()
            ),
            name.span,
        )),
    }
}

fn get_index(value: &Value, key: &Value, span: Span) -> EvalResult<Value> {
    match value {
        Value::Array(items) => match key {
            Value::Int(index) => {
                let length = items.len();
                usize::try_from(*index)
                    .ok()
                    .and_then(|index| items.get(index))
                    .cloned()
                    .ok_or_else(|| {
                        EvalError::key_error(
                            format!("index {index} out of bounds for array of length {length}"),
                            span,
                        )
                    })
            }
            other => Err(EvalError::type_error(
                format!("array index must be an integer, got {}", other.type_name()),
                span,
            )),
        },
        Value::Object(entries) => {
            let key_string = object_key(key).ok_or_else(|| {
                EvalError::type_error(
                    format!("cannot index an object with {}", key.type_name()),
                    span,
                )
            })?;
            entries.get(&key_string).cloned().ok_or_else(|| {
                EvalError::key_error(format!("key '{key_string}' not found in object"), span)
            })
        }
        other => Err(EvalError::type_error(
            format!("cannot index into {}", other.type_name()),
            span,
        )),
    }
}

/// Object index keys coerce to strings: strings as-is, integers and bools
/// through their literal forms.
fn object_key(key: &Value) -> Option<String> {
    match key {
        Value::String(value) => Some(value.clone()),
        Value::Int(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

fn unary_op(op: UnaryOp, value: &Value) -> Result<Value, String> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnaryOp::Neg, Value::Int(value)) => value
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        (UnaryOp::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (op, other) => Err(format!(
            "unary `{op}` is not supported for {}",
            other.type_name()
        )),
    }
}

fn binary_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        BinOp::Eq => Ok(Value::Bool(left == right)),
        BinOp::NotEq => Ok(Value::Bool(left != right)),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            arithmetic(op, left, right)
        }
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => comparison(op, left, right),
        BinOp::And | BinOp::Or => unreachable!("logical operators short-circuit in eval_binary"),
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Int(a), Value::Float(b)) => float_arithmetic(op, *a as f64, *b),
        (Value::Float(a), Value::Int(b)) => float_arithmetic(op, *a, *b as f64),
        (Value::Float(a), Value::Float(b)) => float_arithmetic(op, *a, *b),
        (left, right) => Err(format!(
            "binary `{op}` is not supported for {} and {}",
            left.type_name(),
            right.type_name()
        )),
    }
}

/// Integer division truncates toward zero; `%` is the signed remainder.
fn int_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value, String> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err("division by zero".to_string());
            }
            a.checked_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err("division by zero".to_string());
            }
            a.checked_rem(b)
        }
        _ => unreachable!("not an arithmetic operator"),
    };
    result.map(Value::Int).ok_or_else(|| "integer overflow".to_string())
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value, String> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            a % b
        }
        _ => unreachable!("not an arithmetic operator"),
    };
    Ok(Value::Float(result))
}

/// Ordering is defined for two numerics (mixed Int/Float compare as
/// floats) and for two strings (lexicographic by UTF-8).
fn comparison(op: BinOp, left: &Value, right: &Value) -> Result<Value, String> {
    let result = match (left, right) {
        (Value::Int(a), Value::Int(b)) => apply_ord(op, a, b),
        (Value::Int(a), Value::Float(b)) => apply_ord(op, &(*a as f64), b),
        (Value::Float(a), Value::Int(b)) => apply_ord(op, a, &(*b as f64)),
        (Value::Float(a), Value::Float(b)) => apply_ord(op, a, b),
        (Value::String(a), Value::String(b)) => apply_ord(op, a, b),
        (left, right) => {
            return Err(format!(
                "binary `{op}` is not supported for {} and {}",
                left.type_name(),
                right.type_name()
            ));
        }
    };
    Ok(Value::Bool(result))
}

fn apply_ord<T: PartialOrd + ?Sized>(op: BinOp, a: &T, b: &T) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Gt => a > b,
        BinOp::LtEq => a <= b,
        BinOp::GtEq => a >= b,
        _ => unreachable!("not a comparison operator"),
    }
}

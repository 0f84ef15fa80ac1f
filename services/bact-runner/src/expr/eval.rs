//! Expression evaluator and template interpolator.

use super::ast::{CompareKind, LogicalKind, Node};
use super::context::EvalContext;
use super::functions::{cast_to_string, Functions};
use super::parser;
use super::value::{JsValue, PathSegment};
use super::ExprError;

/// Guard against pathological access chains.
const MAX_ACCESS_DEPTH: usize = 1_000_000;

/// Evaluates parsed expressions against a projected evaluation context.
pub struct Evaluator {
    context: JsValue,
    functions: Functions,
}

impl Evaluator {
    /// Build an evaluator over the given context with the standard function
    /// table.
    pub fn new(context: &EvalContext) -> Result<Self, ExprError> {
        Self::with_functions(context, Functions::standard())
    }

    pub fn with_functions(context: &EvalContext, functions: Functions) -> Result<Self, ExprError> {
        let context = JsValue::from_serialize(context)?;
        Ok(Evaluator { context, functions })
    }

    /// Evaluate a syntax tree to a value.
    pub fn evaluate(&self, node: &Node) -> Result<JsValue, ExprError> {
        match node {
            Node::Variable { name, .. } => {
                Ok(self.context.access(&[PathSegment::Key(name.clone())])?)
            }
            Node::Null { .. } => Ok(JsValue::Null),
            Node::Bool { value, .. } => Ok(JsValue::Bool(*value)),
            Node::Int { value, .. } => Ok(JsValue::Int(*value)),
            Node::Float { value, .. } => Ok(JsValue::Float(*value)),
            Node::String { value, .. } => Ok(JsValue::String(value.clone())),
            Node::Member { .. } | Node::Index { .. } | Node::Splat { .. } => {
                self.evaluate_access(node)
            }
            Node::Not { operand, .. } => {
                let value = self.evaluate(operand)?;
                Ok(JsValue::Bool(!value.truthy()))
            }
            Node::Logical { kind, left, right } => {
                let left = self.evaluate(left)?;
                // the raw side short-circuits, not its boolean coercion
                match kind {
                    LogicalKind::And if !left.truthy() => Ok(left),
                    LogicalKind::Or if left.truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            Node::Compare { kind, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(JsValue::Bool(compare(*kind, &left, &right)))
            }
            Node::Call { callee, args, .. } => {
                let f = self.functions.get(callee).ok_or_else(|| {
                    ExprError::Eval(format!("unknown function '{callee}'"))
                })?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                f(&values)
            }
        }
    }

    /// Flatten a member/index/splat chain into one access path, evaluate the
    /// chain root once, and walk the path.
    fn evaluate_access(&self, node: &Node) -> Result<JsValue, ExprError> {
        let mut reversed = Vec::new();
        let mut current = node;
        loop {
            match current {
                Node::Member { receiver, property } => {
                    reversed.push(PathSegment::Key(property.clone()));
                    current = receiver;
                }
                Node::Splat { receiver } => {
                    reversed.push(PathSegment::Splat);
                    current = receiver;
                }
                Node::Index { receiver, index } => {
                    let idx = self.evaluate(index)?;
                    let segment = match idx {
                        JsValue::Int(i) => PathSegment::Index(i),
                        JsValue::Float(f) if f.fract() == 0.0 => PathSegment::Index(f as i64),
                        JsValue::String(s) => PathSegment::Key(s),
                        other => {
                            return Err(ExprError::Eval(format!(
                                "index must be an integer or a string, got {}",
                                other.kind()
                            )))
                        }
                    };
                    reversed.push(segment);
                    current = receiver;
                }
                _ => break,
            }
            if reversed.len() > MAX_ACCESS_DEPTH {
                return Err(ExprError::Eval("access chain is too deep".to_string()));
            }
        }

        let root = self.evaluate(current)?;
        reversed.reverse();
        Ok(root.access(&reversed)?)
    }

    /// Replace each `${{ … }}` span in `template` with the string cast of
    /// its evaluated expression. `$$` escapes to a literal `$`.
    pub fn evaluate_template(&self, template: &str) -> Result<String, ExprError> {
        const DOLLAR_SENTINEL: &str = "\u{0}escaped-dollar\u{0}";

        if !template.contains("${{") {
            return Ok(template.to_string());
        }

        let escaped = template.replace("$$", DOLLAR_SENTINEL);
        let mut rest = escaped.as_str();
        let mut consumed = 0usize;
        let mut out = String::new();

        while let Some(open) = rest.find("${{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 3..];
            let Some(close) = after.find("}}") else {
                return Err(ExprError::UnterminatedExpression {
                    offset: consumed + open,
                });
            };
            // the parser expects the closing '}}' sentinel
            let body = after[..close + 2].replace(DOLLAR_SENTINEL, "$$");
            let node = parser::parse(&body)?;
            let value = self.evaluate(&node)?;
            out.push_str(&cast_to_string(&value)?);

            consumed += open + 3 + close + 2;
            rest = &after[close + 2..];
        }
        out.push_str(rest);

        Ok(out.replace(DOLLAR_SENTINEL, "$"))
    }

    /// Evaluate a string that is either a bare expression or a full
    /// template. Used for `if:` style values that omit the `${{ }}`.
    pub fn evaluate_expression(&self, expression_or_template: &str) -> Result<String, ExprError> {
        if expression_or_template.trim_start().starts_with("${{") {
            self.evaluate_template(expression_or_template)
        } else {
            self.evaluate_template(&format!("${{{{ {expression_or_template} }}}}"))
        }
    }
}

/// Comparison with JS-style coercion, as GitHub Actions documents it.
fn compare(kind: CompareKind, left: &JsValue, right: &JsValue) -> bool {
    if left.is_number() && right.is_number() {
        let (l, r) = (
            left.as_number().unwrap_or(f64::NAN),
            right.as_number().unwrap_or(f64::NAN),
        );
        return compare_floats(kind, l, r);
    }

    if same_shape(left, right) {
        return match (left, right) {
            (JsValue::String(l), JsValue::String(r)) => match kind {
                CompareKind::Eq => l == r,
                CompareKind::NotEq => l != r,
                CompareKind::Less => l < r,
                CompareKind::LessEq => l <= r,
                CompareKind::Greater => l > r,
                CompareKind::GreaterEq => l >= r,
            },
            (JsValue::Null, JsValue::Null) | (JsValue::Undefined, JsValue::Undefined) => {
                equality_result(kind, true)
            }
            (JsValue::Bool(l), JsValue::Bool(r)) => {
                if kind.is_equality() {
                    equality_result(kind, l == r)
                } else {
                    compare_floats(kind, f64::from(*l), f64::from(*r))
                }
            }
            // arrays and objects compare by identity upstream; without
            // identity only two empty values are considered the same
            (JsValue::Array(l), JsValue::Array(r)) => {
                equality_result(kind, kind.is_equality() && l.is_empty() && r.is_empty())
            }
            (JsValue::Object(l), JsValue::Object(r)) => {
                equality_result(kind, kind.is_equality() && l.is_empty() && r.is_empty())
            }
            _ => false,
        };
    }

    match (coerce_to_number(left), coerce_to_number(right)) {
        (Some(l), Some(r)) => compare_floats(kind, l, r),
        _ => match kind {
            CompareKind::NotEq => true,
            _ => false,
        },
    }
}

fn same_shape(left: &JsValue, right: &JsValue) -> bool {
    std::mem::discriminant(left) == std::mem::discriminant(right)
}

fn equality_result(kind: CompareKind, equal: bool) -> bool {
    match kind {
        CompareKind::Eq => equal,
        CompareKind::NotEq => !equal,
        _ => false,
    }
}

fn compare_floats(kind: CompareKind, l: f64, r: f64) -> bool {
    match kind {
        CompareKind::Eq => l == r,
        CompareKind::NotEq => l != r,
        CompareKind::Less => l < r,
        CompareKind::LessEq => l <= r,
        CompareKind::Greater => l > r,
        CompareKind::GreaterEq => l >= r,
    }
}

/// Number coercion: booleans become 1/0, `null`/`undefined` become 0,
/// strings parse as floats (empty string is 0), everything else is not
/// coercible.
fn coerce_to_number(value: &JsValue) -> Option<f64> {
    match value {
        JsValue::Int(i) => Some(*i as f64),
        JsValue::Float(f) => Some(*f),
        JsValue::Bool(b) => Some(f64::from(*b)),
        JsValue::Null | JsValue::Undefined => Some(0.0),
        JsValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        JsValue::Array(_) | JsValue::Object(_) => None,
    }
}

//! Render engine
//!
//! Executes compiled templates against view data. Nested views (includes and
//! layouts) are obtained through a [`ViewLoader`], which lets the view factory
//! resolve, compile and decorate them (composers, creators, shared data).

use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    error::{EvalError, Result, TemplateError},
    expression::{BinaryOp, Expr, UnaryOp},
    functions,
    nodes::{Branch, CompiledTemplate, ConditionKind, Expression, Node},
    value::{self, Num},
};

/// Maximum nesting of views within one render
pub const MAX_VIEW_DEPTH: usize = 64;

/// Marks where `@parent` content goes inside a section
const PARENT_PLACEHOLDER: &str = "\u{1}parent-placeholder\u{1}";

/// View data: variable name to value
pub type ViewData = Map<String, Value>;

/// A view ready to be rendered
#[derive(Debug, Clone)]
pub struct LoadedView {
    /// Name the view was requested by
    pub name: String,
    /// Compiled template
    pub template: Arc<CompiledTemplate>,
    /// Variables visible to the template
    pub data: ViewData,
}

/// Supplies nested views during rendering
pub trait ViewLoader {
    /// Resolve, compile and prepare `name` with `data` as its call-site data
    fn load_view(&self, name: &str, data: ViewData) -> Result<LoadedView>;

    /// Whether `name` resolves to a view
    fn view_exists(&self, name: &str) -> bool;
}

/// Renders one view tree; sections are shared between a child and its layouts
pub struct Renderer<'a, L: ViewLoader + ?Sized> {
    loader: &'a L,
    sections: HashMap<String, String>,
    stack: Vec<String>,
}

impl<'a, L: ViewLoader + ?Sized> Renderer<'a, L> {
    /// Create a renderer using `loader` for nested views
    pub fn new(loader: &'a L) -> Self {
        Self {
            loader,
            sections: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Render a view, following its layout chain
    pub fn render(&mut self, view: LoadedView) -> Result<String> {
        if self.stack.len() >= MAX_VIEW_DEPTH {
            let mut chain = self.stack.clone();
            chain.push(view.name);
            return Err(TemplateError::CircularTemplateReference { chain });
        }

        trace!(view = %view.name, depth = self.stack.len(), "Rendering view");
        self.stack.push(view.name.clone());
        let result = self.render_view(&view);
        self.stack.pop();
        result
    }

    fn render_view(&mut self, view: &LoadedView) -> Result<String> {
        let mut frame = Frame::new(&view.name, view.data.clone());
        let mut out = String::new();
        self.exec(&view.template.nodes, &mut frame, &mut out)?;

        let Some(layout) = &view.template.layout else {
            return Ok(out);
        };

        if self.stack.iter().any(|name| *name == layout.name) {
            let mut chain = self.stack.clone();
            chain.push(layout.name.clone());
            return Err(TemplateError::CircularTemplateReference { chain });
        }

        // Output outside of sections is discarded for child views
        let mut data = view.data.clone();
        if let Some(expr) = &layout.data {
            let extra = frame.eval(expr)?;
            merge_data(&mut data, extra).map_err(|cause| frame.error(expr, cause))?;
        }
        let parent = self.loader.load_view(&layout.name, data)?;
        self.render(parent)
    }

    fn exec(&mut self, nodes: &[Node], frame: &mut Frame<'_>, out: &mut String) -> Result<Flow> {
        for node in nodes {
            let flow = self.exec_node(node, frame, out)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_node(&mut self, node: &Node, frame: &mut Frame<'_>, out: &mut String) -> Result<Flow> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Echo { expr, escape } => {
                let rendered = value::to_display_string(&frame.eval(expr)?);
                if *escape {
                    out.push_str(&value::escape_html(&rendered));
                } else {
                    out.push_str(&rendered);
                }
            }
            Node::Conditional {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    if frame.test(branch)? {
                        return self.exec(&branch.body, frame, out);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec(body, frame, out);
                }
            }
            Node::Loop {
                iterable,
                key,
                value,
                body,
                empty,
            } => {
                let items = frame.iterate(iterable)?;
                if items.is_empty() {
                    if let Some(body) = empty {
                        return self.exec(body, frame, out);
                    }
                    return Ok(Flow::Normal);
                }
                self.exec_loop(items, key.as_deref(), value, body, frame, out)?;
            }
            Node::Break(condition) => {
                if frame.condition_holds(condition.as_ref())? {
                    return Ok(Flow::Break);
                }
            }
            Node::Continue(condition) => {
                if frame.condition_holds(condition.as_ref())? {
                    return Ok(Flow::Continue);
                }
            }
            Node::Include {
                name,
                data,
                if_exists,
            } => {
                let target = match frame.eval(name)? {
                    Value::String(target) => target,
                    other => {
                        let cause = EvalError::TypeMismatch(format!(
                            "view name must be a string, {} given",
                            value::type_name(&other)
                        ));
                        return Err(frame.error(name, cause));
                    }
                };
                if *if_exists && !self.loader.view_exists(&target) {
                    return Ok(Flow::Normal);
                }
                let mut view_data = frame.visible_variables();
                if let Some(expr) = data {
                    let extra = frame.eval(expr)?;
                    merge_data(&mut view_data, extra).map_err(|cause| frame.error(expr, cause))?;
                }
                let view = self.loader.load_view(&target, view_data)?;
                let rendered = self.render(view)?;
                out.push_str(&rendered);
            }
            Node::Section { name, body, show } => {
                let mut content = String::new();
                let flow = self.exec(body, frame, &mut content)?;
                self.extend_section(name, content);
                if *show {
                    out.push_str(&self.yield_section(name));
                }
                if flow != Flow::Normal {
                    return Ok(flow);
                }
            }
            Node::InlineSection { name, content } => {
                let content = value::escape_html(&value::to_display_string(&frame.eval(content)?));
                self.extend_section(name, content);
            }
            Node::Yield { name, default } => {
                if self.sections.contains_key(name) {
                    out.push_str(&self.yield_section(name));
                } else if let Some(expr) = default {
                    let fallback = value::to_display_string(&frame.eval(expr)?);
                    out.push_str(&value::escape_html(&fallback));
                }
            }
            Node::Parent => out.push_str(PARENT_PLACEHOLDER),
            Node::Json(expr) => {
                let encoded = encode_json(&frame.eval(expr)?).map_err(|cause| frame.error(expr, cause))?;
                out.push_str(&encoded);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_loop(
        &mut self,
        items: Vec<(Value, Value)>,
        key: Option<&str>,
        value: &str,
        body: &[Node],
        frame: &mut Frame<'_>,
        out: &mut String,
    ) -> Result<()> {
        let count = items.len();
        let parent = frame.current_loop();
        let depth = frame.loop_depth + 1;

        frame.loop_depth += 1;
        let mut result = Ok(());
        for (index, (item_key, item)) in items.into_iter().enumerate() {
            let mut scope = Map::new();
            scope.insert("loop".to_string(), loop_object(index, count, depth, &parent));
            if let Some(key) = key {
                scope.insert(key.to_string(), item_key);
            }
            scope.insert(value.to_string(), item);

            frame.scopes.push(scope);
            let flow = self.exec(body, frame, out);
            frame.scopes.pop();

            match flow {
                Ok(Flow::Break) => break,
                Ok(_) => {}
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        frame.loop_depth -= 1;
        result
    }

    /// Store section content; an existing definition wins and absorbs the
    /// new content at its `@parent` marker
    fn extend_section(&mut self, name: &str, content: String) {
        let content = match self.sections.get(name) {
            Some(existing) => existing.replace(PARENT_PLACEHOLDER, &content),
            None => content,
        };
        self.sections.insert(name.to_string(), content);
    }

    fn yield_section(&self, name: &str) -> String {
        self.sections
            .get(name)
            .map(|content| content.replace(PARENT_PLACEHOLDER, ""))
            .unwrap_or_default()
    }
}

/// Render `view` with a fresh renderer
pub fn render_view<L: ViewLoader + ?Sized>(loader: &L, view: LoadedView) -> Result<String> {
    Renderer::new(loader).render(view)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Variable scopes of the view being rendered
struct Frame<'v> {
    view: &'v str,
    scopes: Vec<ViewData>,
    loop_depth: usize,
}

impl<'v> Frame<'v> {
    fn new(view: &'v str, data: ViewData) -> Self {
        Self {
            view,
            scopes: vec![data],
            loop_depth: 0,
        }
    }

    fn error(&self, expr: &Expression, cause: EvalError) -> TemplateError {
        TemplateError::RenderError {
            view: self.view.to_string(),
            expression: expr.source.clone(),
            line: expr.line,
            cause,
        }
    }

    fn eval(&self, expr: &Expression) -> Result<Value> {
        self.eval_expr(&expr.ast).map_err(|cause| self.error(expr, cause))
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn current_loop(&self) -> Value {
        if self.loop_depth == 0 {
            return Value::Null;
        }
        self.lookup("loop").cloned().unwrap_or(Value::Null)
    }

    /// All variables, inner scopes overriding outer ones
    fn visible_variables(&self) -> ViewData {
        let mut merged = Map::new();
        for scope in &self.scopes {
            for (key, value) in scope {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    fn test(&self, branch: &Branch) -> Result<bool> {
        let expr = &branch.condition;
        let outcome = match branch.kind {
            ConditionKind::Truthy => value::is_truthy(&self.eval(expr)?),
            ConditionKind::Falsy => !value::is_truthy(&self.eval(expr)?),
            ConditionKind::Isset => self.is_set(&expr.ast).map_err(|c| self.error(expr, c))?,
            ConditionKind::Empty => self.is_empty(&expr.ast).map_err(|c| self.error(expr, c))?,
        };
        Ok(outcome)
    }

    fn condition_holds(&self, condition: Option<&Expression>) -> Result<bool> {
        match condition {
            Some(expr) => Ok(value::is_truthy(&self.eval(expr)?)),
            None => Ok(true),
        }
    }

    /// Key/value pairs of an iterable; `null` iterates as empty
    fn iterate(&self, expr: &Expression) -> Result<Vec<(Value, Value)>> {
        match self.eval(expr)? {
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect()),
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(self.error(
                expr,
                EvalError::TypeMismatch(format!(
                    "foreach() argument must be of type array, {} given",
                    value::type_name(&other)
                )),
            )),
        }
    }

    fn is_set(&self, expr: &Expr) -> std::result::Result<bool, EvalError> {
        Ok(self.eval_lenient(expr)?.is_some_and(|v| !v.is_null()))
    }

    fn is_empty(&self, expr: &Expr) -> std::result::Result<bool, EvalError> {
        Ok(self
            .eval_lenient(expr)?
            .map_or(true, |v| !value::is_truthy(&v)))
    }

    /// Evaluate, yielding `None` where a variable, key or property is missing
    fn eval_lenient(&self, expr: &Expr) -> std::result::Result<Option<Value>, EvalError> {
        match expr {
            Expr::Variable(name) => Ok(self.lookup(name).cloned()),
            Expr::Property(target, property) => Ok(self
                .eval_lenient(target)?
                .and_then(|target| match target {
                    Value::Object(mut map) => map.remove(property),
                    _ => None,
                })),
            Expr::Index(target, index) => {
                let Some(target) = self.eval_lenient(target)? else {
                    return Ok(None);
                };
                let index = self.eval_expr(index)?;
                Ok(index_value(&target, &index).ok())
            }
            other => self.eval_expr(other).map(Some),
        }
    }

    fn eval_expr(&self, expr: &Expr) -> std::result::Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expr::Array(entries) => self.eval_array(entries),
            Expr::Property(target, property) => match self.eval_expr(target)? {
                Value::Object(mut map) => map
                    .remove(property)
                    .ok_or_else(|| EvalError::UndefinedKey(property.clone())),
                other => Err(EvalError::TypeMismatch(format!(
                    "Attempt to read property \"{property}\" on {}",
                    value::type_name(&other)
                ))),
            },
            Expr::Index(target, index) => {
                let target = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                index_value(&target, &index)
            }
            Expr::Unary(UnaryOp::Not, operand) => {
                Ok(Value::Bool(!value::is_truthy(&self.eval_expr(operand)?)))
            }
            Expr::Unary(UnaryOp::Neg, operand) => {
                let operand = self.eval_expr(operand)?;
                match value::to_number(&operand) {
                    Some(Num::Int(i)) => Ok(i
                        .checked_neg()
                        .map_or_else(|| Num::Float(-(i as f64)).into_value(), Value::from)),
                    Some(Num::Float(f)) => Ok(Num::Float(-f).into_value()),
                    None => Err(EvalError::TypeMismatch(format!(
                        "Unsupported operand types: -{}",
                        value::type_name(&operand)
                    ))),
                }
            }
            Expr::Binary(BinaryOp::And, left, right) => Ok(Value::Bool(
                value::is_truthy(&self.eval_expr(left)?) && value::is_truthy(&self.eval_expr(right)?),
            )),
            Expr::Binary(BinaryOp::Or, left, right) => Ok(Value::Bool(
                value::is_truthy(&self.eval_expr(left)?) || value::is_truthy(&self.eval_expr(right)?),
            )),
            Expr::Binary(op, left, right) => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                binary(*op, &left, &right)
            }
            Expr::Coalesce(left, right) => match self.eval_lenient(left)? {
                Some(value) if !value.is_null() => Ok(value),
                _ => self.eval_expr(right),
            },
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.eval_expr(condition)?;
                if value::is_truthy(&condition) {
                    match then {
                        Some(then) => self.eval_expr(then),
                        None => Ok(condition),
                    }
                } else {
                    self.eval_expr(otherwise)
                }
            }
            Expr::Call(name, args) => match name.as_str() {
                "isset" => {
                    for arg in args {
                        if !self.is_set(arg)? {
                            return Ok(Value::Bool(false));
                        }
                    }
                    Ok(Value::Bool(!args.is_empty()))
                }
                "empty" => match args.as_slice() {
                    [arg] => Ok(Value::Bool(self.is_empty(arg)?)),
                    _ => Err(EvalError::InvalidArgument {
                        function: "empty".to_string(),
                        message: format!("expects exactly 1 argument(s), {} given", args.len()),
                    }),
                },
                _ => {
                    let values = args
                        .iter()
                        .map(|arg| self.eval_expr(arg))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    functions::call(name, &values)
                }
            },
        }
    }

    fn eval_array(&self, entries: &[(Option<Expr>, Expr)]) -> std::result::Result<Value, EvalError> {
        if entries.iter().all(|(key, _)| key.is_none()) {
            let items = entries
                .iter()
                .map(|(_, value)| self.eval_expr(value))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(Value::Array(items));
        }

        let mut map = Map::new();
        // None once the key i64::MAX is taken
        let mut next_index = Some(0i64);
        for (key, value) in entries {
            let key = match key {
                Some(key) => {
                    let key = self.eval_expr(key)?;
                    if let Some(Num::Int(i)) = value::to_number(&key).filter(|_| !key.is_string() || is_int_string(&key)) {
                        next_index = next_index.and_then(|next| i.checked_add(1).map(|after| next.max(after)));
                    }
                    value::to_display_string(&key)
                }
                None => {
                    let Some(index) = next_index else {
                        return Err(EvalError::TypeMismatch(
                            "Cannot add element to the array as the next element is already occupied"
                                .to_string(),
                        ));
                    };
                    next_index = index.checked_add(1);
                    index.to_string()
                }
            };
            map.insert(key, self.eval_expr(value)?);
        }
        Ok(Value::Object(map))
    }
}

fn is_int_string(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.parse::<i64>().is_ok_and(|i| i.to_string() == s))
}

fn index_value(target: &Value, index: &Value) -> std::result::Result<Value, EvalError> {
    match target {
        Value::Array(items) => {
            let position = match value::to_number(index) {
                Some(Num::Int(i)) => i,
                Some(Num::Float(f)) => f.trunc() as i64,
                None => {
                    return Err(EvalError::TypeMismatch(format!(
                        "Cannot access offset of type {} on array",
                        value::type_name(index)
                    )))
                }
            };
            usize::try_from(position)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(EvalError::UndefinedIndex(position))
        }
        Value::Object(map) => {
            let key = value::to_display_string(index);
            map.get(&key).cloned().ok_or(EvalError::UndefinedKey(key))
        }
        Value::String(text) => {
            let position = match value::to_number(index) {
                Some(Num::Int(i)) => i,
                _ => {
                    return Err(EvalError::TypeMismatch(format!(
                        "Cannot access offset of type {} on string",
                        value::type_name(index)
                    )))
                }
            };
            let count = text.chars().count() as i64;
            let position_from_start = if position < 0 { count + position } else { position };
            usize::try_from(position_from_start)
                .ok()
                .and_then(|i| text.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .ok_or(EvalError::UndefinedIndex(position))
        }
        other => Err(EvalError::TypeMismatch(format!(
            "Cannot use a value of type {} as an array",
            value::type_name(other)
        ))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> std::result::Result<Value, EvalError> {
    match op {
        BinaryOp::Concat => Ok(Value::String(format!(
            "{}{}",
            value::to_display_string(left),
            value::to_display_string(right)
        ))),
        BinaryOp::Eq => Ok(Value::Bool(value::loose_eq(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!value::loose_eq(left, right))),
        BinaryOp::Identical => Ok(Value::Bool(value::strict_eq(left, right))),
        BinaryOp::NotIdentical => Ok(Value::Bool(!value::strict_eq(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = value::compare(left, right).ok_or_else(|| unsupported(op, left, right))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let (Some(a), Some(b)) = (value::to_number(left), value::to_number(right)) else {
                return Err(unsupported(op, left, right));
            };
            arithmetic(op, a, b)
        }
        // Short-circuiting operators are handled by the evaluator
        BinaryOp::And => Ok(Value::Bool(value::is_truthy(left) && value::is_truthy(right))),
        BinaryOp::Or => Ok(Value::Bool(value::is_truthy(left) || value::is_truthy(right))),
    }
}

fn arithmetic(op: BinaryOp, a: Num, b: Num) -> std::result::Result<Value, EvalError> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div if y == 0 => return Err(EvalError::DivisionByZero),
            BinaryOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Div => None,
            BinaryOp::Mod if y == 0 => return Err(EvalError::DivisionByZero),
            BinaryOp::Mod => Some(x.wrapping_rem(y)),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Mod => {
            let (x, y) = (x.trunc() as i64, y.trunc() as i64);
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            return Ok(Value::from(x.wrapping_rem(y)));
        }
        _ => return Err(EvalError::TypeMismatch(format!("Unsupported operator {}", op.symbol()))),
    };
    Ok(Num::Float(result).into_value())
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch(format!(
        "Unsupported operand types: {} {} {}",
        value::type_name(left),
        op.symbol(),
        value::type_name(right)
    ))
}

fn loop_object(index: usize, count: usize, depth: usize, parent: &Value) -> Value {
    functions::object([
        ("index".to_string(), Value::from(index)),
        ("iteration".to_string(), Value::from(index + 1)),
        ("remaining".to_string(), Value::from(count - index - 1)),
        ("count".to_string(), Value::from(count)),
        ("first".to_string(), Value::Bool(index == 0)),
        ("last".to_string(), Value::Bool(index + 1 == count)),
        ("even".to_string(), Value::Bool((index + 1) % 2 == 0)),
        ("odd".to_string(), Value::Bool((index + 1) % 2 == 1)),
        ("depth".to_string(), Value::from(depth)),
        ("parent".to_string(), parent.clone()),
    ])
}

/// Merge extra view data given as an object (or an empty list)
fn merge_data(data: &mut ViewData, extra: Value) -> std::result::Result<(), EvalError> {
    match extra {
        Value::Object(map) => {
            data.extend(map);
            Ok(())
        }
        Value::Array(items) if items.is_empty() => Ok(()),
        Value::Null => Ok(()),
        other => Err(EvalError::TypeMismatch(format!(
            "view data must be a key/value array, {} given",
            value::type_name(&other)
        ))),
    }
}

/// JSON for embedding in HTML: tags, ampersands and quotes inside strings are
/// written as unicode escapes
fn encode_json(value: &Value) -> std::result::Result<String, EvalError> {
    let json = serde_json::to_string(value).map_err(|e| EvalError::InvalidArgument {
        function: "json".to_string(),
        message: e.to_string(),
    })?;
    let mut out = String::with_capacity(json.len());
    let mut chars = json.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('"') => out.push_str("\\u0022"),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compiler::Compiler;

    /// Loader over in-memory template sources
    struct MemoryLoader {
        compiler: Compiler,
        sources: HashMap<&'static str, &'static str>,
    }

    impl MemoryLoader {
        fn new(sources: &[(&'static str, &'static str)]) -> Self {
            Self {
                compiler: Compiler::new(),
                sources: sources.iter().copied().collect(),
            }
        }

        fn render(&self, name: &str, data: Value) -> Result<String> {
            let data = match data {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let view = self.load_view(name, data)?;
            render_view(self, view)
        }
    }

    impl ViewLoader for MemoryLoader {
        fn load_view(&self, name: &str, data: ViewData) -> Result<LoadedView> {
            let source = self.sources.get(name).ok_or_else(|| TemplateError::ViewNotFound {
                name: name.to_string(),
                searched: Vec::new(),
            })?;
            Ok(LoadedView {
                name: name.to_string(),
                template: Arc::new(self.compiler.compile(source)?),
                data,
            })
        }

        fn view_exists(&self, name: &str) -> bool {
            self.sources.contains_key(name)
        }
    }

    fn render(source: &'static str, data: Value) -> Result<String> {
        MemoryLoader::new(&[("main", source)]).render("main", data)
    }

    #[test]
    fn test_echo_escaping() {
        let out = render("{{ $a }}|{!! $a !!}", json!({"a": "<b>&'\""})).unwrap();
        assert_eq!(out, "&lt;b&gt;&amp;&#039;&quot;|<b>&'\"");
    }

    #[test]
    fn test_expressions() {
        let data = json!({"user": {"name": "ada", "tags": ["x", "y"]}, "n": 7});
        assert_eq!(render("{{ $user->name }}", data.clone()).unwrap(), "ada");
        assert_eq!(render("{{ $user['tags'][1] }}", data.clone()).unwrap(), "y");
        assert_eq!(render("{{ $n * 2 + 1 }}", data.clone()).unwrap(), "15");
        assert_eq!(render("{{ $n / 2 }}", data.clone()).unwrap(), "3.5");
        assert_eq!(render("{{ $n % 4 }}", data.clone()).unwrap(), "3");
        assert_eq!(render("{{ 'n=' . $n }}", data.clone()).unwrap(), "n=7");
        assert_eq!(render("{{ $missing ?? 'dflt' }}", data.clone()).unwrap(), "dflt");
        assert_eq!(render("{{ $n > 5 ? 'big' : 'small' }}", data.clone()).unwrap(), "big");
        assert_eq!(render("{{ strtoupper($user->name) }}", data.clone()).unwrap(), "ADA");
        assert_eq!(render("{{ count($user->tags) }}", data).unwrap(), "2");
    }

    #[test]
    fn test_undefined_variable_is_render_error() {
        let err = render("line\n{{ $nope }}", json!({})).unwrap_err();
        match err {
            TemplateError::RenderError {
                view, line, cause, ..
            } => {
                assert_eq!(view, "main");
                assert_eq!(line, 2);
                assert_eq!(cause, EvalError::UndefinedVariable("nope".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            render("{{ 1 / 0 }}", json!({})),
            Err(TemplateError::RenderError {
                cause: EvalError::DivisionByZero,
                ..
            })
        ));
    }

    #[test]
    fn test_integer_division_overflow_falls_back_to_float() {
        assert_eq!(
            render("{{ (-9223372036854775807 - 1) / -1 }}", json!({})).unwrap(),
            "9223372036854775808"
        );
        assert_eq!(render("{{ (-9223372036854775807 - 1) % -1 }}", json!({})).unwrap(), "0");
    }

    #[test]
    fn test_oversized_repeat_is_render_error() {
        assert!(matches!(
            render("{{ strlen(str_repeat('ab', 9223372036854775807)) }}", json!({})),
            Err(TemplateError::RenderError {
                cause: EvalError::InvalidArgument { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_conditionals() {
        let source = "@if($n > 1)[many]@elseif($n == 1)[one]@else[none]@endif";
        assert_eq!(render(source, json!({"n": 3})).unwrap(), "[many]");
        assert_eq!(render(source, json!({"n": 1})).unwrap(), "[one]");
        assert_eq!(render(source, json!({"n": 0})).unwrap(), "[none]");
        assert_eq!(render("@unless($a) no @endunless", json!({"a": false})).unwrap(), " no ");
        assert_eq!(render("@isset($a)[set]@endisset", json!({})).unwrap(), "");
        assert_eq!(render("@isset($a->b)[set]@endisset", json!({"a": {"b": 1}})).unwrap(), "[set]");
        assert_eq!(render("@empty($a)[empty]@endempty", json!({"a": []})).unwrap(), "[empty]");
    }

    #[test]
    fn test_foreach_with_loop_variable() {
        let source = "@foreach($xs as $x){{ $loop->iteration }}:{{ $x }}@if(!$loop->last),@endif@endforeach";
        assert_eq!(render(source, json!({"xs": ["a", "b", "c"]})).unwrap(), "1:a,2:b,3:c");
    }

    #[test]
    fn test_foreach_over_object_with_keys() {
        let source = "@foreach($m as $k => $v){{ $k }}={{ $v }};@endforeach";
        assert_eq!(render(source, json!({"m": {"a": 1, "b": 2}})).unwrap(), "a=1;b=2;");
    }

    #[test]
    fn test_loop_variables_are_restored() {
        let source = "@foreach($xs as $x){{ $x }}@endforeach{{ $x }}";
        assert_eq!(render(source, json!({"xs": [1, 2], "x": "outer"})).unwrap(), "12outer");
    }

    #[test]
    fn test_nested_loop_parent_and_depth() {
        let source = "@foreach($a as $x)@foreach($b as $y){{ $loop->depth }}{{ $loop->parent->index }}@endforeach@endforeach";
        assert_eq!(render(source, json!({"a": [1, 2], "b": [1]})).unwrap(), "2021");
    }

    #[test]
    fn test_break_and_continue() {
        let source = "@foreach($xs as $x)@continue($x == 2)@break($x == 4){{ $x }}@endforeach";
        assert_eq!(render(source, json!({"xs": [1, 2, 3, 4, 5]})).unwrap(), "13");
    }

    #[test]
    fn test_forelse_empty_branch() {
        let source = "@forelse($xs as $x){{ $x }}@empty nothing @endforelse";
        assert_eq!(render(source, json!({"xs": []})).unwrap(), " nothing ");
        assert_eq!(render(source, json!({"xs": [1]})).unwrap(), "1");
    }

    #[test]
    fn test_foreach_over_scalar_fails() {
        assert!(matches!(
            render("@foreach($x as $y)@endforeach", json!({"x": 3})),
            Err(TemplateError::RenderError { .. })
        ));
    }

    #[test]
    fn test_json_directive_escapes_for_html() {
        let out = render("@json($v)", json!({"v": {"a": "</script>", "q": "it's \"x\""}})).unwrap();
        assert_eq!(
            out,
            r#"{"a":"\u003C/script\u003E","q":"it\u0027s \u0022x\u0022"}"#
        );
    }

    #[test]
    fn test_include_passes_variables_and_data() {
        let loader = MemoryLoader::new(&[
            ("main", "@foreach($xs as $x)@include('item', ['suffix' => '!'])@endforeach"),
            ("item", "[{{ $x }}{{ $suffix }}{{ $title }}]"),
        ]);
        let out = loader
            .render("main", json!({"xs": [1, 2], "title": "T"}))
            .unwrap();
        assert_eq!(out, "[1!T][2!T]");
    }

    #[test]
    fn test_include_if_skips_missing_views() {
        let loader = MemoryLoader::new(&[("main", "a-@includeIf('missing')-b-@include('missing')")]);
        assert!(matches!(
            loader.render("main", json!({})),
            Err(TemplateError::ViewNotFound { .. })
        ));

        let loader = MemoryLoader::new(&[("main", "a-@includeIf('missing')-b")]);
        assert_eq!(loader.render("main", json!({})).unwrap(), "a--b");
    }

    #[test]
    fn test_layout_sections_and_parent() {
        let loader = MemoryLoader::new(&[
            (
                "child",
                "ignored @extends('layout')@section('title', $title)@section('sidebar')child @parent@endsection",
            ),
            (
                "layout",
                "<title>@yield('title')</title>@section('sidebar')base @show|@yield('footer', '<none>')",
            ),
        ]);
        let out = loader.render("child", json!({"title": "A & B"})).unwrap();
        assert_eq!(out, "<title>A &amp; B</title>child base |&lt;none&gt;");
    }

    #[test]
    fn test_layout_rendered_alone_shows_defaults() {
        let loader = MemoryLoader::new(&[("layout", "@section('s')base @parent@show")]);
        assert_eq!(loader.render("layout", json!({})).unwrap(), "base ");
    }

    #[test]
    fn test_multi_level_layouts() {
        let loader = MemoryLoader::new(&[
            ("page", "@extends('section')@section('body')(page) @parent@endsection"),
            ("section", "@extends('base')@section('body')[section]@endsection"),
            ("base", "<@yield('body')>"),
        ]);
        assert_eq!(loader.render("page", json!({})).unwrap(), "<(page) [section]>");
    }

    #[test]
    fn test_circular_layout_is_detected() {
        let loader = MemoryLoader::new(&[
            ("a", "@extends('b')"),
            ("b", "@extends('a')"),
        ]);
        match loader.render("a", json!({})) {
            Err(TemplateError::CircularTemplateReference { chain }) => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_include_loop_hits_depth_cap() {
        let loader = MemoryLoader::new(&[("a", "x-@include('a')")]);
        match loader.render("a", json!({})) {
            Err(TemplateError::CircularTemplateReference { chain }) => {
                assert_eq!(chain.len(), MAX_VIEW_DEPTH + 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_array_literals() {
        assert_eq!(render("@json([1, 'a' => 2, 3])", json!({})).unwrap(), r#"{"0":1,"a":2,"1":3}"#);
        assert_eq!(render("{{ implode(',', [1, 2]) }}", json!({})).unwrap(), "1,2");
    }

    #[test]
    fn test_array_auto_index_after_max_key() {
        assert_eq!(render("{{ count([9223372036854775807 => 1]) }}", json!({})).unwrap(), "1");
        assert_eq!(
            render("@json([9223372036854775806 => 'a', 'b'])", json!({})).unwrap(),
            r#"{"9223372036854775806":"a","9223372036854775807":"b"}"#
        );
        assert!(matches!(
            render("{{ count([9223372036854775807 => 1, 2]) }}", json!({})),
            Err(TemplateError::RenderError {
                cause: EvalError::TypeMismatch(_),
                ..
            })
        ));
    }

    #[test]
    fn test_lenient_checks() {
        assert_eq!(render("{{ isset($a, $b) ? 'y' : 'n' }}", json!({"a": 1})).unwrap(), "n");
        assert_eq!(render("{{ empty($a['x']) ? 'y' : 'n' }}", json!({"a": {}})).unwrap(), "y");
        assert_eq!(render("{{ $a->b->c ?? 'd' }}", json!({"a": {}})).unwrap(), "d");
    }
}

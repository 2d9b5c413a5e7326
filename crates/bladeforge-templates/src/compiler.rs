//! Template compiler
//!
//! Turns template source into a [`CompiledTemplate`]. Compilation runs the
//! registered extensions over the source, scans it (expanding custom
//! directives) and builds the node tree, validating block structure and
//! parsing every embedded expression up front.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    directives::{DirectiveHandler, DirectiveRegistry, ExtensionHook},
    error::{Result, TemplateError},
    expression,
    lexer::{self, Token},
    nodes::{Branch, CompiledTemplate, ConditionKind, Expression, LayoutRef, Node, TemplateKind},
};

/// Compiles template source using a registry of custom directives
#[derive(Debug, Default)]
pub struct Compiler {
    registry: RwLock<DirectiveRegistry>,
}

impl Compiler {
    /// Create a compiler with only the built-in directives
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom directive.
    ///
    /// The fingerprint records the directive name, not the handler body. When
    /// a handler's output changes between runs sharing a disk cache, bump
    /// [`Compiler::set_version`].
    pub fn directive<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let handler: DirectiveHandler = Arc::new(handler);
        self.registry.write().register(name, handler)?;
        debug!(directive = name, "Registered custom directive");
        Ok(())
    }

    /// Register a source extension
    pub fn extend<F>(&self, hook: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let hook: ExtensionHook = Arc::new(hook);
        self.registry.write().extend(hook);
    }

    /// Version of the registered handlers, mixed into the fingerprint
    pub fn set_version(&self, version: impl Into<String>) {
        let version = version.into();
        debug!(version = %version, "Set compiler version");
        self.registry.write().set_version(version);
    }

    /// Fingerprint of the current registry state
    pub fn fingerprint(&self) -> String {
        self.registry.read().fingerprint()
    }

    /// Names of the registered custom directives
    pub fn directive_names(&self) -> Vec<String> {
        self.registry.read().names().to_vec()
    }

    /// Compile template source
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate> {
        // Handlers run without holding the lock
        let registry = self.registry.read().clone();
        compile_with(&registry, source)
    }
}

/// Compile `source` against a snapshot of a registry
pub fn compile_with(registry: &DirectiveRegistry, source: &str) -> Result<CompiledTemplate> {
    let source = registry.apply_extensions(source);
    let tokens = lexer::tokenize(&source, registry)?;
    let mut builder = TreeBuilder {
        tokens,
        position: 0,
        layout: None,
        includes: Vec::new(),
        loop_depth: 0,
        block_depth: 0,
    };
    let (nodes, closer) = builder.parse_nodes(&[])?;
    debug_assert!(closer.is_none());

    Ok(CompiledTemplate {
        nodes,
        layout: builder.layout,
        includes: builder.includes,
        kind: TemplateKind::Compiled,
    })
}

/// How deeply block directives may nest
pub const MAX_BLOCK_DEPTH: usize = 128;

/// Directives that end or split a block
const CLOSERS: &[&str] = &[
    "elseif",
    "else",
    "endif",
    "endunless",
    "endisset",
    "endempty",
    "endforeach",
    "endforelse",
    "endsection",
    "stop",
    "show",
];

/// Directive that ended a block
struct Closer {
    name: String,
    args: Option<String>,
    line: usize,
}

struct TreeBuilder {
    tokens: Vec<Token>,
    position: usize,
    layout: Option<LayoutRef>,
    includes: Vec<String>,
    loop_depth: usize,
    block_depth: usize,
}

impl TreeBuilder {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Parse nodes until one of `expected` closes the block.
    ///
    /// At the top level `expected` is empty and the end of input is the only
    /// valid terminator.
    fn parse_nodes(&mut self, expected: &[&str]) -> Result<(Vec<Node>, Option<Closer>)> {
        let mut nodes = Vec::new();

        while let Some(token) = self.next() {
            match token {
                Token::Text(text) => push_text(&mut nodes, text),
                Token::Echo {
                    source,
                    line,
                    escape,
                } => {
                    let expr = parse_expression(&source, line)?;
                    nodes.push(Node::Echo { expr, escape });
                }
                Token::Directive { name, args, line } => {
                    let is_closer =
                        CLOSERS.contains(&name.as_str()) || (name == "empty" && args.is_none());
                    if is_closer {
                        if expected.contains(&name.as_str()) {
                            return Ok((nodes, Some(Closer { name, args, line })));
                        }
                        let message = match expected.last() {
                            Some(wanted) => format!("unexpected @{name}, expected @{wanted}"),
                            None => format!("unexpected @{name}"),
                        };
                        return Err(TemplateError::UnbalancedDirective { line, message });
                    }
                    if let Some(node) = self.parse_directive(&name, args, line)? {
                        nodes.push(node);
                    }
                }
            }
        }

        match expected.last() {
            Some(wanted) => Err(TemplateError::UnbalancedDirective {
                line: self.last_line(),
                message: format!("missing @{wanted}"),
            }),
            None => Ok((nodes, None)),
        }
    }

    fn last_line(&self) -> usize {
        self.tokens
            .iter()
            .rev()
            .find_map(|token| match token {
                Token::Echo { line, .. } | Token::Directive { line, .. } => Some(*line),
                Token::Text(_) => None,
            })
            .unwrap_or(1)
    }

    /// Parse a block body, tracking nesting for `@extends` placement
    fn parse_block(&mut self, expected: &[&str], opened: &str, line: usize) -> Result<(Vec<Node>, Closer)> {
        if self.block_depth >= MAX_BLOCK_DEPTH {
            return Err(TemplateError::UnbalancedDirective {
                line,
                message: format!("@{opened} nested more than {MAX_BLOCK_DEPTH} blocks deep"),
            });
        }
        self.block_depth += 1;
        let result = self.parse_nodes(expected);
        self.block_depth -= 1;
        let (nodes, closer) = result.map_err(|err| match err {
            TemplateError::UnbalancedDirective { message, .. } if message.starts_with("missing") => {
                TemplateError::UnbalancedDirective {
                    line,
                    message: format!("@{opened} is never closed"),
                }
            }
            other => other,
        })?;
        let closer = closer.ok_or_else(|| TemplateError::UnbalancedDirective {
            line,
            message: format!("@{opened} is never closed"),
        })?;
        Ok((nodes, closer))
    }

    fn parse_directive(&mut self, name: &str, args: Option<String>, line: usize) -> Result<Option<Node>> {
        let node = match name {
            "if" | "unless" | "isset" | "empty" => self.parse_conditional(name, args, line)?,
            "foreach" | "forelse" => self.parse_loop(name, args, line)?,
            "break" | "continue" => {
                if self.loop_depth == 0 {
                    return Err(invalid(name, line, "used outside of a loop"));
                }
                let condition = match args.as_deref() {
                    Some(source) if !source.is_empty() => Some(parse_expression(source, line)?),
                    _ => None,
                };
                if name == "break" {
                    Node::Break(condition)
                } else {
                    Node::Continue(condition)
                }
            }
            "include" | "includeIf" => {
                let mut exprs = parse_arguments(name, args, line, 1, 2)?.into_iter();
                let target = exprs.next().ok_or_else(|| invalid(name, line, "expects a view name"))?;
                if let Some(literal) = target.ast.as_str_literal() {
                    if !self.includes.iter().any(|existing| existing == literal) {
                        self.includes.push(literal.to_string());
                    }
                }
                Node::Include {
                    name: target,
                    data: exprs.next(),
                    if_exists: name == "includeIf",
                }
            }
            "extends" => {
                if self.layout.is_some() {
                    return Err(invalid(name, line, "may only be used once per template"));
                }
                if self.block_depth > 0 {
                    return Err(invalid(name, line, "must appear at the top level"));
                }
                let mut exprs = parse_arguments(name, args, line, 1, 2)?.into_iter();
                let layout_name = exprs
                    .next()
                    .and_then(|expr| expr.ast.as_str_literal().map(str::to_string))
                    .ok_or_else(|| invalid(name, line, "layout name must be a string literal"))?;
                self.layout = Some(LayoutRef {
                    name: layout_name,
                    data: exprs.next(),
                    line,
                });
                return Ok(None);
            }
            "section" => {
                let mut exprs = parse_arguments(name, args, line, 1, 2)?.into_iter();
                let section = literal_name(name, line, exprs.next())?;
                match exprs.next() {
                    Some(content) => Node::InlineSection {
                        name: section,
                        content,
                    },
                    None => {
                        let (body, closer) =
                            self.parse_block(&["endsection", "stop", "show"], name, line)?;
                        Node::Section {
                            name: section,
                            body,
                            show: closer.name == "show",
                        }
                    }
                }
            }
            "yield" => {
                let mut exprs = parse_arguments(name, args, line, 1, 2)?.into_iter();
                Node::Yield {
                    name: literal_name(name, line, exprs.next())?,
                    default: exprs.next(),
                }
            }
            "json" => {
                let mut exprs = parse_arguments(name, args, line, 1, 1)?.into_iter();
                let expr = exprs.next().ok_or_else(|| invalid(name, line, "expects a value"))?;
                Node::Json(expr)
            }
            "parent" => Node::Parent,
            // Already resolved by the scanner
            "verbatim" | "endverbatim" => return Ok(None),
            other => return Err(invalid(other, line, "is not a known directive")),
        };
        Ok(Some(node))
    }

    fn parse_conditional(&mut self, name: &str, args: Option<String>, line: usize) -> Result<Node> {
        let (kind, closer) = match name {
            "if" => (ConditionKind::Truthy, "endif"),
            "unless" => (ConditionKind::Falsy, "endunless"),
            "isset" => (ConditionKind::Isset, "endisset"),
            _ => (ConditionKind::Empty, "endempty"),
        };
        let mut condition = required_expression(name, args, line)?;
        let mut branch_kind = kind;
        let mut branches = Vec::new();

        loop {
            let expected: &[&str] = if kind == ConditionKind::Truthy {
                &["elseif", "else", "endif"]
            } else {
                &["else", closer]
            };
            let (body, end) = self.parse_block(expected, name, line)?;
            branches.push(Branch {
                kind: branch_kind,
                condition,
                body,
            });

            match end.name.as_str() {
                "elseif" => {
                    condition = required_expression("elseif", end.args, end.line)?;
                    branch_kind = ConditionKind::Truthy;
                }
                "else" => {
                    let (otherwise, _) = self.parse_block(&[closer], name, line)?;
                    return Ok(Node::Conditional {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                _ => {
                    return Ok(Node::Conditional {
                        branches,
                        otherwise: None,
                    })
                }
            }
        }
    }

    fn parse_loop(&mut self, name: &str, args: Option<String>, line: usize) -> Result<Node> {
        let source = args
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(name, line, "expects `$items as $item`"))?;
        let header = expression::parse_loop_header(&source).map_err(|message| {
            TemplateError::InvalidExpression {
                expression: source.clone(),
                line,
                message,
            }
        })?;
        let iterable = Expression {
            source: source.clone(),
            line,
            ast: header.iterable,
        };

        let closers: &[&str] = if name == "forelse" {
            &["empty", "endforelse"]
        } else {
            &["endforeach"]
        };
        self.loop_depth += 1;
        let body = self.parse_block(closers, name, line);
        self.loop_depth -= 1;
        let (body, closer) = body?;

        let empty = if closer.name == "empty" {
            Some(self.parse_block(&["endforelse"], name, line)?.0)
        } else if name == "forelse" {
            Some(Vec::new())
        } else {
            None
        };

        Ok(Node::Loop {
            iterable,
            key: header.key,
            value: header.value,
            body,
            empty,
        })
    }
}

fn push_text(nodes: &mut Vec<Node>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(existing)) = nodes.last_mut() {
        existing.push_str(&text);
    } else {
        nodes.push(Node::Text(text));
    }
}

fn invalid(name: &str, line: usize, message: &str) -> TemplateError {
    TemplateError::InvalidDirective {
        name: name.to_string(),
        line,
        message: message.to_string(),
    }
}

fn parse_expression(source: &str, line: usize) -> Result<Expression> {
    let ast = expression::parse(source).map_err(|message| TemplateError::InvalidExpression {
        expression: source.to_string(),
        line,
        message,
    })?;
    Ok(Expression {
        source: source.to_string(),
        line,
        ast,
    })
}

fn required_expression(name: &str, args: Option<String>, line: usize) -> Result<Expression> {
    match args {
        Some(source) if !source.is_empty() => parse_expression(&source, line),
        _ => Err(invalid(name, line, "expects an expression")),
    }
}

/// Parse a directive's argument list, checking the argument count
fn parse_arguments(
    name: &str,
    args: Option<String>,
    line: usize,
    min: usize,
    max: usize,
) -> Result<Vec<Expression>> {
    let source = args.unwrap_or_default();
    let parts = split_arguments(&source);
    if parts.len() < min || parts.len() > max {
        let expected = if min == max {
            format!("expects {min} argument(s), {} given", parts.len())
        } else {
            format!("expects {min} to {max} arguments, {} given", parts.len())
        };
        return Err(invalid(name, line, &expected));
    }
    parts
        .into_iter()
        .map(|part| parse_expression(part, line))
        .collect()
}

/// Split on commas outside of brackets, parentheses and string literals
fn split_arguments(source: &str) -> Vec<&str> {
    if source.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(source[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(source[start..].trim());
    parts
}

fn literal_name(directive: &str, line: usize, expr: Option<Expression>) -> Result<String> {
    expr.and_then(|expr| expr.ast.as_str_literal().map(str::to_string))
        .ok_or_else(|| invalid(directive, line, "section name must be a string literal"))
}

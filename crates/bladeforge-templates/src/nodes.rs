//! Compiled template representation
//!
//! The compiler turns template source into a tree of [`Node`]s. The tree is
//! what the compilation cache stores and what the renderer executes.

use serde::{Deserialize, Serialize};

use crate::expression::Expr;

/// An embedded expression with its source text and location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Source text, as written in the template
    pub source: String,
    /// 1-based line of the expression
    pub line: usize,
    /// Parsed form
    pub ast: Expr,
}

/// How a conditional branch tests its expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    /// `@if`, `@elseif`
    Truthy,
    /// `@unless`
    Falsy,
    /// `@isset`
    Isset,
    /// `@empty`
    Empty,
}

/// One tested branch of a conditional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Test applied to `condition`
    pub kind: ConditionKind,
    /// Tested expression
    pub condition: Expression,
    /// Nodes rendered when the test passes
    pub body: Vec<Node>,
}

/// Reference to a layout declared with `@extends`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRef {
    /// Layout view name
    pub name: String,
    /// Extra data passed to the layout
    pub data: Option<Expression>,
    /// Line of the `@extends`
    pub line: usize,
}

/// Compiled template node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Literal output
    Text(String),
    /// `{{ }}` (escaped) or `{!! !!}` (raw)
    Echo {
        /// Echoed expression
        expr: Expression,
        /// Whether HTML special characters are escaped
        escape: bool,
    },
    /// `@if` / `@unless` / `@isset` / `@empty` chains
    Conditional {
        /// Tested branches, in order
        branches: Vec<Branch>,
        /// `@else` body
        otherwise: Option<Vec<Node>>,
    },
    /// `@foreach` / `@forelse`
    Loop {
        /// Iterated expression
        iterable: Expression,
        /// Key variable name
        key: Option<String>,
        /// Value variable name
        value: String,
        /// Loop body
        body: Vec<Node>,
        /// `@forelse` empty branch
        empty: Option<Vec<Node>>,
    },
    /// `@break`, optionally conditional
    Break(Option<Expression>),
    /// `@continue`, optionally conditional
    Continue(Option<Expression>),
    /// `@include` / `@includeIf`
    Include {
        /// View name expression
        name: Expression,
        /// Extra data
        data: Option<Expression>,
        /// Skip silently when the view does not exist
        if_exists: bool,
    },
    /// `@section ... @endsection|@stop|@show`
    Section {
        /// Section name
        name: String,
        /// Section body
        body: Vec<Node>,
        /// Yield immediately after defining (`@show`)
        show: bool,
    },
    /// `@section('name', expr)`
    InlineSection {
        /// Section name
        name: String,
        /// Escaped content
        content: Expression,
    },
    /// `@yield('name', default)`
    Yield {
        /// Section name
        name: String,
        /// Escaped fallback content
        default: Option<Expression>,
    },
    /// `@parent`
    Parent,
    /// `@json(expr)`
    Json(Expression),
}

/// Whether a template went through the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateKind {
    /// Compiled from template syntax
    Compiled,
    /// Static file served verbatim
    Static,
}

/// Executable form of one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    /// Top-level nodes
    pub nodes: Vec<Node>,
    /// Layout declared with `@extends`
    pub layout: Option<LayoutRef>,
    /// Views included by literal name, in first-use order
    pub includes: Vec<String>,
    /// How the template was produced
    pub kind: TemplateKind,
}

impl CompiledTemplate {
    /// Wrap the contents of a static file
    pub fn from_static(content: impl Into<String>) -> Self {
        let content = content.into();
        let nodes = if content.is_empty() {
            Vec::new()
        } else {
            vec![Node::Text(content)]
        };
        Self {
            nodes,
            layout: None,
            includes: Vec::new(),
            kind: TemplateKind::Static,
        }
    }

    /// Names of views this template depends on statically, layout first
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.layout
            .iter()
            .map(|layout| layout.name.as_str())
            .chain(self.includes.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_template() {
        let template = CompiledTemplate::from_static("<p>hi</p>");
        assert_eq!(template.kind, TemplateKind::Static);
        assert_eq!(template.nodes, vec![Node::Text("<p>hi</p>".to_string())]);
        assert!(CompiledTemplate::from_static("").nodes.is_empty());
    }

    #[test]
    fn test_dependencies_list_layout_first() {
        let template = CompiledTemplate {
            nodes: Vec::new(),
            layout: Some(LayoutRef {
                name: "layouts.app".to_string(),
                data: None,
                line: 1,
            }),
            includes: vec!["partials.nav".to_string()],
            kind: TemplateKind::Compiled,
        };
        let deps: Vec<&str> = template.dependencies().collect();
        assert_eq!(deps, vec!["layouts.app", "partials.nav"]);
    }
}

//! Template scanner
//!
//! Splits template source into text, echoes and directives. Comments,
//! escaped echoes, `@@` and `@verbatim` blocks are resolved here, and custom
//! directives are expanded in place so the compiler only ever sees built-in
//! syntax.

use crate::{
    directives::{self, DirectiveRegistry},
    error::{Result, TemplateError},
};

/// How deep custom directive expansion may nest
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Scanned piece of template source
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Literal text
    Text(String),
    /// `{{ }}` or `{!! !!}`
    Echo {
        source: String,
        line: usize,
        escape: bool,
    },
    /// Built-in directive
    Directive {
        name: String,
        args: Option<String>,
        line: usize,
    },
}

/// Scan `source` into tokens
pub(crate) fn tokenize(source: &str, registry: &DirectiveRegistry) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        registry,
        tokens: Vec::new(),
    };
    lexer.scan(source, 1, 0)?;
    Ok(lexer.tokens)
}

struct Lexer<'r> {
    registry: &'r DirectiveRegistry,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Token::Text(existing)) = self.tokens.last_mut() {
            existing.push_str(text);
        } else {
            self.tokens.push(Token::Text(text.to_string()));
        }
    }

    fn scan(&mut self, source: &str, mut line: usize, depth: usize) -> Result<()> {
        let mut rest = source;
        let mut prev: Option<char> = None;

        while !rest.is_empty() {
            let Some(offset) = rest.find(['{', '@']) else {
                self.push_text(rest);
                break;
            };
            if offset > 0 {
                let (text, tail) = rest.split_at(offset);
                self.push_text(text);
                line += newlines(text);
                prev = text.chars().last();
                rest = tail;
            }

            if let Some(body) = rest.strip_prefix("{{--") {
                let end = body
                    .find("--}}")
                    .ok_or_else(|| unbalanced(line, "unclosed comment `{{--`"))?;
                line += newlines(&body[..end]);
                rest = &body[end + 4..];
                prev = Some('}');
                continue;
            }

            if let Some(body) = rest.strip_prefix("{!!") {
                let (expr, consumed) = scan_echo(body, "!!}")
                    .ok_or_else(|| unbalanced(line, "unclosed raw echo `{!!`"))?;
                self.tokens.push(Token::Echo {
                    source: expr.trim().to_string(),
                    line,
                    escape: false,
                });
                line += newlines(&body[..consumed]);
                rest = &body[consumed..];
                prev = Some('}');
                continue;
            }

            if let Some(body) = rest.strip_prefix("{{") {
                let (expr, consumed) =
                    scan_echo(body, "}}").ok_or_else(|| unbalanced(line, "unclosed echo `{{`"))?;
                self.tokens.push(Token::Echo {
                    source: expr.trim().to_string(),
                    line,
                    escape: true,
                });
                line += newlines(&body[..consumed]);
                rest = &body[consumed..];
                prev = Some('}');
                continue;
            }

            if rest.starts_with('{') {
                self.push_text("{");
                rest = &rest[1..];
                prev = Some('{');
                continue;
            }

            // Everything below starts with '@'
            if rest.starts_with("@{{") {
                self.push_text("{{");
                rest = &rest[3..];
                prev = Some('{');
                continue;
            }
            if rest.starts_with("@@") {
                self.push_text("@");
                rest = &rest[2..];
                prev = Some('@');
                continue;
            }

            let after_at = &rest[1..];
            let name_len = identifier_len(after_at);
            if name_len == 0 || prev.is_some_and(is_word_char) {
                self.push_text("@");
                rest = after_at;
                prev = Some('@');
                continue;
            }

            let name = &after_at[..name_len];
            let after_name = &after_at[name_len..];

            if name == "verbatim" {
                let end = after_name
                    .find("@endverbatim")
                    .ok_or_else(|| unbalanced(line, "@verbatim without @endverbatim"))?;
                let inner = &after_name[..end];
                self.push_text(inner);
                line += newlines(inner);
                rest = &after_name[end + "@endverbatim".len()..];
                prev = None;
                continue;
            }

            let custom = self.registry.get(name).cloned();
            let takes_args = custom.is_some() || directives::DIRECTIVES_WITH_ARGS.contains(&name);
            if custom.is_none() && !directives::is_builtin(name) {
                self.push_text(&rest[..1 + name_len]);
                rest = after_name;
                prev = name.chars().last();
                continue;
            }

            let (args, consumed) = if takes_args {
                scan_arguments(after_name).map_err(|_| {
                    unbalanced(line, &format!("unclosed argument list of @{name}"))
                })?
            } else {
                (None, 0)
            };
            let directive_line = line;
            line += newlines(&after_name[..consumed]);
            rest = &after_name[consumed..];
            // Directives may follow each other directly
            prev = None;

            match custom {
                Some(handler) => {
                    if depth >= MAX_EXPANSION_DEPTH {
                        return Err(TemplateError::DirectiveRecursion {
                            name: name.to_string(),
                            limit: MAX_EXPANSION_DEPTH,
                        });
                    }
                    let fragment = handler(args.as_deref().unwrap_or(""));
                    self.scan(&fragment, directive_line, depth + 1)?;
                }
                None => self.tokens.push(Token::Directive {
                    name: name.to_string(),
                    args,
                    line: directive_line,
                }),
            }
        }

        Ok(())
    }
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn identifier_len(input: &str) -> usize {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c == '_' || c.is_alphabetic() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !is_word_char(*c))
        .map_or(input.len(), |(i, _)| i)
}

fn newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

fn unbalanced(line: usize, message: &str) -> TemplateError {
    TemplateError::UnbalancedDirective {
        line,
        message: message.to_string(),
    }
}

/// Find `close` outside of string literals; returns the inner text and the
/// number of bytes consumed including the delimiter
fn scan_echo<'s>(body: &'s str, close: &str) -> Option<(&'s str, usize)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
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
        if c == '\'' || c == '"' {
            quote = Some(c);
        } else if body[i..].starts_with(close) {
            return Some((&body[..i], i + close.len()));
        }
    }
    None
}

/// Scan an optional parenthesised argument after a directive name.
///
/// Spaces and tabs may separate the name from `(`. Returns the trimmed inner
/// text and the bytes consumed; `Err` when the parenthesis is never closed.
fn scan_arguments(input: &str) -> std::result::Result<(Option<String>, usize), ()> {
    let gap = input.len() - input.trim_start_matches([' ', '\t']).len();
    let candidate = &input[gap..];
    if !candidate.starts_with('(') {
        return Ok((None, 0));
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in candidate.char_indices() {
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
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let inner = candidate[1..i].trim().to_string();
                    return Ok((Some(inner), gap + i + 1));
                }
            }
            _ => {}
        }
    }
    Err(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        tokenize(source, &DirectiveRegistry::new()).unwrap()
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    fn directive(name: &str, args: Option<&str>, line: usize) -> Token {
        Token::Directive {
            name: name.to_string(),
            args: args.map(str::to_string),
            line,
        }
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(scan("hello world"), vec![text("hello world")]);
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_echoes() {
        assert_eq!(
            scan("a {{ $x }} b {!! $y !!}"),
            vec![
                text("a "),
                Token::Echo {
                    source: "$x".to_string(),
                    line: 1,
                    escape: true
                },
                text(" b "),
                Token::Echo {
                    source: "$y".to_string(),
                    line: 1,
                    escape: false
                },
            ]
        );
    }

    #[test]
    fn test_echo_close_inside_string_is_ignored() {
        let tokens = scan("{{ '}}' }}");
        assert_eq!(
            tokens,
            vec![Token::Echo {
                source: "'}}'".to_string(),
                line: 1,
                escape: true
            }]
        );
    }

    #[test]
    fn test_comments_and_escapes() {
        assert_eq!(scan("a{{-- gone --}}b"), vec![text("ab")]);
        assert_eq!(scan("@{{ name }}"), vec![text("{{ name }}")]);
        assert_eq!(scan("@@if"), vec![text("@if")]);
        assert_eq!(
            scan("@verbatim {{ $x }} @if @endverbatim"),
            vec![text(" {{ $x }} @if ")]
        );
    }

    #[test]
    fn test_directives_with_lines() {
        assert_eq!(
            scan("line1\n@if ($a)\nx\n@endif"),
            vec![
                text("line1\n"),
                directive("if", Some("$a"), 2),
                text("\nx\n"),
                directive("endif", None, 4),
            ]
        );
    }

    #[test]
    fn test_nested_parentheses_and_quotes() {
        assert_eq!(
            scan("@if(count($a) > 0 && $b == ')')"),
            vec![directive("if", Some("count($a) > 0 && $b == ')'"), 1)]
        );
    }

    #[test]
    fn test_unknown_directive_and_email_stay_literal() {
        assert_eq!(scan("@media (x)"), vec![text("@media (x)")]);
        assert_eq!(scan("me@example.com"), vec![text("me@example.com")]);
    }

    #[test]
    fn test_no_arg_directive_leaves_parentheses() {
        assert_eq!(
            scan("@else (note)"),
            vec![directive("else", None, 1), text(" (note)")]
        );
    }

    #[test]
    fn test_back_to_back_directives() {
        assert_eq!(
            scan("@endif@endforeach"),
            vec![directive("endif", None, 1), directive("endforeach", None, 1)]
        );
    }

    #[test]
    fn test_unterminated_constructs() {
        let registry = DirectiveRegistry::new();
        for source in ["{{ $a", "{!! $a", "{{-- x", "@if($a", "@verbatim x"] {
            assert!(
                matches!(
                    tokenize(source, &registry),
                    Err(TemplateError::UnbalancedDirective { .. })
                ),
                "{source}"
            );
        }
    }

    #[test]
    fn test_custom_directive_expansion() {
        let mut registry = DirectiveRegistry::new();
        registry
            .register("upper", Arc::new(|arg: &str| format!("{{{{ strtoupper({arg}) }}}}")))
            .unwrap();
        let tokens = tokenize("x @upper($name)", &registry).unwrap();
        assert_eq!(
            tokens,
            vec![
                text("x "),
                Token::Echo {
                    source: "strtoupper($name)".to_string(),
                    line: 1,
                    escape: true
                }
            ]
        );
    }

    #[test]
    fn test_custom_directive_recursion_is_capped() {
        let mut registry = DirectiveRegistry::new();
        registry
            .register("loop", Arc::new(|_: &str| "@loop".to_string()))
            .unwrap();
        assert!(matches!(
            tokenize("@loop", &registry),
            Err(TemplateError::DirectiveRecursion { limit: MAX_EXPANSION_DEPTH, .. })
        ));
    }
}

//! Sutra Parser
//!
//! Converts Sutra source code into Abstract Syntax Tree nodes with source location tracking.
//! This parser is purely syntactic; special forms are recognized by the evaluator.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::diagnostics::SourceArc;
use crate::syntax::{AstNode, Expr, Span};
use crate::{err_src, SutraError};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct SutraParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse Sutra source code into AST nodes.
///
/// `source` names the file for diagnostics; its text must be `source_text`.
pub fn parse(source_text: &str, source: &SourceArc) -> Result<Vec<AstNode>, SutraError> {
    if source_text.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut pairs = SutraParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, source))?;

    let Some(program) = pairs.next() else {
        return Ok(vec![]);
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_ast_node(p, source))
        .collect()
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_ast_node(pair: Pair<Rule>, source: &SourceArc) -> Result<AstNode, SutraError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::number => {
            let text = pair.as_str();
            let value = text.parse::<f64>().map_err(|_| {
                err_src!(Parse, format!("invalid number literal '{}'", text), source, span)
            })?;
            Ok(AstNode::new(Expr::Number(value), span))
        }

        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            let content = unescape_string(raw, source, span)?;
            Ok(AstNode::new(Expr::String(content), span))
        }

        Rule::keyword => {
            let name = &pair.as_str()[1..];
            Ok(AstNode::new(Expr::Keyword(name.to_string()), span))
        }

        Rule::symbol => {
            let expr = match pair.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "nil" => Expr::Nil,
                text => Expr::Symbol(text.to_string()),
            };
            Ok(AstNode::new(expr, span))
        }

        Rule::list => {
            let children = pair
                .into_inner()
                .map(|p| build_ast_node(p, source))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AstNode::new(Expr::List(children), span))
        }

        Rule::quote => {
            let inner = pair.into_inner().next().ok_or_else(|| {
                err_src!(Parse, "expected an expression after quote", source, span)
            })?;
            let quoted = build_ast_node(inner, source)?;
            Ok(AstNode::new(Expr::Quote(Box::new(quoted)), span))
        }

        rule => Err(err_src!(
            Parse,
            format!("unsupported rule: {:?}", rule),
            source,
            span
        )),
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn get_span(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn unescape_string(inner: &str, source: &SourceArc, span: Span) -> Result<String, SutraError> {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                return Err(err_src!(
                    Parse,
                    format!("unknown escape sequence '\\{}'", other),
                    source,
                    span
                ))
            }
            None => return Err(err_src!(Parse, "dangling escape at end of string", source, span)),
        }
    }

    Ok(result)
}

fn convert_parse_error(error: Error<Rule>, source: &SourceArc) -> SutraError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span {
            start: pos,
            end: pos,
        },
        pest::error::InputLocation::Span((start, end)) => Span { start, end },
    };
    let (line, col) = match error.line_col {
        pest::error::LineColLocation::Pos(pos) => pos,
        pest::error::LineColLocation::Span(start, _) => start,
    };

    let rendered = error.to_string();
    let message = if rendered.contains("string_inner") {
        "missing closing quote"
    } else if span.start >= source.inner().len() {
        "unexpected end of input (missing closing parenthesis?)"
    } else {
        "unexpected token"
    };

    err_src!(
        Parse,
        format!("{} at line {}, column {}", message, line, col),
        source,
        span
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{to_error_source, ErrorType};

    fn parse_str(text: &str) -> Result<Vec<AstNode>, SutraError> {
        parse(text, &to_error_source("test.sutra", text))
    }

    #[test]
    fn empty_input_has_no_nodes() {
        assert!(parse_str("  ; only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn literals_and_symbols() {
        let nodes = parse_str(r#"42 -2.5 "a\"b" :to-be nil true foo/bar"#).unwrap();
        let exprs: Vec<Expr> = nodes.iter().map(|n| (*n.value).clone()).collect();
        assert_eq!(
            exprs,
            vec![
                Expr::Number(42.0),
                Expr::Number(-2.5),
                Expr::String("a\"b".to_string()),
                Expr::Keyword("to-be".to_string()),
                Expr::Nil,
                Expr::Bool(true),
                Expr::Symbol("foo/bar".to_string()),
            ]
        );
    }

    #[test]
    fn minus_alone_is_a_symbol() {
        let nodes = parse_str("(- 5 3)").unwrap();
        let Expr::List(items) = &*nodes[0].value else {
            panic!("expected list");
        };
        assert_eq!(items[0].value.as_symbol(), Some("-"));
        assert_eq!(*items[1].value, Expr::Number(5.0));
    }

    #[test]
    fn brackets_and_commas() {
        let nodes = parse_str("[1, 2, 3]").unwrap();
        assert_eq!(nodes[0].value.pretty(), "(1 2 3)");
    }

    #[test]
    fn spans_cover_the_form() {
        let nodes = parse_str("  (it \"x\")").unwrap();
        assert_eq!(nodes[0].span, Span { start: 2, end: 10 });
    }

    #[test]
    fn unmatched_paren_reports_location() {
        let err = parse_str("(describe \"a\"\n  (it \"b\"").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Parse);
        assert!(err.to_string().contains("line 2"), "{}", err);
    }
}

//! Unit script parser.
//!
//! Converts source text into spanned AST nodes. Purely syntactic: no symbol
//! resolution and no arity checks happen here.

use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::script::ast::{make_node, AstNode, Expr, Span};
use crate::script::error::{to_source_span, ErrorKind, ErrorReporting, ScriptError, SourceContext};

#[derive(Parser)]
#[grammar = "script/grammar.pest"]
struct UnitParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse unit source code into top-level AST nodes.
pub fn parse(source_text: &str, source: &SourceContext) -> Result<Vec<AstNode>, ScriptError> {
    if source_text.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut pairs = UnitParser::parse(Rule::program, source_text)
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

fn build_ast_node(pair: Pair<Rule>, source: &SourceContext) -> Result<AstNode, ScriptError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::expr | Rule::atom => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| source.missing_element("expression", to_source_span(span)))?;
            build_ast_node(inner, source)
        }

        Rule::integer => {
            let text = pair.as_str();
            let value = text
                .parse::<i64>()
                .map_err(|_| invalid_literal(source, "integer", text, span))?;
            Ok(make_node(Expr::Int(value), span))
        }

        Rule::float => {
            let text = pair.as_str();
            let value = text
                .parse::<f64>()
                .map_err(|_| invalid_literal(source, "float", text, span))?;
            Ok(make_node(Expr::Float(value), span))
        }

        Rule::boolean => Ok(make_node(Expr::Bool(pair.as_str() == "true"), span)),

        Rule::nil => Ok(make_node(Expr::Nil, span)),

        Rule::string => {
            let content = unescape_string(pair.as_str());
            Ok(make_node(Expr::String(content), span))
        }

        Rule::symbol => build_symbol(pair.as_str(), span, source),

        Rule::list => {
            let children: Result<Vec<_>, _> = pair
                .into_inner()
                .map(|p| build_ast_node(p, source))
                .collect();
            Ok(make_node(Expr::List(children?), span))
        }

        rule => Err(source.malformed(&format!("unsupported rule: {:?}", rule), to_source_span(span))),
    }
}

fn build_symbol(text: &str, span: Span, source: &SourceContext) -> Result<AstNode, ScriptError> {
    if !text.contains('.') {
        return Ok(make_node(Expr::Symbol(text.to_string()), span));
    }

    let components: Vec<String> = text.split('.').map(String::from).collect();
    if components.iter().any(|c| c.is_empty()) {
        return Err(source.report(
            ErrorKind::InvalidPath { path: text.into() },
            to_source_span(span),
        ));
    }

    let mut components = components.into_iter();
    let base = components.next().unwrap_or_default();
    Ok(make_node(Expr::Attr(base, components.collect()), span))
}

// ============================================================================
// HELPERS
// ============================================================================

fn get_span(pair: &Pair<Rule>) -> Span {
    let s = pair.as_span();
    Span {
        start: s.start(),
        end: s.end(),
    }
}

fn invalid_literal(source: &SourceContext, literal_type: &str, text: &str, span: Span) -> ScriptError {
    source.report(
        ErrorKind::InvalidLiteral {
            literal_type: literal_type.into(),
            value: text.into(),
        },
        to_source_span(span),
    )
}

/// Strips the surrounding quotes and resolves escape sequences.
fn unescape_string(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

fn convert_parse_error(error: pest::error::Error<Rule>, source: &SourceContext) -> ScriptError {
    let (start, end) = match error.location {
        InputLocation::Pos(pos) => (pos, pos),
        InputLocation::Span((start, end)) => (start, end),
    };
    let found = source
        .content
        .get(start..)
        .and_then(|rest| rest.chars().next())
        .map(|c| format!("'{}'", c))
        .unwrap_or_else(|| "end of input".to_string());

    let mut diagnostic = source.report(
        ErrorKind::UnexpectedToken {
            expected: describe_expected(&error.variant),
            found,
        },
        to_source_span(Span { start, end }),
    );
    diagnostic.help = Some("check for unbalanced parentheses or unterminated strings".into());
    diagnostic
}

fn describe_expected(variant: &pest::error::ErrorVariant<Rule>) -> String {
    match variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => positives
            .iter()
            .map(|r| format!("{:?}", r))
            .collect::<Vec<_>>()
            .join(" or "),
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(text: &str) -> Result<Vec<AstNode>, ScriptError> {
        parse(text, &SourceContext::from_file("test", text))
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_str("   ; only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_literals() {
        let nodes = parse_str(r#"42 -7 2.5 "a\"b" true nil"#).unwrap();
        let exprs: Vec<Expr> = nodes.iter().map(|n| (*n.value).clone()).collect();
        assert_eq!(
            exprs,
            vec![
                Expr::Int(42),
                Expr::Int(-7),
                Expr::Float(2.5),
                Expr::String("a\"b".into()),
                Expr::Bool(true),
                Expr::Nil,
            ]
        );
    }

    #[test]
    fn test_dotted_symbol_is_attribute_path() {
        let nodes = parse_str("self.history").unwrap();
        assert_eq!(
            *nodes[0].value,
            Expr::Attr("self".into(), vec!["history".into()])
        );
    }

    #[test]
    fn test_minus_alone_is_symbol() {
        let nodes = parse_str("(- 5 3)").unwrap();
        let items = nodes[0].value.as_list().unwrap();
        assert_eq!(items[0].value.as_symbol(), Some("-"));
    }

    #[test]
    fn test_unmatched_paren() {
        assert!(parse_str("(define x 1").is_err());
    }

    #[test]
    fn test_empty_path_component_rejected() {
        let err = parse_str("self..x").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidPath { .. }));
    }
}

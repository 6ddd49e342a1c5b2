//! Reader - converts Lisp source text into symbolic expression trees.
//!
//! The reader is purely syntactic. Reader shorthands are expanded to their
//! list forms (`'x` reads as `(quote x)`, `#'f` as `(function f)`), so the
//! rewriter only ever sees lists and atoms.

use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::diagnostics::to_error_source;
use crate::syntax::{make_list, make_symbol, spanned, AstNode, Expr, Span};
use crate::{err_msg, NamesError};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct LispParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse source text into top-level forms.
pub fn parse(source_text: &str) -> Result<Vec<AstNode>, NamesError> {
    parse_named("source", source_text)
}

/// Parse source text, naming it `name` in diagnostics.
pub fn parse_named(name: &str, source_text: &str) -> Result<Vec<AstNode>, NamesError> {
    if source_text.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut pairs = LispParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, name, source_text))?;

    let Some(program) = pairs.next() else {
        return Ok(vec![]);
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_ast_node)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.with_source(name, source_text))
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_ast_node(pair: Pair<Rule>) -> Result<AstNode, NamesError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::quote => build_shorthand("quote", pair, span),
        Rule::function_quote => build_shorthand("function", pair, span),
        Rule::backquote => build_shorthand("`", pair, span),
        Rule::unquote => build_shorthand(",", pair, span),
        Rule::splice => build_shorthand(",@", pair, span),

        Rule::list => build_list(pair, span),

        Rule::vector => {
            let items = pair
                .into_inner()
                .map(build_ast_node)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(spanned(Expr::Vector(items), span))
        }

        Rule::string => {
            let inner = pair.into_inner().next().map_or("", |p| p.as_str());
            Ok(spanned(Expr::String(unescape(inner)), span))
        }

        Rule::char_lit => {
            let text = &pair.as_str()[1..];
            let c = read_char(text)
                .ok_or_else(|| err_msg!(Parse, "Invalid character literal '?{}'", text).at(span))?;
            Ok(spanned(Expr::Char(c), span))
        }

        Rule::number => build_number(pair, span),

        Rule::symbol => Ok(make_symbol(unescape_symbol(pair.as_str()), span)),

        rule => Err(err_msg!(Internal, "Unsupported grammar rule: {:?}", rule).at(span)),
    }
}

fn build_shorthand(head: &str, pair: Pair<Rule>, span: Span) -> Result<AstNode, NamesError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| err_msg!(Parse, "Expected an expression after '{}'", head).at(span))?;
    let quoted = build_ast_node(inner)?;
    let head_span = Span {
        start: span.start,
        end: quoted.span.start,
    };
    Ok(make_list(vec![make_symbol(head, head_span), quoted], span))
}

fn build_list(pair: Pair<Rule>, span: Span) -> Result<AstNode, NamesError> {
    let mut items = Vec::new();
    let mut inner = pair.into_inner();

    while let Some(child) = inner.next() {
        if child.as_rule() != Rule::dot {
            items.push(build_ast_node(child)?);
            continue;
        }
        // Grammar guarantees exactly one expression after the dot.
        let tail = inner
            .next()
            .ok_or_else(|| err_msg!(Parse, "Expected an expression after '.'").at(span))?;
        let tail = build_ast_node(tail)?;
        if items.is_empty() {
            return Err(err_msg!(Parse, "Dotted list needs at least one element before '.'").at(span));
        }
        return Ok(spanned(Expr::Dotted(items, tail), span));
    }

    Ok(make_list(items, span))
}

fn build_number(pair: Pair<Rule>, span: Span) -> Result<AstNode, NamesError> {
    let text = pair.as_str();
    let is_float = pair.into_inner().any(|p| p.as_rule() == Rule::float);

    if is_float {
        let value = text
            .parse::<f64>()
            .map_err(|_| err_msg!(Parse, "Invalid float literal '{}'", text).at(span))?;
        return Ok(spanned(Expr::Float(value), span));
    }

    let value = text
        .trim_end_matches('.')
        .parse::<i64>()
        .map_err(|_| err_msg!(Parse, "Integer literal '{}' is out of range", text).at(span))?;
    Ok(spanned(Expr::Integer(value), span))
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

fn convert_parse_error(error: pest::error::Error<Rule>, name: &str, source: &str) -> NamesError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span {
            start: pos,
            end: pos,
        },
        InputLocation::Span((start, end)) => Span { start, end },
    };
    let message = match &error.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if positives.is_empty() => {
            "Unexpected input".to_string()
        }
        pest::error::ErrorVariant::ParsingError { positives, .. } => {
            let expected = positives
                .iter()
                .map(|r| format!("{:?}", r))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Unexpected input, expected one of: {}", expected)
        }
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
    };
    let mut err = err_msg!(Parse, "{}", message).at(span);
    if source[span.start.min(source.len())..].is_empty() {
        err = err.with_help("The input ended early; check for an unclosed '(' or '\"'.");
    }
    err.with_context_source(to_error_source(name, source))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('e') => out.push('\u{1b}'),
            Some('s') => out.push(' '),
            // Escaped newline is a line continuation.
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn unescape_symbol(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

fn read_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(first);
    }
    Some(match chars.next()? {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        's' => ' ',
        'e' => '\u{1b}',
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_strings() {
        assert_eq!(unescape(r#"a\"b\n"#), "a\"b\n");
        assert_eq!(unescape("line\\\nnext"), "linenext");
    }

    #[test]
    fn symbol_escapes_are_removed() {
        assert_eq!(unescape_symbol(r"a\ b"), "a b");
    }

    #[test]
    fn reads_character_escapes() {
        assert_eq!(read_char("a"), Some('a'));
        assert_eq!(read_char("\\n"), Some('\n'));
        assert_eq!(read_char("\\("), Some('('));
    }
}

//! # Standard Macro Library
//!
//! Native macros every [`Environment`](super::Environment) starts with. They
//! expand into the core special forms (`if`, `progn`, `setq`) so that the
//! rewriter sees through them exactly as it would in a real host.

use crate::host::template::MacroDef;
use crate::syntax::{make_list, make_symbol, AstNode};
use crate::{err_span, NamesError};

// ---
// Registry
// ---

/// Returns all standard macros by name.
pub fn std_macros() -> Vec<(&'static str, MacroDef)> {
    vec![
        ("when", MacroDef::Fn(expand_when)),
        ("unless", MacroDef::Fn(expand_unless)),
        ("push", MacroDef::Fn(expand_push)),
    ]
}

// ---
// Conditionals
// ---

/// (when COND BODY...) => (if COND (progn BODY...))
fn expand_when(call: &AstNode) -> Result<AstNode, NamesError> {
    let (cond, body) = split_condition(call, "when")?;
    let span = call.span;
    Ok(make_list(
        vec![make_symbol("if", span), cond, progn(body, call)],
        span,
    ))
}

/// (unless COND BODY...) => (if COND nil BODY...)
fn expand_unless(call: &AstNode) -> Result<AstNode, NamesError> {
    let (cond, body) = split_condition(call, "unless")?;
    let span = call.span;
    let mut items = vec![make_symbol("if", span), cond, make_symbol("nil", span)];
    items.extend(body.iter().cloned());
    Ok(make_list(items, span))
}

// ---
// Places
// ---

/// (push NEWELT PLACE) => (setq PLACE (cons NEWELT PLACE))
///
/// Only symbol places are supported.
fn expand_push(call: &AstNode) -> Result<AstNode, NamesError> {
    let args = call_args(call);
    let [newelt, place] = args else {
        return Err(err_span!(
            HostExpansion,
            call.span,
            "push expects 2 arguments, received {}",
            args.len()
        ));
    };
    if place.value.as_symbol().is_none() {
        return Err(err_span!(
            HostExpansion,
            place.span,
            "push only supports symbol places, found a {}",
            place.value.type_name()
        ));
    }
    let span = call.span;
    let cons = make_list(
        vec![make_symbol("cons", span), newelt.clone(), place.clone()],
        span,
    );
    Ok(make_list(
        vec![make_symbol("setq", span), place.clone(), cons],
        span,
    ))
}

// ---
// Helpers
// ---

fn call_args(call: &AstNode) -> &[AstNode] {
    call.value
        .as_list()
        .and_then(|items| items.get(1..))
        .unwrap_or_default()
}

fn split_condition<'a>(call: &'a AstNode, name: &str) -> Result<(AstNode, &'a [AstNode]), NamesError> {
    let Some((cond, body)) = call_args(call).split_first() else {
        return Err(err_span!(
            HostExpansion,
            call.span,
            "{} expects a condition",
            name
        ));
    };
    Ok((cond.clone(), body))
}

fn progn(body: &[AstNode], call: &AstNode) -> AstNode {
    let mut items = vec![make_symbol("progn", call.span)];
    items.extend(body.iter().cloned());
    make_list(items, call.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse;

    fn expand(f: fn(&AstNode) -> Result<AstNode, NamesError>, src: &str) -> String {
        let call = parse(src).unwrap().remove(0);
        f(&call).unwrap().value.pretty()
    }

    #[test]
    fn when_wraps_body_in_progn() {
        assert_eq!(expand(expand_when, "(when a (b) c)"), "(if a (progn (b) c))");
    }

    #[test]
    fn unless_puts_body_in_else_branch() {
        assert_eq!(expand(expand_unless, "(unless a b)"), "(if a nil b)");
    }

    #[test]
    fn push_onto_symbol_place() {
        assert_eq!(expand(expand_push, "(push x stack)"), "(setq stack (cons x stack))");
    }

    #[test]
    fn push_rejects_generalized_places() {
        let call = parse("(push x (car y))").unwrap().remove(0);
        assert!(expand_push(&call).is_err());
    }
}

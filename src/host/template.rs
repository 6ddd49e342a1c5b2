//! Declarative macros for the in-memory host.
//!
//! A template macro is defined by `(defmacro NAME ARGS TEMPLATE)`. Expansion
//! is purely syntactic: arguments are bound to parameters and substituted into
//! the template. Two template styles are understood:
//!
//! - **Plain**: every parameter symbol in the template is replaced by its
//!   argument; a `&rest` parameter appearing as a list element is spliced
//!   into the enclosing list. Quoted sub-forms are left alone.
//! - **Backquoted**: `` `(list ,x ,@rest) `` substitutes only the unquoted
//!   parameters, like the host language's own quasiquote.
//!
//! Example:
//!   (defmacro twice (x) `(list ,x ,x))
//!   (twice (f 1)) => (list (f 1) (f 1))

use std::collections::{HashMap, HashSet};

use crate::syntax::{make_list, make_symbol, spanned, AstNode, Expr, Span};
use crate::{err_span, NamesError};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A native macro is a Rust function that transforms one call form.
pub type MacroFn = fn(&AstNode) -> Result<AstNode, NamesError>;

/// Parameter list of a template macro: `(a b &optional c &rest body)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamList {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub rest: Option<String>,
    pub span: Span,
}

/// A declarative macro defined by a template.
#[derive(Debug, Clone)]
pub struct MacroTemplate {
    pub params: ParamList,
    pub body: AstNode,
}

/// A macro known to the host, either native or declarative.
#[derive(Debug, Clone)]
pub enum MacroDef {
    Fn(MacroFn),
    Template(MacroTemplate),
}

/// What a parameter is bound to during substitution.
#[derive(Debug, Clone)]
enum Bound {
    Single(AstNode),
    Splice(Vec<AstNode>),
}

// ============================================================================
// PUBLIC API
// ============================================================================

impl ParamList {
    /// Reads a macro argument list. `nil` and `()` are the empty list.
    pub fn parse(arglist: &AstNode) -> Result<Self, NamesError> {
        let span = arglist.span;
        let mut params = ParamList {
            required: vec![],
            optional: vec![],
            rest: None,
            span,
        };
        if arglist.value.is_nil() {
            return Ok(params);
        }
        let Some(items) = arglist.value.as_list() else {
            return Err(err_span!(
                MalformedForm,
                span,
                "Macro argument list must be a list, found a {}",
                arglist.value.type_name()
            ));
        };

        let mut optional = false;
        let mut iter = items.iter();
        while let Some(item) = iter.next() {
            let Some(name) = item.value.as_symbol() else {
                return Err(err_span!(
                    MalformedForm,
                    item.span,
                    "Macro parameters must be symbols, found a {}",
                    item.value.type_name()
                ));
            };
            match name {
                "&optional" => optional = true,
                "&rest" | "&body" => {
                    let rest = iter.next().and_then(|n| n.value.as_symbol()).ok_or_else(|| {
                        err_span!(MalformedForm, item.span, "'{}' must be followed by a symbol", name)
                    })?;
                    params.rest = Some(rest.to_string());
                    if let Some(extra) = iter.next() {
                        return Err(err_span!(
                            MalformedForm,
                            extra.span,
                            "Nothing may follow the rest parameter '{}'",
                            rest
                        ));
                    }
                }
                _ if optional => params.optional.push(name.to_string()),
                _ => params.required.push(name.to_string()),
            }
        }
        Ok(params)
    }

    fn all_names(&self) -> impl Iterator<Item = &String> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .chain(self.rest.iter())
    }
}

impl MacroTemplate {
    /// Constructs a MacroTemplate with validation for duplicate parameters.
    pub fn new(params: ParamList, body: AstNode) -> Result<Self, NamesError> {
        check_no_duplicate_params(&params)?;
        Ok(MacroTemplate { params, body })
    }

    /// Expands `call` (the whole `(name args...)` form) one step.
    pub fn expand(&self, call: &AstNode) -> Result<AstNode, NamesError> {
        let Some(items) = call.value.as_list().filter(|items| !items.is_empty()) else {
            return Err(err_span!(
                HostExpansion,
                call.span,
                "Template macro must be called as a list"
            ));
        };
        let args = &items[1..];
        check_arity(args.len(), &self.params, call.span)?;
        let bindings = bind_macro_params(args, &self.params, call.span);

        match backquoted(&self.body) {
            Some(template) => substitute_backquote(template, &bindings, call.span),
            None => Ok(substitute_plain(&self.body, &bindings, call.span)),
        }
    }
}

/// Checks the number of arguments against the parameter list.
pub fn check_arity(args_len: usize, params: &ParamList, span: Span) -> Result<(), NamesError> {
    let min = params.required.len();
    let max = min + params.optional.len();
    if args_len < min || (params.rest.is_none() && args_len > max) {
        return Err(err_span!(
            HostExpansion,
            span,
            "Macro arity mismatch: {}, but received {}",
            describe_arity(params),
            args_len
        )
        .with_help(build_param_info_string(params)));
    }
    Ok(())
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn check_no_duplicate_params(params: &ParamList) -> Result<(), NamesError> {
    let mut seen = HashSet::new();
    for name in params.all_names() {
        if !seen.insert(name) {
            return Err(err_span!(
                MalformedForm,
                params.span,
                "Duplicate parameter name '{}' in macro definition",
                name
            ));
        }
    }
    Ok(())
}

fn describe_arity(params: &ParamList) -> String {
    let min = params.required.len();
    let max = min + params.optional.len();
    match (&params.rest, min == max) {
        (Some(_), _) => format!("expected at least {} argument{}", min, pluralize(min)),
        (None, true) => format!("expected exactly {} argument{}", min, pluralize(min)),
        (None, false) => format!("expected {} to {} arguments", min, max),
    }
}

fn build_param_info_string(params: &ParamList) -> String {
    let mut parts = params.required.clone();
    if !params.optional.is_empty() {
        parts.push("&optional".to_string());
        parts.extend(params.optional.iter().cloned());
    }
    if let Some(rest) = &params.rest {
        parts.push("&rest".to_string());
        parts.push(rest.clone());
    }
    format!("Macro parameters: ({})", parts.join(" "))
}

fn pluralize(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn bind_macro_params(args: &[AstNode], params: &ParamList, span: Span) -> HashMap<String, Bound> {
    let mut bindings = HashMap::new();
    let mut args_iter = args.iter();

    for name in &params.required {
        if let Some(arg) = args_iter.next() {
            bindings.insert(name.clone(), Bound::Single(arg.clone()));
        }
    }
    for name in &params.optional {
        let arg = args_iter
            .next()
            .cloned()
            .unwrap_or_else(|| make_symbol("nil", span));
        bindings.insert(name.clone(), Bound::Single(arg));
    }

    let Some(rest) = &params.rest else {
        return bindings;
    };
    bindings.insert(rest.clone(), Bound::Splice(args_iter.cloned().collect()));
    bindings
}

/// Returns the template under a leading backquote, if there is one.
fn backquoted(body: &AstNode) -> Option<&AstNode> {
    match body.value.as_list()? {
        [head, template] if head.value.as_symbol() == Some("`") => Some(template),
        _ => None,
    }
}

fn bound_as_node(bound: &Bound, span: Span) -> AstNode {
    match bound {
        Bound::Single(node) => node.clone(),
        Bound::Splice(items) => make_list(items.clone(), span),
    }
}

fn substitute_plain(expr: &AstNode, bindings: &HashMap<String, Bound>, span: Span) -> AstNode {
    match &*expr.value {
        Expr::Symbol(name) => bindings
            .get(name)
            .map(|b| bound_as_node(b, span))
            .unwrap_or_else(|| rewrap(expr, span)),
        // Quoted data is not part of the template's code.
        Expr::List(_) if expr.value.head_symbol() == Some("quote") => rewrap(expr, span),
        Expr::List(items) => {
            let mut new_items = Vec::with_capacity(items.len());
            for item in items {
                if let Some(Bound::Splice(spliced)) = item.value.as_symbol().and_then(|s| bindings.get(s)) {
                    new_items.extend(spliced.iter().cloned());
                    continue;
                }
                new_items.push(substitute_plain(item, bindings, span));
            }
            make_list(new_items, span)
        }
        _ => rewrap(expr, span),
    }
}

fn substitute_backquote(
    expr: &AstNode,
    bindings: &HashMap<String, Bound>,
    span: Span,
) -> Result<AstNode, NamesError> {
    let Some(items) = expr.value.as_list() else {
        return Ok(rewrap(expr, span));
    };
    if let [head, arg] = items {
        if head.value.as_symbol() == Some(",") {
            return lookup_unquoted(arg, bindings, span).map(|b| bound_as_node(b, span));
        }
    }

    let mut new_items = Vec::with_capacity(items.len());
    for item in items {
        match item.value.as_list() {
            Some([head, arg]) if head.value.as_symbol() == Some(",@") => {
                match lookup_unquoted(arg, bindings, span)? {
                    Bound::Splice(spliced) => new_items.extend(spliced.iter().cloned()),
                    Bound::Single(node) if node.value.is_nil() => {}
                    Bound::Single(node) => match node.value.as_list() {
                        Some(list) => new_items.extend(list.iter().cloned()),
                        None => {
                            return Err(err_span!(
                                HostExpansion,
                                node.span,
                                "Cannot splice a {} with ',@'",
                                node.value.type_name()
                            ))
                        }
                    },
                }
            }
            _ => new_items.push(substitute_backquote(item, bindings, span)?),
        }
    }
    Ok(make_list(new_items, span))
}

fn lookup_unquoted<'b>(
    arg: &AstNode,
    bindings: &'b HashMap<String, Bound>,
    span: Span,
) -> Result<&'b Bound, NamesError> {
    arg.value
        .as_symbol()
        .and_then(|name| bindings.get(name))
        .ok_or_else(|| {
            err_span!(
                HostExpansion,
                span,
                "Only macro parameters can be unquoted in a template, found '{}'",
                arg.value
            )
        })
}

/// Template structure takes the span of the call it was expanded from.
fn rewrap(expr: &AstNode, span: Span) -> AstNode {
    spanned((*expr.value).clone(), span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse;

    fn template(source: &str) -> MacroTemplate {
        let forms = parse(source).unwrap();
        let items = forms[0].value.as_list().unwrap().to_vec();
        let params = ParamList::parse(&items[2]).unwrap();
        MacroTemplate::new(params, items[3].clone()).unwrap()
    }

    fn expand(t: &MacroTemplate, call: &str) -> Result<String, NamesError> {
        let call = parse(call).unwrap().remove(0);
        t.expand(&call).map(|n| n.value.pretty())
    }

    #[test]
    fn backquote_template_substitutes_unquoted_params() {
        let t = template("(defmacro twice (x) `(list ,x ,x))");
        assert_eq!(expand(&t, "(twice (f 1))").unwrap(), "(list (f 1) (f 1))");
    }

    #[test]
    fn backquote_template_splices_rest() {
        let t = template("(defmacro my-progn (&rest body) `(progn ,@body))");
        assert_eq!(expand(&t, "(my-progn a (b) c)").unwrap(), "(progn a (b) c)");
    }

    #[test]
    fn plain_template_splices_rest_in_list_position() {
        let t = template("(defmacro my-when (c &rest body) (if c (progn body)))");
        assert_eq!(expand(&t, "(my-when ok (a) (b))").unwrap(), "(if ok (progn (a) (b)))");
    }

    #[test]
    fn plain_template_does_not_touch_quoted_data() {
        let t = template("(defmacro tag (x) (list 'x x))");
        assert_eq!(expand(&t, "(tag 5)").unwrap(), "(list 'x 5)");
    }

    #[test]
    fn optional_params_default_to_nil() {
        let t = template("(defmacro opt (a &optional b) `(cons ,a ,b))");
        assert_eq!(expand(&t, "(opt 1)").unwrap(), "(cons 1 nil)");
    }

    #[test]
    fn arity_mismatch_is_a_host_expansion_error() {
        let t = template("(defmacro twice (x) `(list ,x ,x))");
        let err = expand(&t, "(twice)").unwrap_err();
        assert_eq!(err.error_type(), crate::diagnostics::ErrorType::HostExpansion);
        assert!(err.message().contains("expected exactly 1 argument"));
    }

    #[test]
    fn duplicate_params_are_rejected() {
        let forms = parse("(x x)").unwrap();
        let params = ParamList::parse(&forms[0]).unwrap();
        let body = parse("x").unwrap().remove(0);
        assert!(MacroTemplate::new(params, body).is_err());
    }

    #[test]
    fn unquoting_a_non_parameter_fails() {
        let t = template("(defmacro bad (x) `(list ,y))");
        assert!(expand(&t, "(bad 1)").is_err());
    }
}

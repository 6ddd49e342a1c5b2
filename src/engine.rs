//! Source-level pipeline.
//!
//! Reads Lisp source, replaces every top-level `define-namespace` form with
//! its rewritten body, and hands each finished form to the host so that the
//! definitions it makes are visible to the forms after it.

use tracing::debug;

use crate::host::Host;
use crate::rewrite::{rewrite_namespace, NamespaceOption, NamespaceOptions};
use crate::syntax::parser::parse_named;
use crate::syntax::{make_list, make_symbol, AstNode};
use crate::{err_span, NamesError};

pub const DEFINE_NAMESPACE: &str = "define-namespace";

/// A top-level form before and after expansion.
#[derive(Debug, Clone)]
pub struct ExpandedForm {
    pub original: AstNode,
    pub expanded: AstNode,
}

impl ExpandedForm {
    pub fn changed(&self) -> bool {
        self.original.value != self.expanded.value
    }
}

pub fn is_define_namespace(form: &AstNode) -> bool {
    form.value.head_symbol() == Some(DEFINE_NAMESPACE)
}

/// Expands `(define-namespace NAME [:keyword ...] BODY...)` into
/// `(progn BODY'...)`.
///
/// # Errors
/// `Configuration` for a non-symbol name or an unknown keyword, and any
/// error raised while rewriting the body.
pub fn expand_define_namespace<H: Host + ?Sized>(
    form: &AstNode,
    host: &mut H,
) -> Result<AstNode, NamesError> {
    let items = form.value.as_list().unwrap_or_default();
    let [head, name_node, rest @ ..] = items else {
        return Err(err_span!(MalformedForm, form.span, "define-namespace needs a namespace name"));
    };
    let Some(name) = name_node.value.as_symbol() else {
        return Err(err_span!(
            Configuration,
            name_node.span,
            "Namespace name must be a symbol, found a {}",
            name_node.value.type_name()
        ));
    };

    let keywords: Vec<(&str, &AstNode)> = rest
        .iter()
        .map_while(|node| {
            node.value
                .as_symbol()
                .filter(|s| s.starts_with(':'))
                .map(|s| (s, node))
        })
        .collect();
    let body = &rest[keywords.len()..];

    let mut options = NamespaceOptions::new();
    for (keyword, node) in keywords {
        let option: NamespaceOption = keyword.parse().map_err(|e: NamesError| e.at(node.span))?;
        debug!(namespace = name, option = option.keyword(), "enabled namespace option");
        options = options.with(option);
    }

    debug!(namespace = name, forms = body.len(), "expanding define-namespace");
    let forms = rewrite_namespace(name, options, body, host).map_err(|e| e.at(name_node.span))?;

    let mut out = Vec::with_capacity(forms.len() + 1);
    out.push(make_symbol("progn", head.span));
    out.extend(forms);
    Ok(make_list(out, form.span))
}

/// Expands every top-level form of `forms` in order, absorbing each result
/// into the host before moving on.
pub fn expand_forms<H: Host + ?Sized>(
    forms: &[AstNode],
    host: &mut H,
) -> Result<Vec<ExpandedForm>, NamesError> {
    let mut out = Vec::with_capacity(forms.len());
    for form in forms {
        let expanded = if is_define_namespace(form) {
            expand_define_namespace(form, host)?
        } else {
            form.clone()
        };
        host.absorb(&expanded)?;
        out.push(ExpandedForm {
            original: form.clone(),
            expanded,
        });
    }
    Ok(out)
}

/// Reads and expands a whole source file. Errors carry the source text.
pub fn expand_named_source<H: Host + ?Sized>(
    name: &str,
    text: &str,
    host: &mut H,
) -> Result<Vec<ExpandedForm>, NamesError> {
    let forms = parse_named(name, text)?;
    expand_forms(&forms, host).map_err(|e| e.with_source(name, text))
}

/// Reads and expands `text`, returning the resulting top-level forms.
pub fn expand_source<H: Host + ?Sized>(text: &str, host: &mut H) -> Result<Vec<AstNode>, NamesError> {
    Ok(expand_named_source("<input>", text, host)?
        .into_iter()
        .map(|f| f.expanded)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorType;
    use crate::host::Environment;
    use crate::syntax::render_forms;

    fn expand(src: &str) -> Result<String, NamesError> {
        let mut env = Environment::new();
        expand_source(src, &mut env).map(|forms| render_forms(&forms))
    }

    #[test]
    fn namespace_body_is_wrapped_in_progn() {
        assert_eq!(
            expand("(define-namespace foo- (defvar bar 1) (defun baz () bar))").unwrap(),
            "(progn (defvar foo-bar 1) (defun foo-baz () foo-bar))"
        );
    }

    #[test]
    fn keywords_become_options() {
        assert_eq!(
            expand("(define-namespace foo- :let-vars (let ((x 1)) x))").unwrap(),
            "(progn (let ((foo-x 1)) foo-x))"
        );
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let err = expand("(define-namespace foo- :global (defvar x 1))").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Configuration);
    }

    #[test]
    fn later_forms_see_earlier_namespaces() {
        let out = expand(
            "(define-namespace foo- (defun helper () 1))\n\
             (define-namespace foo- (defun main () (helper)))",
        )
        .unwrap();
        assert_eq!(
            out,
            "(progn (defun foo-helper () 1))\n(progn (defun foo-main () (foo-helper)))"
        );
    }

    #[test]
    fn body_macros_expand_within_the_same_namespace() {
        assert_eq!(
            expand("(define-namespace foo- (defmacro twice (x) `(list ,x ,x)) (defun f () (twice 1)))")
                .unwrap(),
            "(progn (defmacro foo-twice (x) `(list ,x ,x)) (defun foo-f () (list 1 1)))"
        );
    }

    #[test]
    fn other_top_level_forms_pass_through() {
        assert_eq!(expand("(setq x 1)").unwrap(), "(setq x 1)");
    }
}

//! Form classification and the bespoke rewrite rules.
//!
//! The special forms with their own scoping rules are listed once, in
//! [`SPECIAL_FORMS`]. Everything else is either a call to a namespaced
//! definition, a host macro call, or a plain call.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::host::Host;
use crate::rewrite::context::{Binding, Scope};
use crate::rewrite::Rewriter;
use crate::syntax::{make_list, make_quote, make_symbol, AstNode, Expr};
use crate::{err_span, NamesError};

// ============================================================================
// RULE TABLE
// ============================================================================

/// Evaluation order of a local-binding form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOrder {
    /// `let`: every value expression sees the outer scope.
    Parallel,
    /// `let*`: each value expression sees the bindings before it.
    Sequential,
}

/// Forms whose sub-forms do not follow function-call scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    FunctionDefinition,
    LocalBinding(BindingOrder),
    ConditionalDispatch,
    QuotingForm,
    LambdaForm,
    AliasDefinition,
}

/// The rule chosen for a list form, by its head symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteRule {
    /// Call to a function defined in the namespace.
    FunctionApplication { qualified: String },
    /// Call to a macro defined in the namespace.
    NamespacedMacro { qualified: String },
    Special(SpecialForm),
    /// Call to a global host macro.
    MacroExpansion,
    /// Any other call; the head is kept as written.
    GenericPassthrough,
}

pub static SPECIAL_FORMS: Lazy<HashMap<&'static str, SpecialForm>> = Lazy::new(|| {
    HashMap::from([
        ("defun", SpecialForm::FunctionDefinition),
        ("defmacro", SpecialForm::FunctionDefinition),
        ("defsubst", SpecialForm::FunctionDefinition),
        ("let", SpecialForm::LocalBinding(BindingOrder::Parallel)),
        ("let*", SpecialForm::LocalBinding(BindingOrder::Sequential)),
        ("cond", SpecialForm::ConditionalDispatch),
        ("quote", SpecialForm::QuotingForm),
        ("function", SpecialForm::QuotingForm),
        ("lambda", SpecialForm::LambdaForm),
        ("defalias", SpecialForm::AliasDefinition),
    ])
});

/// Forms that introduce a new global variable.
const VARIABLE_DEFINERS: [&str; 7] = [
    "defvar",
    "defconst",
    "defcustom",
    "defvar-local",
    "defstruct",
    "cl-defstruct",
    "defvaralias",
];

pub fn special_form(head: &str) -> Option<SpecialForm> {
    SPECIAL_FORMS.get(head).copied()
}

pub fn is_variable_definer(head: &str) -> bool {
    VARIABLE_DEFINERS.contains(&head)
}

/// `nil`, `t` and keywords evaluate to themselves and are never qualified.
pub fn is_constant(name: &str) -> bool {
    name == "nil" || name == "t" || name.starts_with(':')
}

fn is_lambda_list_marker(name: &str) -> bool {
    name.starts_with('&')
}

// ============================================================================
// RULES
// ============================================================================

impl<H: Host + ?Sized> Rewriter<'_, H> {
    pub(super) fn apply_special(
        &mut self,
        rule: SpecialForm,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        match rule {
            SpecialForm::FunctionDefinition => self.rewrite_definition(form, items, scope),
            SpecialForm::LocalBinding(order) => self.rewrite_let(form, items, scope, order),
            SpecialForm::ConditionalDispatch => self.rewrite_cond(form, items, scope),
            SpecialForm::QuotingForm => self.rewrite_quote(form, items, scope),
            SpecialForm::LambdaForm => self.rewrite_lambda(form, items, scope),
            SpecialForm::AliasDefinition => self.rewrite_defalias(form, items, scope),
        }
    }

    /// Records the name a variable definer introduces, before the rest of
    /// the form is rewritten.
    pub(super) fn register_variable_definition(
        &mut self,
        form: &AstNode,
        head: &str,
        items: &[AstNode],
    ) -> Result<(), NamesError> {
        let Some(target) = items.get(1) else {
            return Err(err_span!(MalformedForm, form.span, "{} is missing the variable name", head));
        };

        let base = if head == "defvaralias" {
            self.evaluate_name(target)?
        } else {
            // (cl-defstruct (name options...) ...) defines name.
            let symbol = match target.value.as_list() {
                Some([first, ..]) => first,
                _ => target,
            };
            match symbol.value.as_symbol() {
                Some(name) => name.to_string(),
                None => {
                    return Err(err_span!(
                        MalformedForm,
                        target.span,
                        "{} expects a symbol name, found a {}",
                        head,
                        target.value.type_name()
                    ))
                }
            }
        };

        let qualified = self.ctx.qualify(&base);
        debug!(definer = head, name = %qualified, "registered variable definition");
        self.ctx.registry_mut().add_variable(qualified);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // defun / defmacro / defsubst
    // ------------------------------------------------------------------------

    fn rewrite_definition(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let [head, name_node, arglist, body @ ..] = items else {
            return Err(err_span!(
                MalformedForm,
                form.span,
                "{} needs a name and an argument list",
                items[0].value
            ));
        };
        let Some(name) = name_node.value.as_symbol() else {
            return Err(err_span!(
                MalformedForm,
                name_node.span,
                "Function name must be a symbol, found a {}",
                name_node.value.type_name()
            ));
        };

        // Registered before the body so recursive calls qualify.
        let qualified = self.ctx.qualify(name);
        debug!(definer = %head.value, name = %qualified, "registered function definition");
        self.ctx.registry_mut().add_function(qualified.clone());

        let inner = bind_parameters(arglist, scope)?;
        let mut out = vec![
            head.clone(),
            make_symbol(qualified, name_node.span),
            arglist.clone(),
        ];
        out.extend(self.rewrite_function_body(body, &inner)?);
        let rewritten = make_list(out, form.span);

        // Later forms in the same body may call the macro.
        if head.value.as_symbol() == Some("defmacro") {
            self.host.absorb(&rewritten)?;
        }
        Ok(rewritten)
    }

    // ------------------------------------------------------------------------
    // lambda
    // ------------------------------------------------------------------------

    fn rewrite_lambda(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let [head, arglist, body @ ..] = items else {
            return Err(err_span!(MalformedForm, form.span, "lambda is missing its argument list"));
        };
        let inner = bind_parameters(arglist, scope)?;
        let mut out = vec![head.clone(), arglist.clone()];
        out.extend(self.rewrite_function_body(body, &inner)?);
        Ok(make_list(out, form.span))
    }

    /// Keeps the doc string and declarations; rewrites the arguments of
    /// `interactive` and every remaining body form.
    fn rewrite_function_body(
        &mut self,
        body: &[AstNode],
        scope: &Scope,
    ) -> Result<Vec<AstNode>, NamesError> {
        let mut out = Vec::with_capacity(body.len());
        let mut rest = body;

        if let [doc, tail @ ..] = rest {
            if matches!(&*doc.value, Expr::String(_)) {
                out.push(doc.clone());
                rest = tail;
            }
        }

        while let [first, tail @ ..] = rest {
            match first.value.head_symbol() {
                Some("declare") => out.push(first.clone()),
                Some("interactive") => out.push(self.rewrite_interactive(first, scope)?),
                _ => break,
            }
            rest = tail;
        }

        for form in rest {
            out.push(self.rewrite(form, scope)?);
        }
        Ok(out)
    }

    fn rewrite_interactive(&mut self, form: &AstNode, scope: &Scope) -> Result<AstNode, NamesError> {
        let items = form.value.as_list().unwrap_or_default();
        let Some((head, args)) = items.split_first() else {
            return Ok(form.clone());
        };
        self.rewrite_arguments(form, head.clone(), args, scope)
    }

    // ------------------------------------------------------------------------
    // let / let*
    // ------------------------------------------------------------------------

    fn rewrite_let(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
        order: BindingOrder,
    ) -> Result<AstNode, NamesError> {
        let [head, bindings_node, body @ ..] = items else {
            return Err(err_span!(MalformedForm, form.span, "{} is missing its binding list", items[0].value));
        };
        let bindings = if bindings_node.value.is_nil() {
            &[][..]
        } else {
            bindings_node.value.as_list().ok_or_else(|| {
                err_span!(
                    MalformedForm,
                    bindings_node.span,
                    "{} bindings must be a list, found a {}",
                    head.value,
                    bindings_node.value.type_name()
                )
            })?
        };

        let qualify = self.ctx.options().qualify_let_bindings();
        let kind = if qualify { Binding::Qualified } else { Binding::Bare };

        let mut sequential = scope.clone();
        let mut pending = Vec::with_capacity(bindings.len());
        let mut new_bindings = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let (name, shape) = parse_binding(binding)?;
            let value_scope = match order {
                BindingOrder::Parallel => scope,
                BindingOrder::Sequential => &sequential,
            };
            let bound = if qualify {
                self.ctx.qualify(name)
            } else {
                name.to_string()
            };
            let bound = make_symbol(bound, binding.span);
            let rebuilt = match shape {
                BindingShape::Symbol => bound,
                BindingShape::NameOnly => make_list(vec![bound], binding.span),
                BindingShape::WithValue(value) => {
                    let value = self.rewrite(value, value_scope)?;
                    make_list(vec![bound, value], binding.span)
                }
            };
            new_bindings.push(rebuilt);

            match order {
                BindingOrder::Parallel => pending.push((name.to_string(), kind)),
                BindingOrder::Sequential => sequential = sequential.bind(name, kind),
            }
        }

        let body_scope = match order {
            BindingOrder::Parallel => scope.extended(pending),
            BindingOrder::Sequential => sequential,
        };
        let mut out = vec![head.clone(), make_list(new_bindings, bindings_node.span)];
        for form in body {
            out.push(self.rewrite(form, &body_scope)?);
        }
        Ok(make_list(out, form.span))
    }

    // ------------------------------------------------------------------------
    // cond
    // ------------------------------------------------------------------------

    fn rewrite_cond(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let mut out = vec![items[0].clone()];
        for clause in &items[1..] {
            let Some(parts) = clause.value.as_list() else {
                return Err(err_span!(
                    MalformedForm,
                    clause.span,
                    "cond clauses must be lists, found a {}",
                    clause.value.type_name()
                ));
            };
            let parts = parts
                .iter()
                .map(|part| self.rewrite(part, scope))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(make_list(parts, clause.span));
        }
        Ok(make_list(out, form.span))
    }

    // ------------------------------------------------------------------------
    // quote / function
    // ------------------------------------------------------------------------

    fn rewrite_quote(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let [head, payload] = items else {
            return Err(err_span!(
                MalformedForm,
                form.span,
                "{} takes exactly one argument, received {}",
                items[0].value,
                items.len() - 1
            ));
        };

        let new_payload = match &*payload.value {
            Expr::Symbol(name)
                if self.is_qualifiable_function(name) || self.is_qualifiable_variable(name, scope) =>
            {
                make_symbol(self.ctx.qualify(name), payload.span)
            }
            Expr::List(_) if self.is_code_payload(payload) => self.rewrite(payload, scope)?,
            _ => return Ok(form.clone()),
        };
        Ok(make_list(vec![head.clone(), new_payload], form.span))
    }

    /// Quoted lists are data unless they are a lambda or a macro call.
    fn is_code_payload(&self, payload: &AstNode) -> bool {
        match payload.value.head_symbol() {
            Some("lambda") => true,
            Some(name) => self.host.is_macro(name) || self.host.is_macro(&self.ctx.qualify(name)),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // defalias
    // ------------------------------------------------------------------------

    fn rewrite_defalias(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let [head, name_expr, value, rest @ ..] = items else {
            return Err(err_span!(MalformedForm, form.span, "defalias needs a name and a definition"));
        };

        let base = self.evaluate_name(name_expr)?;
        let qualified = self.ctx.qualify(&base);
        debug!(name = %qualified, "registered function alias");
        self.ctx.registry_mut().add_function(qualified.clone());

        let mut out = vec![
            head.clone(),
            make_quote(make_symbol(qualified, name_expr.span)),
            self.rewrite(value, scope)?,
        ];
        for form in rest {
            out.push(self.rewrite(form, scope)?);
        }
        Ok(make_list(out, form.span))
    }

    /// Statically evaluates the name expression of an aliasing form.
    fn evaluate_name(&mut self, name_expr: &AstNode) -> Result<String, NamesError> {
        let value = self
            .host
            .evaluate_static(name_expr)
            .map_err(|e| e.at(name_expr.span))?;
        match value.value.as_symbol() {
            Some(name) => Ok(name.to_string()),
            None => Err(err_span!(
                Evaluation,
                name_expr.span,
                "Alias name must evaluate to a symbol, got a {}",
                value.value.type_name()
            )
            .with_help("Pass a quoted symbol, e.g. 'my-function.")),
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

enum BindingShape<'a> {
    /// `x`
    Symbol,
    /// `(x)`
    NameOnly,
    /// `(x value)`
    WithValue(&'a AstNode),
}

fn parse_binding(binding: &AstNode) -> Result<(&str, BindingShape<'_>), NamesError> {
    let shape_error = || {
        err_span!(
            MalformedForm,
            binding.span,
            "Each binding must be a symbol or a (symbol value) pair, found '{}'",
            binding.value
        )
    };
    match &*binding.value {
        Expr::Symbol(name) if !is_constant(name) => Ok((name.as_str(), BindingShape::Symbol)),
        Expr::List(parts) => match parts.as_slice() {
            [name] => name
                .value
                .as_symbol()
                .filter(|n| !is_constant(n))
                .map(|n| (n, BindingShape::NameOnly))
                .ok_or_else(shape_error),
            [name, value] => name
                .value
                .as_symbol()
                .filter(|n| !is_constant(n))
                .map(|n| (n, BindingShape::WithValue(value)))
                .ok_or_else(shape_error),
            _ => Err(shape_error()),
        },
        _ => Err(shape_error()),
    }
}

/// Returns `scope` extended with every parameter of `arglist`, bound bare.
fn bind_parameters(arglist: &AstNode, scope: &Scope) -> Result<Scope, NamesError> {
    if arglist.value.is_nil() {
        return Ok(scope.clone());
    }
    let Some(items) = arglist.value.as_list() else {
        return Err(err_span!(
            MalformedForm,
            arglist.span,
            "Argument list must be a list, found a {}",
            arglist.value.type_name()
        ));
    };

    let mut names = Vec::new();
    for item in items {
        match &*item.value {
            Expr::Symbol(name) if is_lambda_list_marker(name) => {}
            Expr::Symbol(name) => names.push(name.clone()),
            // Destructuring patterns and (name default) entries.
            Expr::List(_) | Expr::Dotted(..) => collect_pattern_symbols(item, &mut names),
            other => {
                return Err(err_span!(
                    MalformedForm,
                    item.span,
                    "Parameters must be symbols, found a {}",
                    other.type_name()
                ))
            }
        }
    }
    Ok(scope.extended(names.into_iter().map(|n| (n, Binding::Bare))))
}

fn collect_pattern_symbols(node: &AstNode, out: &mut Vec<String>) {
    match &*node.value {
        Expr::Symbol(name) if !is_lambda_list_marker(name) && !is_constant(name) => {
            out.push(name.clone())
        }
        Expr::List(items) => items.iter().for_each(|i| collect_pattern_symbols(i, out)),
        Expr::Dotted(items, tail) => {
            items.iter().for_each(|i| collect_pattern_symbols(i, out));
            collect_pattern_symbols(tail, out);
        }
        _ => {}
    }
}

//! # Namespace Rewriter
//!
//! Walks the forms of a namespace body and replaces every reference to a
//! namespaced definition with its qualified name. The walk is a recursive
//! descent over [`AstNode`]s; each list form is classified by its head
//! symbol (see [`rules`]) and rewritten by the matching rule.
//!
//! Macro calls are expanded lazily, one step at a time, through the
//! [`Host`], and the expansion is rewritten in place of the call. Chains of
//! nested expansions are bounded by [`MAX_EXPANSION_DEPTH`]; plain list
//! nesting is bounded only by the input.

pub mod context;
pub mod rules;

use tracing::{debug, trace};

use crate::host::Host;
use crate::syntax::{make_list, make_symbol, AstNode, Expr};
use crate::{err_span, NamesError};

pub use context::{Binding, NamespaceContext, NamespaceOption, NamespaceOptions, Registry, Scope};
pub use rules::{BindingOrder, RewriteRule, SpecialForm};

/// Maximum number of macro expansions active at once on one path.
pub const MAX_EXPANSION_DEPTH: usize = 256;

/// One rewrite pass over a namespace body.
pub struct Rewriter<'h, H: Host + ?Sized> {
    ctx: NamespaceContext,
    host: &'h mut H,
    expansions: usize,
}

impl<'h, H: Host + ?Sized> Rewriter<'h, H> {
    pub fn new(ctx: NamespaceContext, host: &'h mut H) -> Self {
        Self { ctx, host, expansions: 0 }
    }

    pub fn context(&self) -> &NamespaceContext {
        &self.ctx
    }

    pub fn into_context(self) -> NamespaceContext {
        self.ctx
    }

    /// Rewrites one top-level form.
    pub fn rewrite_top_level(&mut self, form: &AstNode) -> Result<AstNode, NamesError> {
        self.rewrite(form, &Scope::new())
    }

    /// Rewrites `form` under the lexical bindings in `scope`.
    pub fn rewrite(&mut self, form: &AstNode, scope: &Scope) -> Result<AstNode, NamesError> {
        match &*form.value {
            Expr::Symbol(name) => Ok(self.rewrite_symbol(form, name, scope)),
            Expr::List(items) if !items.is_empty() => self.rewrite_list(form, items, scope),
            _ => Ok(form.clone()),
        }
    }

    fn rewrite_symbol(&self, form: &AstNode, name: &str, scope: &Scope) -> AstNode {
        if !self.is_qualifiable_variable(name, scope) {
            return form.clone();
        }
        let qualified = self.ctx.qualify(name);
        trace!(symbol = name, qualified = %qualified, "qualified variable reference");
        make_symbol(qualified, form.span)
    }

    fn rewrite_list(
        &mut self,
        form: &AstNode,
        items: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let head = &items[0];
        let Some(name) = head.value.as_symbol() else {
            // ((lambda ...) args) and friends: every element is code.
            let rewritten = items
                .iter()
                .map(|item| self.rewrite(item, scope))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(make_list(rewritten, form.span));
        };

        if rules::is_variable_definer(name) {
            self.register_variable_definition(form, name, items)?;
        }

        match self.classify(name) {
            RewriteRule::NamespacedMacro { qualified } => {
                let mut call = Vec::with_capacity(items.len());
                call.push(make_symbol(qualified, head.span));
                call.extend(items[1..].iter().cloned());
                self.expand_and_rewrite(&make_list(call, form.span), scope)
            }
            RewriteRule::FunctionApplication { qualified } => {
                trace!(function = name, qualified = %qualified, "qualified function call");
                self.rewrite_arguments(form, make_symbol(qualified, head.span), &items[1..], scope)
            }
            RewriteRule::Special(rule) => self.apply_special(rule, form, items, scope),
            RewriteRule::MacroExpansion => self.expand_and_rewrite(form, scope),
            RewriteRule::GenericPassthrough => {
                self.rewrite_arguments(form, head.clone(), &items[1..], scope)
            }
        }
    }

    /// Picks the rule for a list form headed by `head`.
    pub fn classify(&self, head: &str) -> RewriteRule {
        if self.is_qualifiable_function(head) {
            let qualified = self.ctx.qualify(head);
            return if self.host.is_macro(&qualified) {
                RewriteRule::NamespacedMacro { qualified }
            } else {
                RewriteRule::FunctionApplication { qualified }
            };
        }
        if let Some(rule) = rules::special_form(head) {
            return RewriteRule::Special(rule);
        }
        if self.host.is_macro(head) {
            return RewriteRule::MacroExpansion;
        }
        RewriteRule::GenericPassthrough
    }

    fn expand_and_rewrite(&mut self, call: &AstNode, scope: &Scope) -> Result<AstNode, NamesError> {
        if self.expansions >= MAX_EXPANSION_DEPTH {
            return Err(err_span!(
                RecursionLimit,
                call.span,
                "Macro expansion nested more than {} levels",
                MAX_EXPANSION_DEPTH
            )
            .with_help("A macro probably expands into a call to itself."));
        }
        let expanded = self
            .host
            .expand_one_step(call)
            .map_err(|e| e.at(call.span))?;
        debug!(depth = self.expansions, "rewriting macro expansion");
        self.expansions += 1;
        let result = self.rewrite(&expanded, scope);
        self.expansions -= 1;
        result
    }

    fn rewrite_arguments(
        &mut self,
        form: &AstNode,
        head: AstNode,
        args: &[AstNode],
        scope: &Scope,
    ) -> Result<AstNode, NamesError> {
        let mut out = Vec::with_capacity(args.len() + 1);
        out.push(head);
        for arg in args {
            out.push(self.rewrite(arg, scope)?);
        }
        Ok(make_list(out, form.span))
    }

    /// Does `base` name a function or macro defined in this namespace?
    pub fn is_qualifiable_function(&self, base: &str) -> bool {
        if rules::is_constant(base) {
            return false;
        }
        let qualified = self.ctx.qualify(base);
        self.ctx.registry().has_function(&qualified) || self.host.is_function_bound(&qualified)
    }

    /// Does a reference to `base` under `scope` denote a namespace variable?
    pub fn is_qualifiable_variable(&self, base: &str, scope: &Scope) -> bool {
        if rules::is_constant(base) {
            return false;
        }
        match scope.lookup(base) {
            Some(Binding::Bare) => false,
            Some(Binding::Qualified) => true,
            None => {
                let qualified = self.ctx.qualify(base);
                self.ctx.registry().has_variable(&qualified)
                    || self.host.is_variable_bound(&qualified)
            }
        }
    }
}

/// Rewrites a namespace body under `name` as prefix.
///
/// The pass is all-or-nothing: the first failing form aborts it and no
/// output is produced.
///
/// # Errors
/// `Configuration` for an invalid prefix, and any error raised while
/// rewriting a form.
pub fn rewrite_namespace<H: Host + ?Sized>(
    name: &str,
    options: NamespaceOptions,
    body: &[AstNode],
    host: &mut H,
) -> Result<Vec<AstNode>, NamesError> {
    let ctx = NamespaceContext::new(name, options)?;
    let mut rewriter = Rewriter::new(ctx, host);
    let forms = body
        .iter()
        .map(|form| rewriter.rewrite_top_level(form))
        .collect::<Result<Vec<_>, _>>()?;

    let ctx = rewriter.into_context();
    debug!(
        namespace = name,
        forms = forms.len(),
        functions = ctx.registry().functions().count(),
        variables = ctx.registry().variables().count(),
        "rewrote namespace"
    );
    Ok(forms)
}

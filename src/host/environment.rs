//! In-memory host environment.
//!
//! `Environment` keeps the three global tables a Lisp host owns (functions,
//! variables, macros) and answers the rewriter's questions from them. It does
//! not evaluate code. Instead, forms the host would evaluate are *absorbed*:
//! the definitions they make are registered, which is all the rewriter can
//! observe of an evaluation anyway.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::std_macros::std_macros;
use crate::host::template::{MacroDef, MacroTemplate, ParamList};
use crate::host::Host;
use crate::syntax::parser::parse_named;
use crate::syntax::{make_symbol, spanned, AstNode, Expr};
use crate::{err_msg, err_span, NamesError};

/// Serializable list of names known to be bound in the host, loaded from a
/// YAML or JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
}

impl EnvironmentSnapshot {
    /// Loads a snapshot, choosing the format from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NamesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            err_msg!(Io, "Failed to read environment file '{}': {}", path.display(), e).with_cause(e)
        })?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match extension {
            "json" => serde_json::from_str(&text).map_err(|e| {
                err_msg!(Configuration, "Invalid environment file '{}': {}", path.display(), e)
                    .with_cause(e)
            }),
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| {
                err_msg!(Configuration, "Invalid environment file '{}': {}", path.display(), e)
                    .with_cause(e)
            }),
            other => Err(err_msg!(
                Configuration,
                "Unsupported environment file extension '{}' (expected json, yaml or yml)",
                other
            )),
        }
    }
}

/// The in-memory host: global function, variable and macro tables.
#[derive(Debug, Clone)]
pub struct Environment {
    functions: HashSet<String>,
    variables: HashSet<String>,
    macros: HashMap<String, MacroDef>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates an environment with the standard macros defined.
    pub fn new() -> Self {
        let mut env = Self::empty();
        for (name, def) in std_macros() {
            env.define_macro(name, def);
        }
        env
    }

    /// Creates an environment with nothing defined.
    pub fn empty() -> Self {
        Self {
            functions: HashSet::new(),
            variables: HashSet::new(),
            macros: HashMap::new(),
        }
    }

    pub fn define_function(&mut self, name: impl Into<String>) {
        self.functions.insert(name.into());
    }

    pub fn define_variable(&mut self, name: impl Into<String>) {
        self.variables.insert(name.into());
    }

    /// Registers a macro. Returns the previous definition, if any.
    pub fn define_macro(&mut self, name: impl Into<String>, def: MacroDef) -> Option<MacroDef> {
        self.macros.insert(name.into(), def)
    }

    /// Adds every name of `snapshot` to the tables.
    pub fn apply_snapshot(&mut self, snapshot: &EnvironmentSnapshot) {
        self.functions.extend(snapshot.functions.iter().cloned());
        self.variables.extend(snapshot.variables.iter().cloned());
    }

    /// Absorbs every top-level form of a prelude source.
    pub fn load_prelude(&mut self, name: &str, source: &str) -> Result<(), NamesError> {
        let forms = parse_named(name, source)?;
        for form in &forms {
            self.absorb(form).map_err(|e| e.with_source(name, source))?;
        }
        Ok(())
    }

    /// Registers the definitions `form` would make if the host evaluated it.
    /// Forms that define nothing are ignored.
    pub fn absorb(&mut self, form: &AstNode) -> Result<(), NamesError> {
        let Some(items) = form.value.as_list() else {
            return Ok(());
        };
        let Some(head) = items.first().and_then(|h| h.value.as_symbol()) else {
            return Ok(());
        };

        match head {
            "progn" => {
                for item in &items[1..] {
                    self.absorb(item)?;
                }
            }
            "defun" | "defsubst" => {
                let name = defined_symbol(form, items)?;
                debug!(name = %name, "absorbed function definition");
                self.define_function(name);
            }
            "defmacro" => self.absorb_defmacro(form, items)?,
            "defalias" => {
                let name = self.evaluated_name(form, items)?;
                debug!(name = %name, "absorbed function alias");
                self.define_function(name);
            }
            "defvaralias" => {
                let name = self.evaluated_name(form, items)?;
                debug!(name = %name, "absorbed variable alias");
                self.define_variable(name);
            }
            "defvar" | "defconst" | "defcustom" | "defvar-local" | "defstruct" | "cl-defstruct" => {
                let name = defined_symbol(form, items)?;
                debug!(name = %name, "absorbed variable definition");
                self.define_variable(name);
            }
            _ => {}
        }
        Ok(())
    }

    /// Single-template macros become expandable. Any other macro is only
    /// recorded as bound, since this host cannot run its body.
    fn absorb_defmacro(&mut self, form: &AstNode, items: &[AstNode]) -> Result<(), NamesError> {
        let name = defined_symbol(form, items)?;
        let Some(arglist) = items.get(2) else {
            return Err(err_span!(MalformedForm, form.span, "defmacro '{}' has no argument list", name));
        };
        self.define_function(name.clone());

        // Skip a doc string and declarations in front of the template.
        let mut body = &items[3..];
        while body.len() > 1 && is_preamble(&body[0]) {
            body = &body[1..];
        }
        let ([template], Ok(params)) = (body, ParamList::parse(arglist)) else {
            debug!(name = %name, "absorbed macro without a template body");
            return Ok(());
        };

        let template = MacroTemplate::new(params, template.clone())?;
        debug!(name = %name, "absorbed template macro");
        self.define_macro(name, MacroDef::Template(template));
        Ok(())
    }

    fn evaluated_name(&mut self, form: &AstNode, items: &[AstNode]) -> Result<String, NamesError> {
        let Some(name_expr) = items.get(1) else {
            return Err(err_span!(MalformedForm, form.span, "Alias form is missing its name"));
        };
        let value = self.evaluate_static(name_expr)?;
        value
            .value
            .as_symbol()
            .map(str::to_string)
            .ok_or_else(|| {
                err_span!(
                    Evaluation,
                    name_expr.span,
                    "Alias name must evaluate to a symbol, got a {}",
                    value.value.type_name()
                )
            })
    }
}

impl Host for Environment {
    fn is_function_bound(&self, name: &str) -> bool {
        self.functions.contains(name) || self.macros.contains_key(name)
    }

    fn is_variable_bound(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    fn is_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    fn expand_one_step(&mut self, form: &AstNode) -> Result<AstNode, NamesError> {
        let Some(name) = form.value.head_symbol() else {
            return Err(err_span!(
                HostExpansion,
                form.span,
                "Cannot macro-expand a {}: not a macro call",
                form.value.type_name()
            ));
        };
        let Some(def) = self.macros.get(name) else {
            return Err(err_span!(HostExpansion, form.span, "'{}' is not a macro", name));
        };

        let expanded = match def {
            MacroDef::Fn(func) => func(form),
            MacroDef::Template(template) => template.expand(form),
        }
        .map_err(|e| e.at(form.span))?;
        debug!(macro_name = name, expansion = %expanded.value, "expanded macro call");
        Ok(expanded)
    }

    fn evaluate_static(&mut self, expr: &AstNode) -> Result<AstNode, NamesError> {
        match &*expr.value {
            Expr::String(_) | Expr::Integer(_) | Expr::Float(_) | Expr::Char(_) | Expr::Vector(_) => {
                Ok(expr.clone())
            }
            Expr::Symbol(name) if is_self_evaluating(name) => Ok(expr.clone()),
            Expr::Symbol(name) => Err(err_span!(
                Evaluation,
                expr.span,
                "Cannot statically evaluate the variable '{}'",
                name
            )
            .with_help("Use a quoted symbol, e.g. 'my-name.")),
            Expr::List(items) => self.evaluate_call(expr, items),
            Expr::Dotted(..) => Err(err_span!(
                Evaluation,
                expr.span,
                "Cannot evaluate a dotted list"
            )),
        }
    }

    fn absorb(&mut self, form: &AstNode) -> Result<(), NamesError> {
        Environment::absorb(self, form)
    }
}

impl Environment {
    fn evaluate_call(&mut self, expr: &AstNode, items: &[AstNode]) -> Result<AstNode, NamesError> {
        let Some((head, args)) = items.split_first() else {
            return Ok(expr.clone());
        };
        match (head.value.as_symbol(), args) {
            (Some("quote" | "function"), [arg]) => Ok(arg.clone()),
            (Some("intern"), [arg]) => {
                let name = self.evaluate_string(arg)?;
                Ok(make_symbol(name, expr.span))
            }
            (Some("symbol-name"), [arg]) => {
                let value = self.evaluate_static(arg)?;
                match value.value.as_symbol() {
                    Some(name) => Ok(spanned(Expr::String(name.to_string()), expr.span)),
                    None => Err(err_span!(
                        Evaluation,
                        arg.span,
                        "symbol-name expects a symbol, got a {}",
                        value.value.type_name()
                    )),
                }
            }
            (Some("concat"), args) => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.evaluate_string(arg)?);
                }
                Ok(spanned(Expr::String(out), expr.span))
            }
            _ => Err(err_span!(
                Evaluation,
                expr.span,
                "'{}' cannot be evaluated statically",
                expr.value
            )
            .with_help("Only quoted symbols, intern, concat and symbol-name are supported.")),
        }
    }

    fn evaluate_string(&mut self, expr: &AstNode) -> Result<String, NamesError> {
        let value = self.evaluate_static(expr)?;
        match &*value.value {
            Expr::String(s) => Ok(s.clone()),
            other => Err(err_span!(
                Evaluation,
                expr.span,
                "Expected a string, got a {}",
                other.type_name()
            )),
        }
    }
}

/// Returns the symbol a definer form defines (its second element).
/// `(cl-defstruct (name options...) ...)` defines `name`.
fn defined_symbol(form: &AstNode, items: &[AstNode]) -> Result<String, NamesError> {
    let target = items.get(1).map(|n| match n.value.as_list() {
        Some([first, ..]) => first,
        _ => n,
    });
    target
        .and_then(|n| n.value.as_symbol())
        .map(str::to_string)
        .ok_or_else(|| err_span!(MalformedForm, form.span, "Definition is missing a symbol name"))
}

fn is_self_evaluating(name: &str) -> bool {
    name == "nil" || name == "t" || name.starts_with(':')
}

fn is_preamble(form: &AstNode) -> bool {
    matches!(&*form.value, Expr::String(_)) || form.value.head_symbol() == Some("declare")
}

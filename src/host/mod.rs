//! # Host Environment
//!
//! The rewriter never evaluates code itself. Every question about the live
//! state of the surrounding Lisp system goes through the [`Host`] trait: is a
//! name bound as a function or a variable, is it a macro, what does a macro
//! call expand to, and what symbol does a name expression denote.
//!
//! [`Environment`] is the in-memory implementation used by the CLI and the
//! tests. Embedders with a real evaluator implement [`Host`] over it.

use crate::syntax::AstNode;
use crate::NamesError;

pub mod environment;
pub mod std_macros;
pub mod template;

pub use environment::{Environment, EnvironmentSnapshot};
pub use template::{MacroDef, MacroFn, MacroTemplate};

/// The capabilities the rewrite engine consumes from its host.
///
/// The query methods must be side-effect free. `expand_one_step` and
/// `evaluate_static` may run arbitrary host code; their failures abort the
/// rewrite pass.
pub trait Host {
    /// Is `name` currently defined as a function or macro?
    fn is_function_bound(&self, name: &str) -> bool;

    /// Is `name` currently defined as a global variable?
    fn is_variable_bound(&self, name: &str) -> bool;

    /// Is `name` currently defined as a macro?
    fn is_macro(&self, name: &str) -> bool;

    /// Expands a macro call exactly one step.
    ///
    /// # Errors
    /// `HostExpansion` if the head of `form` is not a macro.
    fn expand_one_step(&mut self, form: &AstNode) -> Result<AstNode, NamesError>;

    /// Evaluates `expr` without running user code, as needed for the name
    /// expression of aliasing forms.
    ///
    /// # Errors
    /// `Evaluation` if `expr` is not statically evaluable.
    fn evaluate_static(&mut self, expr: &AstNode) -> Result<AstNode, NamesError>;

    /// Called with every top-level form once it has been rewritten, where a
    /// real host would evaluate it. Later forms see what it defines.
    fn absorb(&mut self, _form: &AstNode) -> Result<(), NamesError> {
        Ok(())
    }
}

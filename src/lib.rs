//! # Namespacer
//!
//! A static rewriting pass for Lisp sources: the forms inside a
//! `(define-namespace PREFIX ...)` block are written with short names, and
//! the pass qualifies every definition and every reference to one of those
//! definitions with `PREFIX`.
//!
//! ```text
//! (define-namespace foo-          (progn
//!   (defvar bar 1)          =>      (defvar foo-bar 1)
//!   (defun baz () bar))             (defun foo-baz () foo-bar))
//! ```
//!
//! The pass asks the surrounding Lisp system what is bound through the
//! [`Host`] trait; [`Environment`] is an in-memory host.

pub use crate::diagnostics::{ErrorType, NamesError};

pub mod cli;
pub mod diagnostics;
pub mod engine;
pub mod host;
pub mod rewrite;
pub mod syntax;

pub use engine::{expand_define_namespace, expand_source};
pub use host::{Environment, EnvironmentSnapshot, Host};
pub use rewrite::{rewrite_namespace, NamespaceOption, NamespaceOptions};
pub use syntax::{AstNode, Expr, Span};

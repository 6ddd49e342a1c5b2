//! Working state of one rewrite pass.
//!
//! [`NamespaceContext`] holds what lives for the whole pass: the prefix, the
//! option set and the definition registry. [`Scope`] holds what is lexical:
//! it is a persistent map, so a binding form extends it by building a new
//! value for its body while the caller keeps its own.

use std::collections::HashSet;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{err_msg, NamesError};

// ============================================================================
// OPTIONS
// ============================================================================

/// A recognised namespace option flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceOption {
    /// `:let-vars` - names bound by `let`/`let*` are qualified too.
    QualifyLetBindings,
}

impl NamespaceOption {
    pub fn keyword(&self) -> &'static str {
        match self {
            NamespaceOption::QualifyLetBindings => ":let-vars",
        }
    }
}

impl FromStr for NamespaceOption {
    type Err = NamesError;

    /// Accepts the keyword with or without its leading colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches(':') {
            "let-vars" => Ok(NamespaceOption::QualifyLetBindings),
            _ => Err(err_msg!(Configuration, "Unrecognised namespace option '{}'", s)
                .with_help("The only supported option is :let-vars.")),
        }
    }
}

/// The set of options a pass runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceOptions {
    flags: HashSet<NamespaceOption>,
}

impl NamespaceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses flags such as `":let-vars"`. The first unknown flag is an error.
    pub fn from_flags<I, S>(flags: I) -> Result<Self, NamesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let flags = flags
            .into_iter()
            .map(|f| f.as_ref().parse())
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { flags })
    }

    pub fn with(mut self, option: NamespaceOption) -> Self {
        self.flags.insert(option);
        self
    }

    pub fn contains(&self, option: NamespaceOption) -> bool {
        self.flags.contains(&option)
    }

    pub fn qualify_let_bindings(&self) -> bool {
        self.contains(NamespaceOption::QualifyLetBindings)
    }
}

// ============================================================================
// SCOPE TRACKER
// ============================================================================

/// How a locally bound name is referenced inside its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Bound under its bare name; shadows any global of the same base name.
    Bare,
    /// Bound under its qualified name (`:let-vars`); references qualify.
    Qualified,
}

/// Names shadowed by the enclosing binding forms, innermost binding wins.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: im::HashMap<String, Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, base: &str) -> Option<Binding> {
        self.bindings.get(base).copied()
    }

    /// Returns this scope extended with `names`. `self` is left untouched.
    pub fn extended<I>(&self, names: I) -> Scope
    where
        I: IntoIterator<Item = (String, Binding)>,
    {
        let mut bindings = self.bindings.clone();
        bindings.extend(names);
        Scope { bindings }
    }

    pub fn bind(&self, base: impl Into<String>, binding: Binding) -> Scope {
        Scope {
            bindings: self.bindings.update(base.into(), binding),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ============================================================================
// DEFINITION REGISTRY
// ============================================================================

/// Qualified names this pass has introduced and the host cannot see yet.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    variables: HashSet<String>,
    functions: HashSet<String>,
}

impl Registry {
    /// Records a variable definition; returns false if it was already known.
    pub fn add_variable(&mut self, qualified: impl Into<String>) -> bool {
        self.variables.insert(qualified.into())
    }

    /// Records a function or macro definition; returns false if it was already known.
    pub fn add_function(&mut self, qualified: impl Into<String>) -> bool {
        self.functions.insert(qualified.into())
    }

    pub fn has_variable(&self, qualified: &str) -> bool {
        self.variables.contains(qualified)
    }

    pub fn has_function(&self, qualified: &str) -> bool {
        self.functions.contains(qualified)
    }

    pub fn variables(&self) -> impl Iterator<Item = &String> {
        self.variables.iter()
    }

    pub fn functions(&self) -> impl Iterator<Item = &String> {
        self.functions.iter()
    }
}

// ============================================================================
// NAMESPACE CONTEXT
// ============================================================================

// A prefix must read back as (the start of) a single symbol.
static PREFIX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^\s()\[\]"'`,;#?\\]([^\s()\[\]"'`,;\\]*)$"#).expect("valid regex"));

/// State that lives for a whole pass.
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    prefix: String,
    options: NamespaceOptions,
    registry: Registry,
}

impl NamespaceContext {
    /// Creates a context for `prefix`, which must be a valid symbol prefix.
    pub fn new(prefix: impl Into<String>, options: NamespaceOptions) -> Result<Self, NamesError> {
        let prefix = prefix.into();
        if !PREFIX_PATTERN.is_match(&prefix) {
            return Err(err_msg!(
                Configuration,
                "Invalid namespace name '{}': it must be a non-empty symbol token",
                prefix
            ));
        }
        Ok(Self {
            prefix,
            options,
            registry: Registry::default(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn options(&self) -> &NamespaceOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// `prefix ++ base`.
    pub fn qualify(&self, base: &str) -> String {
        format!("{}{}", self.prefix, base)
    }
}

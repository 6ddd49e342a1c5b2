//! The namespacer command-line interface.
//!
//! This module is the entry point for all CLI commands and orchestrates the
//! library: it builds an [`Environment`] from the host arguments, runs the
//! requested pipeline and prints the result.

use std::fs;
use std::path::Path;
use std::process;

use clap::Parser;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cli::args::{Command, HostArgs, NamespacerArgs};
use crate::engine::expand_named_source;
use crate::host::{Environment, EnvironmentSnapshot};
use crate::rewrite::{rewrite_namespace, NamespaceOption, NamespaceOptions};
use crate::syntax::parser::parse_named;
use crate::syntax::{make_list, make_symbol, Span};
use crate::{err_msg, NamesError};

pub mod args;
pub mod logging;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = NamespacerArgs::parse();
    if let Err(e) = logging::init() {
        eprintln!("warning: logging disabled: {}", e);
    }

    let result = match args.command {
        Command::Expand { file, host, trace } => handle_expand(&file, &host, trace),
        Command::Rewrite {
            file,
            prefix,
            let_vars,
            host,
        } => handle_rewrite(&file, &prefix, let_vars, &host),
        Command::Check { path, host } => handle_check(&path, &host),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            output::print_error(e);
            process::exit(1);
        }
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

/// Handles the `expand` subcommand.
fn handle_expand(path: &Path, host: &HostArgs, trace: bool) -> Result<bool, NamesError> {
    let mut env = build_environment(host)?;
    let source = read_source(path)?;
    let forms = expand_named_source(&path.display().to_string(), &source, &mut env)?;
    if trace {
        output::print_trace(&forms);
    } else {
        output::print_forms(forms.iter().map(|f| &f.expanded));
    }
    Ok(true)
}

/// Handles the `rewrite` subcommand.
fn handle_rewrite(
    path: &Path,
    prefix: &str,
    let_vars: bool,
    host: &HostArgs,
) -> Result<bool, NamesError> {
    let mut env = build_environment(host)?;
    let name = path.display().to_string();
    let source = read_source(path)?;
    let body = parse_named(&name, &source)?;

    let mut options = NamespaceOptions::new();
    if let_vars {
        options = options.with(NamespaceOption::QualifyLetBindings);
    }
    let forms = rewrite_namespace(prefix, options, &body, &mut env)
        .map_err(|e| e.with_source(&name, &source))?;

    let span = Span {
        start: 0,
        end: source.len(),
    };
    let mut items = Vec::with_capacity(forms.len() + 1);
    items.push(make_symbol("progn", span));
    items.extend(forms);
    output::print_forms([&make_list(items, span)]);
    Ok(true)
}

/// Handles the `check` subcommand. Returns false if any file failed.
fn handle_check(path: &Path, host: &HostArgs) -> Result<bool, NamesError> {
    if !path.exists() {
        return Err(err_msg!(Io, "Path '{}' does not exist", path.display()));
    }

    let files = discover_sources(path);
    let mut failed = 0;
    for file in &files {
        // Every file starts from the same host state.
        let mut env = build_environment(host)?;
        let result = read_source(file)
            .and_then(|source| expand_named_source(&file.display().to_string(), &source, &mut env));
        match result {
            Ok(forms) => debug!(file = %file.display(), forms = forms.len(), "checked"),
            Err(e) => {
                failed += 1;
                output::print_error(e);
            }
        }
    }

    if files.is_empty() {
        warn!(path = %path.display(), "no .el files found");
    }
    output::print_check_summary(files.len(), failed);
    Ok(failed == 0)
}

// ============================================================================
// HELPERS
// ============================================================================

fn build_environment(host: &HostArgs) -> Result<Environment, NamesError> {
    let mut env = Environment::new();
    if let Some(path) = &host.env {
        let snapshot = EnvironmentSnapshot::load(path)?;
        debug!(
            functions = snapshot.functions.len(),
            variables = snapshot.variables.len(),
            "loaded environment snapshot"
        );
        env.apply_snapshot(&snapshot);
    }
    for path in &host.preludes {
        let source = read_source(path)?;
        env.load_prelude(&path.display().to_string(), &source)?;
    }
    Ok(env)
}

fn read_source(path: &Path) -> Result<String, NamesError> {
    fs::read_to_string(path).map_err(|e| {
        err_msg!(Io, "Failed to read '{}': {}", path.display(), e).with_cause(e)
    })
}

/// Collects `.el` files under `path` in a stable order.
fn discover_sources(path: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "el"))
        .collect();
    files.sort();
    files
}

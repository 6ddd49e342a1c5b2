//! Command-line arguments and subcommands for the namespacer CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "namespacer",
    version,
    about = "Qualifies the definitions of Lisp namespaces with their prefix."
)]
pub struct NamespacerArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Where the in-memory host gets its initial definitions from.
#[derive(Debug, Clone, Default, Args)]
pub struct HostArgs {
    /// Lisp file whose definitions are loaded before the input. Repeatable.
    #[arg(long = "prelude", value_name = "FILE")]
    pub preludes: Vec<PathBuf>,

    /// YAML or JSON file listing bound function and variable names.
    #[arg(long, value_name = "FILE")]
    pub env: Option<PathBuf>,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Expand every define-namespace form of a file and print the result.
    Expand {
        /// The Lisp source file to expand.
        #[arg(required = true)]
        file: PathBuf,

        #[command(flatten)]
        host: HostArgs,

        /// Show each top-level form before and after expansion as a diff.
        #[arg(long)]
        trace: bool,
    },
    /// Rewrite a whole file as the body of a single namespace.
    Rewrite {
        /// The Lisp source file holding the namespace body.
        #[arg(required = true)]
        file: PathBuf,

        /// The namespace prefix, e.g. `foo-`.
        #[arg(long)]
        prefix: String,

        /// Qualify names bound by let and let* as well.
        #[arg(long)]
        let_vars: bool,

        #[command(flatten)]
        host: HostArgs,
    },
    /// Expand every `.el` file under a path and report the failures.
    Check {
        /// A directory to walk, or a single file.
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        host: HostArgs,
    },
}

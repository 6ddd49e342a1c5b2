//! Handles all user-facing output for the CLI.
//!
//! Rewritten forms go to stdout, diagnostics to stderr. Colour is only used
//! when stdout is a terminal.

use std::io::Write;

use difference::{Changeset, Difference};
use miette::Report;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::engine::ExpandedForm;
use crate::syntax::AstNode;
use crate::NamesError;

fn stdout() -> StandardStream {
    let choice = if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Prints one form per line.
pub fn print_forms<'a>(forms: impl IntoIterator<Item = &'a AstNode>) {
    let mut out = stdout();
    for form in forms {
        let _ = writeln!(out, "{}", form.value.pretty());
    }
}

/// Prints every top-level form, with a diff for those that were expanded.
pub fn print_trace(forms: &[ExpandedForm]) {
    let mut out = stdout();
    for (i, form) in forms.iter().enumerate() {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(out, "--- Form {} ---", i);
        let _ = out.reset();

        if !form.changed() {
            let _ = writeln!(out, " {}", form.expanded.value.pretty());
        } else {
            let changeset = Changeset::new(
                &form.original.value.pretty(),
                &form.expanded.value.pretty(),
                "\n",
            );
            print_diff(&mut out, &changeset.diffs);
        }
        let _ = writeln!(out);
    }
}

/// Renders an error with its source snippet on stderr.
pub fn print_error(err: NamesError) {
    eprintln!("{:?}", Report::new(err));
}

pub fn print_check_summary(checked: usize, failed: usize) {
    let mut out = stdout();
    let color = if failed == 0 { Color::Green } else { Color::Red };
    let _ = out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(out, "checked {} file(s), {} failed", checked, failed);
    let _ = out.reset();
}

fn print_diff(out: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                let _ = out.reset();
                let _ = writeln!(out, " {}", x);
            }
            Difference::Add(x) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(out, "+{}", x);
            }
            Difference::Rem(x) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                let _ = writeln!(out, "-{}", x);
            }
        }
    }
    let _ = out.reset();
}

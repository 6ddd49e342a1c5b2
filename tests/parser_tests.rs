//! Reader and printer tests.

use namespacer::syntax::parser::{parse, parse_named};
use namespacer::syntax::render_forms;
use namespacer::{ErrorType, Expr};

fn reprint(src: &str) -> String {
    render_forms(&parse(src).unwrap())
}

#[test]
fn reads_multiple_top_level_forms() {
    let forms = parse("(defvar x 1)\n; comment\n(defun f () x)").unwrap();
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0].value.head_symbol(), Some("defvar"));
    assert_eq!(forms[1].value.head_symbol(), Some("defun"));
}

#[test]
fn empty_and_comment_only_sources_have_no_forms() {
    assert!(parse("").unwrap().is_empty());
    assert!(parse("   \n\t").unwrap().is_empty());
    assert!(parse(";; nothing here\n").unwrap().is_empty());
}

#[test]
fn shorthands_read_as_lists() {
    let forms = parse("'x #'f").unwrap();
    let quoted = forms[0].value.as_list().unwrap();
    assert_eq!(quoted[0].value.as_symbol(), Some("quote"));
    assert_eq!(quoted[1].value.as_symbol(), Some("x"));
    assert_eq!(forms[1].value.head_symbol(), Some("function"));
}

#[test]
fn shorthands_print_back() {
    assert_eq!(reprint("'x #'f `(a ,b ,@c)"), "'x\n#'f\n`(a ,b ,@c)");
    assert_eq!(reprint("(quote (a b))"), "'(a b)");
}

#[test]
fn atoms_print_back() {
    assert_eq!(
        reprint("(f 42 -7 1.5 2. 3.0 \"s\\\"q\" ?a ?\\s [1 2] ())"),
        "(f 42 -7 1.5 2 3.0 \"s\\\"q\" ?a ?\\s [1 2] ())"
    );
}

#[test]
fn symbols_with_punctuation() {
    let forms = parse("1+ let* foo-bar? :key a\\ b").unwrap();
    let names: Vec<_> = forms.iter().filter_map(|f| f.value.as_symbol()).collect();
    assert_eq!(names, ["1+", "let*", "foo-bar?", ":key", "a b"]);
    assert_eq!(forms[4].value.pretty(), "a\\ b");
}

#[test]
fn dotted_pairs() {
    let forms = parse("(a . b) (a b . (c))").unwrap();
    assert!(matches!(&*forms[0].value, Expr::Dotted(items, _) if items.len() == 1));
    assert_eq!(forms[0].value.pretty(), "(a . b)");
    assert_eq!(forms[1].value.pretty(), "(a b . (c))");
}

#[test]
fn nil_and_empty_list_are_both_nil() {
    let forms = parse("nil ()").unwrap();
    assert!(forms[0].value.is_nil());
    assert!(forms[1].value.is_nil());
}

#[test]
fn spans_point_into_the_source() {
    let src = "(defvar x 1)";
    let form = &parse(src).unwrap()[0];
    assert_eq!((form.span.start, form.span.end), (0, src.len()));
    let name = &form.value.as_list().unwrap()[1];
    assert_eq!(&src[name.span.start..name.span.end], "x");
}

#[test]
fn unclosed_list_is_a_parse_error() {
    let err = parse_named("bad.el", "(defun f () (g)").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Parse);
    assert!(err.span().is_some());
}

#[test]
fn stray_close_paren_is_a_parse_error() {
    let err = parse("(a))").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Parse);
}

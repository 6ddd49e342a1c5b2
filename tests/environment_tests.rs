//! In-memory host tests: snapshots, preludes, macros and the source pipeline.

use std::fs;
use std::path::PathBuf;

use namespacer::host::{MacroDef, MacroTemplate};
use namespacer::syntax::parser::parse;
use namespacer::syntax::render_forms;
use namespacer::{expand_source, Environment, EnvironmentSnapshot, ErrorType, Host};

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("namespacer-{}-{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn yaml_snapshot_is_loaded() {
    let path = temp_file("env.yaml", "functions:\n  - foo-helper\nvariables:\n  - foo-count\n");
    let snapshot = EnvironmentSnapshot::load(&path).unwrap();
    let _ = fs::remove_file(&path);

    let mut env = Environment::new();
    env.apply_snapshot(&snapshot);
    assert!(env.is_function_bound("foo-helper"));
    assert!(env.is_variable_bound("foo-count"));
}

#[test]
fn json_snapshot_fields_default_to_empty() {
    let path = temp_file("env.json", r#"{ "variables": ["x"] }"#);
    let snapshot = EnvironmentSnapshot::load(&path).unwrap();
    let _ = fs::remove_file(&path);

    assert!(snapshot.functions.is_empty());
    assert_eq!(snapshot.variables, ["x"]);
}

#[test]
fn snapshot_with_unknown_extension_is_rejected() {
    let path = temp_file("env.toml", "functions = []");
    let err = EnvironmentSnapshot::load(&path).unwrap_err();
    let _ = fs::remove_file(&path);
    assert_eq!(err.error_type(), ErrorType::Configuration);
}

#[test]
fn missing_snapshot_is_an_io_error() {
    let err = EnvironmentSnapshot::load("/nonexistent/namespacer/env.yaml").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Io);
}

#[test]
fn prelude_definitions_are_visible() {
    let mut env = Environment::new();
    env.load_prelude(
        "prelude.el",
        "(defvar lib-x 1)\n(defun lib-f () nil)\n(defmacro lib-m (a) `(list ,a))",
    )
    .unwrap();
    assert!(env.is_variable_bound("lib-x"));
    assert!(env.is_function_bound("lib-f"));
    assert!(env.is_macro("lib-m"));
    assert!(env.is_function_bound("lib-m"));
}

#[test]
fn prelude_errors_carry_the_source() {
    let mut env = Environment::new();
    let err = env
        .load_prelude("prelude.el", "(defmacro bad (a a) a)")
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::MalformedForm);
}

#[test]
fn standard_macros_are_available() {
    let mut env = Environment::new();
    for name in ["when", "unless", "push"] {
        assert!(env.is_macro(name), "{}", name);
    }
    let call = parse("(push 1 stack)").unwrap().remove(0);
    let out = env.expand_one_step(&call).unwrap();
    assert_eq!(out.value.pretty(), "(setq stack (cons 1 stack))");
    assert!(!Environment::empty().is_macro("when"));
}

#[test]
fn registered_template_macros_expand() {
    let mut env = Environment::empty();
    let def = parse("(defmacro pair (a &optional b) (cons a b))").unwrap().remove(0);
    let items = def.value.as_list().unwrap();
    let params = namespacer::host::template::ParamList::parse(&items[2]).unwrap();
    let template = MacroTemplate::new(params, items[3].clone()).unwrap();
    env.define_macro("pair", MacroDef::Template(template));

    let out = env.expand_one_step(&parse("(pair 1)").unwrap()[0]).unwrap();
    assert_eq!(out.value.pretty(), "(cons 1 nil)");
}

#[test]
fn source_pipeline_absorbs_each_form() {
    let mut env = Environment::new();
    let out = expand_source(
        "(define-namespace util- (defun trim (s) s))\n\
         (define-namespace app- (defvar name \"x\") (defun run () (util-trim name)))",
        &mut env,
    )
    .unwrap();
    assert_eq!(
        render_forms(&out),
        "(progn (defun util-trim (s) s))\n\
         (progn (defvar app-name \"x\") (defun app-run () (util-trim app-name)))"
    );
    assert!(env.is_function_bound("util-trim"));
    assert!(env.is_function_bound("app-run"));
    assert!(env.is_variable_bound("app-name"));
}

#[test]
fn source_pipeline_reports_errors_with_spans() {
    let mut env = Environment::new();
    let err = expand_source("(define-namespace foo- (let x))", &mut env).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::MalformedForm);
    assert!(err.span().is_some());
}

#[test]
fn define_namespace_requires_a_symbol_name() {
    let mut env = Environment::new();
    let err = expand_source("(define-namespace \"foo-\" (defvar x 1))", &mut env).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Configuration);
}

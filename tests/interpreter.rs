use std::{cell::RefCell, fs, io::Write, rc::Rc};

use evoscript::{
    exception::Exception,
    runtime::{RunMode, Runtime},
    value::Value,
    EvoError,
};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn captured_runtime() -> (Runtime, SharedBuffer, SharedBuffer) {
    let output = SharedBuffer::default();
    let errors = SharedBuffer::default();
    let mut runtime = Runtime::new();
    runtime.set_output(output.clone());
    runtime.set_error_output(errors.clone());
    (runtime, output, errors)
}

fn eval(source: &str) -> Value {
    let (mut runtime, _, _) = captured_runtime();
    runtime
        .run_code(source, RunMode::Include)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> Exception {
    let (mut runtime, _, _) = captured_runtime();
    match runtime.run_code(source, RunMode::Include) {
        Ok(value) => panic!("expected exception, received value {value:?}"),
        Err(EvoError::Exception(exception)) => exception,
        Err(other) => panic!("expected exception, received {other}"),
    }
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        other => panic!("expected int, found {other:?}"),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => panic!("expected bool, found {other:?}"),
    }
}

fn expect_string(value: &Value) -> String {
    match value.as_object().and_then(|object| object.as_str()) {
        Some(text) => text.to_string(),
        None => panic!("expected String, found {value:?}"),
    }
}

#[test]
fn while_loop_counts_down_to_zero() {
    let value = eval("let x = 10; while (x > 0) { x = x - 1; } x;");
    assert_eq!(expect_int(&value), 0);
}

#[test]
fn calls_declared_function() {
    let value = eval("function f(a) { return a + 1; } f(41);");
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn catch_binds_thrown_value() {
    let value = eval("try { throw 5; } catch (e) { e; }");
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn empty_program_is_undefined() {
    assert!(eval("").is_undefined());
}

#[test]
fn arithmetic_respects_precedence() {
    assert_eq!(expect_int(&eval("1 + 2 * 3;")), 7);
    assert_eq!(expect_int(&eval("(1 + 2) * 3;")), 9);
    assert_eq!(expect_int(&eval("10 - 4 - 3;")), 3);
    assert_eq!(expect_int(&eval("17 % 5;")), 2);
    assert_eq!(expect_int(&eval("-7 / 2;")), -3);
    assert_eq!(expect_int(&eval("0x10 + ~0;")), 15);
}

#[test]
fn logical_operators_short_circuit() {
    let value = eval(
        r#"
        let called = 0;
        function side() { called = called + 1; return true; }
        false && side();
        true || side();
        called;
        "#,
    );
    assert_eq!(expect_int(&value), 0);

    let value = eval(
        r#"
        let called = 0;
        function side() { called = called + 1; return true; }
        let r = true && side();
        called;
        "#,
    );
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn division_by_zero_throws() {
    assert_eq!(eval_error("5 / 0;").message(), "Cannot divide by 0");
    assert_eq!(eval_error("5 % 0;").message(), "Cannot modulo by 0");
}

#[test]
fn unknown_identifier_falls_back_to_global() {
    let (mut runtime, _, _) = captured_runtime();
    let value = runtime
        .run_code("function f() { return never_declared; } f();", RunMode::Include)
        .expect("evaluation should succeed");
    assert!(value.is_undefined());
    assert!(runtime.global().get_own("never_declared").is_some());

    let before = runtime.global().member_count();
    runtime
        .run_code("never_declared; never_declared;", RunMode::Include)
        .expect("evaluation should succeed");
    assert_eq!(runtime.global().member_count(), before);
}

#[test]
fn assignment_through_reference_is_visible() {
    let (mut runtime, _, _) = captured_runtime();
    runtime
        .run_code("let a = 1;", RunMode::Include)
        .expect("declaration should succeed");
    let name = runtime.intern("a");
    let mut alias = Value::Reference(runtime.resolve_identifier(&name));
    alias
        .assign(&mut runtime, &Value::Int(7))
        .expect("assignment should succeed");
    let value = runtime
        .run_code("a;", RunMode::Include)
        .expect("evaluation should succeed");
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn assignment_copies_values() {
    assert_eq!(expect_int(&eval("let a = 1; let b = a; b = 5; a;")), 1);
}

#[test]
fn increments_and_compound_assignment() {
    assert_eq!(expect_int(&eval("let a = 1; ++a; a;")), 2);
    assert_eq!(expect_int(&eval("let a = 1; let b = a++; b;")), 1);
    assert_eq!(expect_int(&eval("let a = 1; a--; a;")), 0);
    assert_eq!(expect_int(&eval("let a = 3; a *= 4; a -= 2; a;")), 10);
}

#[test]
fn exception_aborts_enclosing_expressions() {
    let value = eval(
        r#"
        function boom() { throw new Exception("deep"); }
        let r = 0;
        try { r = 1 + (2 * boom()); } catch (e) { r = r + 100; }
        r;
        "#,
    );
    assert_eq!(expect_int(&value), 100);
}

#[test]
fn caught_exception_exposes_message() {
    let value = eval(r#"try { throw new Exception("bad input"); } catch (e) { e.message; }"#);
    assert_eq!(expect_string(&value), "bad input");
}

#[test]
fn uncaught_exception_is_reported() {
    let (mut runtime, _, errors) = captured_runtime();
    let result = runtime.run_code(
        r#"function f() { throw new Exception("bad"); } f();"#,
        RunMode::Script,
    );
    assert!(matches!(result, Err(EvoError::Exception(_))));
    let report = errors.contents();
    assert!(report.contains("Uncaught Exception: bad"), "{report}");
    assert!(report.contains("    at Global::f()"), "{report}");
    assert_eq!(runtime.call_stack().depth(), 1);
}

#[test]
fn switch_runs_matching_case_only() {
    let source = |subject: i64| {
        format!(
            "let r = 0; switch ({subject}) {{ case 1: r = 10; break; case 2: r = 20; break; default: r = 30; }} r;"
        )
    };
    assert_eq!(expect_int(&eval(&source(1))), 10);
    assert_eq!(expect_int(&eval(&source(2))), 20);
    assert_eq!(expect_int(&eval(&source(7))), 30);

    let value = eval("let r = 0; switch (1) { case 1: r = r + 1; case 2: r = r + 10; } r;");
    assert_eq!(expect_int(&value), 1);
    let value = eval("let r = 0; switch (-1) { case -1: r = 5; } r;");
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn for_loop_with_break_and_continue() {
    let value = eval("let sum = 0; for (let i = 0; i < 5; i++) { sum += i; } sum;");
    assert_eq!(expect_int(&value), 10);

    let value = eval(
        r#"
        let s = 0;
        for (let i = 0; i < 10; i++) {
            if (i == 5) break;
            if (i % 2 == 0) continue;
            s += i;
        }
        s;
        "#,
    );
    assert_eq!(expect_int(&value), 4);
}

#[test]
fn if_else_branches() {
    assert_eq!(expect_int(&eval("let r; if (1 < 2) r = 1; else r = 2; r;")), 1);
    assert_eq!(expect_int(&eval("let r; if (0) { r = 1; } else { r = 2; } r;")), 2);
}

#[test]
fn const_bindings_are_read_only() {
    let exception = eval_error("const x = 1; x = 2;");
    assert_eq!(
        exception.message(),
        "Cannot create writable reference for read-only object"
    );
}

#[test]
fn block_declarations_are_scoped() {
    let value = eval("let x = 1; { let x = 2; } x;");
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn string_operations() {
    assert_eq!(expect_int(&eval(r#""abc".length();"#)), 3);
    assert_eq!(expect_int(&eval(r#""5" + 3;"#)), 8);
    assert_eq!(expect_string(&eval(r#""a" + "b";"#)), "ab");
    assert_eq!(expect_string(&eval(r#"1 + "a";"#)), "1a");
    assert_eq!(expect_string(&eval(r#""abc"[1];"#)), "b");
    assert_eq!(expect_string(&eval(r#""x".concat(1, "y");"#)), "x1y");
    assert_eq!(expect_string(&eval(r#""hello".substring(1, 3);"#)), "ell");
    assert_eq!(expect_string(&eval(r#"String.from_codepoints(72, 105);"#)), "Hi");
    assert_eq!(expect_string(&eval("new String(42);")), "42");
    assert!(expect_bool(&eval(r#""abc" == "abc";"#)));
    assert!(expect_bool(&eval(r#""abc" < "abd";"#)));
}

#[test]
fn string_subscript_out_of_range_throws() {
    assert_eq!(eval_error(r#""abc"[5];"#).message(), "Index 5 out of range");
}

#[test]
fn mismatched_types_compare_unknown() {
    assert!(!expect_bool(&eval("1 == true;")));
    assert!(expect_bool(&eval("1 != true;")));
    assert!(!expect_bool(&eval("1 >= null;")));
    assert!(!expect_bool(&eval("null == null;")));
    assert!(expect_bool(&eval("null != null;")));
    assert!(!expect_bool(&eval("undefined == undefined;")));
    assert_eq!(
        expect_int(&eval("let r = 0; switch (null) { case 0: r = 1; break; default: r = 2; } r;")),
        2
    );
}

#[test]
fn control_flow_cannot_escape_program() {
    assert_eq!(eval_error("return 1;").message(), "Cannot 'return' in global scope");
    assert_eq!(eval_error("break;").message(), "Cannot 'break' in global scope");
    assert_eq!(
        eval_error("function f() { continue; } f();").message(),
        "Cannot 'continue' outside of loop"
    );
}

#[test]
fn calling_non_callables_throws() {
    assert_eq!(eval_error("let x = 5; x();").message(), "Cannot call non-object");
    assert_eq!(
        eval_error("let o = new Object(); o();").message(),
        "Object of type Object is not callable"
    );
    assert_eq!(eval_error("let n = 1; new n();").message(), "Cannot convert int to object");
}

#[test]
fn native_method_checks_this() {
    let exception = eval_error(r#"let w = sys.write; w("x");"#);
    assert_eq!(
        exception.message(),
        "Cannot call function with invalid 'this': 'Global', required type: System"
    );
}

#[test]
fn plain_objects_auto_vivify_members() {
    assert_eq!(expect_int(&eval(r#"let o = new Object(); o.x = 5; o["x"];"#)), 5);
    assert!(eval("let o = new Object(); o.missing;").is_undefined());
}

#[test]
fn member_call_binds_this() {
    let value = eval(
        r#"
        let o = new Object();
        o.v = 7;
        o.get = function() { return this.v; };
        o.get();
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn sys_writes_to_output() {
    let (mut runtime, output, _) = captured_runtime();
    runtime
        .run_code(r#"sys.writeln("a", 1, true); sys.write("b");"#, RunMode::Script)
        .expect("evaluation should succeed");
    assert_eq!(output.contents(), "a1true\nb");
}

#[test]
fn sys_dump_prints_debug_form() {
    let (mut runtime, output, _) = captured_runtime();
    let value = runtime
        .run_code("sys.dump(1, null);", RunMode::Script)
        .expect("evaluation should succeed");
    assert_eq!(expect_int(&value), 2);
    assert_eq!(output.contents(), "Value{ int: 1 }\nValue{ null }\n");
}

#[test]
fn sys_throws_reports_and_discards_exceptions() {
    assert!(expect_bool(&eval("sys.throws(function() { throw 1; });")));
    assert!(!expect_bool(&eval("sys.throws(function() { return 1; });")));
}

#[test]
fn sys_backtrace_lists_frames() {
    let (mut runtime, _, errors) = captured_runtime();
    runtime
        .run_code(
            "function inner() { sys.backtrace(); } function outer() { inner(); } outer();",
            RunMode::Script,
        )
        .expect("evaluation should succeed");
    assert_eq!(
        errors.contents(),
        "Backtrace:\n    at System::backtrace()\n    at Global::inner()\n    at Global::outer()\n    at <global scope>\n"
    );
}

#[test]
fn exception_print_writes_to_error_stream() {
    let (mut runtime, _, errors) = captured_runtime();
    runtime
        .run_code(
            r#"function make() { return new Exception("oops"); } let e = make(); e.print();"#,
            RunMode::Script,
        )
        .expect("evaluation should succeed");
    assert_eq!(
        errors.contents(),
        "Exception: oops\n    at ClassWrapper::__construct()\n    at Global::make()\n    at <global scope>\n"
    );
}

#[test]
fn sys_dump_stops_at_reference_cycles() {
    let (mut runtime, output, _) = captured_runtime();
    runtime
        .run_code(
            "let a = new Object(); let b = new Object(); a.b = b; b.a = a; sys.dump(a);",
            RunMode::Script,
        )
        .expect("evaluation should succeed");
    assert_eq!(
        output.contents(),
        "Value{ object: Object:{{\n  b: Value{ object: Object:{{\n  a: <recursive reference>\n}} }\n}} }\n"
    );
}

#[test]
fn repl_mode_echoes_values() {
    let (mut runtime, output, _) = captured_runtime();
    runtime
        .run_code(r#""hi";"#, RunMode::Repl)
        .expect("evaluation should succeed");
    runtime
        .run_code("String;", RunMode::Repl)
        .expect("evaluation should succeed");
    assert_eq!(output.contents(), "\"hi\"\nclass String {...}\n");
}

#[test]
fn syntax_errors_are_reported_before_execution() {
    let (mut runtime, output, errors) = captured_runtime();
    let result = runtime.run_code(r#"sys.write("ran"); let x = (1 + 2;"#, RunMode::Script);
    assert!(matches!(result, Err(EvoError::Syntax(_))));
    assert!(output.contents().is_empty());
    let report = errors.contents();
    assert!(report.starts_with("Syntax Errors detected:"), "{report}");
    assert!(report.contains("Unmatched '('"), "{report}");
}

#[test]
fn include_runs_file_in_global_scope() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("lib.evo");
    fs::write(&path, "let shared = 41; function inc(v) { return v + 1; }").expect("write script");

    let value = eval(&format!(r#"include("{}"); inc(shared);"#, path.display()));
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn include_raises_syntax_error() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("broken.evo");
    fs::write(&path, "let x = (1 + 2;").expect("write script");

    let value = eval(&format!(
        r#"try {{ include("{}"); }} catch (e) {{ e; }}"#,
        path.display()
    ));
    let object = value.as_object().expect("caught value is an object");
    assert_eq!(object.type_name(), "SyntaxError");
    let message = object
        .as_exception()
        .map(|data| data.message.clone())
        .unwrap_or_default();
    assert!(message.starts_with("Parser errors in included script"), "{message}");
}

#[test]
fn include_of_missing_file_throws() {
    let exception = eval_error(r#"include("/definitely/not/here.evo");"#);
    assert!(exception
        .message()
        .starts_with("Failed to open file '/definitely/not/here.evo'"));
}

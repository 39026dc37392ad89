use std::cell::RefCell;

use evoscript::{
    class::{Class, ClassBehavior, ClassRef, PlainObject},
    function::ArgumentList,
    object::{Object, ObjectRef, Payload},
    runtime::{RunMode, Runtime},
    value::Value,
    EvalResult, EvoError,
};

struct Tally;

impl ClassBehavior for Tally {
    fn construct(
        &self,
        rt: &mut Runtime,
        class: &ClassRef,
        args: &ArgumentList,
    ) -> EvalResult<ObjectRef> {
        let start = args.get(0).to_int(rt)?;
        Ok(Object::with_class(class, Payload::Native(RefCell::new(Box::new(start)))))
    }

    fn to_string(&self, object: &Object) -> String {
        match object.native_data::<i64>() {
            Some(count) => format!("Tally({})", *count),
            None => "Tally".to_string(),
        }
    }
}

fn run(runtime: &mut Runtime, source: &str) -> Value {
    runtime
        .run_code(source, RunMode::Include)
        .expect("evaluation should succeed")
}

fn run_error(runtime: &mut Runtime, source: &str) -> String {
    match runtime.run_code(source, RunMode::Include) {
        Ok(value) => panic!("expected exception, received value {value:?}"),
        Err(EvoError::Exception(exception)) => exception.message(),
        Err(other) => panic!("expected exception, received {other}"),
    }
}

fn text(value: &Value) -> String {
    value
        .as_object()
        .and_then(|object| object.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| panic!("expected String, found {value:?}"))
}

#[test]
fn derived_class_resolves_base_methods() {
    let mut runtime = Runtime::new();
    let base = runtime.register_class(Class::new("Base", PlainObject));
    let derived = runtime.register_class(Class::derived("Derived", &base, PlainObject));
    runtime.define_native_method(&base, "greet", |rt, _, _| Ok(rt.new_string("base")));

    let instance = Object::with_class(&derived, Payload::None);
    assert!(instance.is_instance_of(&base));
    assert!(instance.is_instance_of(&derived));
    assert!(!Object::with_class(&base, Payload::None).is_instance_of(&derived));

    runtime.define_global("instance", Value::Object(instance));
    assert_eq!(text(&run(&mut runtime, "instance.greet();")), "base");

    runtime.define_native_method(&derived, "greet", |rt, _, _| Ok(rt.new_string("derived")));
    assert_eq!(text(&run(&mut runtime, "instance.greet();")), "derived");
}

#[test]
fn virtual_members_are_read_only() {
    let mut runtime = Runtime::new();
    let class = runtime.register_class(Class::new("Widget", PlainObject));
    runtime.define_native_method(&class, "size", |_, _, _| Ok(Value::Int(3)));
    runtime.define_global("w", Value::Object(Object::with_class(&class, Payload::None)));

    assert_eq!(
        run_error(&mut runtime, "w.size = 1;"),
        "Cannot create writable reference for read-only object"
    );
    assert!(matches!(run(&mut runtime, "w.size();"), Value::Int(3)));
}

#[test]
fn native_methods_receive_this_and_arguments() {
    let mut runtime = Runtime::new();
    let class = runtime.register_class(Class::new("Counter", PlainObject));
    runtime.define_native_method(&class, "sum", |rt, this, args| {
        let mut total = 0;
        for arg in args.iter() {
            total += arg.to_int(rt)?;
        }
        let name = rt.intern("last");
        this.set(name, Value::Int(total));
        Ok(Value::Int(total))
    });
    let wrapper = runtime.class_wrapper(&class);
    runtime.define_global("Counter", Value::Object(wrapper));

    let value = run(&mut runtime, "let c = new Counter(); c.sum(1, 2, 3); c.last;");
    assert!(matches!(value, Value::Int(6)));
    assert_eq!(
        run_error(&mut runtime, "let f = c.sum; f();"),
        "Cannot call function with invalid 'this': 'Global', required type: Counter"
    );
}

#[test]
fn base_link_does_not_own_base_class() {
    let base = Class::new("Transient", PlainObject);
    let derived = Class::derived("Child", &base, PlainObject);
    assert_eq!(derived.base().map(|class| class.name().to_string()), Some("Transient".into()));
    drop(base);
    assert!(derived.base().is_none());
    assert!(derived.resolve_class_member("anything").is_none());
}

#[test]
fn unresolved_class_member_is_not_an_error() {
    let mut runtime = Runtime::new();
    let class = runtime.register_class(Class::new("Empty", PlainObject));
    assert!(class.resolve_class_member("missing").is_none());
    let object = Object::with_class(&class, Payload::None);
    assert!(object.get_without_side_effects("missing").is_none());
    let name = runtime.intern("missing");
    assert!(object.get(&name).get().is_undefined());
    assert_eq!(object.member_count(), 1);
}

#[test]
fn argument_list_distinguishes_missing_and_undefined() {
    let args = ArgumentList::new(vec![Value::Int(1), Value::Undefined]);
    assert!(args.is_given(1));
    assert!(!args.is_defined(1));
    assert!(!args.is_given(2));
    assert!(args.get(5).is_undefined());
    assert!(matches!(args.get_or(5, Value::Int(9)), Value::Int(9)));
}

#[test]
fn call_stack_unwinds_after_exceptions() {
    let mut runtime = Runtime::new();
    let depth = runtime.call_stack().depth();
    run_error(
        &mut runtime,
        "function a() { { let x = 1; throw x; } } function b() { a(); } b();",
    );
    assert_eq!(runtime.call_stack().depth(), depth);
}

#[test]
fn custom_globals_are_used() {
    let global_this = Object::new(None, Payload::None);
    let mut runtime = Runtime::with_globals(None, Some(global_this.clone()));
    let value = run(&mut runtime, "this;");
    let this = value.as_object().expect("this is an object");
    assert!(std::rc::Rc::ptr_eq(this, &global_this));
}

#[test]
fn class_wrapper_constructs_instances() {
    let mut runtime = Runtime::new();
    let value = run(&mut runtime, "let o = new Object(); o;");
    assert_eq!(value.as_object().map(|object| object.type_name()), Some("Object".into()));

    let value = run(&mut runtime, r#"new SyntaxError("x");"#);
    let object = value.as_object().expect("constructed object");
    assert!(object.is_instance_of(&runtime.intrinsics().exception));
    assert_eq!(object.to_string_value(), "SyntaxError: x");
}

#[test]
fn native_objects_carry_typed_state() {
    let mut runtime = Runtime::new();
    let class = runtime.register_class(Class::new("Tally", Tally));
    runtime.define_native_method(&class, "bump", |_, this, _| {
        let Some(mut count) = this.native_data_mut::<i64>() else {
            return Ok(Value::Undefined);
        };
        *count += 1;
        Ok(Value::Int(*count))
    });
    let wrapper = runtime.class_wrapper(&class);
    runtime.define_global("Tally", Value::Object(wrapper));

    let value = run(&mut runtime, "let t = new Tally(40); t.bump(); t.bump();");
    assert!(matches!(value, Value::Int(42)));
    let value = run(&mut runtime, "t;");
    let tally = value.as_object().expect("tally object");
    assert_eq!(tally.to_string_value(), "Tally(42)");
    assert!(tally.native_data::<String>().is_none());
}

#[test]
fn member_listing_includes_inherited_virtual_members() {
    let mut runtime = Runtime::new();
    let base = runtime.register_class(Class::new("Shape", PlainObject));
    let derived = runtime.register_class(Class::derived("Square", &base, PlainObject));
    runtime.define_native_method(&base, "area", |_, _, _| Ok(Value::Int(0)));
    runtime.define_native_method(&derived, "side", |_, _, _| Ok(Value::Int(2)));
    runtime.define_native_method(&derived, "area", |_, _, _| Ok(Value::Int(4)));

    assert_eq!(derived.virtual_member_names().len(), 2);
    let square = Object::with_class(&derived, Payload::None);
    assert_eq!(square.dump_string(), "{\n  side#: <function>\n  area#: <function>\n}");
    let shape = Object::with_class(&base, Payload::None);
    assert_eq!(shape.dump_string(), "{\n  area#: <function>\n}");
}

#[test]
fn call_stack_is_debug_printable() {
    let runtime = Runtime::new();
    let rendered = format!("{:?}", runtime.call_stack());
    assert!(rendered.contains("name: \"<global scope>\""));
    assert!(rendered.contains("class: \"Global\""));
}

use std::fs;

use crate::{
    class::{ClassBehavior, ClassRef},
    diagnostics::EvoError,
    exception::EvalResult,
    function::ArgumentList,
    object::{Object, ObjectRef, Payload},
    operations::CompareResult,
    runtime::{RunMode, Runtime},
    value::{Value, ValueType},
};

/// Registers the built-in classes, wrappers and global functions.
pub fn install(rt: &mut Runtime) {
    let intrinsics = rt.intrinsics();
    let string = intrinsics.string.clone();
    let class_wrapper = intrinsics.class_wrapper.clone();
    let exception = intrinsics.exception.clone();
    let system = intrinsics.system.clone();
    let object = intrinsics.object.clone();
    let syntax_error = intrinsics.syntax_error.clone();

    rt.define_native_method(&class_wrapper, "__construct", class_wrapper_construct);

    rt.define_native_method(&string, "length", string_length);
    rt.define_native_method(&string, "concat", string_concat);
    rt.define_native_method(&string, "substring", string_substring);

    rt.define_native_method(&exception, "print", exception_print);

    rt.define_native_method(&system, "write", sys_write);
    rt.define_native_method(&system, "writeln", sys_writeln);
    rt.define_native_method(&system, "dump", sys_dump);
    rt.define_native_method(&system, "backtrace", sys_backtrace);
    rt.define_native_method(&system, "throws", sys_throws);

    for class in [&object, &exception, &syntax_error] {
        let wrapper = rt.class_wrapper(class);
        rt.define_global(class.name(), Value::Object(wrapper));
    }
    let string_wrapper = rt.class_wrapper(&string);
    rt.define_native_function(&string_wrapper, "from_codepoints", string_from_codepoints);
    rt.define_global("String", Value::Object(string_wrapper));

    let sys = Object::with_class(&system, Payload::None);
    rt.define_global("sys", Value::Object(sys));

    let global = rt.global().clone();
    rt.define_native_function(&global, "include", include);
    rt.define_native_function(&global, "to_int", |rt, _, args| {
        Ok(Value::Int(args.get(0).to_int(rt)?))
    });
    rt.define_native_function(&global, "to_bool", |_, _, args| {
        Ok(Value::Bool(args.get(0).to_bool()))
    });
}

fn ensure_min(rt: &mut Runtime, args: &ArgumentList, min: usize, name: &str) -> EvalResult<()> {
    if args.len() < min {
        return Err(rt.throw_exception(format!(
            "`{name}` expected at least {min} arguments but received {}",
            args.len()
        )));
    }
    Ok(())
}

fn ensure_max(rt: &mut Runtime, args: &ArgumentList, max: usize, name: &str) -> EvalResult<()> {
    if args.len() > max {
        return Err(rt.throw_exception(format!(
            "`{name}` expected at most {max} arguments but received {}",
            args.len()
        )));
    }
    Ok(())
}

fn text_of(this: &ObjectRef) -> &str {
    this.as_str().unwrap_or_default()
}

/// Strings are immutable; every operation returns a new `String` object.
pub struct StringBehavior;

impl ClassBehavior for StringBehavior {
    fn construct(
        &self,
        rt: &mut Runtime,
        _class: &ClassRef,
        args: &ArgumentList,
    ) -> EvalResult<ObjectRef> {
        let text = if args.is_defined(0) {
            args.get(0).to_string()
        } else {
            String::new()
        };
        Ok(rt.new_string_object(text))
    }

    fn to_string(&self, object: &Object) -> String {
        object.as_str().unwrap_or_default().to_string()
    }

    fn to_primitive(
        &self,
        rt: &mut Runtime,
        object: &ObjectRef,
        hint: ValueType,
    ) -> EvalResult<Value> {
        let text = text_of(object);
        match hint {
            ValueType::Int => match text.trim().parse::<i64>() {
                Ok(value) => Ok(Value::Int(value)),
                Err(_) => Err(rt.throw_exception(format!("Cannot convert '{text}' to int"))),
            },
            _ => Err(rt.throw_exception(format!("Cannot convert String to {hint}"))),
        }
    }

    fn operator_add(&self, rt: &mut Runtime, lhs: &ObjectRef, rhs: &Value) -> EvalResult<Value> {
        Ok(rt.new_string(format!("{}{rhs}", text_of(lhs))))
    }

    fn operator_compare(
        &self,
        _rt: &mut Runtime,
        lhs: &ObjectRef,
        rhs: &Value,
    ) -> EvalResult<CompareResult> {
        let rhs = rhs.to_string();
        Ok(match text_of(lhs).cmp(rhs.as_str()) {
            std::cmp::Ordering::Less => CompareResult::Less,
            std::cmp::Ordering::Equal => CompareResult::Equal,
            std::cmp::Ordering::Greater => CompareResult::Greater,
        })
    }

    fn operator_subscript(
        &self,
        rt: &mut Runtime,
        object: &ObjectRef,
        index: &Value,
    ) -> EvalResult<Value> {
        let position = index.to_int(rt)?;
        let character = usize::try_from(position)
            .ok()
            .and_then(|position| text_of(object).chars().nth(position));
        match character {
            Some(character) => Ok(rt.new_string(character.to_string())),
            None => Err(rt.throw_exception(format!("Index {position} out of range"))),
        }
    }

    fn print(&self, object: &Object, _detailed: bool) -> String {
        format!("\"{}\"", object.as_str().unwrap_or_default())
    }
}

fn string_length(_rt: &mut Runtime, this: &ObjectRef, _args: &ArgumentList) -> EvalResult<Value> {
    let length = text_of(this).chars().count();
    Ok(Value::Int(i64::try_from(length).unwrap_or(i64::MAX)))
}

fn string_concat(rt: &mut Runtime, this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    let mut result = text_of(this).to_string();
    for arg in args.iter() {
        result.push_str(&arg.to_string());
    }
    Ok(rt.new_string(result))
}

/// `substring(start[, length])`, counted in characters.
fn string_substring(rt: &mut Runtime, this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    ensure_min(rt, args, 1, "substring")?;
    ensure_max(rt, args, 2, "substring")?;
    let start = args.get(0).to_int(rt)?;
    let length = if args.is_given(1) {
        Some(args.get(1).to_int(rt)?)
    } else {
        None
    };
    if start < 0 {
        return Err(rt.throw_exception("start cannot be negative"));
    }
    if length.is_some_and(|length| length < 0) {
        return Err(rt.throw_exception("length cannot be negative"));
    }

    let chars: Vec<char> = text_of(this).chars().collect();
    let start = usize::try_from(start).unwrap_or(usize::MAX);
    if start > chars.len() {
        return Err(rt.throw_exception("start exceeds string length"));
    }
    let end = match length {
        Some(length) => {
            let end = start.saturating_add(usize::try_from(length).unwrap_or(usize::MAX));
            if end > chars.len() {
                return Err(rt.throw_exception("length exceeds string length"));
            }
            end
        }
        None => chars.len(),
    };
    Ok(rt.new_string(chars[start..end].iter().collect::<String>()))
}

fn string_from_codepoints(rt: &mut Runtime, _this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    let mut result = String::new();
    for arg in args.iter() {
        let codepoint = arg.to_int(rt)?;
        match u32::try_from(codepoint).ok().and_then(char::from_u32) {
            Some(character) => result.push(character),
            None => return Err(rt.throw_exception(format!("Invalid codepoint {codepoint}"))),
        }
    }
    Ok(rt.new_string(result))
}

fn class_wrapper_construct(rt: &mut Runtime, this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    match this.as_class() {
        Some(class) => {
            let class = class.clone();
            Ok(Value::Object(class.create_object(rt, args)?))
        }
        None => Err(rt.throw_exception("Class wrapper has no class")),
    }
}

fn exception_print(rt: &mut Runtime, this: &ObjectRef, _args: &ArgumentList) -> EvalResult<Value> {
    let text = format!("{}\n", this.repl_string(true));
    rt.write_error_output(&text)?;
    Ok(Value::Undefined)
}

fn sys_write(rt: &mut Runtime, _this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    let text: String = args.iter().map(|arg| arg.to_string()).collect();
    rt.write_output(&text)?;
    Ok(Value::Undefined)
}

fn sys_writeln(rt: &mut Runtime, this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    sys_write(rt, this, args)?;
    rt.write_output("\n")?;
    Ok(Value::Undefined)
}

fn sys_dump(rt: &mut Runtime, _this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    for arg in args.iter() {
        let text = format!("{}\n", arg.dump_string());
        rt.write_output(&text)?;
    }
    Ok(Value::Int(i64::try_from(args.len()).unwrap_or(i64::MAX)))
}

fn sys_backtrace(rt: &mut Runtime, _this: &ObjectRef, _args: &ArgumentList) -> EvalResult<Value> {
    let mut text = String::from("Backtrace:\n");
    for frame in rt.backtrace() {
        text.push_str(&format!("    at {frame}\n"));
    }
    rt.write_error_output(&text)?;
    Ok(Value::Undefined)
}

/// Calls its argument and reports whether it threw. The exception is discarded.
fn sys_throws(rt: &mut Runtime, _this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    ensure_min(rt, args, 1, "throws")?;
    let threw = args.get(0).call(rt, ArgumentList::default()).is_err();
    Ok(Value::Bool(threw))
}

fn include(rt: &mut Runtime, _this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
    if !args.is_defined(0) {
        return Err(rt.throw_exception("You need to specify file name"));
    }
    let path = args.get(0).to_string();
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            return Err(rt.throw_exception(format!(
                "Failed to open file '{path}' for executing: {err}"
            )))
        }
    };
    let mut context = rt.push_global_context(format!("<include {path}>"));
    match context.run_code(&source, RunMode::Include) {
        Ok(value) => Ok(value),
        Err(EvoError::Exception(exception)) => Err(exception),
        Err(other) => Err(context.throw_exception(other.to_string())),
    }
}

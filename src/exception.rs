use std::fmt;

use crate::{
    class::{ClassBehavior, ClassRef},
    function::ArgumentList,
    object::{Object, ObjectRef},
    runtime::Runtime,
    value::Value,
};

/// Result of anything that can throw a script exception.
pub type EvalResult<T> = std::result::Result<T, Exception>;

/// Payload carried by instances of `Exception` and its subclasses.
#[derive(Debug, Clone)]
pub struct ExceptionData {
    pub message: String,
    /// Frame names at the point of construction, innermost first.
    pub backtrace: Vec<String>,
}

/// A thrown script value travelling up the Rust call stack.
#[derive(Clone)]
pub struct Exception {
    value: Value,
    backtrace: Vec<String>,
}

impl Exception {
    pub fn new(value: Value, backtrace: Vec<String>) -> Self {
        Self {
            value: value.dereferenced(),
            backtrace,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn backtrace(&self) -> &[String] {
        &self.backtrace
    }

    fn data(&self) -> Option<&ExceptionData> {
        self.value.as_object().and_then(|object| object.as_exception())
    }

    pub fn is_exception_object(&self) -> bool {
        self.data().is_some()
    }

    pub fn message(&self) -> String {
        match self.data() {
            Some(data) => data.message.clone(),
            None => self.value.to_string(),
        }
    }

    pub fn type_name(&self) -> String {
        match &self.value {
            Value::Object(object) => object.type_name(),
            other => other.value_type().to_string(),
        }
    }

    /// The text printed for an uncaught exception.
    pub fn report(&self) -> String {
        let mut out = if self.is_exception_object() {
            format!("Uncaught {}: {}\n", self.type_name(), self.message())
        } else {
            format!("Uncaught {}\n", self.value.repl_string())
        };
        for frame in &self.backtrace {
            out.push_str(&format!("    at {frame}\n"));
        }
        out
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name(), self.message())
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("value", &self.value)
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

impl std::error::Error for Exception {}

/// Shared by `Exception` and `SyntaxError`.
pub struct ExceptionBehavior;

impl ClassBehavior for ExceptionBehavior {
    fn construct(
        &self,
        rt: &mut Runtime,
        class: &ClassRef,
        args: &ArgumentList,
    ) -> EvalResult<ObjectRef> {
        let message = if args.is_defined(0) {
            args.get(0).to_string()
        } else {
            String::new()
        };
        Ok(rt.new_exception_object(class, message))
    }

    fn to_string(&self, object: &Object) -> String {
        match object.as_exception() {
            Some(data) => format!("{}: {}", object.type_name(), data.message),
            None => object.type_name(),
        }
    }

    fn print(&self, object: &Object, detailed: bool) -> String {
        let Some(data) = object.as_exception() else {
            return object.type_name();
        };
        let mut out = format!("{}: {}", object.type_name(), data.message);
        if detailed {
            for frame in &data.backtrace {
                out.push_str(&format!("\n    at {frame}"));
            }
        }
        out
    }
}

use std::{
    io::{self, Write},
    rc::Rc,
};

use tracing::debug;

use crate::{
    ast::FunctionDecl,
    class::{Class, ClassRef, ClassWrapper, PlainObject},
    diagnostics::{render_all, EvoError, Result},
    environment::{CallStack, ExecutionContext},
    exception::{EvalResult, Exception, ExceptionBehavior, ExceptionData},
    function::{ArgumentList, Function, FunctionBehavior, NativeFunction, ScriptFunction},
    interner::{Interner, Name},
    object::{Object, ObjectRef, Payload},
    parser, stdlib,
    value::Value,
};

/// How `run_code` treats the result and any failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Reports errors to the error stream.
    Script,
    /// Like `Script`, and echoes the result value.
    Repl,
    /// Reports nothing; load failures become `SyntaxError` exceptions.
    Include,
}

/// Classes every runtime owns. Also keeps base classes alive for the weak links
/// held by derived classes.
pub struct Intrinsics {
    pub object: ClassRef,
    pub global: ClassRef,
    pub function: ClassRef,
    pub class_wrapper: ClassRef,
    pub string: ClassRef,
    pub exception: ClassRef,
    pub syntax_error: ClassRef,
    pub system: ClassRef,
}

impl Intrinsics {
    fn new() -> Self {
        let object = Class::new("Object", PlainObject);
        let exception = Class::new("Exception", ExceptionBehavior);
        Self {
            global: Class::derived("Global", &object, PlainObject),
            function: Class::new("Function", FunctionBehavior),
            class_wrapper: Class::new("ClassWrapper", ClassWrapper),
            string: Class::new("String", stdlib::StringBehavior),
            syntax_error: Class::derived("SyntaxError", &exception, ExceptionBehavior),
            system: Class::new("System", PlainObject),
            object,
            exception,
        }
    }
}

pub struct Runtime {
    interner: Interner,
    intrinsics: Intrinsics,
    classes: Vec<ClassRef>,
    global: ObjectRef,
    global_this: ObjectRef,
    call_stack: CallStack,
    output: Box<dyn Write>,
    error_output: Box<dyn Write>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_globals(None, None)
    }

    /// Builds a runtime around an optional pre-built global object and global
    /// `this`. Top-level declarations are stored on the global object.
    pub fn with_globals(global: Option<ObjectRef>, global_this: Option<ObjectRef>) -> Self {
        let intrinsics = Intrinsics::new();
        let global = global.unwrap_or_else(|| Object::with_class(&intrinsics.global, Payload::None));
        let global_this = global_this.unwrap_or_else(|| Object::new(None, Payload::None));

        let mut call_stack = CallStack::default();
        call_stack.push(ExecutionContext {
            name: "<global scope>".to_string(),
            this: global_this.clone(),
            scope: global.clone(),
        });

        let mut runtime = Self {
            interner: Interner::new(),
            intrinsics,
            classes: Vec::new(),
            global,
            global_this,
            call_stack,
            output: Box::new(io::stdout()),
            error_output: Box::new(io::stderr()),
        };
        stdlib::install(&mut runtime);
        runtime
    }

    /// Lexes, parses and evaluates `source` in the current execution context.
    pub fn run_code(&mut self, source: &str, mode: RunMode) -> Result<Value> {
        debug!(?mode, bytes = source.len(), "run code");
        let program = match parser::parse_program(source, &mut self.interner) {
            Ok(program) => program,
            Err(diagnostic) => {
                if mode == RunMode::Include {
                    let message = format!(
                        "Lexer errors in included script\n{}",
                        diagnostic.render(source).trim_end()
                    );
                    let class = self.intrinsics.syntax_error.clone();
                    return Err(self.throw_exception_of(&class, message).into());
                }
                write!(self.error_output, "Lexer error: {}", diagnostic.render(source))?;
                return Err(diagnostic.into());
            }
        };

        if program.is_error() {
            let diagnostics = program.diagnostics();
            let rendered = render_all(source, &diagnostics);
            if mode == RunMode::Include {
                let message = format!("Parser errors in included script\n{}", rendered.trim_end());
                let class = self.intrinsics.syntax_error.clone();
                return Err(self.throw_exception_of(&class, message).into());
            }
            write!(self.error_output, "Syntax Errors detected:\n{rendered}")?;
            return Err(EvoError::Syntax(diagnostics));
        }

        match self.run_program(&program) {
            Ok(value) => {
                let value = value.dereferenced();
                if mode == RunMode::Repl {
                    writeln!(self.output, "{}", value.repl_string())?;
                }
                Ok(value)
            }
            Err(exception) => {
                if mode != RunMode::Include {
                    write!(self.error_output, "{}", exception.report())?;
                }
                Err(exception.into())
            }
        }
    }

    pub fn throw_exception(&mut self, message: impl Into<String>) -> Exception {
        let class = self.intrinsics.exception.clone();
        self.throw_exception_of(&class, message)
    }

    /// Builds an instance of `class` (an `Exception` subclass) carrying the current
    /// backtrace.
    pub fn throw_exception_of(&mut self, class: &ClassRef, message: impl Into<String>) -> Exception {
        let message = message.into();
        debug!(class = class.name(), %message, "throw exception");
        let object = self.new_exception_object(class, message);
        Exception::new(Value::Object(object), self.backtrace())
    }

    pub fn throw_value(&mut self, value: Value) -> Exception {
        debug!(value = ?value, "throw value");
        Exception::new(value, self.backtrace())
    }

    pub fn new_exception_object(&mut self, class: &ClassRef, message: String) -> ObjectRef {
        let object = Object::with_class(
            class,
            Payload::Exception(ExceptionData {
                message: message.clone(),
                backtrace: self.backtrace(),
            }),
        );
        let name = self.intern("message");
        let text = self.new_string(message);
        object.allocate(name, text, false);
        object
    }

    pub fn new_string(&self, text: impl Into<String>) -> Value {
        Value::Object(self.new_string_object(text))
    }

    pub fn new_string_object(&self, text: impl Into<String>) -> ObjectRef {
        Object::with_class(&self.intrinsics.string, Payload::String(text.into()))
    }

    pub fn new_object(&self) -> ObjectRef {
        Object::with_class(&self.intrinsics.object, Payload::None)
    }

    /// Wraps a host callback. With `required`, calls whose `this` is not an
    /// instance of that class fail instead of reaching the callback.
    pub fn new_native_function<F>(&self, name: Name, required: Option<&ClassRef>, callback: F) -> ObjectRef
    where
        F: Fn(&mut Runtime, &ObjectRef, &ArgumentList) -> EvalResult<Value> + 'static,
    {
        Object::with_class(
            &self.intrinsics.function,
            Payload::Function(Function::Native(NativeFunction {
                name,
                required: required.map(Rc::downgrade),
                callback: Rc::new(callback),
            })),
        )
    }

    pub fn new_script_function(&self, decl: Rc<FunctionDecl>) -> ObjectRef {
        Object::with_class(
            &self.intrinsics.function,
            Payload::Function(Function::Script(ScriptFunction { decl })),
        )
    }

    pub fn class_wrapper(&self, class: &ClassRef) -> ObjectRef {
        Object::with_class(&self.intrinsics.class_wrapper, Payload::Class(class.clone()))
    }

    /// Adds a native method to `class`'s vtable, callable only on its instances.
    pub fn define_native_method<F>(&mut self, class: &ClassRef, name: &str, callback: F)
    where
        F: Fn(&mut Runtime, &ObjectRef, &ArgumentList) -> EvalResult<Value> + 'static,
    {
        let name = self.intern(name);
        let function = self.new_native_function(name.clone(), Some(class), callback);
        class.define_virtual_member(name, function);
    }

    /// Adds a read-only native member to a single object.
    pub fn define_native_function<F>(&mut self, object: &ObjectRef, name: &str, callback: F)
    where
        F: Fn(&mut Runtime, &ObjectRef, &ArgumentList) -> EvalResult<Value> + 'static,
    {
        let name = self.intern(name);
        let function = self.new_native_function(name.clone(), None, callback);
        object.allocate(name, Value::Object(function), true);
    }

    /// Keeps `class` alive for the runtime's lifetime, so subclasses may use it as
    /// a base.
    pub fn register_class(&mut self, class: ClassRef) -> ClassRef {
        debug!(class = class.name(), "register class");
        self.classes.push(class.clone());
        class
    }

    /// Installs `value` as a global under `name`.
    pub fn define_global(&mut self, name: &str, value: Value) {
        let name = self.intern(name);
        self.global.allocate(name, value, false);
    }

    pub fn intern(&mut self, name: &str) -> Name {
        self.interner.intern(name)
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    pub fn global_this(&self) -> &ObjectRef {
        &self.global_this
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub(crate) fn call_stack_mut(&mut self) -> &mut CallStack {
        &mut self.call_stack
    }

    pub fn set_output(&mut self, output: impl Write + 'static) {
        self.output = Box::new(output);
    }

    pub fn set_error_output(&mut self, error_output: impl Write + 'static) {
        self.error_output = Box::new(error_output);
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    pub fn error_output(&mut self) -> &mut dyn Write {
        self.error_output.as_mut()
    }

    /// Writes to the output stream, turning I/O failures into script exceptions.
    pub fn write_output(&mut self, text: &str) -> EvalResult<()> {
        match self.output.write_all(text.as_bytes()).and_then(|()| self.output.flush()) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.throw_exception(format!("I/O error: {err}"))),
        }
    }

    pub fn write_error_output(&mut self, text: &str) -> EvalResult<()> {
        match self
            .error_output
            .write_all(text.as_bytes())
            .and_then(|()| self.error_output.flush())
        {
            Ok(()) => Ok(()),
            Err(err) => Err(self.throw_exception(format!("I/O error: {err}"))),
        }
    }
}

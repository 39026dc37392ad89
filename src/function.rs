use std::{
    fmt,
    rc::{Rc, Weak},
};

use tracing::trace;

use crate::{
    ast::FunctionDecl,
    class::{Class, ClassBehavior},
    eval::Completion,
    exception::EvalResult,
    interner::Name,
    object::{Object, ObjectRef},
    runtime::Runtime,
    value::Value,
};

/// Positional call arguments. Missing arguments read as `undefined`.
#[derive(Debug, Clone, Default)]
pub struct ArgumentList(Vec<Value>);

impl ArgumentList {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, index: usize) -> Value {
        self.get_or(index, Value::Undefined)
    }

    pub fn get_or(&self, index: usize, default: Value) -> Value {
        self.0.get(index).cloned().unwrap_or(default)
    }

    pub fn is_given(&self, index: usize) -> bool {
        index < self.0.len()
    }

    /// Given and not `undefined`.
    pub fn is_defined(&self, index: usize) -> bool {
        self.0
            .get(index)
            .is_some_and(|value| !value.dereferenced().is_undefined())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl From<Vec<Value>> for ArgumentList {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

pub type NativeCallback = Rc<dyn Fn(&mut Runtime, &ObjectRef, &ArgumentList) -> EvalResult<Value>>;

pub enum Function {
    Native(NativeFunction),
    Script(ScriptFunction),
}

impl Function {
    pub fn name(&self) -> Option<Name> {
        match self {
            Function::Native(function) => Some(function.name.clone()),
            Function::Script(function) => function.decl.name.clone(),
        }
    }
}

/// A host callback, optionally restricted to a `this` of a given class.
pub struct NativeFunction {
    pub name: Name,
    pub required: Option<Weak<Class>>,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(&self, rt: &mut Runtime, this: &ObjectRef, args: &ArgumentList) -> EvalResult<Value> {
        if let Some(required) = self.required.as_ref().and_then(Weak::upgrade) {
            if !this.is_instance_of(&required) {
                return Err(rt.throw_exception(format!(
                    "Cannot call function with invalid 'this': '{}', required type: {}",
                    this.type_name(),
                    required.name()
                )));
            }
        }
        trace!(function = %self.name, args = args.len(), "native call");
        (self.callback)(rt, this, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub decl: Rc<FunctionDecl>,
}

impl ScriptFunction {
    /// Runs the body directly in the scope of the frame the caller pushed.
    pub fn call(&self, rt: &mut Runtime, args: &ArgumentList) -> EvalResult<Value> {
        let scope = rt.current_scope();
        for (index, param) in self.decl.params.iter().enumerate() {
            scope.allocate(param.clone(), args.get(index).dereferenced(), false);
        }
        match rt.execute_block_items(&self.decl.body)? {
            Completion::Normal(_) => Ok(Value::Undefined),
            Completion::Return(value) => Ok(value),
            Completion::Break => Err(rt.throw_exception("Cannot 'break' outside of loop")),
            Completion::Continue => Err(rt.throw_exception("Cannot 'continue' outside of loop")),
        }
    }
}

pub struct FunctionBehavior;

impl ClassBehavior for FunctionBehavior {
    fn call(
        &self,
        rt: &mut Runtime,
        callee: &ObjectRef,
        this: &ObjectRef,
        args: &ArgumentList,
    ) -> EvalResult<Value> {
        match callee.as_function() {
            Some(Function::Native(function)) => function.call(rt, this, args),
            Some(Function::Script(function)) => function.call(rt, args),
            None => Err(rt.throw_exception("Function object has no body")),
        }
    }

    fn to_string(&self, object: &Object) -> String {
        match object.function_name() {
            Some(name) => format!("[function {name}]"),
            None => "[function]".to_string(),
        }
    }

    fn print(&self, object: &Object, _detailed: bool) -> String {
        let kind = match object.as_function() {
            Some(Function::Native(_)) => "native function",
            _ => "function",
        };
        match object.function_name() {
            Some(name) => format!("{kind} {name}()"),
            None => format!("{kind} <anonymous>()"),
        }
    }
}

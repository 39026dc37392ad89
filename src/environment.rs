use std::{
    ops::{Deref, DerefMut},
    rc::Rc,
};

use tracing::trace;

use crate::{
    interner::Name,
    object::{Object, ObjectRef},
    runtime::Runtime,
    value::Reference,
};

/// One frame of the call stack. Function frames carry a name; block scopes pushed
/// with `push_scope` have an empty one.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub name: String,
    pub this: ObjectRef,
    pub scope: ObjectRef,
}

impl ExecutionContext {
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<ExecutionContext>,
}

impl CallStack {
    pub fn push(&mut self, context: ExecutionContext) {
        self.frames.push(context);
    }

    pub fn pop(&mut self) -> Option<ExecutionContext> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&ExecutionContext> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Named frames, innermost first.
    pub fn backtrace(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .filter(|frame| frame.is_named())
            .map(|frame| frame.name.clone())
            .collect()
    }
}

/// Pops the frame it was created for when dropped, on every exit path.
pub struct ContextGuard<'rt> {
    runtime: &'rt mut Runtime,
}

impl Deref for ContextGuard<'_> {
    type Target = Runtime;

    fn deref(&self) -> &Runtime {
        self.runtime
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Runtime {
        self.runtime
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.runtime.call_stack_mut().pop() {
            trace!(frame = %frame.name, "pop execution context");
        }
    }
}

impl Runtime {
    /// Pushes a function frame with a fresh local scope. `this` defaults to the
    /// global `this` object.
    pub fn push_execution_context(
        &mut self,
        name: impl Into<String>,
        this: Option<ObjectRef>,
    ) -> ContextGuard<'_> {
        let name = name.into();
        trace!(frame = %name, depth = self.call_stack().depth(), "push execution context");
        let this = this.unwrap_or_else(|| self.global_this().clone());
        self.call_stack_mut().push(ExecutionContext {
            name,
            this,
            scope: Object::new_scope(None),
        });
        ContextGuard { runtime: self }
    }

    /// Pushes a frame whose locals are the global object, so declarations made in
    /// it outlive the frame.
    pub fn push_global_context(&mut self, name: impl Into<String>) -> ContextGuard<'_> {
        let name = name.into();
        trace!(frame = %name, "push global context");
        let this = self.global_this().clone();
        let scope = self.global().clone();
        self.call_stack_mut().push(ExecutionContext { name, this, scope });
        ContextGuard { runtime: self }
    }

    /// Pushes a block scope that sees the enclosing locals and keeps the current `this`.
    pub fn push_scope(&mut self) -> ContextGuard<'_> {
        let parent = self.current_scope();
        let this = self.this_object();
        self.call_stack_mut().push(ExecutionContext {
            name: String::new(),
            this,
            scope: Object::new_scope(Some(parent)),
        });
        ContextGuard { runtime: self }
    }

    pub fn current_scope(&self) -> ObjectRef {
        match self.call_stack().current() {
            Some(frame) => frame.scope.clone(),
            None => self.global().clone(),
        }
    }

    pub fn this_object(&self) -> ObjectRef {
        match self.call_stack().current() {
            Some(frame) => frame.this.clone(),
            None => self.global_this().clone(),
        }
    }

    /// Walks the scope chain outwards. Names bound nowhere resolve on the global
    /// object, which creates them as `undefined`.
    pub fn resolve_identifier(&self, name: &Name) -> Reference {
        let global = self.global().clone();
        let mut scope = Some(self.current_scope());
        while let Some(current) = scope {
            if let Some(slot) = current.get_own(name.as_str()) {
                let container = Rc::ptr_eq(&current, &global).then(|| global.clone());
                return Reference::new(slot, container, Some(name.clone()));
            }
            scope = current.parent_scope().cloned();
        }
        global.get(name)
    }

    pub fn backtrace(&self) -> Vec<String> {
        self.call_stack().backtrace()
    }
}

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

use crate::{
    exception::EvalResult,
    function::ArgumentList,
    interner::Name,
    object::{Object, ObjectRef, Payload},
    operations::CompareResult,
    runtime::Runtime,
    value::{MemoryValue, SlotRef, Value, ValueType},
};

pub type ClassRef = Rc<Class>;

/// Per-class hooks. Every hook has a default; concrete classes override the ones
/// they support.
pub trait ClassBehavior {
    /// Allocates an instance for `new`.
    fn construct(
        &self,
        rt: &mut Runtime,
        class: &ClassRef,
        args: &ArgumentList,
    ) -> EvalResult<ObjectRef> {
        let _ = (rt, args);
        Ok(Object::with_class(class, Payload::None))
    }

    fn call(
        &self,
        rt: &mut Runtime,
        callee: &ObjectRef,
        this: &ObjectRef,
        args: &ArgumentList,
    ) -> EvalResult<Value> {
        let _ = (this, args);
        Err(rt.throw_exception(format!(
            "Object of type {} is not callable",
            callee.type_name()
        )))
    }

    fn to_string(&self, object: &Object) -> String {
        format!("[object {}]", object.type_name())
    }

    fn to_primitive(
        &self,
        rt: &mut Runtime,
        object: &ObjectRef,
        hint: ValueType,
    ) -> EvalResult<Value> {
        Err(rt.throw_exception(format!(
            "Cannot convert {} to {hint}",
            object.type_name()
        )))
    }

    fn operator_add(&self, rt: &mut Runtime, lhs: &ObjectRef, rhs: &Value) -> EvalResult<Value> {
        let _ = (lhs, rhs);
        Err(rt.throw_exception("Add operator not defined for class"))
    }

    fn operator_compare(
        &self,
        rt: &mut Runtime,
        lhs: &ObjectRef,
        rhs: &Value,
    ) -> EvalResult<CompareResult> {
        let _ = (lhs, rhs);
        Err(rt.throw_exception("Compare operator not defined for class"))
    }

    /// Plain objects index their own members by the string form of the key.
    fn operator_subscript(
        &self,
        rt: &mut Runtime,
        object: &ObjectRef,
        index: &Value,
    ) -> EvalResult<Value> {
        let name = rt.intern(&index.to_string());
        Ok(Value::Reference(object.get(&name)))
    }

    fn print(&self, object: &Object, detailed: bool) -> String {
        if detailed {
            format!("{} {}", object.type_name(), object.members_string(false))
        } else {
            format!("{} {{...}}", object.type_name())
        }
    }
}

/// Behavior of ordinary script objects.
pub struct PlainObject;

impl ClassBehavior for PlainObject {}

/// Instances wrap a class so scripts can reach it by name and construct it through
/// the virtual `__construct` member.
pub struct ClassWrapper;

impl ClassBehavior for ClassWrapper {
    fn to_string(&self, object: &Object) -> String {
        match object.as_class() {
            Some(class) => format!("[class {}]", class.name()),
            None => "[class]".to_string(),
        }
    }

    fn print(&self, object: &Object, _detailed: bool) -> String {
        match object.as_class() {
            Some(class) => format!("class {} {{...}}", class.name()),
            None => self.to_string(object),
        }
    }
}

pub struct Class {
    name: String,
    vtable: RefCell<IndexMap<Name, ObjectRef>>,
    /// Non-owning; the runtime's class registry keeps bases alive.
    base: Option<Weak<Class>>,
    behavior: Box<dyn ClassBehavior>,
}

impl Class {
    pub fn new(name: impl Into<String>, behavior: impl ClassBehavior + 'static) -> ClassRef {
        Rc::new(Self {
            name: name.into(),
            vtable: RefCell::new(IndexMap::new()),
            base: None,
            behavior: Box::new(behavior),
        })
    }

    pub fn derived(
        name: impl Into<String>,
        base: &ClassRef,
        behavior: impl ClassBehavior + 'static,
    ) -> ClassRef {
        Rc::new(Self {
            name: name.into(),
            vtable: RefCell::new(IndexMap::new()),
            base: Some(Rc::downgrade(base)),
            behavior: Box::new(behavior),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<ClassRef> {
        self.base.as_ref().and_then(Weak::upgrade)
    }

    pub fn behavior(&self) -> &dyn ClassBehavior {
        self.behavior.as_ref()
    }

    pub fn define_virtual_member(&self, name: Name, value: ObjectRef) {
        self.vtable.borrow_mut().insert(name, value);
    }

    /// Looks in this class's vtable, then up the base chain. The result is a fresh
    /// read-only slot, so virtual members cannot be overwritten through instances.
    pub fn resolve_class_member(&self, name: &str) -> Option<SlotRef> {
        let found = self
            .vtable
            .borrow()
            .get_key_value(name)
            .map(|(key, object)| (key.clone(), object.clone()));
        match found {
            Some((key, object)) => Some(
                MemoryValue::named(key, Value::Object(object))
                    .with_read_only(true)
                    .into_slot(),
            ),
            None => self.base()?.resolve_class_member(name),
        }
    }

    /// True when `other` is this class or one of its bases.
    pub fn is_same_or_derived_from(&self, other: &Class) -> bool {
        std::ptr::eq(self, other)
            || self
                .base()
                .is_some_and(|base| base.is_same_or_derived_from(other))
    }

    pub fn create_object(self: &Rc<Self>, rt: &mut Runtime, args: &ArgumentList) -> EvalResult<ObjectRef> {
        self.behavior.construct(rt, self, args)
    }

    /// Names resolvable through the class chain, own entries first. A name shadowed
    /// by a derived class is listed once.
    pub fn virtual_member_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.vtable.borrow().keys().cloned().collect();
        if let Some(base) = self.base() {
            for name in base.virtual_member_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("base", &self.base().map(|base| base.name.clone()))
            .finish()
    }
}

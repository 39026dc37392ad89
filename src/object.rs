use std::{
    any::Any,
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    class::{Class, ClassRef},
    exception::{EvalResult, ExceptionData},
    function::{ArgumentList, Function},
    interner::Name,
    operations::CompareResult,
    runtime::Runtime,
    value::{MemoryValue, Reference, SlotRef, Value, ValueType},
};

pub type ObjectRef = Rc<Object>;

/// Internal state attached to an object, opaque to member access.
pub enum Payload {
    None,
    String(String),
    Function(Function),
    /// The object is a script-visible wrapper around a class.
    Class(ClassRef),
    Exception(ExceptionData),
    /// Local variables of a frame; the parent is the enclosing block scope.
    Scope(Option<ObjectRef>),
    /// Host-defined data for native classes.
    Native(RefCell<Box<dyn Any>>),
}

pub struct Object {
    class: Option<ClassRef>,
    members: RefCell<IndexMap<Name, SlotRef>>,
    payload: Payload,
}

impl Object {
    pub fn new(class: Option<ClassRef>, payload: Payload) -> ObjectRef {
        Rc::new(Self {
            class,
            members: RefCell::new(IndexMap::new()),
            payload,
        })
    }

    pub fn with_class(class: &ClassRef, payload: Payload) -> ObjectRef {
        Self::new(Some(class.clone()), payload)
    }

    pub fn new_scope(parent: Option<ObjectRef>) -> ObjectRef {
        Self::new(None, Payload::Scope(parent))
    }

    pub fn class(&self) -> Option<&ClassRef> {
        self.class.as_ref()
    }

    pub fn type_name(&self) -> String {
        match &self.class {
            Some(class) => class.name().to_string(),
            None => "Object".to_string(),
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.payload {
            Payload::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match &self.payload {
            Payload::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_exception(&self) -> Option<&ExceptionData> {
        match &self.payload {
            Payload::Exception(data) => Some(data),
            _ => None,
        }
    }

    pub fn parent_scope(&self) -> Option<&ObjectRef> {
        match &self.payload {
            Payload::Scope(parent) => parent.as_ref(),
            _ => None,
        }
    }

    pub fn native_data<T: 'static>(&self) -> Option<Ref<'_, T>> {
        match &self.payload {
            Payload::Native(data) => Ref::filter_map(data.borrow(), |data| data.downcast_ref::<T>()).ok(),
            _ => None,
        }
    }

    pub fn native_data_mut<T: 'static>(&self) -> Option<RefMut<'_, T>> {
        match &self.payload {
            Payload::Native(data) => {
                RefMut::filter_map(data.borrow_mut(), |data| data.downcast_mut::<T>()).ok()
            }
            _ => None,
        }
    }

    pub fn function_name(&self) -> Option<Name> {
        self.as_function().and_then(Function::name)
    }

    /// Member lookup. Virtual members from the class chain win and come back as
    /// read-only slots; otherwise an absent member is created as `undefined`.
    pub fn get(self: &Rc<Self>, member: &Name) -> Reference {
        let slot = self.get_without_side_effects(member.as_str()).unwrap_or_else(|| {
            self.members
                .borrow_mut()
                .entry(member.clone())
                .or_insert_with(|| MemoryValue::named(member.clone(), Value::Undefined).into_slot())
                .clone()
        });
        Reference::new(slot, Some(self.clone()), Some(member.clone()))
    }

    pub fn get_without_side_effects(&self, member: &str) -> Option<SlotRef> {
        if let Some(slot) = self
            .class
            .as_ref()
            .and_then(|class| class.resolve_class_member(member))
        {
            return Some(slot);
        }
        self.get_own(member)
    }

    /// Instance member only, ignoring the class chain.
    pub fn get_own(&self, member: &str) -> Option<SlotRef> {
        self.members.borrow().get(member).cloned()
    }

    /// Creates (or replaces) an own member slot.
    pub fn allocate(&self, name: Name, value: Value, read_only: bool) -> SlotRef {
        let slot = MemoryValue::named(name.clone(), value)
            .with_read_only(read_only)
            .into_slot();
        self.members.borrow_mut().insert(name, slot.clone());
        slot
    }

    pub fn set(&self, name: Name, value: Value) {
        self.allocate(name, value, false);
    }

    pub fn member_count(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn members(&self) -> Vec<(Name, Value)> {
        self.members
            .borrow()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.borrow().value.clone()))
            .collect()
    }

    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.class
            .as_ref()
            .is_some_and(|own| own.is_same_or_derived_from(class))
    }

    pub fn to_string_value(&self) -> String {
        match &self.class {
            Some(class) => class.behavior().to_string(self),
            None => "[object Object]".to_string(),
        }
    }

    pub fn to_primitive(self: &Rc<Self>, rt: &mut Runtime, hint: ValueType) -> EvalResult<Value> {
        match self.class.clone() {
            Some(class) => class.behavior().to_primitive(rt, self, hint),
            None => Err(rt.throw_exception(format!(
                "Cannot convert {} to primitive",
                self.type_name()
            ))),
        }
    }

    pub fn operator_add(self: &Rc<Self>, rt: &mut Runtime, rhs: &Value) -> EvalResult<Value> {
        match self.class.clone() {
            Some(class) => class.behavior().operator_add(rt, self, rhs),
            None => Err(rt.throw_exception("Cannot call add operator without class")),
        }
    }

    pub fn operator_compare(
        self: &Rc<Self>,
        rt: &mut Runtime,
        rhs: &Value,
    ) -> EvalResult<CompareResult> {
        match self.class.clone() {
            Some(class) => class.behavior().operator_compare(rt, self, rhs),
            None => Err(rt.throw_exception("Cannot call compare operator without class")),
        }
    }

    pub fn operator_subscript(self: &Rc<Self>, rt: &mut Runtime, index: &Value) -> EvalResult<Value> {
        match self.class.clone() {
            Some(class) => class.behavior().operator_subscript(rt, self, index),
            None => Ok(Value::Reference(self.get(&Name::new(&index.to_string())))),
        }
    }

    pub fn call(
        self: &Rc<Self>,
        rt: &mut Runtime,
        this: &ObjectRef,
        args: &ArgumentList,
    ) -> EvalResult<Value> {
        match self.class.clone() {
            Some(class) => class.behavior().call(rt, self, this, args),
            None => Err(rt.throw_exception("Cannot call object without class")),
        }
    }

    pub fn repl_string(&self, detailed: bool) -> String {
        match &self.class {
            Some(class) => class.behavior().print(self, detailed),
            None => format!("{} {}", self.type_name(), self.members_string(false)),
        }
    }

    pub fn dump_string(&self) -> String {
        self.render_members(true, &mut Vec::new())
    }

    /// Renders `{ name: value, ... }` including the virtual members of the class
    /// chain, which are marked with `#`.
    pub fn members_string(&self, dump: bool) -> String {
        self.render_members(dump, &mut Vec::new())
    }

    /// `visiting` holds the objects currently being rendered; meeting one of them
    /// again prints `<recursive reference>` instead of descending.
    pub(crate) fn render_members(&self, dump: bool, visiting: &mut Vec<*const Object>) -> String {
        let members = self.members();
        let virtual_members = self
            .class
            .as_ref()
            .map(|class| class.virtual_member_names())
            .unwrap_or_default();
        if members.is_empty() && virtual_members.is_empty() {
            return "{}".to_string();
        }

        visiting.push(self as *const Object);
        let mut lines = Vec::new();
        for (name, value) in members {
            let rendered = match &value {
                Value::Object(object) if visiting.contains(&Rc::as_ptr(object)) => {
                    "<recursive reference>".to_string()
                }
                _ if dump => value.dump_with(visiting),
                Value::Object(object) if object.class.is_none() => {
                    format!("{} {}", object.type_name(), object.render_members(false, visiting))
                }
                Value::Object(object) => object.repl_string(false),
                _ => value.to_string(),
            };
            lines.push(format!("  {name}: {rendered}"));
        }
        visiting.pop();
        for name in virtual_members {
            lines.push(format!("  {name}#: <function>"));
        }
        format!("{{\n{}\n}}", lines.join("\n"))
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.type_name())
            .field("members", &self.member_count())
            .finish_non_exhaustive()
    }
}

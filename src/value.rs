use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    exception::EvalResult,
    function::ArgumentList,
    interner::Name,
    object::{Object, ObjectRef},
    runtime::Runtime,
};

/// Shared handle to a storage slot. The owning scope or member table holds one
/// handle; every `Value::Reference` to the slot holds another.
pub type SlotRef = Rc<RefCell<MemoryValue>>;

/// A named, mutable storage cell.
#[derive(Debug, Clone)]
pub struct MemoryValue {
    pub value: Value,
    pub read_only: bool,
    pub name: Option<Name>,
}

impl MemoryValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            read_only: false,
            name: None,
        }
    }

    pub fn named(name: Name, value: Value) -> Self {
        Self {
            value,
            read_only: false,
            name: Some(name),
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn into_slot(self) -> SlotRef {
        Rc::new(RefCell::new(self))
    }
}

/// A value bound to a slot, remembering where it was resolved from.
#[derive(Clone)]
pub struct Reference {
    pub slot: SlotRef,
    /// Object the reference was resolved through; becomes `this` when called.
    pub container: Option<ObjectRef>,
    pub name: Option<Name>,
}

impl Reference {
    pub fn new(slot: SlotRef, container: Option<ObjectRef>, name: Option<Name>) -> Self {
        Self {
            slot,
            container,
            name,
        }
    }

    pub fn get(&self) -> Value {
        self.slot.borrow().value.clone()
    }

    pub fn is_read_only(&self) -> bool {
        self.slot.borrow().read_only
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Invalid,
    Null,
    Undefined,
    Int,
    Bool,
    Object,
    Reference,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Invalid => "<invalid>",
            ValueType::Null => "null",
            ValueType::Undefined => "undefined",
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::Object => "object",
            ValueType::Reference => "reference",
        })
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Invalid,
    Null,
    Undefined,
    Int(i64),
    Bool(bool),
    Object(ObjectRef),
    Reference(Reference),
}

impl Value {
    pub fn reference(slot: SlotRef, container: Option<ObjectRef>, name: Option<Name>) -> Self {
        Value::Reference(Reference::new(slot, container, name))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Invalid => ValueType::Invalid,
            Value::Null => ValueType::Null,
            Value::Undefined => ValueType::Undefined,
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Object(_) => ValueType::Object,
            Value::Reference(_) => ValueType::Reference,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Follows references until a non-reference value is found. Slots never store
    /// references to themselves, so this terminates.
    pub fn dereferenced(&self) -> Value {
        let mut value = self.clone();
        while let Value::Reference(reference) = &value {
            let next = reference.get();
            value = next;
        }
        value
    }

    pub fn to_int(&self, rt: &mut Runtime) -> EvalResult<i64> {
        match self {
            Value::Null | Value::Undefined => Ok(0),
            Value::Int(value) => Ok(*value),
            Value::Bool(value) => Ok(i64::from(*value)),
            Value::Object(object) => match object.to_primitive(rt, ValueType::Int)? {
                Value::Int(value) => Ok(value),
                other => Err(rt.throw_exception(format!(
                    "Cannot convert {} to int",
                    other.value_type()
                ))),
            },
            Value::Reference(reference) => reference.get().to_int(rt),
            Value::Invalid => Err(rt.throw_exception("Cannot convert <invalid> to int")),
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Invalid | Value::Null | Value::Undefined => false,
            Value::Int(value) => *value != 0,
            Value::Bool(value) => *value,
            Value::Object(_) => true,
            Value::Reference(reference) => reference.get().to_bool(),
        }
    }

    pub fn to_object(&self, rt: &mut Runtime) -> EvalResult<ObjectRef> {
        match self {
            Value::Object(object) => Ok(object.clone()),
            Value::Reference(reference) => reference.get().to_object(rt),
            other => Err(rt.throw_exception(format!(
                "Cannot convert {} to object",
                other.value_type()
            ))),
        }
    }

    pub fn to_reference(&self, rt: &mut Runtime) -> EvalResult<Reference> {
        match self {
            Value::Reference(reference) => Ok(reference.clone()),
            other => Err(rt.throw_exception(format!(
                "Cannot bind {} to reference",
                other.value_type()
            ))),
        }
    }

    pub fn to_writable_reference(&self, rt: &mut Runtime) -> EvalResult<Reference> {
        let reference = self.to_reference(rt)?;
        if reference.is_read_only() {
            return Err(rt.throw_exception(
                "Cannot create writable reference for read-only object",
            ));
        }
        Ok(reference)
    }

    /// Writes through a reference into its slot, or overwrites `self` otherwise. The
    /// stored value is always the dereferenced right-hand side.
    pub fn assign(&mut self, rt: &mut Runtime, other: &Value) -> EvalResult<()> {
        let new_value = other.dereferenced();
        match self {
            Value::Reference(reference) => {
                if reference.is_read_only() {
                    return Err(rt.throw_exception("Cannot assign to read-only object"));
                }
                reference.slot.borrow_mut().value = new_value;
            }
            _ => *self = new_value,
        }
        Ok(())
    }

    /// Calls the dereferenced object inside a new named execution context whose
    /// `this` is the container the callee was resolved through.
    pub fn call(&self, rt: &mut Runtime, args: ArgumentList) -> EvalResult<Value> {
        let Value::Object(callee) = self.dereferenced() else {
            return Err(rt.throw_exception("Cannot call non-object"));
        };
        let container = match self {
            Value::Reference(reference) => reference.container.clone(),
            _ => None,
        };
        let frame_name = match &container {
            Some(container) => format!("{}::{}()", container.type_name(), self.callee_name()),
            None => format!("{}()", self.callee_name()),
        };
        let this = container.clone().unwrap_or_else(|| callee.clone());
        let mut context = rt.push_execution_context(frame_name, container);
        callee.call(&mut context, &this, &args)
    }

    fn callee_name(&self) -> String {
        if let Value::Object(object) = self.dereferenced() {
            if let Some(name) = object.function_name() {
                return name.to_string();
            }
        }
        match self {
            Value::Reference(Reference {
                name: Some(name), ..
            }) => name.to_string(),
            _ => "<object>".to_string(),
        }
    }

    /// Human-readable form used by the REPL echo and `sys.write`.
    pub fn repl_string(&self) -> String {
        match self.dereferenced() {
            Value::Object(object) => object.repl_string(true),
            other => other.to_string(),
        }
    }

    /// Debug form used by `sys.dump`.
    pub fn dump_string(&self) -> String {
        self.dump_with(&mut Vec::new())
    }

    /// `visiting` holds the objects whose members are being dumped further up.
    pub(crate) fn dump_with(&self, visiting: &mut Vec<*const Object>) -> String {
        match self {
            Value::Object(object) if visiting.contains(&Rc::as_ptr(object)) => {
                "<recursive reference>".to_string()
            }
            Value::Object(object) => format!(
                "Value{{ object: {}:{{{}}} }}",
                object.type_name(),
                object.render_members(true, visiting)
            ),
            Value::Reference(reference) => {
                format!("Value{{ reference: {} }}", reference.get().dump_with(visiting))
            }
            Value::Invalid | Value::Null | Value::Undefined => {
                format!("Value{{ {} }}", self.value_type())
            }
            other => format!("Value{{ {}: {} }}", other.value_type(), other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => write!(f, "<invalid>"),
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Object(object) => write!(f, "{}", object.to_string_value()),
            Value::Reference(reference) => write!(f, "{}", reference.get()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => write!(f, "Invalid"),
            Value::Null => write!(f, "Null"),
            Value::Undefined => write!(f, "Undefined"),
            Value::Int(value) => write!(f, "Int({value})"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Object(object) => write!(f, "Object({})", object.type_name()),
            Value::Reference(reference) => match &reference.name {
                Some(name) => write!(f, "Reference({name} = {:?})", reference.get()),
                None => write!(f, "Reference({:?})", reference.get()),
            },
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", Value::Reference(self.clone()))
    }
}

//! Arithmetic, logical and comparison operators shared by the evaluator and the
//! native library. Every operation dereferences its operands first.

use crate::{exception::EvalResult, runtime::Runtime, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Equal,
    Less,
    Greater,
    Unknown,
}

impl CompareResult {
    fn of<T: Ord>(lhs: T, rhs: T) -> Self {
        match lhs.cmp(&rhs) {
            std::cmp::Ordering::Less => CompareResult::Less,
            std::cmp::Ordering::Equal => CompareResult::Equal,
            std::cmp::Ordering::Greater => CompareResult::Greater,
        }
    }
}

/// Integer addition when both sides convert to int. Otherwise an object on the left
/// gets its add operator, and anything else is concatenated as strings.
pub fn add(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let lhs = lhs.dereferenced();
    let rhs = rhs.dereferenced();
    if let (Ok(left), Ok(right)) = (lhs.to_int(rt), rhs.to_int(rt)) {
        return Ok(Value::Int(left.wrapping_add(right)));
    }
    match &lhs {
        Value::Object(object) => object.operator_add(rt, &rhs),
        _ => Ok(rt.new_string(format!("{lhs}{rhs}"))),
    }
}

fn integers(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<(i64, i64)> {
    let left = lhs.dereferenced().to_int(rt)?;
    let right = rhs.dereferenced().to_int(rt)?;
    Ok((left, right))
}

pub fn subtract(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let (left, right) = integers(rt, lhs, rhs)?;
    Ok(Value::Int(left.wrapping_sub(right)))
}

pub fn multiply(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let (left, right) = integers(rt, lhs, rhs)?;
    Ok(Value::Int(left.wrapping_mul(right)))
}

pub fn divide(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let (left, right) = integers(rt, lhs, rhs)?;
    if right == 0 {
        return Err(rt.throw_exception("Cannot divide by 0"));
    }
    Ok(Value::Int(left.wrapping_div(right)))
}

pub fn modulo(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let (left, right) = integers(rt, lhs, rhs)?;
    if right == 0 {
        return Err(rt.throw_exception("Cannot modulo by 0"));
    }
    Ok(Value::Int(left.wrapping_rem(right)))
}

pub fn not(value: &Value) -> Value {
    Value::Bool(!value.dereferenced().to_bool())
}

pub fn bitwise_not(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    Ok(Value::Int(!value.dereferenced().to_int(rt)?))
}

pub fn minus(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    Ok(Value::Int(value.dereferenced().to_int(rt)?.wrapping_neg()))
}

pub fn plus(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    Ok(Value::Int(value.dereferenced().to_int(rt)?))
}

/// Operands of different types never compare, and neither do `null` or `undefined`;
/// both give `Unknown`, not an error.
pub fn compare(rt: &mut Runtime, lhs: &Value, rhs: &Value) -> EvalResult<CompareResult> {
    let lhs = lhs.dereferenced();
    let rhs = rhs.dereferenced();
    if lhs.value_type() != rhs.value_type() {
        return Ok(CompareResult::Unknown);
    }
    match (&lhs, &rhs) {
        (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => {
            Ok(CompareResult::Unknown)
        }
        (Value::Int(left), Value::Int(right)) => Ok(CompareResult::of(left, right)),
        (Value::Bool(left), Value::Bool(right)) if left == right => Ok(CompareResult::Equal),
        (Value::Bool(_), Value::Bool(_)) => Ok(CompareResult::Unknown),
        (Value::Object(object), _) => object.operator_compare(rt, &rhs),
        _ => Err(rt.throw_exception(format!(
            "Cannot compare values of type {}",
            lhs.value_type()
        ))),
    }
}

fn step(rt: &mut Runtime, value: &Value, delta: i64) -> EvalResult<()> {
    let reference = value.to_writable_reference(rt)?;
    let current = reference.get().to_int(rt)?;
    let mut target = Value::Reference(reference);
    target.assign(rt, &Value::Int(current.wrapping_add(delta)))
}

/// Returns the operand itself, so `++x` stays assignable.
pub fn prefix_increment(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    step(rt, value, 1)?;
    Ok(value.clone())
}

pub fn prefix_decrement(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    step(rt, value, -1)?;
    Ok(value.clone())
}

pub fn postfix_increment(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    let old = value.dereferenced();
    step(rt, value, 1)?;
    Ok(old)
}

pub fn postfix_decrement(rt: &mut Runtime, value: &Value) -> EvalResult<Value> {
    let old = value.dereferenced();
    step(rt, value, -1)?;
    Ok(old)
}

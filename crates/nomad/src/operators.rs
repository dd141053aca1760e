//! Arithmetic and comparison opcode semantics, factored out of
//! `vm.rs`'s fetch-decode-execute loop.
//!
//! Nomad's `ADD`/`SUB`/`MULT`/`DIV` require the two operands to be the
//! exact same scalar type; there is no int/float promotion.

use crate::error::Error;
use crate::token::Span;
use crate::types::{RuntimeType, BOOL_TYPE, INT_TYPE};
use crate::value::{Payload, Value};

pub fn apply_not(v: Value, span: Span) -> Result<Value, Error> {
    match v.payload {
        Payload::Bool(b) => Ok(Value::bool(v.ty, !b)),
        _ => Err(Error::type_mismatch(span, BOOL_TYPE, v.ty.name())),
    }
}

pub fn apply_negative(v: Value, span: Span) -> Result<Value, Error> {
    match v.payload {
        Payload::Int(n) => Ok(Value::int(v.ty, -n)),
        Payload::Float(f) => Ok(Value::float(v.ty, -f)),
        _ => Err(Error::type_mismatch(span, "int|float", v.ty.name())),
    }
}

pub fn apply_len(v: &Value, span: Span) -> Result<Value, Error> {
    let n = match &v.payload {
        Payload::Str(s) => s.chars().count() as i64,
        Payload::Array(items) => items.len() as i64,
        _ => return Err(Error::type_mismatch(span, "array|string", v.ty.name())),
    };
    Ok(Value::int(RuntimeType::Scalar(INT_TYPE.to_string()), n))
}

pub enum ArithOp {
    Add,
    Sub,
    Mult,
    Div,
}

/// `ADD`/`SUB`/`MULT`/`DIV`: matching int/float operands (exact same
/// type); string `+` concatenates.
pub fn apply_arith(op: ArithOp, lhs: Value, rhs: Value, span: Span) -> Result<Value, Error> {
    if matches!(op, ArithOp::Add) {
        if let (Payload::Str(a), Payload::Str(b)) = (&lhs.payload, &rhs.payload) {
            return Ok(Value::string(lhs.ty, format!("{a}{b}")));
        }
    }
    if !lhs.ty.type_eq(&rhs.ty) {
        return Err(Error::type_mismatch(span, lhs.ty.name(), rhs.ty.name()));
    }
    match (&lhs.payload, &rhs.payload) {
        (Payload::Int(a), Payload::Int(b)) => {
            let result = match op {
                ArithOp::Add => a.checked_add(*b),
                ArithOp::Sub => a.checked_sub(*b),
                ArithOp::Mult => a.checked_mul(*b),
                ArithOp::Div => {
                    if *b == 0 {
                        return Err(Error::Resource("division by zero".to_string()));
                    }
                    a.checked_div(*b)
                }
            };
            let result = result.ok_or_else(|| Error::Resource("integer overflow".to_string()))?;
            Ok(Value::int(lhs.ty, result))
        }
        (Payload::Float(a), Payload::Float(b)) => {
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mult => a * b,
                ArithOp::Div => a / b,
            };
            Ok(Value::float(lhs.ty, result))
        }
        _ => Err(Error::type_mismatch(span, "int|float|string", lhs.ty.name())),
    }
}

/// `CMP`: numeric three-way compare, pushes `-1 | 0 | 1`.
pub fn apply_cmp(lhs: Value, rhs: Value, span: Span) -> Result<Value, Error> {
    if !lhs.ty.type_eq(&rhs.ty) {
        return Err(Error::type_mismatch(span, lhs.ty.name(), rhs.ty.name()));
    }
    let ordering = match (&lhs.payload, &rhs.payload) {
        (Payload::Int(a), Payload::Int(b)) => a.cmp(b),
        (Payload::Float(a), Payload::Float(b)) => {
            a.partial_cmp(b).ok_or_else(|| Error::type_mismatch(span, "comparable float", "NaN"))?
        }
        _ => return Err(Error::type_mismatch(span, "int|float", lhs.ty.name())),
    };
    let n = match ordering {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    };
    Ok(Value::int(RuntimeType::Scalar(INT_TYPE.to_string()), n))
}

/// `EQ`: pop two, push bool equality on payload.
pub fn apply_eq(lhs: &Value, rhs: &Value) -> Value {
    Value::bool(RuntimeType::Scalar(BOOL_TYPE.to_string()), lhs.ty.type_eq(&rhs.ty) && lhs.payload == rhs.payload)
}

/// `EQ_2`: pop three (top, mid, bot), push `top == mid || top == bot`.
pub fn apply_eq2(top: &Value, mid: &Value, bot: &Value) -> Value {
    let matches = (top.ty.type_eq(&mid.ty) && top.payload == mid.payload)
        || (top.ty.type_eq(&bot.ty) && top.payload == bot.payload);
    Value::bool(RuntimeType::Scalar(BOOL_TYPE.to_string()), matches)
}

pub fn apply_and(lhs: Value, rhs: Value, span: Span) -> Result<Value, Error> {
    match (lhs.payload, rhs.payload) {
        (Payload::Bool(a), Payload::Bool(b)) => Ok(Value::bool(lhs.ty, a && b)),
        _ => Err(Error::type_mismatch(span, BOOL_TYPE, "non-bool operand")),
    }
}

pub fn apply_or(lhs: Value, rhs: Value, span: Span) -> Result<Value, Error> {
    match (lhs.payload, rhs.payload) {
        (Payload::Bool(a), Payload::Bool(b)) => Ok(Value::bool(lhs.ty, a || b)),
        _ => Err(Error::type_mismatch(span, BOOL_TYPE, "non-bool operand")),
    }
}

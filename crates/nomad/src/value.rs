//! Tagged runtime values: the payload behind every [`RuntimeType`].
//!
//! Modelled as a tagged variant with one case per scalar plus
//! array/object/function/type.

use crate::env::EnvHandle;
use crate::types::RuntimeType;

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub ty: RuntimeType,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    /// Field name -> value, in declaration order, so printing is
    /// deterministic per type.
    Object(Vec<(String, Value)>),
    Function(Box<Closure>),
    Type(Box<RuntimeType>),
}

/// A runtime function value: entry address, signature, and the
/// environment active at `FUNC_INIT` time — the call's new scope is a
/// child of this, giving function literals real lexical closure over
/// their defining scope.
#[derive(Debug, Clone)]
pub struct Closure {
    pub entry_address: usize,
    pub tag: String,
    pub signature: Signature,
    pub captured_env: EnvHandle,
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        self.entry_address == other.entry_address && self.tag == other.tag && self.signature == other.signature
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<ParamSig>,
    pub return_type: RuntimeType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    pub name: String,
    pub ty: RuntimeType,
    pub default: Option<Value>,
}

impl Value {
    pub fn void() -> Self {
        Value { ty: RuntimeType::Scalar(crate::types::VOID_TYPE.to_string()), payload: Payload::Void }
    }

    pub fn bool(ty: RuntimeType, b: bool) -> Self {
        Value { ty, payload: Payload::Bool(b) }
    }

    pub fn int(ty: RuntimeType, n: i64) -> Self {
        Value { ty, payload: Payload::Int(n) }
    }

    pub fn float(ty: RuntimeType, f: f64) -> Self {
        Value { ty, payload: Payload::Float(f) }
    }

    pub fn string(ty: RuntimeType, s: String) -> Self {
        Value { ty, payload: Payload::Str(s) }
    }

    pub fn type_value(ty: RuntimeType) -> Self {
        Value { ty: RuntimeType::Scalar(crate::types::TYPE_TYPE.to_string()), payload: Payload::Type(Box::new(ty)) }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.payload {
            Payload::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.payload {
            Payload::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match &self.payload {
            Payload::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.payload {
            Payload::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Vec<(String, Value)>> {
        match &mut self.payload {
            Payload::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Vec<(String, Value)>> {
        match &self.payload {
            Payload::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&RuntimeType> {
        match &self.payload {
            Payload::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_type_mut(&mut self) -> Option<&mut RuntimeType> {
        match &mut self.payload {
            Payload::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Closure> {
        match &self.payload {
            Payload::Function(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut Closure> {
        match &mut self.payload {
            Payload::Function(c) => Some(c),
            _ => None,
        }
    }

    /// Renders the `<typeName> value` form `DEBUG_PRINT` writes to stdout.
    pub fn display(&self) -> String {
        match &self.payload {
            Payload::Void => format!("<{}> void", self.ty.name()),
            Payload::Bool(b) => format!("<{}> {b}", self.ty.name()),
            Payload::Int(n) => format!("<{}> {n}", self.ty.name()),
            Payload::Float(f) => format!("<{}> {f}", self.ty.name()),
            Payload::Str(s) => format!("<{}> {s}", self.ty.name()),
            Payload::Array(items) => {
                let rendered: Vec<String> = items.iter().map(Value::display).collect();
                format!("<{}> [{}]", self.ty.name(), rendered.join(", "))
            }
            Payload::Object(fields) => {
                let rendered: Vec<String> =
                    fields.iter().map(|(name, v)| format!("{name}: {}", v.display())).collect();
                format!("<{}> {{{}}}", self.ty.name(), rendered.join(", "))
            }
            Payload::Function(c) => format!("<{}> {}", self.ty.name(), c.tag),
            Payload::Type(t) => format!("<type> {}", t.name()),
        }
    }
}

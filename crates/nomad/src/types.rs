//! The runtime type system: scalars, arrays, named objects, and
//! structurally-typed functions.
//!
//! Rather than an interface with `name()`/`match(other)` methods and a
//! handful of concrete implementers, this models the same capability
//! set as a sealed sum, with a single `match` driving the few places
//! that need to tell the variants apart.

use std::collections::HashMap;

use crate::error::Error;
use crate::token::Span;
use crate::value::Value;

pub const VOID_TYPE: &str = "void";
pub const INT_TYPE: &str = "int";
pub const FLOAT_TYPE: &str = "float";
pub const BOOL_TYPE: &str = "bool";
pub const STRING_TYPE: &str = "string";
pub const TYPE_TYPE: &str = "type";

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeType {
    Scalar(String),
    Array(Box<RuntimeType>),
    Object(ObjectType),
    Function(FuncType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub ty: RuntimeType,
    pub default: Value,
}

/// Named (or auto-named when anonymous) object type with an ordered
/// field list, preserved insertion order so `DEBUG_PRINT` is at least
/// deterministic for a given type even though the order itself is
/// otherwise unspecified.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub anonymous: bool,
    fields: Vec<(String, ObjectField)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub params: Vec<RuntimeType>,
    pub ret: Box<RuntimeType>,
}

impl RuntimeType {
    pub fn name(&self) -> String {
        match self {
            RuntimeType::Scalar(name) => name.clone(),
            RuntimeType::Array(elem) => format!("[{}]", elem.name()),
            RuntimeType::Object(obj) => obj.name.clone(),
            RuntimeType::Function(f) => {
                let params: Vec<String> = f.params.iter().map(RuntimeType::name).collect();
                format!("func({}) {}", params.join(","), f.ret.name())
            }
        }
    }

    /// Type equality: exact-name for scalars, nominal for objects
    /// (name only), structural for arrays (element type) and functions
    /// (parameter sequence + return type).
    pub fn type_eq(&self, other: &RuntimeType) -> bool {
        match (self, other) {
            (RuntimeType::Scalar(a), RuntimeType::Scalar(b)) => a == b,
            (RuntimeType::Array(a), RuntimeType::Array(b)) => a.type_eq(b),
            (RuntimeType::Object(a), RuntimeType::Object(b)) => a.name == b.name,
            (RuntimeType::Function(a), RuntimeType::Function(b)) => {
                a.params.len() == b.params.len()
                    && a.params.iter().zip(&b.params).all(|(p, q)| p.type_eq(q))
                    && a.ret.type_eq(&b.ret)
            }
            _ => false,
        }
    }

    pub fn expect_eq(&self, other: &RuntimeType, span: Span) -> Result<(), Error> {
        if self.type_eq(other) {
            Ok(())
        } else {
            Err(Error::type_mismatch(span, self.name(), other.name()))
        }
    }

    pub fn as_array_elem(&self) -> Option<&RuntimeType> {
        match self {
            RuntimeType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            RuntimeType::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectType> {
        match self {
            RuntimeType::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FuncType> {
        match self {
            RuntimeType::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl ObjectType {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), anonymous: false, fields: Vec::new() }
    }

    pub fn anonymous(name: impl Into<String>) -> Self {
        Self { name: name.into(), anonymous: true, fields: Vec::new() }
    }

    pub fn add_field(&mut self, name: String, ty: RuntimeType, default: Value, span: Span) -> Result<(), Error> {
        if self.fields.iter().any(|(n, _)| n == &name) {
            return Err(Error::name(span, format!("field '{name}' is already declared on type '{}'", self.name)));
        }
        self.fields.push((name, ObjectField { ty, default }));
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&ObjectField> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ObjectField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }
}

impl FuncType {
    pub fn new() -> Self {
        Self { params: Vec::new(), ret: Box::new(RuntimeType::Scalar(VOID_TYPE.to_string())) }
    }
}

impl Default for FuncType {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide (per-VM-instance) catalogue of declared types, read by
/// every type-handling instruction and written only by `DECL_TYPE`.
pub struct TypeRegistry {
    types: HashMap<String, RuntimeType>,
    next_anon_id: usize,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for name in [VOID_TYPE, INT_TYPE, FLOAT_TYPE, BOOL_TYPE, TYPE_TYPE, STRING_TYPE] {
            types.insert(name.to_string(), RuntimeType::Scalar(name.to_string()));
        }
        Self { types, next_anon_id: 0 }
    }

    pub fn get(&self, name: &str, span: Span) -> Result<RuntimeType, Error> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| Error::name(span, format!("undefined type '{name}'")))
    }

    pub fn next_anonymous_name(&mut self) -> String {
        let id = self.next_anon_id;
        self.next_anon_id += 1;
        format!("$anon{id}")
    }

    /// Registers a type under `name`, rejecting shadowing of an
    /// already-declared type.
    pub fn declare(&mut self, name: String, ty: RuntimeType, span: Span) -> Result<(), Error> {
        if self.types.contains_key(&name) {
            return Err(Error::name(span, format!("type '{name}' is already declared")));
        }
        self.types.insert(name, ty);
        Ok(())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

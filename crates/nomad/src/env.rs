//! Lexically-scoped environment: a parent-chain of variable bindings.
//!
//! Declaration writes into the innermost scope; lookup searches
//! innermost-outward, with a declared type enforced on every write.
//! Modelled as an `Rc<RefCell<_>>` chain so a function literal's
//! closing-over scope can outlive the block that created it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::token::Span;
use crate::types::RuntimeType;
use crate::value::Value;

#[derive(Debug)]
struct Binding {
    ty: RuntimeType,
    value: Value,
}

#[derive(Debug)]
pub struct Environment {
    parent: Option<Rc<RefCell<Environment>>>,
    vars: HashMap<String, Binding>,
}

pub type EnvHandle = Rc<RefCell<Environment>>;

impl Environment {
    pub fn root() -> EnvHandle {
        Rc::new(RefCell::new(Environment { parent: None, vars: HashMap::new() }))
    }

    pub fn child(parent: &EnvHandle) -> EnvHandle {
        Rc::new(RefCell::new(Environment { parent: Some(Rc::clone(parent)), vars: HashMap::new() }))
    }

    /// `DECL_VAR <name>`: writes into the innermost scope unconditionally.
    pub fn declare(&mut self, name: String, ty: RuntimeType, value: Value, span: Span) -> Result<(), Error> {
        ty.expect_eq(&value.ty, span)?;
        self.vars.insert(name, Binding { ty, value });
        Ok(())
    }

    pub fn get(env: &EnvHandle, name: &str, span: Span) -> Result<Value, Error> {
        let this = env.borrow();
        if let Some(binding) = this.vars.get(name) {
            return Ok(binding.value.clone());
        }
        match &this.parent {
            Some(parent) => Environment::get(parent, name, span),
            None => Err(Error::name(span, format!("undefined variable '{name}'"))),
        }
    }

    /// `SET_VAR <name>`: the declared type stays put; only the payload
    /// is overwritten.
    pub fn set(env: &EnvHandle, name: &str, value: Value, span: Span) -> Result<(), Error> {
        let mut this = env.borrow_mut();
        if let Some(binding) = this.vars.get_mut(name) {
            binding.ty.expect_eq(&value.ty, span)?;
            binding.value = value;
            return Ok(());
        }
        let parent = this.parent.clone();
        drop(this);
        match parent {
            Some(parent) => Environment::set(&parent, name, value, span),
            None => Err(Error::name(span, format!("undefined variable '{name}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{INT_TYPE, VOID_TYPE};

    fn int_ty() -> RuntimeType {
        RuntimeType::Scalar(INT_TYPE.to_string())
    }

    #[test]
    fn child_scope_reads_parent_bindings() {
        let root = Environment::root();
        root.borrow_mut().declare("x".into(), int_ty(), Value::int(int_ty(), 1), Span::default()).unwrap();
        let child = Environment::child(&root);
        assert_eq!(Environment::get(&child, "x", Span::default()).unwrap().as_int(), Some(1));
    }

    #[test]
    fn set_rejects_type_mismatch() {
        let root = Environment::root();
        root.borrow_mut().declare("x".into(), int_ty(), Value::int(int_ty(), 1), Span::default()).unwrap();
        let bad = Value::void();
        let _ = bad;
        let void_val = Value { ty: RuntimeType::Scalar(VOID_TYPE.to_string()), payload: crate::value::Payload::Void };
        assert!(Environment::set(&root, "x", void_val, Span::default()).is_err());
    }

    #[test]
    fn set_on_undefined_name_is_name_error() {
        let root = Environment::root();
        assert!(Environment::set(&root, "missing", Value::int(int_ty(), 1), Span::default()).is_err());
    }
}

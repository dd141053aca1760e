//! Stack-based bytecode virtual machine.
//!
//! A fetch-decode-execute loop over the flat, label-resolved instruction
//! array the compiler produces. `CALL` pushes a [`Frame`] carrying a
//! return address, the stack pointer to restore on return, and the
//! caller's environment, then binds parameters into a child of the
//! callee's *captured* scope, giving function literals real lexical
//! closures.

use std::collections::{HashMap, VecDeque};

use crate::bytecode::{Instruction, JumpTarget, Op};
use crate::env::{Environment, EnvHandle};
use crate::error::Error;
use crate::operators::{self, ArithOp};
use crate::token::Span;
use crate::types::{FuncType, ObjectType, RuntimeType, TypeRegistry, VOID_TYPE};
use crate::value::{Closure, ParamSig, Payload, Signature, Value};
use tracing::warn;

/// Sentinel type name `LOAD_TYPE_INFER` pushes; `DECL_VAR` resolves it
/// to the initializer's own runtime type instead of looking it up in
/// the registry.
const INFER_MARKER: &str = "$infer";

/// Resource limits enforced during [`Vm::run`]. Both bounds default to
/// 16384.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_stack: usize,
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_stack: 16_384, max_call_depth: 16_384 }
    }
}

/// A call-stack activation: what `RETURN`/`FUNC_END` restore.
struct Frame {
    return_address: usize,
    saved_sp: usize,
    saved_env: EnvHandle,
    expected_return: RuntimeType,
}

/// Pending-call argument scope, opened by `ARGS_BEGIN` and closed by
/// `CALL`. A stack of these (not a single shared buffer) is required so
/// a nested call used as an argument expression doesn't spill its own
/// `PUSH_ARG`s into the outer call's buffer.
#[derive(Default)]
struct ArgBuffer {
    positional: VecDeque<Value>,
    named: HashMap<String, Value>,
}

pub struct Vm {
    stack: Vec<Value>,
    call_stack: Vec<Frame>,
    arg_buffers: Vec<ArgBuffer>,
    env: EnvHandle,
    types: TypeRegistry,
    print_output: Vec<String>,
    limits: Limits,
}

impl Vm {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            call_stack: Vec::new(),
            arg_buffers: Vec::new(),
            env: Environment::root(),
            types: TypeRegistry::new(),
            print_output: Vec::new(),
            limits: Limits::default(),
        }
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    pub fn take_print_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.print_output)
    }

    /// Runs a fully label-resolved instruction stream to completion.
    /// Returns whatever value the program's final bare-expression
    /// statement left on top of the stack, or `void` if none did.
    pub fn run(&mut self, instructions: &[Instruction]) -> Result<Value, Error> {
        let mut ip = 0usize;
        while ip < instructions.len() {
            let idx = ip;
            ip += 1;
            let instr = &instructions[idx];
            self.step(&instr.op, instr.debug_token.loc, &mut ip)?;
        }
        Ok(self.stack.pop().unwrap_or_else(Value::void))
    }

    fn push(&mut self, v: Value) -> Result<(), Error> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(Error::Resource("operand stack overflow".to_string()));
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, Error> {
        self.stack.pop().ok_or_else(|| Error::Resource("operand stack underflow".to_string()))
    }

    fn arg_buffer_mut(&mut self, span: Span) -> Result<&mut ArgBuffer, Error> {
        self.arg_buffers.last_mut().ok_or_else(|| Error::Compile(format!("{span} PUSH_ARG without ARGS_BEGIN")))
    }

    fn take_type(v: Value, span: Span) -> Result<RuntimeType, Error> {
        match v.payload {
            Payload::Type(t) => Ok(*t),
            _ => Err(Error::type_mismatch(span, "type", v.ty.name())),
        }
    }

    fn take_closure(v: Value, span: Span) -> Result<(RuntimeType, Closure), Error> {
        match v.payload {
            Payload::Function(c) => Ok((v.ty, *c)),
            _ => Err(Error::type_mismatch(span, "function", v.ty.name())),
        }
    }

    fn closure_runtime_type(sig: &Signature) -> RuntimeType {
        RuntimeType::Function(FuncType {
            params: sig.params.iter().map(|p| p.ty.clone()).collect(),
            ret: Box::new(sig.return_type.clone()),
        })
    }

    /// Executes one instruction. `*ip` already points at the next
    /// instruction (fall-through default); jumps and calls overwrite it.
    fn step(&mut self, op: &Op, span: Span, ip: &mut usize) -> Result<(), Error> {
        match op {
            Op::PushConst { type_name, literal } => {
                let ty = self.types.get(type_name, span)?;
                let payload = match type_name.as_str() {
                    "int" => Payload::Int(
                        literal.parse().map_err(|_| Error::Compile(format!("bad int literal '{literal}'")))?,
                    ),
                    "float" => Payload::Float(
                        literal.parse().map_err(|_| Error::Compile(format!("bad float literal '{literal}'")))?,
                    ),
                    "bool" => Payload::Bool(literal == "true"),
                    "string" => Payload::Str(literal.clone()),
                    other => return Err(Error::Compile(format!("unsupported literal type '{other}'"))),
                };
                self.push(Value { ty, payload })?;
            }
            Op::PopConst => {
                self.pop()?;
            }

            Op::LoadVar(name) => {
                let v = Environment::get(&self.env, name, span)?;
                self.push(v)?;
            }
            Op::LoadType(name) => {
                let ty = self.types.get(name, span)?;
                self.push(Value::type_value(ty))?;
            }
            Op::LoadTypeInfer => {
                self.push(Value::type_value(RuntimeType::Scalar(INFER_MARKER.to_string())))?;
            }
            Op::SetVar(name) => {
                let v = self.pop()?;
                Environment::set(&self.env, name, v, span)?;
            }
            Op::DeclVar(name) => {
                let declared = Self::take_type(self.pop()?, span)?;
                let value = self.pop()?;
                let ty = match &declared {
                    RuntimeType::Scalar(s) if s == INFER_MARKER => value.ty.clone(),
                    other => other.clone(),
                };
                self.env.borrow_mut().declare(name.clone(), ty, value, span)?;
            }
            Op::DeclType(name) => {
                let ty = Self::take_type(self.pop()?, span)?;
                self.types.declare(name.clone(), ty, span)?;
            }

            Op::Not => {
                let v = self.pop()?;
                self.push(operators::apply_not(v, span)?)?;
            }
            Op::Negative => {
                let v = self.pop()?;
                self.push(operators::apply_negative(v, span)?)?;
            }
            Op::Len => {
                let v = self.pop()?;
                let result = operators::apply_len(&v, span)?;
                self.push(result)?;
            }
            Op::Add => self.binary_arith(ArithOp::Add, span)?,
            Op::Sub => self.binary_arith(ArithOp::Sub, span)?,
            Op::Mult => self.binary_arith(ArithOp::Mult, span)?,
            Op::Div => self.binary_arith(ArithOp::Div, span)?,
            Op::Cmp => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(operators::apply_cmp(lhs, rhs, span)?)?;
            }
            Op::Eq => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let result = operators::apply_eq(&lhs, &rhs);
                self.push(result)?;
            }
            Op::Eq2 => {
                let top = self.pop()?;
                let mid = self.pop()?;
                let bot = self.pop()?;
                let result = operators::apply_eq2(&top, &mid, &bot);
                self.push(result)?;
            }
            Op::And => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(operators::apply_and(lhs, rhs, span)?)?;
            }
            Op::Or => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(operators::apply_or(lhs, rhs, span)?)?;
            }

            Op::Label(_) => {}
            Op::Jump(target) => {
                *ip = Self::address_of(target, span)?;
            }
            Op::JumpNot(target) => {
                let cond = self.pop()?;
                let truthy = cond.as_bool().ok_or_else(|| Error::type_mismatch(span, "bool", cond.ty.name()))?;
                if !truthy {
                    *ip = Self::address_of(target, span)?;
                }
            }

            Op::FuncInit(target) => {
                let entry_address = Self::address_of(target, span)?;
                let signature =
                    Signature { params: Vec::new(), return_type: RuntimeType::Scalar(VOID_TYPE.to_string()) };
                let ty = Self::closure_runtime_type(&signature);
                let closure = Closure {
                    entry_address,
                    tag: format!("<function@{entry_address}>"),
                    signature,
                    captured_env: self.env.clone(),
                };
                self.push(Value { ty, payload: Payload::Function(Box::new(closure)) })?;
            }
            Op::FuncSetRet => {
                let ret_ty = Self::take_type(self.pop()?, span)?;
                let (_, mut closure) = Self::take_closure(self.pop()?, span)?;
                closure.signature.return_type = ret_ty;
                let ty = Self::closure_runtime_type(&closure.signature);
                self.push(Value { ty, payload: Payload::Function(Box::new(closure)) })?;
            }
            Op::FuncSetParam(name) => {
                let param_ty = Self::take_type(self.pop()?, span)?;
                let (_, mut closure) = Self::take_closure(self.pop()?, span)?;
                self.add_param(&mut closure, name, param_ty, None, span)?;
                let ty = Self::closure_runtime_type(&closure.signature);
                self.push(Value { ty, payload: Payload::Function(Box::new(closure)) })?;
            }
            Op::FuncSetParamWithDefault(name) => {
                let param_ty = Self::take_type(self.pop()?, span)?;
                let default = self.pop()?;
                let (_, mut closure) = Self::take_closure(self.pop()?, span)?;
                self.add_param(&mut closure, name, param_ty, Some(default), span)?;
                let ty = Self::closure_runtime_type(&closure.signature);
                self.push(Value { ty, payload: Payload::Function(Box::new(closure)) })?;
            }
            Op::FuncBegin => {}
            Op::FuncEnd => {
                let frame = self
                    .call_stack
                    .pop()
                    .ok_or_else(|| Error::Compile(format!("{span} FUNC_END outside a function")))?;
                frame.expected_return.expect_eq(&RuntimeType::Scalar(VOID_TYPE.to_string()), span)?;
                self.stack.truncate(frame.saved_sp);
                self.env = frame.saved_env;
                self.push(Value::void())?;
                *ip = frame.return_address;
            }

            Op::ArgsBegin => self.arg_buffers.push(ArgBuffer::default()),
            Op::PushArg => {
                let v = self.pop()?;
                self.arg_buffer_mut(span)?.positional.push_back(v);
            }
            Op::PushNamedArg(name) => {
                let v = self.pop()?;
                if self.arg_buffer_mut(span)?.named.insert(name.clone(), v).is_some() {
                    return Err(Error::name(span, format!("duplicate named argument '{name}'")));
                }
            }
            Op::Call => self.exec_call(span, ip)?,
            Op::Return => {
                let retval = self.pop()?;
                let frame = self
                    .call_stack
                    .pop()
                    .ok_or_else(|| Error::Compile(format!("{span} RETURN outside a function")))?;
                frame.expected_return.expect_eq(&retval.ty, span)?;
                self.stack.truncate(frame.saved_sp);
                self.env = frame.saved_env;
                self.push(retval)?;
                *ip = frame.return_address;
            }

            Op::ObjType => {
                let name = self.types.next_anonymous_name();
                self.push(Value::type_value(RuntimeType::Object(ObjectType::anonymous(name))))?;
            }
            Op::ObjTypeSetField(name) => {
                let default = self.pop()?;
                let field_ty = Self::take_type(self.pop()?, span)?;
                let mut ty = Self::take_type(self.pop()?, span)?;
                let ty_name = ty.name();
                ty.as_object_mut()
                    .ok_or_else(|| Error::type_mismatch(span, "object type", ty_name))?
                    .add_field(name.clone(), field_ty, default, span)?;
                self.push(Value::type_value(ty))?;
            }
            Op::ObjInit(type_name) => {
                let ty = self.types.get(type_name, span)?;
                let obj = ty.as_object().ok_or_else(|| Error::type_mismatch(span, "object type", ty.name()))?;
                let fields: Vec<(String, Value)> =
                    obj.fields().map(|(n, f)| (n.to_string(), f.default.clone())).collect();
                self.push(Value { ty: ty.clone(), payload: Payload::Object(fields) })?;
            }
            Op::ObjSetField(name) => {
                let value = self.pop()?;
                let mut obj = self.pop()?;
                let expected = obj
                    .ty
                    .as_object()
                    .and_then(|o| o.field(name))
                    .ok_or_else(|| Error::name(span, format!("no such field '{name}' on '{}'", obj.ty.name())))?
                    .ty
                    .clone();
                expected.expect_eq(&value.ty, span)?;
                let fields = obj.as_object_mut().expect("object payload");
                match fields.iter_mut().find(|(n, _)| n == name) {
                    Some(slot) => slot.1 = value,
                    None => fields.push((name.clone(), value)),
                }
                self.push(obj)?;
            }
            Op::ObjLoad(name) => {
                let obj = self.pop()?;
                let fields = obj
                    .as_object()
                    .ok_or_else(|| Error::type_mismatch(span, "object", obj.ty.name()))?;
                let value = fields
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Error::name(span, format!("no such field '{name}'")))?;
                self.push(value)?;
            }
            Op::ObjTypeLoadDefault(name) => {
                let ty = Self::take_type(self.pop()?, span)?;
                let obj = ty.as_object().ok_or_else(|| Error::type_mismatch(span, "object type", ty.name()))?;
                let default = obj
                    .field(name)
                    .ok_or_else(|| Error::name(span, format!("no such field '{name}'")))?
                    .default
                    .clone();
                self.push(default)?;
            }

            Op::ArrType => {
                let elem = Self::take_type(self.pop()?, span)?;
                self.push(Value::type_value(RuntimeType::Array(Box::new(elem))))?;
            }
            Op::ArrInit => {
                let elem = Self::take_type(self.pop()?, span)?;
                self.push(Value { ty: RuntimeType::Array(Box::new(elem)), payload: Payload::Array(Vec::new()) })?;
            }
            Op::ArrPush => {
                let value = self.pop()?;
                let mut arr = self.pop()?;
                let elem_ty = arr
                    .ty
                    .as_array_elem()
                    .ok_or_else(|| Error::type_mismatch(span, "array", arr.ty.name()))?
                    .clone();
                elem_ty.expect_eq(&value.ty, span)?;
                arr.as_array_mut().expect("array payload").push(value);
                self.push(arr)?;
            }
            Op::ArrLoad => {
                let index = self.pop()?;
                let arr = self.pop()?;
                let idx = index.as_int().ok_or_else(|| Error::type_mismatch(span, "int", index.ty.name()))?;
                let items = arr.as_array().ok_or_else(|| Error::type_mismatch(span, "array", arr.ty.name()))?;
                let value = usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| Error::Resource(format!("array index {idx} out of range")))?;
                self.push(value)?;
            }

            Op::FuncType => {
                self.push(Value::type_value(RuntimeType::Function(FuncType::new())))?;
            }
            Op::FuncTypeSetParam => {
                let param_ty = Self::take_type(self.pop()?, span)?;
                let mut ty = Self::take_type(self.pop()?, span)?;
                let ty_name = ty.name();
                ty.as_function_mut()
                    .ok_or_else(|| Error::type_mismatch(span, "function type", ty_name))?
                    .params
                    .push(param_ty);
                self.push(Value::type_value(ty))?;
            }
            Op::FuncTypeSetRet => {
                let ret_ty = Self::take_type(self.pop()?, span)?;
                let mut ty = Self::take_type(self.pop()?, span)?;
                let ty_name = ty.name();
                ty.as_function_mut()
                    .ok_or_else(|| Error::type_mismatch(span, "function type", ty_name))?
                    .ret = Box::new(ret_ty);
                self.push(Value::type_value(ty))?;
            }

            Op::DebugPrint => {
                let v = self.stack.last().ok_or_else(|| Error::Resource("operand stack underflow".to_string()))?;
                self.print_output.push(v.display());
            }
        }
        Ok(())
    }

    fn binary_arith(&mut self, op: ArithOp, span: Span) -> Result<(), Error> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.push(operators::apply_arith(op, lhs, rhs, span)?)
    }

    fn add_param(
        &self,
        closure: &mut Closure,
        name: &str,
        ty: RuntimeType,
        default: Option<Value>,
        span: Span,
    ) -> Result<(), Error> {
        if closure.signature.params.iter().any(|p| p.name == name) {
            return Err(Error::name(span, format!("redeclared parameter '{name}'")));
        }
        closure.signature.params.push(ParamSig { name: name.to_string(), ty, default });
        Ok(())
    }

    fn address_of(target: &JumpTarget, span: Span) -> Result<usize, Error> {
        target.address().ok_or_else(|| Error::Compile(format!("{span} unresolved jump target")))
    }

    fn exec_call(&mut self, span: Span, ip: &mut usize) -> Result<(), Error> {
        let (_, closure) = Self::take_closure(self.pop()?, span)?;
        let mut buffer = self
            .arg_buffers
            .pop()
            .ok_or_else(|| Error::Compile(format!("{span} CALL without ARGS_BEGIN")))?;

        if self.call_stack.len() >= self.limits.max_call_depth {
            warn!(depth = self.call_stack.len(), "call stack overflow");
            return Err(Error::Resource("call stack overflow".to_string()));
        }

        let new_env = Environment::child(&closure.captured_env);
        for param in &closure.signature.params {
            let value = if let Some(v) = buffer.named.remove(&param.name) {
                v
            } else if let Some(v) = buffer.positional.pop_front() {
                v
            } else if let Some(d) = &param.default {
                d.clone()
            } else {
                return Err(Error::arity(span, format!("missing argument '{}'", param.name)));
            };
            param.ty.expect_eq(&value.ty, span)?;
            new_env.borrow_mut().declare(param.name.clone(), param.ty.clone(), value, span)?;
        }
        if let Some(name) = buffer.named.keys().next() {
            return Err(Error::name(span, format!("unexpected named argument '{name}'")));
        }
        if !buffer.positional.is_empty() {
            return Err(Error::arity(span, "too many arguments".to_string()));
        }

        let saved_env = std::mem::replace(&mut self.env, new_env);
        self.call_stack.push(Frame {
            return_address: *ip,
            saved_sp: self.stack.len(),
            saved_env,
            expected_return: closure.signature.return_type.clone(),
        });
        *ip = closure.entry_address;
        Ok(())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn run_src(src: &str) -> (Value, Vec<String>) {
        let instrs = compile(&parse(tokenize(src).unwrap()).unwrap()).unwrap();
        let mut vm = Vm::new();
        let result = vm.run(&instrs).unwrap();
        (result, vm.take_print_output())
    }

    #[test]
    fn arithmetic_and_print() {
        let (_, out) = run_src("print 2 + 3 * 4");
        assert_eq!(out, vec!["<int> 14"]);
    }

    #[test]
    fn var_decl_and_mutation() {
        let (_, out) = run_src("int a :: 1\na :: a + 1\nprint a");
        assert_eq!(out, vec!["<int> 2"]);
    }

    #[test]
    fn if_else_takes_the_matching_branch() {
        let (_, out) = run_src("int a :: 5\nif a < 3 { print 1 } elif a < 10 { print 2 } else { print 3 }");
        assert_eq!(out, vec!["<int> 2"]);
    }

    #[test]
    fn for_loop_accumulates() {
        let (_, out) = run_src("int total :: 0\nfor int i :: 0; i < 3; i :: i + 1 { total :: total + i }\nprint total");
        assert_eq!(out, vec!["<int> 3"]);
    }

    #[test]
    fn function_call_with_default_param() {
        let (_, out) = run_src("func add :: (int x, int y::10) int { return x + y }\nprint add(1)\nprint add(1, 2)");
        assert_eq!(out, vec!["<int> 11", "<int> 3"]);
    }

    #[test]
    fn closures_capture_defining_scope() {
        let src = "int base :: 100\nfunc adder :: () int { return base + 1 }\nbase :: 0\nprint adder()";
        let (_, out) = run_src(src);
        assert_eq!(out, vec!["<int> 101"]);
    }

    #[test]
    fn nested_call_as_argument_does_not_corrupt_outer_args() {
        let src =
            "func inc :: (int x) int { return x + 1 }\nfunc add :: (int a, int b) int { return a + b }\nprint add(1, inc(10))";
        let (_, out) = run_src(src);
        assert_eq!(out, vec!["<int> 12"]);
    }

    #[test]
    fn array_and_object_roundtrip() {
        let src = "[int] xs :: [int]{1, 2, 3}\nprint xs[1]\ntype Point :: { int x :: 0, int y :: 0 }\nPoint p :: new Point { x :: 4 }\nprint p.x\nprint p.y";
        let (_, out) = run_src(src);
        assert_eq!(out, vec!["<int> 2", "<int> 4", "<int> 0"]);
    }

    #[test]
    fn division_by_zero_is_a_resource_error() {
        let instrs = compile(&parse(tokenize("print 1 / 0").unwrap()).unwrap()).unwrap();
        let mut vm = Vm::new();
        assert!(matches!(vm.run(&instrs), Err(Error::Resource(_))));
    }

    #[test]
    fn undefined_variable_is_a_name_error() {
        let instrs = compile(&parse(tokenize("print missing").unwrap()).unwrap()).unwrap();
        let mut vm = Vm::new();
        assert!(matches!(vm.run(&instrs), Err(Error::Name { .. })));
    }
}

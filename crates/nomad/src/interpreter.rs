//! The embedding surface: run Nomad source through the full pipeline.
//!
//! A thin façade over tokenize → parse → compile →
//! [`crate::vm::Vm::run`] with a `run`/`capture` pair and a `limit`
//! setter, bounded by Nomad's own resource model: operand-stack and
//! call-stack depth, rather than an instruction counter.

use crate::error::Result;
use crate::parser::parse;
use crate::tokenizer::tokenize;
use crate::value::Value;
use crate::vm::{Limits, Vm};

/// A persistent Nomad execution context.
///
/// Each [`Interpreter::run`]/[`Interpreter::capture`] call compiles and
/// runs a fresh program against a fresh [`Vm`] — Nomad has no import
/// system, so there is no cross-call global state to carry beyond the
/// configured [`Limits`].
pub struct Interpreter {
    limits: Limits,
}

impl Interpreter {
    pub fn new() -> Self {
        Self { limits: Limits::default() }
    }

    /// Overrides the operand-stack and call-stack bounds enforced by
    /// every subsequent [`run`](Self::run)/[`capture`](Self::capture) call.
    pub fn limit(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// Runs a Nomad program to completion, returning whatever value its
    /// final bare-expression statement left on the stack (`void` if
    /// none did). `print` output is discarded; use
    /// [`capture`](Self::capture) to observe it.
    pub fn run(&self, source: &str) -> Result<Value> {
        let instructions = compile_source(source)?;
        let mut vm = Vm::new();
        vm.set_limits(self.limits.clone());
        vm.run(&instructions)
    }

    /// Runs a Nomad program and captures everything it wrote via
    /// `DEBUG_PRINT` (the `print` statement), in emission order.
    pub fn capture(&self, source: &str) -> Result<Output> {
        let instructions = compile_source(source)?;
        let mut vm = Vm::new();
        vm.set_limits(self.limits.clone());
        let value = vm.run(&instructions)?;
        let output = vm.take_print_output();
        Ok(Output { value, output })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_source(source: &str) -> Result<Vec<crate::bytecode::Instruction>> {
    let tokens = tokenize(source)?;
    let stmts = parse(tokens)?;
    crate::compiler::compile(&stmts)
}

/// The result of running a program with `print` output captured.
#[derive(Debug, Clone)]
pub struct Output {
    /// Whatever value the program's final bare-expression statement
    /// left on top of the stack.
    pub value: Value,
    /// Lines written by `print`, in emission order.
    pub output: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_final_expression_value() {
        let interp = Interpreter::new();
        let value = interp.run("2 + 3").unwrap();
        assert_eq!(value.as_int(), Some(5));
    }

    #[test]
    fn capture_collects_print_lines_in_order() {
        let interp = Interpreter::new();
        let out = interp.capture("print 1\nprint 2").unwrap();
        assert_eq!(out.output, vec!["<int> 1", "<int> 2"]);
    }

    #[test]
    fn limit_override_triggers_stack_overflow() {
        let mut interp = Interpreter::new();
        interp.limit(Limits { max_stack: 2, max_call_depth: 16_384 });
        let err = interp.capture("print 1\nprint 2\nprint 3").unwrap_err();
        assert!(matches!(err, crate::error::Error::Resource(_)));
    }
}

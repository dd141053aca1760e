//! AST → linear bytecode with a label-resolution pass.
//!
//! Phase 1 walks the tree and emits instructions against symbolic
//! [`JumpTarget::Label`]s; phase 2 ([`resolve_labels`]) rewrites every
//! `JUMP`/`JUMP_NOT`/`FUNC_INIT` operand to an absolute address in one
//! linear scan. Per the source's own REDESIGN note, labels are named
//! from a monotonically increasing counter scoped to one compilation
//! rather than a random suffix, so two compiler runs over the same
//! source are byte-identical.

use std::collections::HashMap;

use crate::ast::{BinOp, Expr, Stmt};
use crate::bytecode::{Instruction, JumpTarget, Op};
use crate::error::Error;
use crate::token::Token;
use tracing::debug;

pub fn compile(stmts: &[Stmt]) -> Result<Vec<Instruction>, Error> {
    let mut c = Compiler { instructions: Vec::new(), label_counter: 0 };
    let last = stmts.len().saturating_sub(1);
    for (i, stmt) in stmts.iter().enumerate() {
        let pop_result = !(i == last && matches!(stmt, Stmt::Expr(_)));
        c.compile_stmt(stmt, pop_result)?;
    }
    let resolved = resolve_labels(c.instructions)?;
    debug!(instructions = resolved.len(), "compiled program");
    Ok(resolved)
}

struct Compiler {
    instructions: Vec<Instruction>,
    label_counter: usize,
}

impl Compiler {
    fn new_label(&mut self, tag: &str) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("__{tag}_{n}")
    }

    fn emit(&mut self, op: Op, token: &Token) {
        self.instructions.push(Instruction::new(op, token.clone()));
    }

    fn compile_block(&mut self, stmts: &[Stmt]) -> Result<(), Error> {
        for stmt in stmts {
            self.compile_stmt(stmt, true)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt, pop_expr_result: bool) -> Result<(), Error> {
        match stmt {
            Stmt::Expr(expr) => {
                let token = expr.token().clone();
                self.compile_expr(expr)?;
                if pop_expr_result {
                    self.emit(Op::PopConst, &token);
                }
            }
            Stmt::VarDecl { type_expr, name, value } => {
                self.compile_expr(value)?;
                self.compile_type_expr(type_expr)?;
                self.emit(Op::DeclVar(name.content.clone()), name);
            }
            Stmt::TypeDecl { name, type_expr } => {
                self.compile_type_expr(type_expr)?;
                self.emit(Op::DeclType(name.content.clone()), name);
            }
            Stmt::Assign { name, value } => {
                self.compile_expr(value)?;
                self.emit(Op::SetVar(name.content.clone()), name);
            }
            Stmt::If { branches, else_branch } => self.compile_if(branches, else_branch)?,
            Stmt::For { init, cond, step, body } => self.compile_for(init, cond, step, body)?,
            Stmt::Print(expr) => {
                let token = expr.token().clone();
                self.compile_expr(expr)?;
                self.emit(Op::DebugPrint, &token);
            }
            Stmt::Return(expr) => {
                let token = expr.token().clone();
                self.compile_expr(expr)?;
                self.emit(Op::Return, &token);
            }
        }
        Ok(())
    }

    fn compile_if(&mut self, branches: &[(Expr, Vec<Stmt>)], else_branch: &Option<Vec<Stmt>>) -> Result<(), Error> {
        let branch_labels: Vec<String> = (0..branches.len()).map(|_| self.new_label("if")).collect();
        let else_label = else_branch.as_ref().map(|_| self.new_label("else"));
        let end_label = self.new_label("if_end");

        for (i, (cond, body)) in branches.iter().enumerate() {
            let token = cond.token().clone();
            self.emit(Op::Label(branch_labels[i].clone()), &token);
            self.compile_expr(cond)?;
            let next = if i + 1 < branch_labels.len() {
                branch_labels[i + 1].clone()
            } else if let Some(label) = &else_label {
                label.clone()
            } else {
                end_label.clone()
            };
            self.emit(Op::JumpNot(JumpTarget::Label(next)), &token);
            self.compile_block(body)?;
            self.emit(Op::Jump(JumpTarget::Label(end_label.clone())), &token);
        }
        if let (Some(label), Some(body)) = (&else_label, else_branch) {
            let token = body.first().map(stmt_token).unwrap_or_else(dummy_token);
            self.emit(Op::Label(label.clone()), &token);
            self.compile_block(body)?;
            self.emit(Op::Jump(JumpTarget::Label(end_label.clone())), &token);
        }
        self.emit(Op::Label(end_label), &dummy_token());
        Ok(())
    }

    fn compile_for(&mut self, init: &Stmt, cond: &Expr, step: &Stmt, body: &[Stmt]) -> Result<(), Error> {
        let test_label = self.new_label("for_test");
        let end_label = self.new_label("for_end");
        let token = cond.token().clone();

        self.compile_stmt(init, true)?;
        self.emit(Op::Label(test_label.clone()), &token);
        self.compile_expr(cond)?;
        self.emit(Op::PushConst { type_name: "bool".to_string(), literal: "true".to_string() }, &token);
        self.emit(Op::Eq, &token);
        self.emit(Op::JumpNot(JumpTarget::Label(end_label.clone())), &token);
        self.compile_block(body)?;
        self.compile_stmt(step, true)?;
        self.emit(Op::Jump(JumpTarget::Label(test_label)), &token);
        self.emit(Op::Label(end_label), &token);
        Ok(())
    }

    fn compile_type_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        match expr {
            Expr::TypeId(tok) => self.emit(Op::LoadType(tok.content.clone()), tok),
            Expr::InferType(tok) => self.emit(Op::LoadTypeInfer, tok),
            Expr::ArrayType(tok, elem) => {
                self.compile_type_expr(elem)?;
                self.emit(Op::ArrType, tok);
            }
            Expr::FuncTypeExpr(tok, params, ret) => {
                self.emit(Op::FuncType, tok);
                for param in params {
                    self.compile_type_expr(param)?;
                    self.emit(Op::FuncTypeSetParam, tok);
                }
                self.compile_type_expr(ret)?;
                self.emit(Op::FuncTypeSetRet, tok);
            }
            Expr::ObjectTypeExpr(tok, fields) => {
                self.emit(Op::ObjType, tok);
                for field in fields {
                    self.compile_type_expr(&field.type_expr)?;
                    self.compile_expr(&field.default)?;
                    self.emit(Op::ObjTypeSetField(field.name.content.clone()), &field.name);
                }
            }
            _ => return Err(Error::Compile(format!("{expr:?} is not a type expression"))),
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        match expr {
            Expr::IntLit(tok, _) => {
                self.emit(Op::PushConst { type_name: "int".to_string(), literal: tok.content.clone() }, tok)
            }
            Expr::FloatLit(tok, _) => {
                self.emit(Op::PushConst { type_name: "float".to_string(), literal: tok.content.clone() }, tok)
            }
            Expr::StringLit(tok, content) => {
                self.emit(Op::PushConst { type_name: "string".to_string(), literal: content.clone() }, tok)
            }
            Expr::BoolLit(tok, b) => {
                self.emit(Op::PushConst { type_name: "bool".to_string(), literal: b.to_string() }, tok)
            }
            Expr::Identifier(tok) => self.emit(Op::LoadVar(tok.content.clone()), tok),

            Expr::TypeId(_)
            | Expr::ArrayType(_, _)
            | Expr::ObjectTypeExpr(_, _)
            | Expr::FuncTypeExpr(_, _, _)
            | Expr::InferType(_) => {
                self.compile_type_expr(expr)?;
            }

            Expr::Not(tok, inner) => {
                self.compile_expr(inner)?;
                self.emit(Op::Not, tok);
            }
            Expr::Negative(tok, inner) => {
                self.compile_expr(inner)?;
                self.emit(Op::Negative, tok);
            }
            Expr::Len(tok, inner) => {
                self.compile_expr(inner)?;
                self.emit(Op::Len, tok);
            }
            Expr::PrefixInc(tok, inner) => self.compile_step(tok, inner, true, true)?,
            Expr::PrefixDec(tok, inner) => self.compile_step(tok, inner, false, true)?,
            Expr::PostfixInc(tok, inner) => self.compile_step(tok, inner, true, false)?,
            Expr::PostfixDec(tok, inner) => self.compile_step(tok, inner, false, false)?,

            Expr::FieldAccess(tok, base, field) => {
                self.compile_expr(base)?;
                self.emit(Op::ObjLoad(field.content.clone()), tok);
            }
            Expr::DefaultAccess(tok, base, field) => {
                self.compile_type_expr(base)?;
                self.emit(Op::ObjTypeLoadDefault(field.content.clone()), tok);
            }
            Expr::Index(tok, base, index) => {
                self.compile_expr(base)?;
                self.compile_expr(index)?;
                self.emit(Op::ArrLoad, tok);
            }
            Expr::Call(tok, callee, args) => {
                self.compile_expr(callee)?;
                self.emit(Op::ArgsBegin, tok);
                for arg in args {
                    self.compile_expr(&arg.value)?;
                    match &arg.name {
                        Some(name) => self.emit(Op::PushNamedArg(name.content.clone()), name),
                        None => self.emit(Op::PushArg, tok),
                    }
                }
                self.emit(Op::Call, tok);
            }

            Expr::ArrayLit(tok, elem_type, elems) => {
                self.compile_type_expr(elem_type)?;
                self.emit(Op::ArrInit, tok);
                for elem in elems {
                    self.compile_expr(elem)?;
                    self.emit(Op::ArrPush, tok);
                }
            }
            Expr::ObjectLit(tok, type_name, fields) => {
                self.emit(Op::ObjInit(type_name.content.clone()), tok);
                for (name, value) in fields {
                    self.compile_expr(value)?;
                    self.emit(Op::ObjSetField(name.content.clone()), name);
                }
            }
            Expr::FunctionLit(tok, params, ret_type, body) => self.compile_function_lit(tok, params, ret_type, body)?,

            Expr::Binary(tok, op, lhs, rhs) => self.compile_binary(tok, op, lhs, rhs)?,
            Expr::Paren(inner) => self.compile_expr(inner)?,
        }
        Ok(())
    }

    /// Postfix/prefix `++`/`--`. The ISA has no `DUP`, so the operand is
    /// reloaded after `SET_VAR` to surface the pre- or post-increment
    /// value the surrounding expression expects.
    fn compile_step(&mut self, tok: &Token, target: &Expr, is_inc: bool, is_prefix: bool) -> Result<(), Error> {
        let name = match target {
            Expr::Identifier(id) => id.content.clone(),
            _ => return Err(Error::Compile("++/-- target must be an identifier".to_string())),
        };
        if !is_prefix {
            self.emit(Op::LoadVar(name.clone()), tok);
        }
        self.emit(Op::LoadVar(name.clone()), tok);
        self.emit(Op::PushConst { type_name: "int".to_string(), literal: "1".to_string() }, tok);
        self.emit(if is_inc { Op::Add } else { Op::Sub }, tok);
        self.emit(Op::SetVar(name.clone()), tok);
        if is_prefix {
            self.emit(Op::LoadVar(name), tok);
        }
        Ok(())
    }

    fn compile_function_lit(
        &mut self,
        tok: &Token,
        params: &[crate::ast::Param],
        ret_type: &Expr,
        body: &[Stmt],
    ) -> Result<(), Error> {
        let func_label = self.new_label("func");
        let decl_end_label = self.new_label("func_end");

        self.emit(Op::FuncInit(JumpTarget::Label(func_label.clone())), tok);
        self.compile_type_expr(ret_type)?;
        self.emit(Op::FuncSetRet, tok);
        for param in params {
            if let Some(default) = &param.default {
                self.compile_expr(default)?;
            }
            self.compile_type_expr(&param.type_expr)?;
            let op = if param.default.is_some() {
                Op::FuncSetParamWithDefault(param.name.content.clone())
            } else {
                Op::FuncSetParam(param.name.content.clone())
            };
            self.emit(op, &param.name);
        }
        self.emit(Op::Jump(JumpTarget::Label(decl_end_label.clone())), tok);
        self.emit(Op::Label(func_label), tok);
        self.emit(Op::FuncBegin, tok);
        self.compile_block(body)?;
        self.emit(Op::FuncEnd, tok);
        self.emit(Op::Label(decl_end_label), tok);
        Ok(())
    }

    fn compile_binary(&mut self, tok: &Token, op: &BinOp, lhs: &Expr, rhs: &Expr) -> Result<(), Error> {
        match op {
            BinOp::Eq => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(Op::Eq, tok);
            }
            BinOp::Add => self.compile_arith(tok, Op::Add, lhs, rhs)?,
            BinOp::Sub => self.compile_arith(tok, Op::Sub, lhs, rhs)?,
            BinOp::Mult => self.compile_arith(tok, Op::Mult, lhs, rhs)?,
            BinOp::Div => self.compile_arith(tok, Op::Div, lhs, rhs)?,
            BinOp::And => self.compile_arith(tok, Op::And, lhs, rhs)?,
            BinOp::Or => self.compile_arith(tok, Op::Or, lhs, rhs)?,
            BinOp::Lt => self.compile_comparison(tok, lhs, rhs, "-1")?,
            BinOp::Gt => self.compile_comparison(tok, lhs, rhs, "1")?,
            BinOp::LtEq => self.compile_comparison_or_eq(tok, lhs, rhs, "-1")?,
            BinOp::GtEq => self.compile_comparison_or_eq(tok, lhs, rhs, "1")?,
        }
        Ok(())
    }

    fn compile_arith(&mut self, tok: &Token, op: Op, lhs: &Expr, rhs: &Expr) -> Result<(), Error> {
        self.compile_expr(lhs)?;
        self.compile_expr(rhs)?;
        self.emit(op, tok);
        Ok(())
    }

    fn compile_comparison(&mut self, tok: &Token, lhs: &Expr, rhs: &Expr, expected: &str) -> Result<(), Error> {
        self.compile_expr(lhs)?;
        self.compile_expr(rhs)?;
        self.emit(Op::Cmp, tok);
        self.emit(Op::PushConst { type_name: "int".to_string(), literal: expected.to_string() }, tok);
        self.emit(Op::Eq, tok);
        Ok(())
    }

    fn compile_comparison_or_eq(&mut self, tok: &Token, lhs: &Expr, rhs: &Expr, expected: &str) -> Result<(), Error> {
        self.emit(Op::PushConst { type_name: "int".to_string(), literal: expected.to_string() }, tok);
        self.emit(Op::PushConst { type_name: "int".to_string(), literal: "0".to_string() }, tok);
        self.compile_expr(lhs)?;
        self.compile_expr(rhs)?;
        self.emit(Op::Cmp, tok);
        self.emit(Op::Eq2, tok);
        Ok(())
    }
}

fn stmt_token(stmt: &Stmt) -> Token {
    match stmt {
        Stmt::Expr(e) | Stmt::Print(e) | Stmt::Return(e) => e.token().clone(),
        Stmt::VarDecl { name, .. } | Stmt::Assign { name, .. } | Stmt::TypeDecl { name, .. } => name.clone(),
        Stmt::If { branches, .. } => branches[0].0.token().clone(),
        Stmt::For { cond, .. } => cond.token().clone(),
    }
}

fn dummy_token() -> Token {
    Token::new(crate::token::TokenKind::Eof, "", crate::token::Span::default())
}

/// Phase 2: resolve every symbolic label to an absolute instruction
/// index, one linear scan.
fn resolve_labels(mut instructions: Vec<Instruction>) -> Result<Vec<Instruction>, Error> {
    let mut addresses = HashMap::new();
    for (i, instr) in instructions.iter().enumerate() {
        if let Op::Label(name) = &instr.op {
            addresses.insert(name.clone(), i + 1);
        }
    }
    for instr in instructions.iter_mut() {
        let target = match &mut instr.op {
            Op::Jump(t) | Op::JumpNot(t) | Op::FuncInit(t) => t,
            _ => continue,
        };
        if let JumpTarget::Label(name) = target {
            let addr = *addresses.get(name).ok_or_else(|| Error::Compile(format!("unresolved label '{name}'")))?;
            *target = JumpTarget::Address(addr);
        }
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    fn compile_src(src: &str) -> Vec<Instruction> {
        compile(&parse(tokenize(src).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn label_resolution_leaves_no_symbolic_targets() {
        let instrs = compile_src("int a :: 2\nif a = 1 { print a } else { print a }\n");
        for instr in &instrs {
            match &instr.op {
                Op::Jump(t) | Op::JumpNot(t) | Op::FuncInit(t) => assert!(t.address().is_some()),
                _ => {}
            }
        }
    }

    #[test]
    fn less_than_lowers_to_cmp_then_eq_minus_one() {
        let instrs = compile_src("print 1 < 2");
        let ops: Vec<&Op> = instrs.iter().map(|i| &i.op).collect();
        let cmp_pos = ops.iter().position(|o| matches!(o, Op::Cmp)).unwrap();
        assert!(matches!(ops[cmp_pos + 1], Op::PushConst { literal, .. } if literal == "-1"));
        assert!(matches!(ops[cmp_pos + 2], Op::Eq));
    }

    #[test]
    fn less_or_eq_pushes_sentinels_before_cmp() {
        let instrs = compile_src("print 1 <= 2");
        let ops: Vec<&Op> = instrs.iter().map(|i| &i.op).collect();
        assert!(matches!(ops[0], Op::PushConst { literal, .. } if literal == "-1"));
        assert!(matches!(ops[1], Op::PushConst { literal, .. } if literal == "0"));
        let cmp_pos = ops.iter().position(|o| matches!(o, Op::Cmp)).unwrap();
        assert!(matches!(ops[cmp_pos + 1], Op::Eq2));
    }

    #[test]
    fn debug_print_never_gets_a_trailing_pop() {
        let instrs = compile_src("print 1");
        assert!(matches!(instrs.last().unwrap().op, Op::DebugPrint));
    }

    #[test]
    fn function_literal_jumps_over_its_own_body() {
        let instrs = compile_src("func f :: () int { return 1 }\nprint f()");
        let ops: Vec<&Op> = instrs.iter().map(|i| &i.op).collect();
        assert!(matches!(ops[0], Op::FuncInit(_)));
        let begin_pos = ops.iter().position(|o| matches!(o, Op::FuncBegin)).unwrap();
        let jump_pos = ops.iter().position(|o| matches!(o, Op::Jump(_))).unwrap();
        assert!(jump_pos < begin_pos);
    }
}

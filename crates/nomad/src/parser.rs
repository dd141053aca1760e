//! Recursive-descent parser with precedence climbing for binary
//! expressions and speculative lookahead/rollback for the
//! `type-expr identifier ::` vs `identifier ::` ambiguity.

use crate::ast::{Arg, BinOp, Expr, FieldDecl, Param, Stmt};
use crate::error::Error;
use crate::token::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, Error> {
    let mut p = Parser { tokens, pos: 0 };
    p.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, Error>;

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            Err(Error::parse(tok.loc, format!("expected {what}, found {tok}"), true))
        }
    }

    fn skip_separators(&mut self) {
        while self.at(TokenKind::NewLine) || self.at(TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn terminator(&mut self) -> PResult<()> {
        if self.at(TokenKind::NewLine) || self.at(TokenKind::Semicolon) {
            self.skip_separators();
            Ok(())
        } else if self.at(TokenKind::Eof) || self.at(TokenKind::RightCurly) {
            Ok(())
        } else {
            let tok = self.peek().clone();
            Err(Error::parse(tok.loc, format!("expected statement terminator, found {tok}"), true))
        }
    }

    // ---- program / blocks ----

    fn parse_program(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.at(TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            self.skip_separators();
        }
        Ok(stmts)
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LeftCurly, "'{'")?;
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.at(TokenKind::RightCurly) {
            stmts.push(self.parse_statement()?);
            self.skip_separators();
        }
        self.expect(TokenKind::RightCurly, "'}'")?;
        Ok(stmts)
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.peek().kind {
            TokenKind::Type => self.parse_type_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Print => {
                self.advance();
                let expr = self.parse_expr()?;
                self.terminator()?;
                Ok(Stmt::Print(expr))
            }
            TokenKind::Return => {
                self.advance();
                let expr = self.parse_expr()?;
                self.terminator()?;
                Ok(Stmt::Return(expr))
            }
            _ => self.parse_decl_assign_or_expr(),
        }
    }

    fn parse_type_decl(&mut self) -> PResult<Stmt> {
        self.advance();
        let name = self.expect(TokenKind::Id, "type name")?;
        self.expect(TokenKind::DoubleColon, "'::'")?;
        let type_expr = self.parse_type_expr()?;
        self.terminator()?;
        Ok(Stmt::TypeDecl { name, type_expr })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.advance();
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        branches.push((cond, body));
        loop {
            self.skip_blank_lines_before_clause();
            if self.at(TokenKind::Elif) {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else {
                break;
            }
        }
        self.skip_blank_lines_before_clause();
        let else_branch = if self.at(TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        self.terminator()?;
        Ok(Stmt::If { branches, else_branch })
    }

    /// `elif`/`else` may follow the closing `}` on the next line.
    fn skip_blank_lines_before_clause(&mut self) {
        let save = self.pos;
        while self.at(TokenKind::NewLine) {
            self.advance();
        }
        if !self.at(TokenKind::Elif) && !self.at(TokenKind::Else) {
            self.pos = save;
        }
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.advance();
        let init = Box::new(self.parse_decl_or_assign_stmt()?);
        self.expect(TokenKind::Semicolon, "';'")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let step = Box::new(self.parse_decl_or_assign_stmt()?);
        let body = self.parse_block()?;
        self.terminator()?;
        Ok(Stmt::For { init, cond, step, body })
    }

    /// A `for` init/step clause: a declaration or assignment with no
    /// trailing terminator of its own (the surrounding `;`/`{` owns it).
    fn parse_decl_or_assign_stmt(&mut self) -> PResult<Stmt> {
        if let Some(decl) = self.try_parse(Self::try_var_decl)? {
            return Ok(decl);
        }
        if let Some(assign) = self.try_parse(Self::try_assign)? {
            return Ok(assign);
        }
        Ok(Stmt::Expr(self.parse_expr()?))
    }

    fn parse_decl_assign_or_expr(&mut self) -> PResult<Stmt> {
        if let Some(decl) = self.try_parse(Self::try_var_decl)? {
            self.terminator()?;
            return Ok(decl);
        }
        if let Some(assign) = self.try_parse(Self::try_assign)? {
            self.terminator()?;
            return Ok(assign);
        }
        let expr = self.parse_expr()?;
        self.terminator()?;
        Ok(Stmt::Expr(expr))
    }

    /// Runs `f`; on a non-fatal parse error rolls the cursor back and
    /// reports "no match" rather than propagating. Fatal errors and
    /// successes propagate as-is.
    fn try_parse<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<Option<T>> {
        let save = self.pos;
        match f(self) {
            Ok(v) => Ok(Some(v)),
            Err(e) if !e.is_recoverable() => {
                self.pos = save;
                Err(e)
            }
            Err(_) => {
                self.pos = save;
                Ok(None)
            }
        }
    }

    fn try_var_decl(&mut self) -> PResult<Stmt> {
        let type_expr = self.parse_type_expr()?;
        if !self.at(TokenKind::Id) {
            let tok = self.peek().clone();
            return Err(Error::parse(tok.loc, "expected variable name after type", false));
        }
        let name = self.advance();
        if !self.at(TokenKind::DoubleColon) {
            let tok = self.peek().clone();
            return Err(Error::parse(tok.loc, "expected '::' after variable name", false));
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(Stmt::VarDecl { type_expr, name, value })
    }

    fn try_assign(&mut self) -> PResult<Stmt> {
        if !self.at(TokenKind::Id) {
            let tok = self.peek().clone();
            return Err(Error::parse(tok.loc, "expected identifier", false));
        }
        let name = self.advance();
        if !self.at(TokenKind::DoubleColon) {
            let tok = self.peek().clone();
            return Err(Error::parse(tok.loc, "expected '::'", false));
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(Stmt::Assign { name, value })
    }

    // ---- type expressions ----

    fn parse_type_expr(&mut self) -> PResult<Expr> {
        match self.peek().kind {
            TokenKind::LeftSquare => {
                let tok = self.advance();
                let elem = self.parse_type_expr()?;
                self.expect(TokenKind::RightSquare, "']'")?;
                Ok(Expr::ArrayType(tok, Box::new(elem)))
            }
            TokenKind::Func => {
                let tok = self.advance();
                if self.at(TokenKind::LeftBracket) {
                    self.advance();
                    let mut params = Vec::new();
                    if !self.at(TokenKind::RightBracket) {
                        params.push(self.parse_type_expr()?);
                        while self.at(TokenKind::Comma) {
                            self.advance();
                            params.push(self.parse_type_expr()?);
                        }
                    }
                    self.expect(TokenKind::RightBracket, "')'")?;
                    let ret = self.parse_type_expr()?;
                    Ok(Expr::FuncTypeExpr(tok, params, Box::new(ret)))
                } else {
                    Ok(Expr::InferType(tok))
                }
            }
            TokenKind::LeftCurly => {
                let tok = self.advance();
                let mut fields = Vec::new();
                if !self.at(TokenKind::RightCurly) {
                    fields.push(self.parse_field_decl()?);
                    while self.at(TokenKind::Comma) {
                        self.advance();
                        fields.push(self.parse_field_decl()?);
                    }
                }
                self.expect(TokenKind::RightCurly, "'}'")?;
                Ok(Expr::ObjectTypeExpr(tok, fields))
            }
            TokenKind::Id => {
                let tok = self.advance();
                Ok(Expr::TypeId(tok))
            }
            _ => {
                let tok = self.peek().clone();
                Err(Error::parse(tok.loc, format!("expected type expression, found {tok}"), true))
            }
        }
    }

    fn parse_field_decl(&mut self) -> PResult<FieldDecl> {
        let type_expr = self.parse_type_expr()?;
        let name = self.expect(TokenKind::Id, "field name")?;
        self.expect(TokenKind::DoubleColon, "'::'")?;
        let default = self.parse_expr()?;
        Ok(FieldDecl { name, type_expr, default })
    }

    // ---- expressions: precedence climbing ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_eq()
    }

    fn parse_eq(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive_tier()?;
        while self.at(TokenKind::Equal) {
            let tok = self.advance();
            let rhs = self.parse_additive_tier()?;
            lhs = Expr::Binary(tok, BinOp::Eq, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive_tier(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Inferior => BinOp::Lt,
                TokenKind::InferiorOrEq => BinOp::LtEq,
                TokenKind::Superior => BinOp::Gt,
                TokenKind::SuperiorOrEq => BinOp::GtEq,
                TokenKind::AndSign => BinOp::And,
                TokenKind::Bar => BinOp::Or,
                _ => break,
            };
            let tok = self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(tok, op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.at(TokenKind::Star) {
            let tok = self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(tok, BinOp::Mult, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek().kind {
            TokenKind::Minus => {
                let tok = self.advance();
                Ok(Expr::Negative(tok, Box::new(self.parse_unary()?)))
            }
            TokenKind::Bang => {
                let tok = self.advance();
                Ok(Expr::Not(tok, Box::new(self.parse_unary()?)))
            }
            TokenKind::Len => {
                let tok = self.advance();
                Ok(Expr::Len(tok, Box::new(self.parse_unary()?)))
            }
            TokenKind::DbPlus => {
                let tok = self.advance();
                Ok(Expr::PrefixInc(tok, Box::new(self.parse_unary()?)))
            }
            TokenKind::DbMinus => {
                let tok = self.advance();
                Ok(Expr::PrefixDec(tok, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    let tok = self.advance();
                    let field = self.expect(TokenKind::Id, "field name")?;
                    expr = Expr::FieldAccess(tok, Box::new(expr), field);
                }
                TokenKind::Hash => {
                    let tok = self.advance();
                    let field = self.expect(TokenKind::Id, "field name")?;
                    expr = Expr::DefaultAccess(tok, Box::new(expr), field);
                }
                TokenKind::LeftSquare => {
                    let tok = self.advance();
                    let index = self.parse_array_index()?;
                    self.expect(TokenKind::RightSquare, "']'")?;
                    expr = Expr::Index(tok, Box::new(expr), Box::new(index));
                }
                TokenKind::LeftBracket => {
                    let tok = self.advance();
                    let args = self.parse_args()?;
                    self.expect(TokenKind::RightBracket, "')'")?;
                    expr = Expr::Call(tok, Box::new(expr), args);
                }
                TokenKind::DbPlus => {
                    let tok = self.advance();
                    expr = Expr::PostfixInc(tok, Box::new(expr));
                }
                TokenKind::DbMinus => {
                    let tok = self.advance();
                    expr = Expr::PostfixDec(tok, Box::new(expr));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `[index]`: a literal or identifier index only.
    fn parse_array_index(&mut self) -> PResult<Expr> {
        match self.peek().kind {
            TokenKind::NumLit => {
                let tok = self.advance();
                let n: i64 = tok.content.parse().unwrap_or(0);
                Ok(Expr::IntLit(tok, n))
            }
            TokenKind::Id => {
                let tok = self.advance();
                Ok(Expr::Identifier(tok))
            }
            _ => {
                let tok = self.peek().clone();
                Err(Error::parse(tok.loc, "array index must be a literal or identifier", true))
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        let mut seen_named = false;
        if self.at(TokenKind::RightBracket) {
            return Ok(args);
        }
        loop {
            let named = self.at(TokenKind::Id) && self.peek_at(1).kind == TokenKind::Colon;
            if named {
                let name = self.advance();
                self.advance();
                let value = self.parse_expr()?;
                seen_named = true;
                args.push(Arg { name: Some(name), value });
            } else {
                if seen_named {
                    let tok = self.peek().clone();
                    return Err(Error::parse(tok.loc, "positional argument after named argument", true));
                }
                let value = self.parse_expr()?;
                args.push(Arg { name: None, value });
            }
            if self.at(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.peek().kind {
            TokenKind::NumLit => {
                let tok = self.advance();
                if tok.content.contains('.') {
                    let f: f64 = tok.content.parse().unwrap_or(0.0);
                    Ok(Expr::FloatLit(tok, f))
                } else {
                    let n: i64 = tok.content.parse().unwrap_or(0);
                    Ok(Expr::IntLit(tok, n))
                }
            }
            TokenKind::StringLit => {
                let tok = self.advance();
                let unquoted = strip_quotes(&tok.content);
                Ok(Expr::StringLit(tok, unquoted))
            }
            TokenKind::True => {
                let tok = self.advance();
                Ok(Expr::BoolLit(tok, true))
            }
            TokenKind::False => {
                let tok = self.advance();
                Ok(Expr::BoolLit(tok, false))
            }
            TokenKind::New => self.parse_object_lit(),
            TokenKind::LeftSquare => self.parse_array_type_or_lit(),
            TokenKind::LeftBracket => self.parse_paren_or_func_lit(),
            TokenKind::Id => {
                let tok = self.advance();
                Ok(Expr::Identifier(tok))
            }
            _ => {
                let tok = self.peek().clone();
                Err(Error::parse(tok.loc, format!("unexpected token {tok}"), true))
            }
        }
    }

    fn parse_object_lit(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let type_name = self.expect(TokenKind::Id, "type name")?;
        self.expect(TokenKind::LeftCurly, "'{'")?;
        let mut fields = Vec::new();
        self.skip_separators();
        if !self.at(TokenKind::RightCurly) {
            loop {
                let name = self.expect(TokenKind::Id, "field name")?;
                self.expect(TokenKind::DoubleColon, "'::'")?;
                let value = self.parse_expr()?;
                fields.push((name, value));
                self.skip_separators();
                if self.at(TokenKind::Comma) {
                    self.advance();
                    self.skip_separators();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightCurly, "'}'")?;
        Ok(Expr::ObjectLit(tok, type_name, fields))
    }

    /// `[T]` as a bare type or `[T]{e, …}` as an array literal.
    fn parse_array_type_or_lit(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let elem = self.parse_type_expr()?;
        self.expect(TokenKind::RightSquare, "']'")?;
        if self.at(TokenKind::LeftCurly) {
            self.advance();
            let mut elems = Vec::new();
            if !self.at(TokenKind::RightCurly) {
                elems.push(self.parse_expr()?);
                while self.at(TokenKind::Comma) {
                    self.advance();
                    elems.push(self.parse_expr()?);
                }
            }
            self.expect(TokenKind::RightCurly, "'}'")?;
            Ok(Expr::ArrayLit(tok, Box::new(elem), elems))
        } else {
            Ok(Expr::ArrayType(tok, Box::new(elem)))
        }
    }

    /// Disambiguates `(expr)` from `(params) retType { body }` via
    /// speculative lookahead.
    fn parse_paren_or_func_lit(&mut self) -> PResult<Expr> {
        if let Some(func_lit) = self.try_parse(Self::try_func_lit)? {
            return Ok(func_lit);
        }
        let tok = self.advance();
        let inner = self.parse_expr()?;
        self.expect(TokenKind::RightBracket, "')'")?;
        let _ = tok;
        Ok(Expr::Paren(Box::new(inner)))
    }

    fn try_func_lit(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let mut params = Vec::new();
        if !self.at(TokenKind::RightBracket) {
            params.push(self.parse_param()?);
            while self.at(TokenKind::Comma) {
                self.advance();
                params.push(self.parse_param()?);
            }
        }
        if !self.at(TokenKind::RightBracket) {
            let t = self.peek().clone();
            return Err(Error::parse(t.loc, "expected ')'", false));
        }
        self.advance();
        let ret_type = self.parse_type_expr()?;
        if !self.at(TokenKind::LeftCurly) {
            let t = self.peek().clone();
            return Err(Error::parse(t.loc, "expected '{'", false));
        }
        let body = self.parse_block()?;
        Ok(Expr::FunctionLit(tok, params, Box::new(ret_type), body))
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let type_expr = self.parse_type_expr()?;
        let name = self.expect(TokenKind::Id, "parameter name")?;
        let default = if self.at(TokenKind::DoubleColon) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Param { name, type_expr, default })
    }
}

/// Strips the surrounding quotes and resolves `\"`/`\'`/`\\` escapes —
/// the tokenizer stores the raw delimited text, leaving unescaping to
/// the compiler front end.
fn strip_quotes(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() < 2 {
        return String::new();
    }
    let inner = &chars[1..chars.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == '\\' && i + 1 < inner.len() && matches!(inner[i + 1], '"' | '\'' | '\\') {
            out.push(inner[i + 1]);
            i += 2;
        } else {
            out.push(inner[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn parse_src(src: &str) -> Vec<Stmt> {
        parse(tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_var_decl_with_explicit_type() {
        let stmts = parse_src("int a :: 2");
        assert!(matches!(&stmts[0], Stmt::VarDecl { name, .. } if name.content == "a"));
    }

    #[test]
    fn distinguishes_decl_from_assign() {
        let stmts = parse_src("int a :: 2\na :: 3");
        assert!(matches!(stmts[0], Stmt::VarDecl { .. }));
        assert!(matches!(&stmts[1], Stmt::Assign { name, .. } if name.content == "a"));
    }

    #[test]
    fn binary_precedence_is_left_to_right_with_mult_tightest() {
        let stmts = parse_src("print 1 + 2 * 3");
        match &stmts[0] {
            Stmt::Print(Expr::Binary(_, BinOp::Add, lhs, rhs)) => {
                assert!(matches!(**lhs, Expr::IntLit(_, 1)));
                assert!(matches!(**rhs, Expr::Binary(_, BinOp::Mult, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_named_after_positional_call_args() {
        let stmts = parse_src("add(5)");
        assert!(matches!(&stmts[0], Stmt::Expr(Expr::Call(_, _, args)) if args.len() == 1));
    }

    #[test]
    fn rejects_positional_after_named() {
        let err = parse(tokenize("f(1, x: 2, 3)").unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn parses_for_loop_header() {
        let stmts = parse_src("for int i :: 0; i < 3; i :: i + 1 { print i }");
        assert!(matches!(&stmts[0], Stmt::For { .. }));
    }

    #[test]
    fn parses_function_literal_with_default_param() {
        let stmts = parse_src("func add :: (int x, int y::10) int { return x + y }");
        match &stmts[0] {
            Stmt::VarDecl { type_expr, value, .. } => {
                assert!(matches!(type_expr, Expr::InferType(_)));
                assert!(matches!(value, Expr::FunctionLit(_, params, _, _) if params.len() == 2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn expr_of(stmts: Vec<Stmt>) -> Expr {
        match stmts.into_iter().next() {
            Some(Stmt::Expr(e)) | Some(Stmt::Print(e)) => e,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn to_sexpr_nests_by_precedence() {
        let expr = expr_of(parse_src("1 + 2 * 3 - 69"));
        assert_eq!(expr.to_sexpr(), "(- (+ 1 (* 2 3)) 69)");
    }

    #[test]
    fn to_sexpr_is_transparent_to_explicit_parens() {
        let expr = expr_of(parse_src("(1+2)*3-69"));
        assert_eq!(expr.to_sexpr(), "(- (* (+ 1 2) 3) 69)");
    }

    #[test]
    fn reparsing_the_explicit_nested_form_round_trips_the_sexpr() {
        let original = expr_of(parse_src("1 + 2 * 3 - 69"));
        let sexpr = original.to_sexpr();

        let explicit = expr_of(parse_src("(1 + (2 * 3)) - 69"));
        assert_eq!(explicit.to_sexpr(), sexpr);
    }
}

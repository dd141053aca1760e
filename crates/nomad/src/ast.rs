//! The abstract syntax tree produced by the parser and consumed by the
//! compiler.
//!
//! Nodes are grouped as generic `{kind, token, children, block}` /
//! `{kind, expr, data, children}` tuples in a source without sum types;
//! here each node kind gets its own enum variant with named fields
//! instead, the idiomatic Rust rendering of the same fixed
//! arity-per-kind rule.

use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum BinOp {
    Eq,
    Add,
    Sub,
    Div,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Mult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<Token>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Token,
    pub type_expr: Expr,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Token,
    pub type_expr: Expr,
    pub default: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(Token, i64),
    FloatLit(Token, f64),
    StringLit(Token, String),
    BoolLit(Token, bool),
    Identifier(Token),

    /// A reference to a declared type used in type-expression position
    /// (`int`, `string`, or a user object type's name).
    TypeId(Token),
    /// `[T]` as a type expression (as opposed to `[T]{...}`, an array
    /// literal, which wraps this in [`Expr::ArrayLit`]).
    ArrayType(Token, Box<Expr>),
    /// `{ T f :: default, ... }`, the anonymous object-type literal used
    /// on the right of `type Name :: { ... }`.
    ObjectTypeExpr(Token, Vec<FieldDecl>),
    /// `func(T1, T2) Tret` as a type expression.
    FuncTypeExpr(Token, Vec<Expr>, Box<Expr>),
    /// Bare `func` in type-expression position: infer the declared
    /// type from the initializer already on the stack.
    InferType(Token),

    Not(Token, Box<Expr>),
    Negative(Token, Box<Expr>),
    Len(Token, Box<Expr>),
    PrefixInc(Token, Box<Expr>),
    PrefixDec(Token, Box<Expr>),
    PostfixInc(Token, Box<Expr>),
    PostfixDec(Token, Box<Expr>),

    FieldAccess(Token, Box<Expr>, Token),
    /// `T#field`: the declared default for `field` on type expression `T`.
    DefaultAccess(Token, Box<Expr>, Token),
    Index(Token, Box<Expr>, Box<Expr>),
    Call(Token, Box<Expr>, Vec<Arg>),

    /// `[T]{e, e, ...}`.
    ArrayLit(Token, Box<Expr>, Vec<Expr>),
    /// `new T { field :: value, ... }`.
    ObjectLit(Token, Token, Vec<(Token, Expr)>),
    /// `(params) retType { body }`.
    FunctionLit(Token, Vec<Param>, Box<Expr>, Vec<Stmt>),

    Binary(Token, BinOp, Box<Expr>, Box<Expr>),
    Paren(Box<Expr>),
}

impl Expr {
    pub fn token(&self) -> &Token {
        match self {
            Expr::IntLit(t, _)
            | Expr::FloatLit(t, _)
            | Expr::StringLit(t, _)
            | Expr::BoolLit(t, _)
            | Expr::Identifier(t)
            | Expr::TypeId(t)
            | Expr::ArrayType(t, _)
            | Expr::ObjectTypeExpr(t, _)
            | Expr::FuncTypeExpr(t, _, _)
            | Expr::InferType(t)
            | Expr::Not(t, _)
            | Expr::Negative(t, _)
            | Expr::Len(t, _)
            | Expr::PrefixInc(t, _)
            | Expr::PrefixDec(t, _)
            | Expr::PostfixInc(t, _)
            | Expr::PostfixDec(t, _)
            | Expr::FieldAccess(t, _, _)
            | Expr::DefaultAccess(t, _, _)
            | Expr::Index(t, _, _)
            | Expr::Call(t, _, _)
            | Expr::ArrayLit(t, _, _)
            | Expr::ObjectLit(t, _, _)
            | Expr::FunctionLit(t, _, _, _)
            | Expr::Binary(t, _, _, _) => t,
            Expr::Paren(inner) => inner.token(),
        }
    }

    /// Renders a binary expression as a fully-parenthesized prefix
    /// S-expression — `(op lhs rhs)`, recursively — the canonical form
    /// for checking that precedence climbing nested the tree correctly.
    /// Parens are transparent; anything else (literals, identifiers,
    /// unary forms, calls, ...) renders as its own token text.
    pub fn to_sexpr(&self) -> String {
        match self {
            Expr::Binary(t, _, lhs, rhs) => {
                format!("({} {} {})", t.content, lhs.to_sexpr(), rhs.to_sexpr())
            }
            Expr::Paren(inner) => inner.to_sexpr(),
            other => other.token().content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;

    fn id(name: &str) -> Expr {
        Expr::Identifier(Token::new(TokenKind::Id, name, Span::default()))
    }

    #[test]
    fn non_binary_expr_renders_as_its_own_token_text() {
        assert_eq!(id("x").to_sexpr(), "x");
    }

    #[test]
    fn binary_expr_renders_as_a_prefix_sexpr() {
        let plus = Token::new(TokenKind::Plus, "+", Span::default());
        let expr = Expr::Binary(plus, BinOp::Add, Box::new(id("a")), Box::new(id("b")));
        assert_eq!(expr.to_sexpr(), "(+ a b)");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A bare expression statement; only meaningful as the final
    /// top-level statement, whose value becomes the program result.
    Expr(Expr),
    VarDecl { type_expr: Expr, name: Token, value: Expr },
    TypeDecl { name: Token, type_expr: Expr },
    Assign { name: Token, value: Expr },
    If { branches: Vec<(Expr, Vec<Stmt>)>, else_branch: Option<Vec<Stmt>> },
    For { init: Box<Stmt>, cond: Expr, step: Box<Stmt>, body: Vec<Stmt> },
    Print(Expr),
    Return(Expr),
}

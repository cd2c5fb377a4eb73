//! Node constructors.
//!
//! Small builders for the trees the parser and the DSL rewriter synthesize.

use rty_core::{names, Loc, SymbolRef};
use rty_intern::Name;

use crate::tree::*;

/// The absent tree.
#[must_use]
pub fn empty_tree(loc: Loc) -> Expression {
    Expression::EmptyTree(EmptyTree { loc })
}

/// A `nil` literal.
#[must_use]
pub fn nil(loc: Loc) -> Expression {
    Expression::Literal(Literal {
        loc,
        value: LiteralValue::Nil,
    })
}

/// A constant reference `scope::name`.
#[must_use]
pub fn constant(loc: Loc, scope: Expression, cnst: Name) -> Expression {
    Expression::ConstantLit(ConstantLit {
        loc,
        scope: Box::new(scope),
        cnst,
    })
}

/// A method call.
#[must_use]
pub fn send(loc: Loc, recv: Expression, fun: Name, args: Vec<Expression>) -> Expression {
    Expression::Send(Send {
        loc,
        recv: Box::new(recv),
        fun,
        args,
        block: None,
    })
}

/// A method definition with no symbol assigned yet.
#[must_use]
pub fn method_def(
    loc: Loc,
    name: Name,
    args: Vec<Expression>,
    rhs: Expression,
    is_self: bool,
) -> Expression {
    Expression::MethodDef(MethodDef {
        loc,
        symbol: SymbolRef::NONE,
        name,
        args,
        rhs: Box::new(rhs),
        is_self,
    })
}

/// The untyped body placeholder, `T.unsafe(nil)`.
#[must_use]
pub fn untyped(loc: Loc) -> Expression {
    send(
        loc,
        constant(loc, empty_tree(loc), names::t()),
        names::unsafe_(),
        vec![nil(loc)],
    )
}

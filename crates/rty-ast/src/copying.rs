//! The deep-copy protocol.
//!
//! `deep_copy` returns a freshly allocated, fully independent tree of the
//! same shape, or `None` when the tree is not copyable. The traversal
//! carries an **avoid** pointer: the address of a node whose recurrence
//! below the root indicates an unwanted cycle. The root itself is exempt on
//! its first visit, so copying a tree with avoid pointed at its own root
//! succeeds; re-entering the root through a [`TreeRef`] does not.

use std::ptr;
use std::sync::Arc;

use crate::tree::*;

/// Raised internally when the traversal re-enters the avoid node. Never
/// escapes the entry point.
pub(crate) struct DeepCopyError;

type CopyResult = Result<Expression, DeepCopyError>;

fn copy_vec(avoid: *const Expression, origin: &[Expression]) -> Result<Vec<Expression>, DeepCopyError> {
    origin.iter().map(|e| e.copy_avoiding(avoid)).collect()
}

fn copy_box(avoid: *const Expression, origin: &Expression) -> Result<Box<Expression>, DeepCopyError> {
    Ok(Box::new(origin.copy_avoiding(avoid)?))
}

impl Expression {
    /// Produce an independent copy of this tree, or `None` when the tree
    /// contains a cycle back into itself.
    #[must_use]
    pub fn deep_copy(&self) -> Option<Expression> {
        // The root is exempt from the avoid check on its first visit.
        self.copy_children(self as *const Expression).ok()
    }

    /// Copy a non-root node: fail if it is the avoid node, else recurse.
    pub(crate) fn copy_avoiding(&self, avoid: *const Expression) -> CopyResult {
        if ptr::eq(self as *const Expression, avoid) {
            return Err(DeepCopyError);
        }
        self.copy_children(avoid)
    }

    fn copy_children(&self, avoid: *const Expression) -> CopyResult {
        Ok(match self {
            Expression::ClassDef(n) => Expression::ClassDef(ClassDef {
                loc: n.loc,
                symbol: n.symbol,
                name: copy_box(avoid, &n.name)?,
                ancestors: copy_vec(avoid, &n.ancestors)?,
                rhs: copy_vec(avoid, &n.rhs)?,
                kind: n.kind,
            }),
            Expression::MethodDef(n) => Expression::MethodDef(MethodDef {
                loc: n.loc,
                symbol: n.symbol,
                name: n.name,
                args: copy_vec(avoid, &n.args)?,
                rhs: copy_box(avoid, &n.rhs)?,
                is_self: n.is_self,
            }),
            Expression::ConstDef(n) => Expression::ConstDef(ConstDef {
                loc: n.loc,
                symbol: n.symbol,
                rhs: copy_box(avoid, &n.rhs)?,
            }),
            Expression::If(n) => Expression::If(If {
                loc: n.loc,
                cond: copy_box(avoid, &n.cond)?,
                thenp: copy_box(avoid, &n.thenp)?,
                elsep: copy_box(avoid, &n.elsep)?,
            }),
            Expression::While(n) => Expression::While(While {
                loc: n.loc,
                cond: copy_box(avoid, &n.cond)?,
                body: copy_box(avoid, &n.body)?,
            }),
            Expression::Break(n) => Expression::Break(Break {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::Retry(n) => Expression::Retry(Retry { loc: n.loc }),
            Expression::Next(n) => Expression::Next(Next {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::Return(n) => Expression::Return(Return {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::Yield(n) => Expression::Yield(Yield {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::RescueCase(n) => Expression::RescueCase(RescueCase {
                loc: n.loc,
                exceptions: copy_vec(avoid, &n.exceptions)?,
                var: copy_box(avoid, &n.var)?,
                body: copy_box(avoid, &n.body)?,
            }),
            Expression::Rescue(n) => Expression::Rescue(Rescue {
                loc: n.loc,
                body: copy_box(avoid, &n.body)?,
                rescue_cases: copy_vec(avoid, &n.rescue_cases)?,
                else_: copy_box(avoid, &n.else_)?,
                ensure: copy_box(avoid, &n.ensure)?,
            }),
            Expression::Ident(n) => Expression::Ident(Ident {
                loc: n.loc,
                symbol: n.symbol,
            }),
            Expression::Local(n) => Expression::Local(Local {
                loc: n.loc,
                local_variable: n.local_variable,
            }),
            Expression::UnresolvedIdent(n) => Expression::UnresolvedIdent(UnresolvedIdent {
                loc: n.loc,
                kind: n.kind,
                name: n.name,
            }),
            Expression::Self_(n) => Expression::Self_(Self_ {
                loc: n.loc,
                claz: n.claz,
            }),
            Expression::RestArg(n) => Expression::RestArg(RestArg {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::KeywordArg(n) => Expression::KeywordArg(KeywordArg {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::OptionalArg(n) => Expression::OptionalArg(OptionalArg {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
                default: copy_box(avoid, &n.default)?,
            }),
            Expression::BlockArg(n) => Expression::BlockArg(BlockArg {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::ShadowArg(n) => Expression::ShadowArg(ShadowArg {
                loc: n.loc,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::Assign(n) => Expression::Assign(Assign {
                loc: n.loc,
                lhs: copy_box(avoid, &n.lhs)?,
                rhs: copy_box(avoid, &n.rhs)?,
            }),
            Expression::Send(n) => Expression::Send(Send {
                loc: n.loc,
                recv: copy_box(avoid, &n.recv)?,
                fun: n.fun,
                args: copy_vec(avoid, &n.args)?,
                block: match &n.block {
                    Some(b) => Some(copy_box(avoid, b)?),
                    None => None,
                },
            }),
            Expression::Cast(n) => Expression::Cast(Cast {
                loc: n.loc,
                ty: n.ty,
                arg: copy_box(avoid, &n.arg)?,
                cast: n.cast,
            }),
            Expression::Hash(n) => Expression::Hash(Hash {
                loc: n.loc,
                keys: copy_vec(avoid, &n.keys)?,
                values: copy_vec(avoid, &n.values)?,
            }),
            Expression::Array(n) => Expression::Array(Array {
                loc: n.loc,
                elems: copy_vec(avoid, &n.elems)?,
            }),
            Expression::Literal(n) => Expression::Literal(Literal {
                loc: n.loc,
                value: n.value.clone(),
            }),
            Expression::ConstantLit(n) => Expression::ConstantLit(ConstantLit {
                loc: n.loc,
                scope: copy_box(avoid, &n.scope)?,
                cnst: n.cnst,
            }),
            Expression::ArraySplat(n) => Expression::ArraySplat(ArraySplat {
                loc: n.loc,
                arg: copy_box(avoid, &n.arg)?,
            }),
            Expression::HashSplat(n) => Expression::HashSplat(HashSplat {
                loc: n.loc,
                arg: copy_box(avoid, &n.arg)?,
            }),
            Expression::ZSuperArgs(n) => Expression::ZSuperArgs(ZSuperArgs { loc: n.loc }),
            Expression::Block(n) => Expression::Block(Block {
                loc: n.loc,
                args: copy_vec(avoid, &n.args)?,
                body: copy_box(avoid, &n.body)?,
                symbol: n.symbol,
            }),
            Expression::InsSeq(n) => Expression::InsSeq(InsSeq {
                loc: n.loc,
                stats: copy_vec(avoid, &n.stats)?,
                expr: copy_box(avoid, &n.expr)?,
            }),
            Expression::EmptyTree(n) => Expression::EmptyTree(EmptyTree { loc: n.loc }),
            Expression::TreeRef(n) => {
                // Re-expand the shared target. A dangling reference or a
                // target that is the avoid node makes the whole copy fail.
                let Some(inner) = n.tree.upgrade() else {
                    return Err(DeepCopyError);
                };
                if ptr::eq(Arc::as_ptr(&inner), avoid) {
                    return Err(DeepCopyError);
                }
                inner.copy_children(avoid)?
            }
        })
    }
}

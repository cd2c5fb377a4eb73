//! The abstract syntax tree.
//!
//! The AST is a closed family of node variants expressed as a single sum
//! type, [`Expression`]. Every node carries a [`Loc`](rty_core::Loc); nodes
//! own their children outright except for [`TreeRef`], which holds a weak
//! relation to a tree stored elsewhere.
//!
//! The companion [`deep_copy`](Expression::deep_copy) protocol produces
//! structurally independent snapshots of a tree and is what isolates cached
//! indexed trees from the trees a reanalysis mutates. Copying detects
//! unwanted cycles through an "avoid" sentinel; see the `copying` module.

#![warn(missing_docs)]

pub mod helpers;

mod copying;
mod tree;

pub use tree::{
    Array, ArraySplat, Assign, Block, BlockArg, Break, Cast, CastKind, ClassDef, ClassDefKind,
    ConstDef, ConstantLit, EmptyTree, Expression, Hash, HashSplat, Ident, If, InsSeq, KeywordArg,
    Literal, LiteralValue, Local, LocalVariable, MethodDef, Next, OptionalArg, RescueCase, Rescue,
    RestArg, Retry, Return, Self_, Send, ShadowArg, TreeRef, UnresolvedIdent, VarKind, While,
    Yield, ZSuperArgs,
};

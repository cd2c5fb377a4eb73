//! The typechecker.
//!
//! Checks call sites against the indexed method definitions. The pass is
//! data-parallel over files: each file's tree is walked independently on
//! the worker pool and the collected diagnostics are queued afterwards on
//! the calling thread.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use rty_ast::{Expression, Send};
use rty_core::{errors, GlobalState, QueuedError, SymbolRef};
use rty_intern::Name;
use tracing::debug;

use crate::{Opts, ParsedFile, Workers};

/// Required positional-argument counts per (class, method).
type ArityMap = FxHashMap<(SymbolRef, Name), usize>;

/// Typecheck a batch of resolved trees, queueing diagnostics.
pub fn typecheck(gs: &mut GlobalState, trees: Vec<ParsedFile>, _opts: &Opts, workers: &Workers) {
    let mut arities = ArityMap::default();
    for parsed in &trees {
        collect_arities(&parsed.tree, &mut arities);
    }

    let found: Vec<Vec<QueuedError>> = workers.install(|| {
        trees
            .par_iter()
            .map(|parsed| {
                let mut out = Vec::new();
                check(&parsed.tree, SymbolRef::NONE, &arities, &mut out);
                out
            })
            .collect()
    });

    let queue = gs.error_queue();
    let mut count = 0usize;
    for errors in found {
        for error in errors {
            queue.push(error);
            count += 1;
        }
    }
    debug!(files = trees.len(), errors = count, "typecheck complete");
}

fn collect_arities(expr: &Expression, arities: &mut ArityMap) {
    match expr {
        Expression::ClassDef(klass) => {
            for stat in &klass.rhs {
                if let Expression::MethodDef(mdef) = stat {
                    if !mdef.is_self {
                        let required = mdef
                            .args
                            .iter()
                            .filter(|arg| {
                                matches!(
                                    arg,
                                    Expression::UnresolvedIdent(_) | Expression::Local(_)
                                )
                            })
                            .count();
                        arities.insert((klass.symbol, mdef.name), required);
                    }
                }
                collect_arities(stat, arities);
            }
        }
        Expression::InsSeq(seq) => {
            for stat in &seq.stats {
                collect_arities(stat, arities);
            }
            collect_arities(&seq.expr, arities);
        }
        _ => {}
    }
}

/// Count the positional arguments at a call site; `None` when splats make
/// the count unknowable.
fn positional_count(send: &Send) -> Option<usize> {
    let mut count = 0;
    for arg in &send.args {
        match arg {
            Expression::ArraySplat(_) | Expression::ZSuperArgs(_) => return None,
            Expression::Hash(_) | Expression::HashSplat(_) => {}
            _ => count += 1,
        }
    }
    Some(count)
}

fn check(expr: &Expression, klass: SymbolRef, arities: &ArityMap, out: &mut Vec<QueuedError>) {
    match expr {
        Expression::ClassDef(class_def) => {
            for stat in &class_def.rhs {
                check(stat, class_def.symbol, arities, out);
            }
        }
        Expression::MethodDef(mdef) => check(&mdef.rhs, klass, arities, out),
        Expression::Send(send) => {
            let implicit_self = send.recv.is_empty_tree()
                || matches!(send.recv.as_ref(), Expression::Self_(_));
            if implicit_self && klass.exists() {
                if let Some(&required) = arities.get(&(klass, send.fun)) {
                    if let Some(got) = positional_count(send) {
                        if got < required {
                            out.push(QueuedError::new(
                                send.loc,
                                errors::typecheck::NOT_ENOUGH_ARGUMENTS,
                                format!(
                                    "Not enough arguments provided for method `{}`. Expected: {required}, got: {got}",
                                    send.fun
                                ),
                            ));
                        }
                    }
                }
            }
            check(&send.recv, klass, arities, out);
            for arg in &send.args {
                check(arg, klass, arities, out);
            }
            if let Some(block) = &send.block {
                check(block, klass, arities, out);
            }
        }
        Expression::InsSeq(seq) => {
            for stat in &seq.stats {
                check(stat, klass, arities, out);
            }
            check(&seq.expr, klass, arities, out);
        }
        Expression::If(node) => {
            check(&node.cond, klass, arities, out);
            check(&node.thenp, klass, arities, out);
            check(&node.elsep, klass, arities, out);
        }
        Expression::While(node) => {
            check(&node.cond, klass, arities, out);
            check(&node.body, klass, arities, out);
        }
        Expression::Assign(node) => check(&node.rhs, klass, arities, out),
        Expression::Block(node) => check(&node.body, klass, arities, out),
        Expression::Rescue(node) => {
            check(&node.body, klass, arities, out);
            for case in &node.rescue_cases {
                check(case, klass, arities, out);
            }
            check(&node.else_, klass, arities, out);
            check(&node.ensure, klass, arities, out);
        }
        Expression::RescueCase(node) => check(&node.body, klass, arities, out),
        Expression::ConstDef(node) => check(&node.rhs, klass, arities, out),
        Expression::Return(node) => check(&node.expr, klass, arities, out),
        Expression::Break(node) => check(&node.expr, klass, arities, out),
        Expression::Next(node) => check(&node.expr, klass, arities, out),
        Expression::Yield(node) => check(&node.expr, klass, arities, out),
        Expression::Cast(node) => check(&node.arg, klass, arities, out),
        Expression::Array(node) => {
            for elem in &node.elems {
                check(elem, klass, arities, out);
            }
        }
        Expression::Hash(node) => {
            for value in &node.values {
                check(value, klass, arities, out);
            }
        }
        _ => {}
    }
}

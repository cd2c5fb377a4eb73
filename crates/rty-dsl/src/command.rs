//! The `Opus::Command` rewrite.
//!
//! Command classes implement an instance method `call`, but callers invoke
//! the command through a generated singleton of the same name. This pass
//! mirrors the instance `call` as a `def self.call` with an untyped body,
//! duplicating the preceding signature declaration so both entry points
//! carry one.

use rty_ast::{helpers, ClassDef, ClassDefKind, Expression};
use rty_core::{names, SymbolRef};
use tracing::debug;

/// Whether `klass` is a direct subclass of `Opus::Command`.
fn is_command(klass: &ClassDef) -> bool {
    if klass.kind != ClassDefKind::Class || klass.ancestors.is_empty() {
        return false;
    }
    let Some(cnst) = klass.ancestors[0].as_constant_lit() else {
        return false;
    };
    if cnst.cnst != names::command() {
        return false;
    }
    let Some(scope) = cnst.scope.as_constant_lit() else {
        return false;
    };
    if scope.cnst != names::opus() {
        return false;
    }
    if scope.scope.is_empty_tree() {
        return true;
    }
    match scope.scope.as_ref() {
        Expression::Ident(id) => id.symbol == SymbolRef::ROOT,
        _ => false,
    }
}

/// Rewrite a command class in place; no-op when the shape does not match.
///
/// Applying the pass twice is safe: the synthesized singleton is inserted
/// *after* the first `call`, and the scan stops at that first `call`, so a
/// rewritten body never matches again in a way that would duplicate it.
pub fn patch_command(klass: &mut ClassDef) {
    if !is_command(klass) {
        return;
    }

    let mut found = None;
    for (i, stat) in klass.rhs.iter().enumerate() {
        if let Expression::MethodDef(mdef) = stat {
            if mdef.name == names::call() {
                found = Some(i);
                break;
            }
        }
    }
    // No `call`, or `call` is the first statement and thus cannot have a
    // signature in front of it.
    let Some(i) = found else {
        return;
    };
    if i == 0 {
        return;
    }

    // Heuristic: does the previous statement look like a signature
    // declaration? Check that it is a Send and so is its receiver. This
    // matches any chained call; tightening it would require the resolver's
    // type-syntax knowledge, which this pass must not depend on.
    let Some(sig) = klass.rhs[i - 1].as_send() else {
        return;
    };
    if sig.recv.as_send().is_none() {
        return;
    }

    let Expression::MethodDef(call) = &klass.rhs[i] else {
        return;
    };

    let mut new_args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        let Some(copy) = arg.deep_copy() else {
            return;
        };
        new_args.push(copy);
    }
    let self_call = helpers::method_def(
        call.loc,
        call.name,
        new_args,
        helpers::untyped(call.loc),
        true,
    );

    let Some(sig_copy) = klass.rhs[i - 1].deep_copy() else {
        return;
    };

    debug!(class = %call.name, "mirroring command call as singleton");
    klass.rhs.insert(i + 1, sig_copy);
    klass.rhs.insert(i + 2, self_call);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch_tree;
    use rty_ast::{UnresolvedIdent, VarKind};
    use rty_core::Loc;
    use rty_intern::Name;

    fn loc() -> Loc {
        Loc::none()
    }

    /// `Opus::Command` as an ancestor expression.
    fn command_ancestor() -> Expression {
        helpers::constant(
            loc(),
            helpers::constant(loc(), helpers::empty_tree(loc()), names::opus()),
            names::command(),
        )
    }

    /// `sig.params(x: Integer).returns(NilClass)` — a chained send whose
    /// receiver is itself a send.
    fn sig_statement() -> Expression {
        let sig = helpers::send(loc(), helpers::empty_tree(loc()), names::sig(), vec![]);
        let params = helpers::send(loc(), sig, Name::intern("params"), vec![]);
        helpers::send(loc(), params, Name::intern("returns"), vec![])
    }

    fn call_def() -> Expression {
        helpers::method_def(
            loc(),
            names::call(),
            vec![Expression::UnresolvedIdent(UnresolvedIdent {
                loc: loc(),
                kind: VarKind::Local,
                name: Name::intern("x"),
            })],
            helpers::empty_tree(loc()),
            false,
        )
    }

    fn command_class(rhs: Vec<Expression>) -> ClassDef {
        ClassDef {
            loc: loc(),
            symbol: SymbolRef::NONE,
            name: Box::new(helpers::constant(loc(), helpers::empty_tree(loc()), Name::intern("Foo"))),
            ancestors: vec![command_ancestor()],
            rhs,
            kind: ClassDefKind::Class,
        }
    }

    fn assert_rewritten(klass: &ClassDef) {
        assert_eq!(klass.rhs.len(), 4);
        // Original sig, original call, copied sig, synthesized singleton.
        assert_eq!(klass.rhs[2], klass.rhs[0]);
        let Expression::MethodDef(mirror) = &klass.rhs[3] else {
            panic!("expected the synthesized singleton");
        };
        assert_eq!(mirror.name, names::call());
        assert!(mirror.is_self);
        let Expression::MethodDef(original) = &klass.rhs[1] else {
            panic!("expected the original call");
        };
        assert_eq!(mirror.args, original.args);
        assert_eq!(*mirror.rhs, helpers::untyped(loc()));
    }

    #[test]
    fn rewrites_a_matching_command_class() {
        let mut klass = command_class(vec![sig_statement(), call_def()]);
        patch_command(&mut klass);
        assert_rewritten(&klass);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let mut klass = command_class(vec![sig_statement(), call_def()]);
        patch_command(&mut klass);
        let after_once = klass.clone();
        patch_command(&mut klass);
        assert_eq!(klass, after_once);
    }

    #[test]
    fn no_op_without_the_command_ancestor() {
        let original = command_class(vec![sig_statement(), call_def()]);
        let mut klass = ClassDef {
            ancestors: vec![helpers::constant(
                loc(),
                helpers::empty_tree(loc()),
                Name::intern("Object"),
            )],
            ..original
        };
        let before = klass.clone();
        patch_command(&mut klass);
        assert_eq!(klass, before);
    }

    #[test]
    fn no_op_on_modules() {
        let mut klass = command_class(vec![sig_statement(), call_def()]);
        klass.kind = ClassDefKind::Module;
        let before = klass.clone();
        patch_command(&mut klass);
        assert_eq!(klass, before);
    }

    #[test]
    fn no_op_when_call_is_the_first_statement() {
        let mut klass = command_class(vec![call_def(), sig_statement()]);
        let before = klass.clone();
        patch_command(&mut klass);
        assert_eq!(klass, before);
    }

    #[test]
    fn no_op_when_the_preceding_statement_is_not_a_chained_send() {
        // Bare `sig` with no chained receiver fails the heuristic.
        let bare_sig = helpers::send(loc(), helpers::empty_tree(loc()), names::sig(), vec![]);
        let mut klass = command_class(vec![bare_sig, call_def()]);
        let before = klass.clone();
        patch_command(&mut klass);
        assert_eq!(klass, before);
    }

    #[test]
    fn no_op_without_a_call_method() {
        let other = helpers::method_def(
            loc(),
            Name::intern("run"),
            vec![],
            helpers::empty_tree(loc()),
            false,
        );
        let mut klass = command_class(vec![sig_statement(), other]);
        let before = klass.clone();
        patch_command(&mut klass);
        assert_eq!(klass, before);
    }

    #[test]
    fn patch_tree_reaches_nested_classes() {
        let inner = command_class(vec![sig_statement(), call_def()]);
        let mut outer = Expression::ClassDef(ClassDef {
            loc: loc(),
            symbol: SymbolRef::NONE,
            name: Box::new(helpers::constant(loc(), helpers::empty_tree(loc()), Name::intern("Outer"))),
            ancestors: vec![],
            rhs: vec![Expression::ClassDef(inner)],
            kind: ClassDefKind::Class,
        });

        patch_tree(&mut outer);

        let Expression::ClassDef(outer) = &outer else {
            unreachable!();
        };
        let Expression::ClassDef(inner) = &outer.rhs[0] else {
            panic!("expected the nested class");
        };
        assert_rewritten(inner);
    }

    #[test]
    fn mirror_keeps_argument_names() {
        let mut klass = command_class(vec![sig_statement(), call_def()]);
        patch_command(&mut klass);
        let Expression::MethodDef(mirror) = &klass.rhs[3] else {
            panic!("expected the synthesized singleton");
        };
        let Expression::UnresolvedIdent(arg) = &mirror.args[0] else {
            panic!("expected the mirrored argument");
        };
        assert_eq!(arg.name, Name::intern("x"));
    }
}

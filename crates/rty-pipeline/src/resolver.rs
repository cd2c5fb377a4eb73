//! The resolver: binds constant references and checks definition shapes.
//!
//! Runs against the post-index derivative of the global state. Resolves
//! ancestor constants, flags reopened classes that change their superclass,
//! flags duplicate argument names, and rewrites `T.let`-family sends into
//! `Cast` nodes so the typechecker sees casts uniformly.

use rustc_hash::{FxHashMap, FxHashSet};
use rty_ast::{Cast, CastKind, Expression, MethodDef};
use rty_core::{errors, names, GlobalState, QueuedError, SymbolRef};
use rty_intern::Name;

use crate::{Opts, ParsedFile};

/// Resolve a batch of indexed trees, queueing diagnostics as they surface.
#[must_use]
pub fn resolve(gs: &mut GlobalState, mut trees: Vec<ParsedFile>, _opts: &Opts) -> Vec<ParsedFile> {
    let mut pass = Resolver {
        gs,
        parents_seen: FxHashMap::default(),
    };
    for parsed in &mut trees {
        pass.visit(&mut parsed.tree);
    }
    trees
}

struct Resolver<'gs> {
    gs: &'gs mut GlobalState,
    /// First-seen superclass name per class symbol, for reopen checking.
    parents_seen: FxHashMap<SymbolRef, Name>,
}

impl Resolver<'_> {
    fn visit(&mut self, expr: &mut Expression) {
        rewrite_casts(expr);
        match expr {
            Expression::ClassDef(klass) => {
                for ancestor in &klass.ancestors {
                    if self.resolve_constant(ancestor).is_none() {
                        self.gs.error_queue().push(QueuedError::new(
                            ancestor.loc(),
                            errors::resolver::STUB_CONSTANT,
                            format!(
                                "Unable to resolve constant `{}`",
                                render_constant(ancestor)
                            ),
                        ));
                    }
                }
                self.check_parents(klass);
                for stat in &mut klass.rhs {
                    self.visit(stat);
                }
            }
            Expression::MethodDef(mdef) => {
                self.check_duplicate_args(mdef);
                self.visit(&mut mdef.rhs);
            }
            Expression::InsSeq(seq) => {
                for stat in &mut seq.stats {
                    self.visit(stat);
                }
                self.visit(&mut seq.expr);
            }
            Expression::If(node) => {
                self.visit(&mut node.cond);
                self.visit(&mut node.thenp);
                self.visit(&mut node.elsep);
            }
            Expression::While(node) => {
                self.visit(&mut node.cond);
                self.visit(&mut node.body);
            }
            Expression::Assign(node) => {
                self.visit(&mut node.lhs);
                self.visit(&mut node.rhs);
            }
            Expression::Send(node) => {
                self.visit(&mut node.recv);
                for arg in &mut node.args {
                    self.visit(arg);
                }
                if let Some(block) = &mut node.block {
                    self.visit(block);
                }
            }
            Expression::Block(node) => self.visit(&mut node.body),
            Expression::Rescue(node) => {
                self.visit(&mut node.body);
                for case in &mut node.rescue_cases {
                    self.visit(case);
                }
                self.visit(&mut node.else_);
                self.visit(&mut node.ensure);
            }
            Expression::RescueCase(node) => self.visit(&mut node.body),
            Expression::ConstDef(node) => self.visit(&mut node.rhs),
            Expression::Return(node) => self.visit(&mut node.expr),
            Expression::Break(node) => self.visit(&mut node.expr),
            Expression::Next(node) => self.visit(&mut node.expr),
            Expression::Yield(node) => self.visit(&mut node.expr),
            Expression::Cast(node) => self.visit(&mut node.arg),
            Expression::Array(node) => {
                for elem in &mut node.elems {
                    self.visit(elem);
                }
            }
            Expression::Hash(node) => {
                for key in &mut node.keys {
                    self.visit(key);
                }
                for value in &mut node.values {
                    self.visit(value);
                }
            }
            Expression::ArraySplat(node) => self.visit(&mut node.arg),
            Expression::HashSplat(node) => self.visit(&mut node.arg),
            _ => {}
        }
    }

    /// Resolve a `ConstantLit` chain against the symbol table, rooted at
    /// the root scope.
    fn resolve_constant(&self, expr: &Expression) -> Option<SymbolRef> {
        let mut segments = Vec::new();
        let mut cur = expr;
        loop {
            match cur {
                Expression::ConstantLit(cnst) => {
                    segments.push(cnst.cnst);
                    cur = &cnst.scope;
                }
                Expression::EmptyTree(_) => break,
                _ => return None,
            }
        }
        segments.reverse();

        let mut scope = SymbolRef::ROOT;
        for segment in segments {
            let member = self.gs.find_member(scope, segment)?;
            if !self.gs.symbol(member).is_class_or_module() {
                return None;
            }
            scope = member;
        }
        Some(scope)
    }

    fn check_parents(&mut self, klass: &rty_ast::ClassDef) {
        let Some(first) = klass.ancestors.first() else {
            return;
        };
        let Some(cnst) = first.as_constant_lit() else {
            return;
        };
        match self.parents_seen.get(&klass.symbol) {
            Some(prior) if *prior != cnst.cnst => {
                self.gs.error_queue().push(QueuedError::new(
                    klass.loc,
                    errors::resolver::REDEFINITION_OF_PARENTS,
                    format!(
                        "Parent of `{}` redefined from `{prior}` to `{}`",
                        self.gs.full_name(klass.symbol),
                        cnst.cnst
                    ),
                ));
            }
            Some(_) => {}
            None => {
                self.parents_seen.insert(klass.symbol, cnst.cnst);
            }
        }
    }

    fn check_duplicate_args(&mut self, mdef: &MethodDef) {
        let mut seen = FxHashSet::default();
        for arg in &mdef.args {
            let Some((name, loc)) = crate::namer::arg_name(arg) else {
                continue;
            };
            if !seen.insert(name) {
                self.gs.error_queue().push(QueuedError::new(
                    loc,
                    errors::resolver::DUPLICATE_VARIABLE_DECLARATION,
                    format!("Duplicate variable declaration `{name}`"),
                ));
            }
        }
    }
}

/// Rewrite `T.let(value, Type)`-family sends into `Cast` nodes, in place.
fn rewrite_casts(expr: &mut Expression) {
    let Expression::Send(send) = expr else {
        return;
    };
    let Some(recv) = send.recv.as_constant_lit() else {
        return;
    };
    if recv.cnst != names::t() || !recv.scope.is_empty_tree() {
        return;
    }
    let (kind, arity) = match send.fun.as_str() {
        "let" => (CastKind::Let, 2),
        "cast" => (CastKind::Cast, 2),
        "assert_type!" => (CastKind::AssertType, 2),
        "unsafe" => (CastKind::Unsafe, 1),
        _ => return,
    };
    if send.args.len() != arity {
        return;
    }

    let loc = send.loc;
    let ty = if arity == 2 {
        match send.args[1].as_constant_lit() {
            Some(cnst) => cnst.cnst,
            None => Name::intern("untyped"),
        }
    } else {
        Name::intern("untyped")
    };
    let arg = send.args.remove(0);
    *expr = Expression::Cast(Cast {
        loc,
        ty,
        arg: Box::new(arg),
        cast: kind,
    });
}

fn render_constant(expr: &Expression) -> String {
    let mut segments = Vec::new();
    let mut cur = expr;
    while let Expression::ConstantLit(cnst) = cur {
        segments.push(cnst.cnst.as_str());
        cur = &cnst.scope;
    }
    segments.reverse();
    segments.join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{index, Workers};
    use rty_core::{FileRef, SourceType};

    fn run_resolve(sources: &[&str]) -> GlobalState {
        let mut gs = GlobalState::new();
        let workers = Workers::new(Some(1)).expect("pool");
        let opts = Opts::default();
        let refs: Vec<FileRef> = sources
            .iter()
            .enumerate()
            .map(|(i, src)| gs.enter_file(format!("f{i}.rb"), *src, SourceType::Normal))
            .collect();
        let trees = index(&mut gs, &[], &refs, &opts, &workers);
        let _ = resolve(&mut gs, trees, &opts);
        gs
    }

    #[test]
    fn unresolved_ancestors_are_stubbed() {
        let gs = run_resolve(&["class Foo < Missing::Thing\nend\n"]);
        let drained = gs.error_queue().drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].class, errors::resolver::STUB_CONSTANT);
        assert!(drained[0].formatted.contains("Missing::Thing"));
    }

    #[test]
    fn known_ancestors_resolve_silently() {
        let gs = run_resolve(&[
            "module Opus\n  class Command\n  end\nend\n",
            "class Foo < Opus::Command\nend\n",
        ]);
        assert!(gs.error_queue().is_empty());
    }

    #[test]
    fn changed_superclass_is_reported() {
        let gs = run_resolve(&[
            "class Base\nend\nclass Other\nend\nclass Foo < Base\nend\nclass Foo < Other\nend\n",
        ]);
        let drained = gs.error_queue().drain();
        assert!(drained
            .iter()
            .any(|e| e.class == errors::resolver::REDEFINITION_OF_PARENTS));
    }

    #[test]
    fn duplicate_argument_names_are_reported() {
        let gs = run_resolve(&["class Foo\n  def m(x, x)\n  end\nend\n"]);
        let drained = gs.error_queue().drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(
            drained[0].class,
            errors::resolver::DUPLICATE_VARIABLE_DECLARATION
        );
    }

    #[test]
    fn t_let_rewrites_to_a_cast() {
        let mut gs = GlobalState::new();
        let file = gs.enter_file("a.rb", "x = T.let(1, Integer)\n", SourceType::Normal);
        let (mut tree, _) = crate::parser::parse("x = T.let(1, Integer)\n", file);
        rty_dsl::patch_tree(&mut tree);
        crate::namer::enter_symbols(&mut gs, &mut tree);
        let trees = vec![ParsedFile { file, tree }];
        let resolved = resolve(&mut gs, trees, &Opts::default());

        let Expression::InsSeq(seq) = &resolved[0].tree else {
            panic!("programs parse to a sequence");
        };
        let Expression::Assign(assign) = &seq.stats[0] else {
            panic!("expected the assignment");
        };
        let Expression::Cast(cast) = assign.rhs.as_ref() else {
            panic!("expected the rewritten cast");
        };
        assert_eq!(cast.cast, CastKind::Let);
        assert_eq!(cast.ty, Name::intern("Integer"));
    }
}

//! The namer: populates the symbol table from a freshly parsed tree.
//!
//! Runs as the tail end of indexing. Walks a tree, enters the definitions
//! it finds into the global state, and stamps the entered refs back onto
//! the defining nodes. Constant assignments are rewritten into `ConstDef`
//! nodes carrying their symbol.

use rty_ast::{ConstDef, Expression, VarKind};
use rty_core::{errors, ErrorLine, ErrorSection, GlobalState, Loc, QueuedError, SymbolRef};
use rty_intern::Name;

/// Enter every definition in `tree`, mutating nodes to carry their symbols.
pub fn enter_symbols(gs: &mut GlobalState, tree: &mut Expression) {
    visit(gs, tree, SymbolRef::ROOT);
}

fn visit(gs: &mut GlobalState, expr: &mut Expression, owner: SymbolRef) {
    match expr {
        Expression::ClassDef(klass) => {
            let symbol = enter_cpath(
                gs,
                owner,
                &klass.name,
                klass.kind == rty_ast::ClassDefKind::Module,
                klass.loc,
            );
            klass.symbol = symbol;
            visit_body(gs, &mut klass.rhs, symbol);
        }
        Expression::MethodDef(mdef) => {
            // Singleton methods live in their own namespace; prefix them so
            // `def call` and `def self.call` never collide.
            let entered_name = if mdef.is_self {
                Name::intern(&format!("self.{}", mdef.name))
            } else {
                mdef.name
            };

            let symbol = match gs.find_member(owner, entered_name) {
                Some(existing)
                    if gs.symbol(existing).is_method()
                        && gs.symbol(existing).definition_loc != mdef.loc =>
                {
                    report_redefinition(gs, entered_name, mdef.loc, existing);
                    existing
                }
                Some(existing) if gs.symbol(existing).is_method() => existing,
                _ => gs.enter_method(owner, entered_name, mdef.loc),
            };
            mdef.symbol = symbol;

            for arg in &mdef.args {
                if let Some((name, loc)) = arg_name(arg) {
                    gs.enter_method_argument(symbol, name, loc);
                }
            }
            visit(gs, &mut mdef.rhs, owner);
        }
        Expression::Assign(assign) => {
            if let Expression::UnresolvedIdent(ident) = assign.lhs.as_ref() {
                if ident.kind == VarKind::Instance {
                    gs.enter_field(owner, ident.name, ident.loc);
                }
            }
            visit(gs, &mut assign.lhs, owner);
            visit(gs, &mut assign.rhs, owner);
        }
        Expression::Self_(node) => {
            node.claz = owner;
        }
        Expression::InsSeq(seq) => {
            visit_body(gs, &mut seq.stats, owner);
            visit(gs, &mut seq.expr, owner);
        }
        Expression::If(node) => {
            visit(gs, &mut node.cond, owner);
            visit(gs, &mut node.thenp, owner);
            visit(gs, &mut node.elsep, owner);
        }
        Expression::While(node) => {
            visit(gs, &mut node.cond, owner);
            visit(gs, &mut node.body, owner);
        }
        Expression::Break(node) => visit(gs, &mut node.expr, owner),
        Expression::Next(node) => visit(gs, &mut node.expr, owner),
        Expression::Return(node) => visit(gs, &mut node.expr, owner),
        Expression::Yield(node) => visit(gs, &mut node.expr, owner),
        Expression::Rescue(node) => {
            visit(gs, &mut node.body, owner);
            for case in &mut node.rescue_cases {
                visit(gs, case, owner);
            }
            visit(gs, &mut node.else_, owner);
            visit(gs, &mut node.ensure, owner);
        }
        Expression::RescueCase(node) => {
            visit(gs, &mut node.var, owner);
            visit(gs, &mut node.body, owner);
        }
        Expression::Send(node) => {
            visit(gs, &mut node.recv, owner);
            for arg in &mut node.args {
                visit(gs, arg, owner);
            }
            if let Some(block) = &mut node.block {
                visit(gs, block, owner);
            }
        }
        Expression::Block(node) => {
            visit(gs, &mut node.body, owner);
        }
        Expression::Cast(node) => visit(gs, &mut node.arg, owner),
        Expression::Hash(node) => {
            for key in &mut node.keys {
                visit(gs, key, owner);
            }
            for value in &mut node.values {
                visit(gs, value, owner);
            }
        }
        Expression::Array(node) => {
            for elem in &mut node.elems {
                visit(gs, elem, owner);
            }
        }
        Expression::ArraySplat(node) => visit(gs, &mut node.arg, owner),
        Expression::HashSplat(node) => visit(gs, &mut node.arg, owner),
        Expression::ConstDef(node) => visit(gs, &mut node.rhs, owner),
        Expression::OptionalArg(node) => visit(gs, &mut node.default, owner),
        Expression::RestArg(_)
        | Expression::KeywordArg(_)
        | Expression::BlockArg(_)
        | Expression::ShadowArg(_)
        | Expression::Ident(_)
        | Expression::Local(_)
        | Expression::UnresolvedIdent(_)
        | Expression::ConstantLit(_)
        | Expression::Literal(_)
        | Expression::Retry(_)
        | Expression::ZSuperArgs(_)
        | Expression::EmptyTree(_)
        | Expression::TreeRef(_) => {}
    }
}

/// Visit a statement list, rewriting constant assignments into `ConstDef`s.
fn visit_body(gs: &mut GlobalState, stats: &mut Vec<Expression>, owner: SymbolRef) {
    for stat in stats {
        let const_assign = matches!(stat, Expression::Assign(a)
            if matches!(a.lhs.as_ref(), Expression::ConstantLit(c) if c.scope.is_empty_tree()));
        if const_assign {
            let placeholder = rty_ast::helpers::empty_tree(stat.loc());
            let Expression::Assign(assign) = std::mem::replace(stat, placeholder) else {
                unreachable!("matched above");
            };
            let Expression::ConstantLit(lhs) = *assign.lhs else {
                unreachable!("matched above");
            };
            let symbol = gs.enter_static_field(owner, lhs.cnst, lhs.loc);
            let mut rhs = assign.rhs;
            visit(gs, &mut rhs, owner);
            *stat = Expression::ConstDef(ConstDef {
                loc: assign.loc,
                symbol,
                rhs,
            });
        } else {
            visit(gs, stat, owner);
        }
    }
}

/// Enter the `Foo::Bar` chain of a definition name, returning the symbol
/// for the rightmost segment.
fn enter_cpath(
    gs: &mut GlobalState,
    owner: SymbolRef,
    name: &Expression,
    is_module: bool,
    def_loc: Loc,
) -> SymbolRef {
    let mut segments = Vec::new();
    let mut cur = name;
    while let Expression::ConstantLit(cnst) = cur {
        segments.push(cnst.cnst);
        cur = &cnst.scope;
    }
    segments.reverse();

    let mut scope = owner;
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        // Intermediate segments are namespace stubs entered as modules.
        scope = gs.enter_class(
            scope,
            *segment,
            if last { def_loc } else { Loc::none() },
            if last { is_module } else { true },
        );
    }
    scope
}

fn report_redefinition(gs: &GlobalState, name: Name, loc: Loc, existing: SymbolRef) {
    let previous_loc = gs.symbol(existing).definition_loc;
    gs.error_queue().push(
        QueuedError::new(
            loc,
            errors::namer::REDEFINITION_OF_METHOD,
            format!("Method `{name}` redefined"),
        )
        .with_section(ErrorSection {
            header: format!("Previous definition of `{name}`"),
            messages: vec![ErrorLine {
                loc: previous_loc,
                formatted: String::new(),
            }],
        }),
    );
}

/// The base name and location of a formal argument, unwrapping wrappers.
pub(crate) fn arg_name(arg: &Expression) -> Option<(Name, Loc)> {
    match arg {
        Expression::UnresolvedIdent(ident) => Some((ident.name, ident.loc)),
        Expression::Local(local) => Some((local.local_variable.name, local.loc)),
        Expression::RestArg(w) => arg_name(&w.expr),
        Expression::KeywordArg(w) => arg_name(&w.expr),
        Expression::BlockArg(w) => arg_name(&w.expr),
        Expression::ShadowArg(w) => arg_name(&w.expr),
        Expression::OptionalArg(w) => arg_name(&w.expr),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use rty_core::{SourceType, SymbolKind};

    fn index_source(src: &str) -> (GlobalState, Expression) {
        let mut gs = GlobalState::new();
        let file = gs.enter_file("test.rb", src, SourceType::Normal);
        let (mut tree, diags) = parser::parse(src, file);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        enter_symbols(&mut gs, &mut tree);
        (gs, tree)
    }

    #[test]
    fn enters_classes_methods_and_arguments() {
        let (gs, tree) = index_source("class Foo\n  def call(x)\n  end\nend\n");

        let foo = gs
            .find_member(SymbolRef::ROOT, Name::intern("Foo"))
            .expect("class entered");
        let call = gs
            .find_member(foo, Name::intern("call"))
            .expect("method entered");
        assert!(gs.symbol(call).is_method());
        let x = gs
            .find_member(call, Name::intern("x"))
            .expect("argument entered");
        assert_eq!(gs.symbol(x).kind, SymbolKind::MethodArgument);

        // The refs are stamped back onto the tree.
        let Expression::InsSeq(seq) = &tree else {
            panic!("programs parse to a sequence");
        };
        let klass = seq.stats[0].as_class_def().expect("class");
        assert_eq!(klass.symbol, foo);
    }

    #[test]
    fn nested_name_chains_enter_namespace_stubs() {
        let (gs, _) = index_source("class Opus::Command\nend\n");

        let opus = gs
            .find_member(SymbolRef::ROOT, Name::intern("Opus"))
            .expect("stub entered");
        let command = gs
            .find_member(opus, Name::intern("Command"))
            .expect("class entered");
        assert_eq!(gs.full_name(command), "Opus::Command");
    }

    #[test]
    fn method_redefinition_is_reported() {
        let (gs, _) = index_source("class Foo\n  def call\n  end\n  def call\n  end\nend\n");

        let drained = gs.error_queue().drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].class, errors::namer::REDEFINITION_OF_METHOD);
        // The previous-definition pointer rides along as a section.
        assert_eq!(drained[0].sections.len(), 1);
    }

    #[test]
    fn singleton_methods_do_not_collide_with_instance_methods() {
        let (gs, _) = index_source("class Foo\n  def call\n  end\n  def self.call\n  end\nend\n");
        assert!(gs.error_queue().is_empty());
    }

    #[test]
    fn constant_assignment_becomes_const_def() {
        let (gs, tree) = index_source("class Foo\n  MAX = 10\nend\n");

        let foo = gs
            .find_member(SymbolRef::ROOT, Name::intern("Foo"))
            .expect("class entered");
        let max = gs
            .find_member(foo, Name::intern("MAX"))
            .expect("constant entered");
        assert_eq!(gs.symbol(max).kind, SymbolKind::StaticField);

        let Expression::InsSeq(seq) = &tree else {
            panic!("programs parse to a sequence");
        };
        let klass = seq.stats[0].as_class_def().expect("class");
        assert!(matches!(klass.rhs[0], Expression::ConstDef(_)));
    }

    #[test]
    fn instance_variable_assignment_enters_a_field() {
        let (gs, _) = index_source("class Foo\n  def setup\n    @count = 0\n  end\nend\n");

        let foo = gs
            .find_member(SymbolRef::ROOT, Name::intern("Foo"))
            .expect("class entered");
        let field = gs
            .find_member(foo, Name::intern("count"))
            .expect("field entered");
        assert_eq!(gs.symbol(field).kind, SymbolKind::Field);
    }

    #[test]
    fn fresh_file_ref() {
        // Re-indexing the same content under a new ref reports the method
        // as redefined; the server silences this class.
        let mut gs = GlobalState::new();
        for _ in 0..2 {
            let file = gs.enter_file("a.rb", "class A\n  def m\n  end\nend\n", SourceType::Normal);
            let (mut tree, _) = parser::parse("class A\n  def m\n  end\nend\n", file);
            enter_symbols(&mut gs, &mut tree);
        }
        let drained = gs.error_queue().drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].class, errors::namer::REDEFINITION_OF_METHOD);
    }
}

//! Syntactic DSL rewriting.
//!
//! These passes run on freshly parsed trees, before naming. They recognize
//! source-level idioms of the supported frameworks and mechanically
//! synthesize the nodes later passes expect to see, so that downstream
//! analysis never has to know about the idiom.

#![warn(missing_docs)]

mod command;

pub use command::patch_command;

use rty_ast::Expression;

/// Apply every DSL pass to all class definitions in a tree.
pub fn patch_tree(expr: &mut Expression) {
    match expr {
        Expression::ClassDef(klass) => {
            for stat in &mut klass.rhs {
                patch_tree(stat);
            }
            command::patch_command(klass);
        }
        Expression::InsSeq(seq) => {
            for stat in &mut seq.stats {
                patch_tree(stat);
            }
            patch_tree(&mut seq.expr);
        }
        _ => {}
    }
}

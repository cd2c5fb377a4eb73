//! The compilation pipeline: index, resolve, typecheck.
//!
//! `index` parses files, applies the DSL rewrites, and populates the symbol
//! table; `resolve` binds constants and checks definition shapes against a
//! deep-copied global state; `typecheck` verifies call sites. The server
//! drives these three in order on every reanalysis.
//!
//! Parsing and typechecking fan out per file on a [`Workers`] pool and
//! return synchronously; all global-state mutation happens on the calling
//! thread.

#![warn(missing_docs)]

mod lexer;
mod namer;
mod resolver;
mod typecheck;

pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use resolver::resolve;
pub use typecheck::typecheck;

use rayon::prelude::*;
use rty_ast::Expression;
use rty_core::{FileRef, GlobalState, SourceType};
use tracing::{debug, warn};

/// Pipeline options, shared by the batch driver and the server.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Files named on the command line; the cold-index input set.
    pub input_file_names: Vec<String>,
    /// Worker-pool size; `None` picks the rayon default.
    pub jobs: Option<usize>,
}

/// A data-parallel worker pool for per-file fan-out.
pub struct Workers {
    pool: rayon::ThreadPool,
}

impl Workers {
    /// Build a pool with the given thread count (`None` = rayon default).
    ///
    /// # Errors
    ///
    /// Returns an error if the pool's threads cannot be spawned.
    pub fn new(jobs: Option<usize>) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.unwrap_or(0))
            .build()?;
        Ok(Self { pool })
    }

    /// Run `f` inside the pool.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }
}

/// One indexed file: its ref and its named tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// The file this tree came from.
    pub file: FileRef,
    /// The indexed AST root.
    pub tree: Expression,
}

/// Index a set of inputs: parse, rewrite DSLs, and enter symbols.
///
/// Inputs come either as file names (cold index: each is read from disk and
/// registered) or as already-registered refs (re-index). Returns one
/// [`ParsedFile`] per input in file order; parse diagnostics are queued on
/// the global state's error queue.
pub fn index(
    gs: &mut GlobalState,
    input_names: &[String],
    input_refs: &[FileRef],
    _opts: &Opts,
    workers: &Workers,
) -> Vec<ParsedFile> {
    let mut refs: Vec<FileRef> = input_refs.to_vec();
    for name in input_names {
        match std::fs::read_to_string(name) {
            Ok(source) => refs.push(gs.enter_file(name.clone(), source, SourceType::Normal)),
            Err(err) => warn!(file = %name, %err, "skipping unreadable input"),
        }
    }

    // Parsing only needs the source text; snapshot it so the fan-out does
    // not borrow the global state.
    let snapshots: Vec<(FileRef, String)> = refs
        .iter()
        .map(|&fref| (fref, gs.file(fref).source.clone()))
        .collect();

    let parsed: Vec<(FileRef, Expression, Vec<rty_core::QueuedError>)> = workers.install(|| {
        snapshots
            .par_iter()
            .map(|(fref, source)| {
                let (mut tree, diagnostics) = parser::parse(source, *fref);
                rty_dsl::patch_tree(&mut tree);
                (*fref, tree, diagnostics)
            })
            .collect()
    });

    let mut out = Vec::with_capacity(parsed.len());
    for (fref, mut tree, diagnostics) in parsed {
        for diagnostic in diagnostics {
            gs.error_queue().push(diagnostic);
        }
        namer::enter_symbols(gs, &mut tree);
        out.push(ParsedFile { file: fref, tree });
    }
    debug!(files = out.len(), "index complete");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rty_core::names;

    #[test]
    fn index_applies_the_command_rewrite() {
        let mut gs = GlobalState::new();
        let workers = Workers::new(Some(1)).expect("pool");
        let file = gs.enter_file(
            "cmd.rb",
            "class Foo < Opus::Command\n  sig.params(x: Integer).returns(Integer)\n  def call(x)\n    x\n  end\nend\n",
            SourceType::Normal,
        );

        let trees = index(&mut gs, &[], &[file], &Opts::default(), &workers);
        assert_eq!(trees.len(), 1);

        let Expression::InsSeq(seq) = &trees[0].tree else {
            panic!("programs parse to a sequence");
        };
        let klass = seq.stats[0].as_class_def().expect("class");
        // sig, call, mirrored sig, synthesized self.call.
        assert_eq!(klass.rhs.len(), 4);
        let Expression::MethodDef(mirror) = &klass.rhs[3] else {
            panic!("expected the synthesized singleton");
        };
        assert!(mirror.is_self);
        assert_eq!(mirror.name, names::call());
    }

    #[test]
    fn index_queues_parse_errors() {
        let mut gs = GlobalState::new();
        let workers = Workers::new(Some(1)).expect("pool");
        let file = gs.enter_file("bad.rb", "class Foo\n  def\nend\n", SourceType::Normal);

        let trees = index(&mut gs, &[], &[file], &Opts::default(), &workers);
        assert_eq!(trees.len(), 1);
        let drained = gs.error_queue().drain();
        assert!(!drained.is_empty());
        assert!(drained
            .iter()
            .all(|e| e.class == rty_core::errors::parser::SYNTAX_ERROR));
        assert_eq!(drained[0].loc.file, file);
    }

    #[test]
    fn index_preserves_input_order() {
        let mut gs = GlobalState::new();
        let workers = Workers::new(Some(2)).expect("pool");
        let a = gs.enter_file("a.rb", "class A\nend\n", SourceType::Normal);
        let b = gs.enter_file("b.rb", "class B\nend\n", SourceType::Normal);

        let trees = index(&mut gs, &[], &[a, b], &Opts::default(), &workers);
        assert_eq!(trees[0].file, a);
        assert_eq!(trees[1].file, b);
    }
}

//! Draining and publishing diagnostics.

use std::io::{BufRead, Write};

use rty_core::errors::{self, ErrorClass};
use rty_core::{FileRef, GlobalState, Loc, SourceType};
use serde_json::Value;

use crate::protocol::{
    Diagnostic, DiagnosticRelatedInformation, Location, Position, PublishDiagnosticsParams, Range,
};
use crate::server::LspLoop;
use crate::Result;

/// Error classes that never surface in the editor.
///
/// Re-indexing a changed file enters its definitions next to the previous
/// version's, so these re-definition classes fire on every edit; they are
/// noise in a session even though they are real diagnostics in batch mode.
fn silence_error(class: ErrorClass) -> bool {
    class == errors::namer::REDEFINITION_OF_METHOD
        || class == errors::resolver::DUPLICATE_VARIABLE_DECLARATION
        || class == errors::resolver::REDEFINITION_OF_PARENTS
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// Pull everything from the error queue into the per-file accumulator.
    pub(crate) fn drain_errors(&mut self) {
        for error in self.initial_gs.error_queue().drain() {
            if silence_error(error.class) {
                continue;
            }
            let file = error.loc.file;
            self.errors_accumulated.entry(file).or_default().push(error);

            if self.updated_errors.last() == Some(&file) {
                continue;
            }
            self.updated_errors.push(file);
        }

        // Files can be tombstoned between drains; drop their buckets.
        let gs = &self.initial_gs;
        self.errors_accumulated
            .retain(|&file, _| gs.file(file).source_type != SourceType::TombStone);
    }

    /// Drain, then publish one notification per file with new diagnostics.
    pub(crate) fn push_errors(&mut self) -> Result<()> {
        self.drain_errors();

        let updated = std::mem::take(&mut self.updated_errors);
        for file in updated {
            if !file.exists() {
                continue;
            }
            let Some(params) = self.build_publish_params(file)? else {
                continue;
            };
            self.send_notification("textDocument/publishDiagnostics", params)?;
        }
        Ok(())
    }

    fn build_publish_params(&self, file: FileRef) -> Result<Option<Value>> {
        let Some(final_gs) = &self.final_gs else {
            return Ok(None);
        };
        let file_data = final_gs.file(file);
        let uri = if file_data.source_type == SourceType::Payload {
            file_data.path.clone()
        } else {
            self.local_name_to_remote(&file_data.path)
        };

        let mut diagnostics = Vec::new();
        if let Some(accumulated) = self.errors_accumulated.get(&file) {
            for error in accumulated {
                let related: Vec<DiagnosticRelatedInformation> = error
                    .sections
                    .iter()
                    .flat_map(|section| {
                        section.messages.iter().map(|line| {
                            DiagnosticRelatedInformation {
                                location: self.loc_to_location(final_gs, line.loc),
                                message: if line.formatted.is_empty() {
                                    section.header.clone()
                                } else {
                                    line.formatted.clone()
                                },
                            }
                        })
                    })
                    .collect();

                diagnostics.push(Diagnostic {
                    range: loc_to_range(final_gs, error.loc),
                    code: error.class.code,
                    message: error.formatted.clone(),
                    related_information: if related.is_empty() {
                        None
                    } else {
                        Some(related)
                    },
                });
            }
        }

        let params = PublishDiagnosticsParams { uri, diagnostics };
        Ok(Some(serde_json::to_value(params)?))
    }

    /// A `Location` for a diagnostic cross-reference. Payload files use
    /// their bare path decorated with `#L<line>` so external viewers can
    /// anchor the position.
    pub(crate) fn loc_to_location(&self, gs: &GlobalState, loc: Loc) -> Location {
        let file_data = gs.file(loc.file);
        let uri = if file_data.source_type == SourceType::Payload {
            let line = gs.position(loc).map_or(1, |(begin, _)| begin.line);
            format!("{}#L{line}", file_data.path)
        } else {
            self.local_name_to_remote(&file_data.path)
        };
        Location {
            uri,
            range: loc_to_range(gs, loc),
        }
    }
}

/// Convert a 1-based internal location into a 0-based LSP range.
pub(crate) fn loc_to_range(gs: &GlobalState, loc: Loc) -> Range {
    match gs.position(loc) {
        Some((begin, end)) => Range {
            start: Position {
                line: begin.line - 1,
                character: begin.column - 1,
            },
            end: Position {
                line: end.line - 1,
                character: end.column - 1,
            },
        },
        None => Range::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rty_core::SourceType;

    #[test]
    fn range_conversion_is_zero_based() {
        let mut gs = GlobalState::new();
        let file = gs.enter_file("a.rb", "abc\ndef\n", SourceType::Normal);

        let range = loc_to_range(&gs, Loc::new(file, 4, 7));
        assert_eq!(range.start, Position { line: 1, character: 0 });
        assert_eq!(range.end, Position { line: 1, character: 3 });
    }

    #[test]
    fn range_conversion_round_trips_against_positions() {
        let mut gs = GlobalState::new();
        let file = gs.enter_file("a.rb", "x = 1\ny = 2\nz = 3\n", SourceType::Normal);

        // Every byte offset maps 1-based -> 0-based by subtracting one on
        // both axes; spot-check across lines.
        for (offset, line, character) in [(0u32, 0u32, 0u32), (6, 1, 0), (10, 1, 4), (12, 2, 0)] {
            let range = loc_to_range(&gs, Loc::new(file, offset, offset));
            assert_eq!(range.start, Position { line, character });
            let (internal, _) = gs.position(Loc::new(file, offset, offset)).unwrap();
            assert_eq!(internal.line - 1, range.start.line);
            assert_eq!(internal.column - 1, range.start.character);
        }
    }

    #[test]
    fn nowhere_locations_map_to_the_zero_range() {
        let gs = GlobalState::new();
        assert_eq!(loc_to_range(&gs, Loc::none()), Range::default());
    }
}

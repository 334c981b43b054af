use std::collections::HashMap;

use crate::document::{Cursor, Document};
use crate::snapshot::{CursorEntry, Snapshot};

#[derive(Debug, Default)]
pub struct DocumentHandler {
    document: Document,
    cursors: HashMap<usize, Cursor>,
}

impl DocumentHandler {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            cursors: HashMap::new(),
        }
    }

    pub fn add_cursor(&mut self, id: usize) {
        if self.cursors.contains_key(&id) {
            tracing::warn!(id, "cursor already registered, ignoring add_cursor");
            return;
        }
        self.cursors.insert(id, Cursor::new());
    }

    pub fn remove_cursor(&mut self, id: usize) {
        self.cursors.remove(&id);
    }

    /// Returns `false` and mutates nothing for an unknown id or opcode.
    pub fn process_message(&mut self, id: usize, msg: [u8; 2]) -> bool {
        let Some(cursor) = self.cursors.get_mut(&id) else {
            tracing::debug!(id, "process_message for unknown cursor id");
            return false;
        };

        match msg {
            [b'W', byte] => {
                cursor.write(&mut self.document, byte);
                true
            }
            [b'S', verb] => match verb {
                b'U' => {
                    cursor.up(&self.document);
                    true
                }
                b'D' => {
                    cursor.down(&self.document);
                    true
                }
                b'R' => {
                    cursor.right(&self.document);
                    true
                }
                b'L' => {
                    cursor.left(&self.document);
                    true
                }
                b'H' => {
                    cursor.home(&self.document);
                    true
                }
                b'E' => {
                    cursor.end(&self.document);
                    true
                }
                b'B' => {
                    cursor.break_line(&mut self.document);
                    true
                }
                b'X' => {
                    cursor.del(&mut self.document);
                    true
                }
                b'A' => {
                    cursor.backspace(&mut self.document);
                    true
                }
                b'T' => {
                    cursor.tab(&mut self.document);
                    true
                }
                _ => {
                    tracing::debug!(id, verb, "unrecognized S-opcode");
                    false
                }
            },
            _ => {
                tracing::debug!(id, "unrecognized opcode");
                false
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let cursors = self
            .cursors
            .iter()
            .map(|(&id, c)| CursorEntry {
                line: c.line,
                column: c.column,
                id,
            })
            .collect();
        Snapshot::build(self.document.lines().to_vec(), cursors)
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.snapshot().serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cursor_id_is_rejected() {
        let mut handler = DocumentHandler::new();
        assert!(!handler.process_message(0, *b"Wa"));
    }

    #[test]
    fn unknown_opcode_is_rejected_and_mutates_nothing() {
        let mut handler = DocumentHandler::new();
        handler.add_cursor(0);
        let before = handler.serialize();
        assert!(!handler.process_message(0, *b"ZZ"));
        assert_eq!(handler.serialize(), before);
    }

    #[test]
    fn write_then_newline_then_write_matches_scenario_s3() {
        let mut handler = DocumentHandler::new();
        handler.add_cursor(0);
        assert!(handler.process_message(0, *b"Wa"));
        assert!(handler.process_message(0, *b"SB"));
        assert!(handler.process_message(0, *b"Wb"));
        assert_eq!(handler.serialize(), b"1\n1 1 0\n2\na\nb\n");

        // Backspace deletes the byte immediately to the left of the cursor
        // (the 'b' just typed); it only crosses a line boundary when the
        // cursor was already at column 0 before `left()` runs.
        assert!(handler.process_message(0, *b"SA"));
        assert_eq!(handler.serialize(), b"1\n1 0 0\n2\na\n\n");
    }

    #[test]
    fn single_client_hello_matches_scenario_s1() {
        let mut handler = DocumentHandler::new();
        handler.add_cursor(0);
        assert_eq!(handler.serialize(), b"1\n0 0 0\n1\n\n");
    }

    #[test]
    fn tab_matches_scenario_s4() {
        let mut handler = DocumentHandler::new();
        handler.add_cursor(0);
        assert!(handler.process_message(0, *b"ST"));
        let snap = handler.snapshot();
        assert_eq!(snap.cursors[0].column, 4);
        assert_eq!(snap.lines[0], b"    ");
        assert!(handler.process_message(0, *b"ST"));
        assert_eq!(handler.snapshot().cursors[0].column, 8);
    }

    #[test]
    fn delete_at_end_joins_lines_matches_scenario_s5() {
        let mut handler = DocumentHandler::new();
        handler.add_cursor(0);
        handler.process_message(0, *b"Wa");
        handler.process_message(0, *b"SB");
        handler.process_message(0, *b"Wb");
        handler.process_message(0, *b"SH");
        handler.process_message(0, *b"SU");
        handler.process_message(0, *b"SE");
        assert_eq!(handler.serialize(), b"1\n0 1 0\n2\na\nb\n");

        assert!(handler.process_message(0, *b"SX"));
        assert_eq!(handler.serialize(), b"1\n0 1 0\n1\nab\n");
    }

    #[test]
    fn snapshot_has_exactly_one_cursor_per_registered_id() {
        let mut handler = DocumentHandler::new();
        handler.add_cursor(0);
        handler.add_cursor(1);
        handler.process_message(0, *b"Wa");
        let snap = handler.snapshot();
        assert_eq!(snap.cursors.len(), 2);
    }
}

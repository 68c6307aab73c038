//! Byte-level clause recognition.
//!
//! The importer only needs to know which of a handful of clauses a statement
//! contains, so statements are never parsed: a small state machine watches
//! the unquoted bytes as they stream through the tokenizer and records the
//! clauses it sees. A real lexer would cost more per byte and buy nothing
//! here.

use crate::model::ClauseFlags;

/// Longest recognized word is `STORAGE`; anything longer can be dropped on
/// the floor without being compared.
const WORD_CAP: usize = 7;

/// What the previous token leaves behind for the next one. Whitespace keeps
/// the context alive so two-word phrases and `CREATE (` connect; any other
/// delimiter or unrecognized word clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Context {
    #[default]
    None,
    Create,
    Match,
    Merge,
    Detach,
    Drop,
    Storage,
    CloseParen,
}

/// Incremental clause recognizer. Fed one unquoted byte at a time; word
/// bytes accumulate (ASCII-uppercased) into a bounded buffer and delimiter
/// bytes close the word. Keywords only count when the whole word matches,
/// which is what makes `xCREATE` or `CREATED` a plain identifier.
#[derive(Debug, Default)]
pub struct ClauseRecognizer {
    word: [u8; WORD_CAP],
    len: usize,
    overflow: bool,
    context: Context,
    flags: ClauseFlags,
}

impl ClauseRecognizer {
    /// Feeds the next unquoted byte of the current statement.
    pub fn step(&mut self, byte: u8) {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            if self.len < WORD_CAP {
                self.word[self.len] = byte.to_ascii_uppercase();
                self.len += 1;
            } else {
                self.overflow = true;
            }
            return;
        }

        self.close_word();
        match byte {
            b'(' => {
                match self.context {
                    Context::Create => self.flags.has_create = true,
                    Context::Match => self.flags.has_match = true,
                    Context::Merge => self.flags.has_merge = true,
                    _ => {}
                }
                self.context = Context::None;
            }
            b')' => self.context = Context::CloseParen,
            b' ' | b'\t' | b'\r' | b'\n' => {}
            _ => self.context = Context::None,
        }
    }

    /// Called by the tokenizer on a quote boundary: quoted text never
    /// participates in recognition, and a quote also severs any phrase in
    /// progress.
    pub fn interrupt(&mut self) {
        self.len = 0;
        self.overflow = false;
        self.context = Context::None;
    }

    /// Flushes the pending word, returns the collected flags and resets the
    /// recognizer for the next statement.
    pub fn finish(&mut self) -> ClauseFlags {
        self.close_word();
        let flags = self.flags;
        *self = ClauseRecognizer::default();
        flags
    }

    fn close_word(&mut self) {
        let word = &self.word[..self.len];
        let overflow = self.overflow;
        self.len = 0;
        self.overflow = false;
        if word.is_empty() {
            return;
        }
        if overflow {
            self.context = Context::None;
            return;
        }
        self.context = match word {
            b"CREATE" => Context::Create,
            b"MATCH" => Context::Match,
            b"MERGE" => Context::Merge,
            b"DETACH" => Context::Detach,
            b"DROP" => Context::Drop,
            b"STORAGE" => Context::Storage,
            b"INDEX" => {
                match self.context {
                    Context::Create => self.flags.has_create_index = true,
                    Context::Drop => self.flags.has_drop_index = true,
                    _ => {}
                }
                Context::None
            }
            b"DELETE" => {
                if self.context == Context::Detach {
                    self.flags.has_detach_delete = true;
                }
                Context::None
            }
            b"MODE" => {
                if self.context == Context::Storage {
                    self.flags.has_storage_mode = true;
                }
                Context::None
            }
            b"REMOVE" => {
                if self.context == Context::CloseParen {
                    self.flags.has_remove = true;
                }
                Context::None
            }
            _ => Context::None,
        };
    }
}

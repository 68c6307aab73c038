//! Statement tokenization.
//!
//! Input arrives as an unbounded byte stream of Cypher statements separated
//! by unquoted `;`. The stream is split without understanding the language:
//! the only lexical state is the active quote, the escape toggle and the
//! clause recognizer that classifies each statement while it is assembled,
//! so every byte is scanned exactly once.

pub mod clauses;

use std::io::BufRead;

use crate::error::Result;
use crate::model::Statement;
use clauses::ClauseRecognizer;

/// Lazy, finite, non-restartable stream of statements read from `reader`.
///
/// Yields one `Statement` per unquoted `;`, with 1-based line numbers and a
/// monotonically assigned index. Whitespace-only statements are skipped.
/// Trailing text without a terminating `;` is discarded at end of input,
/// matching the behavior of the console client this importer descends from.
pub struct StatementStream<R> {
    reader: R,
    line: Vec<u8>,
    pos: usize,
    line_number: u64,
    pending: Vec<u8>,
    start_line: Option<u64>,
    quote: Option<u8>,
    escaped: bool,
    recognizer: ClauseRecognizer,
    next_index: u64,
    eof: bool,
}

impl<R: BufRead> StatementStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            pos: 0,
            line_number: 0,
            pending: Vec::new(),
            start_line: None,
            quote: None,
            escaped: false,
            recognizer: ClauseRecognizer::default(),
            next_index: 0,
            eof: false,
        }
    }

    /// Consumes one byte; returns true when it terminated a statement.
    fn consume(&mut self, byte: u8) -> bool {
        if let Some(quote) = self.quote {
            // Escaping only matters inside quotation, where it keeps an
            // escaped quote character from ending the quote.
            if byte == b'\\' {
                self.escaped = !self.escaped;
                self.pending.push(byte);
                return false;
            }
            if byte == quote && !self.escaped {
                self.quote = None;
                self.recognizer.interrupt();
            }
            self.pending.push(byte);
            self.escaped = false;
            return false;
        }

        match byte {
            b'\'' | b'"' => {
                self.note_start();
                self.quote = Some(byte);
                self.recognizer.interrupt();
                self.pending.push(byte);
            }
            b';' => return true,
            _ => {
                if !byte.is_ascii_whitespace() {
                    self.note_start();
                }
                self.pending.push(byte);
                self.recognizer.step(byte);
            }
        }
        false
    }

    fn note_start(&mut self) {
        if self.start_line.is_none() {
            self.start_line = Some(self.line_number);
        }
    }

    /// Finalizes the accumulated statement; `None` when it was blank.
    fn seal(&mut self) -> Option<Statement> {
        let clauses = self.recognizer.finish();
        let raw = std::mem::take(&mut self.pending);
        let start_line = self.start_line.take();
        self.quote = None;
        self.escaped = false;

        let text = String::from_utf8_lossy(&raw);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let statement = Statement {
            line_number: start_line.unwrap_or(self.line_number),
            index: self.next_index,
            text: text.to_string(),
            clauses,
        };
        self.next_index += 1;
        Some(statement)
    }
}

impl<R: BufRead> Iterator for StatementStream<R> {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof {
            return None;
        }
        loop {
            while self.pos < self.line.len() {
                let byte = self.line[self.pos];
                self.pos += 1;
                if self.consume(byte) {
                    if let Some(statement) = self.seal() {
                        return Some(Ok(statement));
                    }
                }
            }

            self.line.clear();
            self.pos = 0;
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    // End of input: a statement that never saw its `;` is
                    // dropped, not executed.
                    self.eof = true;
                    return None;
                }
                Ok(_) => self.line_number += 1,
                Err(err) => {
                    self.eof = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bucket;
    use std::io::{BufReader, Write};

    fn statements(input: &str) -> Vec<Statement> {
        StatementStream::new(input.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn splits_on_unquoted_semicolons() {
        let got = statements("CREATE (:A {id:1}); CREATE (:A {id:2});");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].text, "CREATE (:A {id:1})");
        assert_eq!(got[1].text, "CREATE (:A {id:2})");
        assert_eq!(got[0].index, 0);
        assert_eq!(got[1].index, 1);
    }

    #[test]
    fn semicolons_inside_quotes_do_not_terminate() {
        let got = statements(r#"CREATE (:A {name: "a;b"}); CREATE (:A {name: 'c;d'});"#);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].text, r#"CREATE (:A {name: "a;b"})"#);
        assert_eq!(got[1].text, "CREATE (:A {name: 'c;d'})");
    }

    #[test]
    fn escaped_quote_stays_inside_the_string() {
        let got = statements(r#"CREATE (:A {name: "say \";\" twice"});"#);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].text, r#"CREATE (:A {name: "say \";\" twice"})"#);
    }

    #[test]
    fn double_backslash_does_not_escape_the_quote() {
        let got = statements(r#"CREATE (:A {path: "c:\\"}); RETURN 1;"#);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].text, r#"CREATE (:A {path: "c:\\"})"#);
    }

    #[test]
    fn statements_span_lines_and_keep_newlines() {
        let got = statements("CREATE\n  (:A)\n;\nRETURN 1;");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].text, "CREATE\n  (:A)");
        assert_eq!(got[0].line_number, 1);
        assert_eq!(got[1].line_number, 4);
    }

    #[test]
    fn line_number_points_at_first_non_blank_byte() {
        let got = statements("\n\n  CREATE (:A);");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].line_number, 3);
    }

    #[test]
    fn blank_statements_are_skipped_without_an_index() {
        let got = statements("; ;\n\t;CREATE (:A);;");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].text, "CREATE (:A)");
        assert_eq!(got[0].index, 0);
    }

    #[test]
    fn trailing_unterminated_statement_is_discarded() {
        let got = statements("CREATE (:A);\nCREATE (:B)");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].text, "CREATE (:A)");
    }

    #[test]
    fn classification_is_folded_into_tokenization() {
        let got = statements(
            "CREATE INDEX ON :A(id);\
             CREATE (:A {id:1});\
             MATCH (a:A {id:1}), (b:A {id:2}) CREATE (a)-[:R]->(b);\
             MATCH (n) DETACH DELETE n;",
        );
        let buckets: Vec<Bucket> = got.iter().map(|s| s.clauses.bucket()).collect();
        assert_eq!(
            buckets,
            vec![Bucket::Pre, Bucket::Vertex, Bucket::Edge, Bucket::Post]
        );
    }

    #[test]
    fn quoted_keywords_are_not_recognized() {
        let got = statements(r#"RETURN "CREATE (x)";"#);
        assert_eq!(got.len(), 1);
        assert!(!got[0].clauses.has_create);
        assert_eq!(got[0].clauses.bucket(), Bucket::Post);
    }

    #[test]
    fn recognizer_state_resets_between_statements() {
        // `CREATE` at the end of one statement must not combine with an
        // `INDEX` at the start of the next.
        let got = statements("RETURN 1 CREATE; INDEX (:A);");
        assert!(!got[1].clauses.has_create_index);
    }

    #[test]
    fn reads_from_a_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "CREATE (:A);\nCREATE (:B);\n").unwrap();
        let reader = BufReader::new(file.reopen().unwrap());
        let got: Vec<Statement> = StatementStream::new(reader)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].line_number, 2);
    }
}

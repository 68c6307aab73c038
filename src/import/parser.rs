//! Parser-only dry run: tokenize and classify the whole input without
//! touching the database.

use std::io::BufRead;

use tracing::info;

use crate::error::Result;
use crate::import::ParserReport;
use crate::model::Bucket;
use crate::parse::StatementStream;

#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Log every statement's classification, not just the totals.
    pub log_each: bool,
}

pub fn run<R: BufRead>(input: R, options: &ParserOptions) -> Result<ParserReport> {
    let mut report = ParserReport::default();
    for statement in StatementStream::new(input) {
        let statement = statement?;
        let bucket = statement.clauses.bucket();
        report.statements_total += 1;
        match bucket {
            Bucket::Pre => report.pre += 1,
            Bucket::Vertex => report.vertex += 1,
            Bucket::Edge => report.edge += 1,
            Bucket::Post => report.post += 1,
        }
        let clauses = statement.clauses;
        report.create += u64::from(clauses.has_create);
        report.match_ += u64::from(clauses.has_match);
        report.merge += u64::from(clauses.has_merge);
        report.create_index += u64::from(clauses.has_create_index);
        report.drop_index += u64::from(clauses.has_drop_index);
        report.detach_delete += u64::from(clauses.has_detach_delete);
        report.remove += u64::from(clauses.has_remove);
        report.storage_mode += u64::from(clauses.has_storage_mode);

        if options.log_each {
            info!(
                index = statement.index,
                line = statement.line_number,
                bucket = bucket.as_str(),
                "classified statement"
            );
        }
    }
    Ok(report)
}

//! Batch driver.
//!
//! Feeds each statement through the [`Rewriter`] independently. A statement
//! that fails never aborts the batch: its output is the reason as a comment
//! line plus the original text commented out, and conversion continues with
//! the next statement. Output order always matches input order.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::error::RewriteError;
use crate::rewriter::Rewriter;
use crate::split::{StatementSpan, split_statements};

/// `DEFINER=`user`@`host`` appears in dump files on views, triggers, and
/// events; it is account bookkeeping the parser chokes on and the target
/// dialect does not express. Stripped before parsing.
static DEFINER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDEFINER\s*=\s*(?:`[^`]+`|\w+)\s*@\s*(?:`[^`]+`|\w+)\s*")
        .expect("definer pattern")
});

/// Outcome of one input statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    Rewritten,
    Failed,
}

/// Per-statement entry in the conversion report.
#[derive(Debug, Serialize)]
pub struct StatementReport {
    /// Zero-based position in the input batch.
    pub index: usize,
    pub status: StatementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Machine-readable summary of a conversion run.
#[derive(Debug, Serialize)]
pub struct ConversionReport {
    pub statements: Vec<StatementReport>,
    pub rewritten: usize,
    pub failed: usize,
}

/// A converted batch: the output SQL plus the per-statement report.
#[derive(Debug)]
pub struct Conversion {
    pub sql: String,
    pub report: ConversionReport,
}

/// Convert a batch of MySQL statements to PostgreSQL.
///
/// One output block per input statement (plus one per trailing comment run),
/// blocks separated by a blank line. Each block is either the rewritten
/// statement(s) or an annotated copy of the original.
pub fn convert_batch(input: &str) -> Conversion {
    let mut rewriter = Rewriter::new();
    let mut blocks = Vec::new();
    let mut statements = Vec::new();
    let mut index = 0;

    for span in split_statements(input) {
        if span.sql.is_empty() {
            blocks.push(span.comments.join("\n"));
            continue;
        }
        match convert_span(&mut rewriter, &span) {
            Ok(block) => {
                blocks.push(block);
                statements.push(StatementReport {
                    index,
                    status: StatementStatus::Rewritten,
                    error: None,
                });
            }
            Err(err) => {
                blocks.push(failure_block(&span, &err));
                statements.push(StatementReport {
                    index,
                    status: StatementStatus::Failed,
                    error: Some(err.to_string()),
                });
            }
        }
        index += 1;
    }

    let rewritten = statements
        .iter()
        .filter(|s| s.status == StatementStatus::Rewritten)
        .count();
    let failed = statements.len() - rewritten;

    let mut sql = blocks.join("\n\n");
    if !sql.is_empty() {
        sql.push('\n');
    }
    Conversion {
        sql,
        report: ConversionReport {
            statements,
            rewritten,
            failed,
        },
    }
}

fn convert_span(rewriter: &mut Rewriter, span: &StatementSpan) -> Result<String, RewriteError> {
    let sql = DEFINER.replace_all(&span.sql, "");
    let parsed = Parser::parse_sql(&MySqlDialect {}, &sql)?;

    let mut lines: Vec<String> = span.comments.clone();
    for stmt in parsed {
        let output = rewriter.rewrite(stmt)?;
        for statement in &output.statements {
            lines.extend(statement.notes.iter().cloned());
            lines.push(statement.render());
        }
    }
    Ok(lines.join("\n"))
}

fn failure_block(span: &StatementSpan, err: &RewriteError) -> String {
    let mut lines = span.comments.clone();
    lines.push(format!("{} {}", err.annotation_prefix(), err));
    for line in span.sql.lines() {
        lines.push(format!("-- {line}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_definer_is_stripped() {
        let stripped = DEFINER.replace_all("CREATE DEFINER=`admin`@`localhost` VIEW v AS SELECT 1", "");
        assert_eq!(stripped, "CREATE VIEW v AS SELECT 1");
    }

    #[test]
    fn test_report_counts() {
        let conversion = convert_batch("SELECT 1; NOT SQL AT ALL; SELECT 2;");
        assert_eq!(conversion.report.rewritten, 2);
        assert_eq!(conversion.report.failed, 1);
        assert_eq!(conversion.report.statements.len(), 3);
    }

    #[test]
    fn test_failed_statement_keeps_its_position() {
        let conversion = convert_batch("NOT SQL AT ALL; SELECT 2;");
        let blocks: Vec<&str> = conversion.sql.split("\n\n").collect();
        assert!(blocks[0].starts_with("-- ERROR:"));
        assert!(blocks[0].contains("-- NOT SQL AT ALL"));
        assert_eq!(blocks[1].trim_end(), "SELECT 2;");
    }
}

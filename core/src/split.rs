//! Batch text splitting.
//!
//! `;` only separates statements outside string literals, quoted identifiers,
//! and comments. Comments that precede a statement's first token are captured
//! so the batch driver can re-emit them next to that statement's output
//! (MySQL `#` line comments are normalized to `--` on the way through).

/// One statement's text plus the comments that introduced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSpan {
    /// Leading comments, already normalized to PostgreSQL-safe forms.
    pub comments: Vec<String>,
    /// Statement text without the terminating `;`. May be empty for a span
    /// that held only trailing comments.
    pub sql: String,
}

/// Split a batch into statement spans, preserving input order.
pub fn split_statements(input: &str) -> Vec<StatementSpan> {
    let chars: Vec<char> = input.chars().collect();
    let n = chars.len();
    let mut spans = Vec::new();
    let mut sql = String::new();
    let mut comments: Vec<String> = Vec::new();
    let mut i = 0;

    while i < n {
        let c = chars[i];
        match c {
            ';' => {
                flush(&mut sql, &mut comments, &mut spans);
                i += 1;
            }
            '\'' | '"' | '`' => {
                let end = consume_quoted(&chars, i);
                sql.extend(&chars[i..end]);
                i = end;
            }
            // `--` starts a comment only when followed by whitespace,
            // otherwise `a--b` would lose its double negation.
            '-' if chars.get(i + 1) == Some(&'-')
                && matches!(chars.get(i + 2), None | Some(' ' | '\t' | '\r' | '\n')) =>
            {
                let end = line_end(&chars, i);
                if sql.trim().is_empty() {
                    let text: String = chars[i..end].iter().collect();
                    comments.push(text.trim_end().to_string());
                }
                i = end;
            }
            '#' => {
                let end = line_end(&chars, i);
                if sql.trim().is_empty() {
                    let body: String = chars[i + 1..end].iter().collect();
                    let body = body.trim();
                    comments.push(if body.is_empty() {
                        "--".to_string()
                    } else {
                        format!("-- {}", body)
                    });
                }
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = block_comment_end(&chars, i);
                if sql.trim().is_empty() {
                    let text: String = chars[i..end].iter().collect();
                    comments.push(text);
                }
                i = end;
            }
            _ => {
                sql.push(c);
                i += 1;
            }
        }
    }

    flush(&mut sql, &mut comments, &mut spans);
    if !comments.is_empty() {
        spans.push(StatementSpan {
            comments,
            sql: String::new(),
        });
    }
    spans
}

fn flush(sql: &mut String, comments: &mut Vec<String>, spans: &mut Vec<StatementSpan>) {
    let text = sql.trim();
    if !text.is_empty() {
        spans.push(StatementSpan {
            comments: std::mem::take(comments),
            sql: text.to_string(),
        });
    }
    sql.clear();
}

/// Index just past the closing quote, honoring backslash escapes (strings)
/// and doubled-quote escapes (strings and backtick identifiers).
fn consume_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let n = chars.len();
    let mut i = start + 1;
    while i < n {
        if chars[i] == '\\' && quote != '`' {
            i += 2;
        } else if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    n
}

fn line_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|&c| c == '\n')
        .map(|p| start + p)
        .unwrap_or(chars.len())
}

fn block_comment_end(chars: &[char], start: usize) -> usize {
    let n = chars.len();
    let mut i = start + 2;
    while i + 1 < n {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_in_string_is_not_a_separator() {
        let spans = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1;");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].sql, "INSERT INTO t VALUES ('a;b')");
        assert_eq!(spans[1].sql, "SELECT 1");
    }

    #[test]
    fn test_semicolon_in_comment_is_not_a_separator() {
        let spans = split_statements("-- setup; do not edit\nSELECT 1;");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].comments, vec!["-- setup; do not edit"]);
        assert_eq!(spans[0].sql, "SELECT 1");
    }

    #[test]
    fn test_hash_comment_becomes_dashes() {
        let spans = split_statements("# grades table\nSELECT 1;");
        assert_eq!(spans[0].comments, vec!["-- grades table"]);
    }

    #[test]
    fn test_double_dash_without_space_stays_in_statement() {
        let spans = split_statements("SELECT 1--2;");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].sql, "SELECT 1--2");
    }

    #[test]
    fn test_backtick_identifier_with_semicolon() {
        let spans = split_statements("SELECT `a;b` FROM t;");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].sql, "SELECT `a;b` FROM t");
    }

    #[test]
    fn test_missing_final_semicolon() {
        let spans = split_statements("SELECT 1;\nSELECT 2");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].sql, "SELECT 2");
    }

    #[test]
    fn test_trailing_comments_form_their_own_span() {
        let spans = split_statements("SELECT 1;\n-- done");
        assert_eq!(spans.len(), 2);
        assert!(spans[1].sql.is_empty());
        assert_eq!(spans[1].comments, vec!["-- done"]);
    }
}

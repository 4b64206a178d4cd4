//! Expression-level dialect mapping.
//!
//! A single [`VisitorMut`] pass applied after the structural passes. It walks
//! every expression reachable from a statement (select lists, predicates,
//! generated-column sources, defaults) and applies a closed mapping table.
//! Unrecognized MySQL-only functions and format tokens are reported, never
//! guessed.

use std::ops::ControlFlow;

use sqlparser::ast::helpers::attached_token::AttachedToken;
use sqlparser::ast::{
    BinaryOperator, CaseWhen, CastKind, DataType, DateTimeField, Expr, ExtractSyntax, Function,
    FunctionArg, FunctionArgExpr, FunctionArgumentClause, FunctionArgumentList, FunctionArguments,
    Ident, Interval, LimitClause, ObjectName, ObjectNamePart, Offset, OffsetRows, Query,
    SelectItem, SetExpr, Statement, TableFactor, Value, VisitMut, VisitorMut,
    visit_expressions_mut,
};

use super::requote;
use crate::error::{RewriteError, RewriteResult};

/// Functions that report server or session state; they have no PostgreSQL
/// equivalent an offline rewrite could substitute.
const UNTRANSLATABLE_FUNCTIONS: &[&str] = &[
    "FOUND_ROWS",
    "LAST_INSERT_ID",
    "GET_LOCK",
    "RELEASE_LOCK",
    "SLEEP",
    "BENCHMARK",
    "UUID_SHORT",
];

/// Apply the expression mapping to every subtree of `stmt`, in place.
pub(super) fn rewrite_statement(stmt: &mut Statement) -> RewriteResult<()> {
    let mut pass = Normalizer;
    match stmt.visit(&mut pass) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(err) => Err(err),
    }
}

/// Wrap every division under `expr` as `CAST(a AS NUMERIC) / NULLIF(b, 0)`.
///
/// MySQL division is decimal and yields NULL on a zero divisor; PostgreSQL
/// integer division truncates and raises. Used for generated-column sources,
/// where a silent behavior change would corrupt stored data. Divisions whose
/// left side is already a cast are left alone so re-running the pass is a
/// no-op.
pub(crate) fn guard_integer_division(expr: &mut Expr) {
    let _ = visit_expressions_mut(expr, |e| {
        if let Expr::BinaryOp {
            op: BinaryOperator::Divide,
            left,
            ..
        } = e
            && !matches!(left.as_ref(), Expr::Cast { .. })
        {
            let Expr::BinaryOp { left, op, right } =
                std::mem::replace(e, Expr::Value(Value::Null.into()))
            else {
                unreachable!();
            };
            *e = Expr::BinaryOp {
                left: Box::new(Expr::Cast {
                    kind: CastKind::Cast,
                    expr: left,
                    data_type: DataType::Numeric(sqlparser::ast::ExactNumberInfo::None),
                    format: None,
                }),
                op,
                right: Box::new(call("NULLIF", vec![*right, number("0")])),
            };
        }
        ControlFlow::<()>::Continue(())
    });
}

struct Normalizer;

impl VisitorMut for Normalizer {
    type Break = RewriteError;

    fn pre_visit_relation(&mut self, relation: &mut ObjectName) -> ControlFlow<Self::Break> {
        for part in &mut relation.0 {
            if let ObjectNamePart::Identifier(ident) = part {
                requote(ident);
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        swap_comma_limit(query);
        requote_projection_aliases(query.body.as_mut());
        if let Some(with) = &mut query.with {
            for cte in &mut with.cte_tables {
                requote(&mut cte.alias.name);
            }
        }
        ControlFlow::Continue(())
    }

    // Aliases are plain idents the expression walk never reaches.
    fn pre_visit_table_factor(
        &mut self,
        table_factor: &mut TableFactor,
    ) -> ControlFlow<Self::Break> {
        let alias = match table_factor {
            TableFactor::Table { alias, .. } | TableFactor::Derived { alias, .. } => alias,
            _ => return ControlFlow::Continue(()),
        };
        if let Some(alias) = alias {
            requote(&mut alias.name);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        match rewrite_expr(expr) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(err),
        }
    }
}

/// `LIMIT offset, count` → `LIMIT count OFFSET offset`. The arguments swap
/// roles; this is the one place a straight copy would silently return the
/// wrong rows.
fn swap_comma_limit(query: &mut Query) {
    if matches!(
        query.limit_clause,
        Some(LimitClause::OffsetCommaLimit { .. })
    ) && let Some(LimitClause::OffsetCommaLimit { offset, limit }) = query.limit_clause.take()
    {
        query.limit_clause = Some(LimitClause::LimitOffset {
            limit: Some(limit),
            offset: Some(Offset {
                value: offset,
                rows: OffsetRows::None,
            }),
            limit_by: Vec::new(),
        });
    }
}

fn requote_projection_aliases(body: &mut SetExpr) {
    match body {
        SetExpr::Select(select) => {
            for item in &mut select.projection {
                if let SelectItem::ExprWithAlias { alias, .. } = item {
                    requote(alias);
                }
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            requote_projection_aliases(left);
            requote_projection_aliases(right);
        }
        _ => {}
    }
}

fn rewrite_expr(expr: &mut Expr) -> RewriteResult<()> {
    match expr {
        Expr::Identifier(ident) => requote(ident),
        Expr::CompoundIdentifier(idents) => {
            for ident in idents {
                requote(ident);
            }
        }
        Expr::Function(_) => rewrite_function(expr)?,
        Expr::RLike { .. } => {
            let Expr::RLike {
                negated,
                expr: operand,
                pattern,
                ..
            } = std::mem::replace(expr, Expr::Value(Value::Null.into()))
            else {
                unreachable!();
            };
            *expr = Expr::BinaryOp {
                left: operand,
                op: if negated {
                    BinaryOperator::PGRegexNotMatch
                } else {
                    BinaryOperator::PGRegexMatch
                },
                right: pattern,
            };
        }
        Expr::BinaryOp {
            op: op @ (BinaryOperator::Arrow | BinaryOperator::LongArrow),
            left,
            right,
        } => {
            // MySQL packs a whole path into one operand: `doc -> '$.a.b'`.
            // PostgreSQL wants one operator per segment.
            if let Expr::Value(value) = right.as_ref()
                && let Value::SingleQuotedString(path) = &value.value
                && let Some(segments) = json_path_segments(path)
            {
                let base = std::mem::replace(left.as_mut(), Expr::Value(Value::Null.into()));
                *expr = json_chain(base, segments, op.clone());
            }
        }
        _ => {}
    }
    Ok(())
}

fn rewrite_function(expr: &mut Expr) -> RewriteResult<()> {
    let Expr::Function(func) = expr else {
        return Ok(());
    };
    let name = function_name(func);

    if UNTRANSLATABLE_FUNCTIONS.contains(&name.as_str()) {
        return Err(RewriteError::translation(
            name,
            "depends on MySQL server/session state and has no offline equivalent",
        ));
    }

    match name.as_str() {
        "IFNULL" => func.name = ObjectName::from(vec![Ident::new("COALESCE")]),
        "IF" => {
            let [condition, then, otherwise] = take_args(func, "IF")?;
            *expr = Expr::Case {
                case_token: AttachedToken::empty(),
                end_token: AttachedToken::empty(),
                operand: None,
                conditions: vec![CaseWhen {
                    condition,
                    result: then,
                }],
                else_result: Some(Box::new(otherwise)),
            };
        }
        "CONCAT" => {
            let args = take_arg_list(func, "CONCAT")?;
            let Some(chain) = concat_chain(args) else {
                return Err(RewriteError::translation(
                    "CONCAT",
                    "expected at least one argument",
                ));
            };
            *expr = chain;
        }
        "GROUP_CONCAT" => rewrite_group_concat(func)?,
        "DATE_ADD" | "ADDDATE" => rewrite_date_arith(expr, BinaryOperator::Plus)?,
        "DATE_SUB" | "SUBDATE" => rewrite_date_arith(expr, BinaryOperator::Minus)?,
        "UNIX_TIMESTAMP" => {
            let mut args = take_arg_list(func, "UNIX_TIMESTAMP")?;
            if args.len() > 1 {
                return Err(RewriteError::translation(
                    "UNIX_TIMESTAMP",
                    "expected at most one argument",
                ));
            }
            let source = args.pop().unwrap_or_else(|| call("now", Vec::new()));
            *expr = Expr::Cast {
                kind: CastKind::Cast,
                expr: Box::new(Expr::Extract {
                    field: DateTimeField::Epoch,
                    syntax: ExtractSyntax::From,
                    expr: Box::new(source),
                }),
                data_type: DataType::BigInt(None),
                format: None,
            };
        }
        "DATE_FORMAT" => {
            let [source, format] = take_args(func, "DATE_FORMAT")?;
            let Expr::Value(value) = &format else {
                return Err(RewriteError::translation(
                    "DATE_FORMAT",
                    "format must be a string literal",
                ));
            };
            let Value::SingleQuotedString(tokens) = &value.value else {
                return Err(RewriteError::translation(
                    "DATE_FORMAT",
                    "format must be a string literal",
                ));
            };
            let translated = translate_date_format(tokens)?;
            *expr = call(
                "TO_CHAR",
                vec![source, string(translated)],
            );
        }
        "JSON_EXTRACT" => {
            let [doc, path] = take_args(func, "JSON_EXTRACT")?;
            *expr = json_extract(doc, path, BinaryOperator::Arrow)?;
        }
        "JSON_UNQUOTE" => {
            let [inner] = take_args(func, "JSON_UNQUOTE")?;
            let Expr::Function(mut inner_func) = inner else {
                return Err(RewriteError::translation(
                    "JSON_UNQUOTE",
                    "only JSON_UNQUOTE(JSON_EXTRACT(..)) is recognized",
                ));
            };
            if function_name(&inner_func) != "JSON_EXTRACT" {
                return Err(RewriteError::translation(
                    "JSON_UNQUOTE",
                    "only JSON_UNQUOTE(JSON_EXTRACT(..)) is recognized",
                ));
            }
            let [doc, path] = take_args(&mut inner_func, "JSON_EXTRACT")?;
            *expr = json_extract(doc, path, BinaryOperator::LongArrow)?;
        }
        // Anything else passes through: PostgreSQL shares most of the
        // standard function vocabulary, and guessing at the rest would
        // produce plausible-looking wrong output.
        _ => {}
    }
    Ok(())
}

/// `GROUP_CONCAT(x SEPARATOR s)` → `STRING_AGG(x, s)`, defaulting the
/// separator to `,` as MySQL does. DISTINCT and in-aggregate ORDER BY carry
/// over unchanged.
fn rewrite_group_concat(func: &mut Function) -> RewriteResult<()> {
    let FunctionArguments::List(list) = &mut func.args else {
        return Err(RewriteError::translation(
            "GROUP_CONCAT",
            "expected an argument list",
        ));
    };
    if list.args.len() != 1 {
        return Err(RewriteError::translation(
            "GROUP_CONCAT",
            "expected exactly one aggregated expression",
        ));
    }

    let mut separator = Value::SingleQuotedString(",".into());
    list.clauses.retain(|clause| match clause {
        FunctionArgumentClause::Separator(value) => {
            separator = value.clone();
            false
        }
        _ => true,
    });
    list.args
        .push(FunctionArg::Unnamed(FunctionArgExpr::Expr(Expr::Value(
            separator.into(),
        ))));
    func.name = ObjectName::from(vec![Ident::new("STRING_AGG")]);
    Ok(())
}

/// `DATE_ADD(d, INTERVAL n unit)` → `d + INTERVAL 'n unit'` (and the `-`
/// twin). A non-literal count becomes `d + n * INTERVAL '1 unit'`.
fn rewrite_date_arith(expr: &mut Expr, op: BinaryOperator) -> RewriteResult<()> {
    let Expr::Function(func) = expr else {
        return Ok(());
    };
    let construct = if op == BinaryOperator::Plus {
        "DATE_ADD"
    } else {
        "DATE_SUB"
    };
    let [date, interval] = take_args(func, construct)?;
    let Expr::Interval(interval) = interval else {
        return Err(RewriteError::translation(
            construct,
            "second argument must be an INTERVAL expression",
        ));
    };
    let Some(unit) = interval.leading_field else {
        return Err(RewriteError::translation(
            construct,
            "interval has no unit",
        ));
    };
    let unit = unit.to_string().to_lowercase();

    let right = match literal_text(&interval.value) {
        Some(count) => interval_literal(format!("{count} {unit}")),
        None => Expr::BinaryOp {
            left: interval.value,
            op: BinaryOperator::Multiply,
            right: Box::new(interval_literal(format!("1 {unit}"))),
        },
    };
    *expr = Expr::BinaryOp {
        left: Box::new(date),
        op,
        right: Box::new(right),
    };
    Ok(())
}

fn interval_literal(text: String) -> Expr {
    Expr::Interval(Interval {
        value: Box::new(string(text)),
        leading_field: None,
        leading_precision: None,
        last_field: None,
        fractional_seconds_precision: None,
    })
}

fn literal_text(expr: &Expr) -> Option<String> {
    let Expr::Value(value) = expr else {
        return None;
    };
    match &value.value {
        Value::Number(n, _) => Some(n.clone()),
        Value::SingleQuotedString(s) => Some(s.clone()),
        _ => None,
    }
}

/// MySQL `%`-token date format → `TO_CHAR` template.
///
/// Literal letters would be interpreted as template patterns by `TO_CHAR`,
/// so runs of them are emitted double-quoted. Tokens outside the table are
/// reported rather than copied through.
fn translate_date_format(format: &str) -> RewriteResult<String> {
    let mut out = String::with_capacity(format.len());
    let mut literal = String::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            if c.is_ascii_alphabetic() || c == '"' {
                literal.push(c);
            } else {
                flush_literal(&mut out, &mut literal);
                out.push(c);
            }
            continue;
        }
        flush_literal(&mut out, &mut literal);
        let Some(token) = chars.next() else {
            return Err(RewriteError::translation(
                "DATE_FORMAT",
                "dangling % at end of format string",
            ));
        };
        out.push_str(match token {
            'Y' => "YYYY",
            'y' => "YY",
            'm' => "MM",
            'd' => "DD",
            'H' => "HH24",
            'h' | 'I' => "HH12",
            'i' => "MI",
            's' | 'S' => "SS",
            'p' => "AM",
            '%' => "%",
            other => {
                return Err(RewriteError::translation(
                    "DATE_FORMAT",
                    format!("format token %{other} is not mapped"),
                ));
            }
        });
    }
    flush_literal(&mut out, &mut literal);
    Ok(out)
}

fn flush_literal(out: &mut String, literal: &mut String) {
    if !literal.is_empty() {
        out.push('"');
        out.push_str(&literal.replace('"', "\"\""));
        out.push('"');
        literal.clear();
    }
}

fn json_extract(doc: Expr, path: Expr, last_op: BinaryOperator) -> RewriteResult<Expr> {
    let Some(path) = literal_text(&path) else {
        return Err(RewriteError::translation(
            "JSON_EXTRACT",
            "path must be a string literal",
        ));
    };
    let Some(segments) = json_path_segments(&path) else {
        return Err(RewriteError::translation(
            "JSON_EXTRACT",
            format!("cannot decompose path {path:?}"),
        ));
    };
    Ok(json_chain(doc, segments, last_op))
}

/// `$.a.b[0]` → `["a", "b", "0"]`. Returns None for paths using wildcard or
/// recursive-descent operators, which have no per-segment equivalent.
fn json_path_segments(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix('$')?;
    let mut segments = Vec::new();
    let mut chars = rest.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                let mut key = String::new();
                if chars.peek() == Some(&'"') {
                    chars.next();
                    for k in chars.by_ref() {
                        if k == '"' {
                            break;
                        }
                        key.push(k);
                    }
                } else {
                    while let Some(&k) = chars.peek() {
                        if k == '.' || k == '[' {
                            break;
                        }
                        if !k.is_ascii_alphanumeric() && k != '_' {
                            return None;
                        }
                        key.push(k);
                        chars.next();
                    }
                }
                if key.is_empty() {
                    return None;
                }
                segments.push(key);
            }
            '[' => {
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => index.push(d),
                        _ => return None,
                    }
                }
                if index.is_empty() {
                    return None;
                }
                segments.push(index);
            }
            _ => return None,
        }
    }
    (!segments.is_empty()).then_some(segments)
}

/// Chain path segments with `->`, applying `last_op` to the final segment so
/// the caller controls whether the result stays json or becomes text.
fn json_chain(base: Expr, segments: Vec<String>, last_op: BinaryOperator) -> Expr {
    let count = segments.len();
    segments
        .into_iter()
        .enumerate()
        .fold(base, |acc, (i, segment)| {
            let key = if segment.chars().all(|c| c.is_ascii_digit()) {
                number(&segment)
            } else {
                string(segment)
            };
            Expr::BinaryOp {
                left: Box::new(acc),
                op: if i + 1 == count {
                    last_op.clone()
                } else {
                    BinaryOperator::Arrow
                },
                right: Box::new(key),
            }
        })
}

fn concat_chain(args: Vec<Expr>) -> Option<Expr> {
    args.into_iter().reduce(|left, right| Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::StringConcat,
        right: Box::new(right),
    })
}

fn function_name(func: &Function) -> String {
    match func.name.0.last() {
        Some(ObjectNamePart::Identifier(ident)) if ident.quote_style.is_none() => {
            ident.value.to_uppercase()
        }
        _ => String::new(),
    }
}

/// Pull exactly `N` plain expression arguments out of a call, consuming them.
fn take_args<const N: usize>(
    func: &mut Function,
    construct: &'static str,
) -> RewriteResult<[Expr; N]> {
    let args = take_arg_list(func, construct)?;
    args.try_into().map_err(|args: Vec<Expr>| {
        RewriteError::translation(
            construct,
            format!("expected {N} argument(s), found {}", args.len()),
        )
    })
}

fn take_arg_list(func: &mut Function, construct: &'static str) -> RewriteResult<Vec<Expr>> {
    let FunctionArguments::List(list) =
        std::mem::replace(&mut func.args, FunctionArguments::None)
    else {
        return Err(RewriteError::translation(
            construct,
            "expected an argument list",
        ));
    };
    list.args
        .into_iter()
        .map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Ok(expr),
            other => Err(RewriteError::translation(
                construct,
                format!("unexpected argument {other}"),
            )),
        })
        .collect()
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(Function {
        name: ObjectName::from(vec![Ident::new(name)]),
        uses_odbc_syntax: false,
        parameters: FunctionArguments::None,
        args: FunctionArguments::List(FunctionArgumentList {
            duplicate_treatment: None,
            args: args
                .into_iter()
                .map(|arg| FunctionArg::Unnamed(FunctionArgExpr::Expr(arg)))
                .collect(),
            clauses: Vec::new(),
        }),
        filter: None,
        null_treatment: None,
        over: None,
        within_group: Vec::new(),
    })
}

fn string(text: impl Into<String>) -> Expr {
    Expr::Value(Value::SingleQuotedString(text.into()).into())
}

fn number(text: &str) -> Expr {
    Expr::Value(Value::Number(text.to_string(), false).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_format_tokens() {
        assert_eq!(
            translate_date_format("%Y-%m-%d %H:%i:%s").unwrap(),
            "YYYY-MM-DD HH24:MI:SS"
        );
        assert_eq!(translate_date_format("%d.%m.%y").unwrap(), "DD.MM.YY");
        assert_eq!(translate_date_format("100%%").unwrap(), "100%");
    }

    #[test]
    fn test_date_format_quotes_literal_letters() {
        assert_eq!(
            translate_date_format("%Yyear %mmonth").unwrap(),
            "YYYY\"year\" MM\"month\""
        );
    }

    #[test]
    fn test_date_format_rejects_unknown_token() {
        let err = translate_date_format("%Y-%q").unwrap_err();
        assert!(err.to_string().contains("%q"));
    }

    #[test]
    fn test_json_path_segments() {
        assert_eq!(
            json_path_segments("$.a.b[0]"),
            Some(vec!["a".into(), "b".into(), "0".into()])
        );
        assert_eq!(json_path_segments("$.\"two words\""), Some(vec!["two words".into()]));
        assert_eq!(json_path_segments("$"), None);
        assert_eq!(json_path_segments("$.*"), None);
        assert_eq!(json_path_segments("a.b"), None);
    }
}

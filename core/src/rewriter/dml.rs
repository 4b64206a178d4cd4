//! INSERT / UPDATE / DELETE restructuring.

use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, Delete, Expr, FromTable, Ident, Insert, JoinConstraint,
    JoinOperator, LimitClause, ObjectName, ObjectNamePart, OnConflict, OnConflictAction, OnInsert,
    OrderBy, OrderByKind, SetExpr, Statement, TableFactor, TableObject, TableWithJoins, Update,
    UpdateTableFromKind,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::{RewriteOutput, pg_ident, pg_object_name, requote, requote_object_name};
use crate::error::{RewriteError, RewriteResult};

/// `INSERT IGNORE` maps to a targetless `ON CONFLICT DO NOTHING`; the forms
/// that need a conflict target we cannot infer are rejected for manual review.
pub(super) fn rewrite_insert(mut insert: Insert) -> RewriteResult<RewriteOutput> {
    if insert.replace_into {
        return Err(RewriteError::unsupported(
            "REPLACE INTO",
            "delete+insert semantics differ around foreign keys and triggers; \
             rewrite manually as INSERT ... ON CONFLICT (<target>) DO UPDATE",
        ));
    }
    if matches!(insert.on, Some(OnInsert::DuplicateKeyUpdate(_))) {
        return Err(RewriteError::unsupported(
            "INSERT ... ON DUPLICATE KEY UPDATE",
            "the conflict target is ambiguous without knowing the table's unique \
             constraints; use ON CONFLICT (<target>) DO UPDATE",
        ));
    }

    if insert.ignore {
        insert.ignore = false;
        insert.on = Some(OnInsert::OnConflict(OnConflict {
            conflict_target: None,
            action: OnConflictAction::DoNothing,
        }));
    }
    // LOW_PRIORITY / DELAYED / HIGH_PRIORITY are MySQL-only scheduling hints.
    insert.priority = None;

    if let TableObject::TableName(name) = &mut insert.table {
        requote_object_name(name);
    }
    for column in &mut insert.columns {
        requote(column);
    }

    Ok(RewriteOutput::single(Statement::Insert(insert)))
}

/// `UPDATE t1 JOIN t2 ON p SET ...` becomes `UPDATE t1 SET ... FROM t2 WHERE p`.
///
/// The updated table never enters the `FROM` list, and SET columns qualified
/// with the target table or its alias lose the qualifier (PostgreSQL rejects
/// qualified columns in SET).
pub(super) fn rewrite_update(mut update: Update) -> RewriteResult<RewriteOutput> {
    let joins = std::mem::take(&mut update.table.joins);

    let mut target_names = Vec::new();
    if let TableFactor::Table { name, alias, .. } = &update.table.relation {
        if let Some(ObjectNamePart::Identifier(ident)) = name.0.last() {
            target_names.push(ident.value.clone());
        }
        if let Some(alias) = alias {
            target_names.push(alias.name.value.clone());
        }
    }

    for assignment in &mut update.assignments {
        if let AssignmentTarget::ColumnName(name) = &mut assignment.target {
            strip_target_qualifier(name, &target_names);
            requote_object_name(name);
        }
    }

    if joins.is_empty() {
        return Ok(RewriteOutput::single(Statement::Update(update)));
    }

    let mut from_tables = Vec::new();
    let mut predicates = Vec::new();
    for join in joins {
        let constraint = match join.join_operator {
            JoinOperator::Join(constraint) | JoinOperator::Inner(constraint) => constraint,
            _ => {
                return Err(RewriteError::unsupported(
                    "UPDATE with outer join",
                    "UPDATE ... FROM ... WHERE only expresses inner joins; \
                     rewrite the outer join manually",
                ));
            }
        };
        match constraint {
            JoinConstraint::On(expr) => predicates.push(expr),
            JoinConstraint::None => {}
            _ => {
                return Err(RewriteError::unsupported(
                    "UPDATE with USING/NATURAL join",
                    "spell out the join predicate with ON so it can move into WHERE",
                ));
            }
        }
        from_tables.push(TableWithJoins {
            relation: join.relation,
            joins: Vec::new(),
        });
    }

    if let Some(selection) = update.selection.take() {
        predicates.push(selection);
    }
    update.selection = predicates.into_iter().reduce(|left, right| Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::And,
        right: Box::new(right),
    });
    update.from = Some(UpdateTableFromKind::AfterSet(from_tables));

    Ok(RewriteOutput::single(Statement::Update(update)))
}

/// `DELETE ... LIMIT n` has no target-dialect form; re-select the doomed rows
/// by `ctid` in a subquery and delete by membership. The original predicate
/// moves into the subquery unmodified.
pub(super) fn rewrite_delete(mut delete: Delete) -> RewriteResult<RewriteOutput> {
    if !delete.tables.is_empty() {
        return Err(RewriteError::unsupported(
            "multi-table DELETE",
            "split into one DELETE per table, or use DELETE ... USING",
        ));
    }

    let Some(limit) = delete.limit.take() else {
        return Ok(RewriteOutput::single(Statement::Delete(delete)));
    };

    let tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    let [table] = tables.as_slice() else {
        return Err(RewriteError::unsupported(
            "DELETE ... LIMIT over multiple tables",
            "the row-limited rewrite needs a single target table",
        ));
    };
    if !table.joins.is_empty() {
        return Err(RewriteError::unsupported(
            "DELETE ... LIMIT with joins",
            "the row-limited rewrite needs a single target table",
        ));
    }
    let TableFactor::Table { name, alias, .. } = &table.relation else {
        return Err(RewriteError::unsupported(
            "DELETE ... LIMIT from a derived table",
            "the row-limited rewrite needs a plain table name",
        ));
    };

    let mut table_sql = pg_object_name(name);
    if let Some(alias) = alias {
        table_sql.push_str(" AS ");
        table_sql.push_str(&pg_ident(&alias.name));
    }

    let mut subquery = parse_pg_query(&format!("SELECT ctid FROM {table_sql}"))?;
    if let SetExpr::Select(select) = subquery.body.as_mut() {
        select.selection = delete.selection.take();
    }
    let order_by = std::mem::take(&mut delete.order_by);
    if !order_by.is_empty() {
        subquery.order_by = Some(OrderBy {
            kind: OrderByKind::Expressions(order_by),
            interpolate: None,
        });
    }
    subquery.limit_clause = Some(LimitClause::LimitOffset {
        limit: Some(limit),
        offset: None,
        limit_by: Vec::new(),
    });

    delete.selection = Some(Expr::InSubquery {
        expr: Box::new(Expr::Identifier(Ident::new("ctid"))),
        subquery,
        negated: false,
    });

    Ok(RewriteOutput::single(Statement::Delete(delete)))
}

/// Parse a query skeleton in the target dialect. Used where assembling the
/// tree by hand would restate half the grammar.
fn parse_pg_query(sql: &str) -> RewriteResult<Box<sqlparser::ast::Query>> {
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)?;
    match statements.pop() {
        Some(Statement::Query(query)) => Ok(query),
        _ => Err(RewriteError::translation(
            "internal query skeleton",
            format!("expected a query from {sql:?}"),
        )),
    }
}

fn strip_target_qualifier(name: &mut ObjectName, target_names: &[String]) {
    if name.0.len() < 2 {
        return;
    }
    let qualifier_matches = match name.0.first() {
        Some(ObjectNamePart::Identifier(ident)) => target_names
            .iter()
            .any(|target| target.eq_ignore_ascii_case(&ident.value)),
        _ => false,
    };
    if qualifier_matches && let Some(last) = name.0.pop() {
        name.0 = vec![last];
    }
}

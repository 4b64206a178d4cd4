//! CREATE TABLE / ALTER TABLE restructuring.
//!
//! MySQL folds secondary indexes, storage options, and column attributes into
//! the table definition; PostgreSQL wants most of that outside it. This pass
//! splits inline indexes into standalone `CREATE INDEX` statements, maps the
//! type system, and strips engine-level options that have no target meaning.

use sqlparser::ast::{
    AlterTable, AlterTableOperation, ColumnDef, ColumnOption, ColumnOptionDef, CreateTable,
    CreateTableOptions, DataType, EnumMember, ExactNumberInfo, Expr, FullTextOrSpatialConstraint,
    GeneratedAs, GeneratedExpressionMode, Ident, IndexColumn, IndexConstraint, IndexType,
    KeyOrIndexDisplay, ObjectNamePart, Statement, TableConstraint, TimezoneInfo,
};
use sqlparser::tokenizer::Token;

use super::expr::guard_integer_division;
use super::{
    OutputStatement, RewriteOutput, StatementBody, bare_table_name, pg_ident, pg_object_name,
    requote, requote_object_name,
};
use crate::error::{RewriteError, RewriteResult};
use crate::naming::NamingContext;

pub(super) fn rewrite_create_table(
    mut create: CreateTable,
    naming: &mut NamingContext,
) -> RewriteResult<RewriteOutput> {
    requote_object_name(&mut create.name);
    let table = bare_table_name(&create.name);
    let table_sql = pg_object_name(&create.name);

    // ENGINE, CHARSET, ROW_FORMAT, AUTO_INCREMENT seed and friends are all
    // storage-engine knobs with no target-side meaning.
    create.table_options = CreateTableOptions::None;

    let mut notes = Vec::new();
    let mut trailing = Vec::new();
    let mut checks = Vec::new();
    for column in &mut create.columns {
        rewrite_column(column, &table, &table_sql, &mut notes, &mut trailing, &mut checks)?;
    }

    let mut kept = Vec::new();
    for constraint in std::mem::take(&mut create.constraints) {
        let rewritten =
            rewrite_constraint(constraint, &table, &table_sql, naming, &mut notes, &mut trailing)?;
        if let Some(constraint) = rewritten {
            kept.push(constraint);
        }
    }
    kept.extend(checks);
    create.constraints = kept;

    let mut out = RewriteOutput::default();
    out.statements.push(OutputStatement {
        notes,
        body: StatementBody::Tree(Statement::CreateTable(create)),
    });
    out.statements.extend(trailing);
    Ok(out)
}

pub(super) fn rewrite_alter_table(
    mut alter: AlterTable,
    naming: &mut NamingContext,
) -> RewriteResult<RewriteOutput> {
    requote_object_name(&mut alter.name);
    let table = bare_table_name(&alter.name);
    let table_sql = pg_object_name(&alter.name);

    let mut notes = Vec::new();
    let mut trailing = Vec::new();
    let mut checks = Vec::new();
    let mut kept_ops = Vec::new();

    for operation in std::mem::take(&mut alter.operations) {
        match operation {
            mut op @ AlterTableOperation::AddColumn { .. } => {
                if let AlterTableOperation::AddColumn { column_def, .. } = &mut op {
                    rewrite_column(
                        column_def,
                        &table,
                        &table_sql,
                        &mut notes,
                        &mut trailing,
                        &mut checks,
                    )?;
                }
                kept_ops.push(op);
            }
            AlterTableOperation::ModifyColumn { .. } => {
                return Err(RewriteError::unsupported(
                    "ALTER TABLE ... MODIFY",
                    "use ALTER TABLE ... ALTER COLUMN ... TYPE/SET DEFAULT/SET NOT NULL",
                ));
            }
            AlterTableOperation::ChangeColumn { .. } => {
                return Err(RewriteError::unsupported(
                    "ALTER TABLE ... CHANGE",
                    "split into ALTER TABLE ... RENAME COLUMN and \
                     ALTER TABLE ... ALTER COLUMN ... TYPE",
                ));
            }
            AlterTableOperation::AddConstraint {
                constraint,
                not_valid,
            } => {
                let rewritten = rewrite_constraint(
                    constraint,
                    &table,
                    &table_sql,
                    naming,
                    &mut notes,
                    &mut trailing,
                )?;
                if let Some(constraint) = rewritten {
                    kept_ops.push(AlterTableOperation::AddConstraint {
                        constraint,
                        not_valid,
                    });
                }
            }
            other => kept_ops.push(other),
        }
    }
    alter.operations = kept_ops;

    for check in checks {
        trailing.push(OutputStatement {
            notes: Vec::new(),
            body: StatementBody::Raw(format!("ALTER TABLE {table_sql} ADD {check}")),
        });
    }

    let mut out = RewriteOutput::default();
    if !alter.operations.is_empty() {
        out.statements.push(OutputStatement {
            notes,
            body: StatementBody::Tree(Statement::AlterTable(alter)),
        });
    } else if let Some(first) = trailing.first_mut() {
        // Every operation turned into standalone statements; the notes move
        // onto the first of them.
        notes.extend(first.notes.drain(..));
        first.notes = notes;
    }
    out.statements.extend(trailing);
    Ok(out)
}

/// Rewrite one table constraint. Returns the constraint to keep inline, or
/// `None` when it left the table as a standalone statement in `trailing`.
fn rewrite_constraint(
    constraint: TableConstraint,
    table: &str,
    table_sql: &str,
    naming: &mut NamingContext,
    notes: &mut Vec<String>,
    trailing: &mut Vec<OutputStatement>,
) -> RewriteResult<Option<TableConstraint>> {
    match constraint {
        TableConstraint::Index(IndexConstraint {
            name,
            index_type,
            mut columns,
            ..
        }) => {
            let mut index_notes = Vec::new();
            normalize_index_columns(&mut columns, &mut index_notes);
            let index_name = match name {
                Some(ref ident) => pg_ident(ident),
                None => naming.index_name(table),
            };
            trailing.push(OutputStatement {
                notes: index_notes,
                body: StatementBody::Raw(plain_index_sql(
                    &index_name,
                    table_sql,
                    index_type.as_ref(),
                    &columns,
                )),
            });
            Ok(None)
        }
        TableConstraint::FulltextOrSpatial(FullTextOrSpatialConstraint {
            fulltext: true,
            opt_index_name,
            columns,
            ..
        }) => {
            let index_name = match opt_index_name {
                Some(ref ident) => pg_ident(ident),
                None => naming.index_name(table),
            };
            trailing.push(OutputStatement {
                notes: Vec::new(),
                body: StatementBody::Raw(fulltext_index_sql(&index_name, table_sql, &columns)),
            });
            Ok(None)
        }
        TableConstraint::FulltextOrSpatial(_) => Err(RewriteError::unsupported(
            "SPATIAL index",
            "requires PostGIS and a geometry column type; create the \
             GiST index manually after installing the extension",
        )),
        TableConstraint::Unique(mut unique) => {
            // `UNIQUE KEY name (..)` carries its name in the index slot; the
            // target dialect names constraints instead.
            if unique.name.is_none() {
                unique.name = unique.index_name.take();
            }
            unique.index_name = None;
            unique.index_type_display = KeyOrIndexDisplay::None;
            normalize_index_columns(&mut unique.columns, notes);
            Ok(Some(TableConstraint::Unique(unique)))
        }
        TableConstraint::PrimaryKey(mut primary_key) => {
            primary_key.index_name = None;
            normalize_index_columns(&mut primary_key.columns, notes);
            Ok(Some(TableConstraint::PrimaryKey(primary_key)))
        }
        TableConstraint::ForeignKey(mut foreign_key) => {
            for ident in foreign_key
                .columns
                .iter_mut()
                .chain(foreign_key.referred_columns.iter_mut())
            {
                requote(ident);
            }
            requote_object_name(&mut foreign_key.foreign_table);
            Ok(Some(TableConstraint::ForeignKey(foreign_key)))
        }
        other => Ok(Some(other)),
    }
}

fn rewrite_column(
    column: &mut ColumnDef,
    table: &str,
    table_sql: &str,
    notes: &mut Vec<String>,
    trailing: &mut Vec<OutputStatement>,
    checks: &mut Vec<TableConstraint>,
) -> RewriteResult<()> {
    requote(&mut column.name);
    let column_name = column.name.value.clone();

    if let DataType::Enum(members, _) = &column.data_type {
        checks.push(enum_check(table, &column_name, &column.name, members));
        column.data_type = DataType::Text;
    } else {
        column.data_type = map_data_type(std::mem::replace(&mut column.data_type, DataType::Text));
    }

    let mut kept = Vec::new();
    for mut option in std::mem::take(&mut column.options) {
        match &mut option.option {
            ColumnOption::Collation(_) | ColumnOption::CharacterSet(_) => {}
            ColumnOption::OnUpdate(expr) => {
                notes.push(format!(
                    "-- TODO: column {column_name} had ON UPDATE {expr}; create a BEFORE \
                     UPDATE trigger to reproduce this behavior"
                ));
            }
            ColumnOption::Comment(text) => {
                trailing.push(OutputStatement {
                    notes: Vec::new(),
                    body: StatementBody::Raw(format!(
                        "COMMENT ON COLUMN {table_sql}.{} IS '{}'",
                        pg_ident(&column.name),
                        text.replace('\'', "''"),
                    )),
                });
            }
            ColumnOption::DialectSpecific(tokens) if is_auto_increment(tokens) => {
                kept.push(ColumnOptionDef {
                    name: None,
                    option: ColumnOption::Generated {
                        generated_as: GeneratedAs::ByDefault,
                        sequence_options: None,
                        generation_expr: None,
                        generation_expr_mode: None,
                        generated_keyword: true,
                    },
                });
            }
            ColumnOption::DialectSpecific(_) => {}
            ColumnOption::Generated {
                generated_as,
                generation_expr,
                generation_expr_mode,
                generated_keyword,
                ..
            } if generation_expr.is_some() => {
                if let Some(expr) = generation_expr {
                    guard_integer_division(expr);
                }
                if !matches!(generation_expr_mode, Some(GeneratedExpressionMode::Stored)) {
                    notes.push(format!(
                        "-- TODO: column {column_name} was a VIRTUAL generated column; it is \
                         now STORED (computed on write, occupies storage)"
                    ));
                    *generation_expr_mode = Some(GeneratedExpressionMode::Stored);
                }
                *generated_as = GeneratedAs::Always;
                *generated_keyword = true;
                kept.push(option);
            }
            _ => kept.push(option),
        }
    }
    column.options = kept;
    Ok(())
}

/// MySQL → PostgreSQL scalar type mapping.
///
/// Display widths disappear (they were never a storage property). Unsigned
/// types widen to the next signed type that covers their range; `BIGINT
/// UNSIGNED` exceeds every target integer and lands on `NUMERIC(20, 0)`.
fn map_data_type(ty: DataType) -> DataType {
    match ty {
        DataType::TinyInt(_) => DataType::SmallInt(None),
        DataType::SmallInt(_) => DataType::SmallInt(None),
        DataType::MediumInt(_) => DataType::Integer(None),
        DataType::Int(_) | DataType::Integer(_) => DataType::Integer(None),
        DataType::BigInt(_) => DataType::BigInt(None),
        DataType::TinyIntUnsigned(_) => DataType::SmallInt(None),
        DataType::SmallIntUnsigned(_) => DataType::Integer(None),
        DataType::MediumIntUnsigned(_)
        | DataType::IntUnsigned(_)
        | DataType::IntegerUnsigned(_) => DataType::BigInt(None),
        DataType::BigIntUnsigned(_) => {
            DataType::Numeric(ExactNumberInfo::PrecisionAndScale(20, 0))
        }
        DataType::Datetime(_) => DataType::Timestamp(None, TimezoneInfo::None),
        DataType::Timestamp(_, _) => DataType::Timestamp(None, TimezoneInfo::WithTimeZone),
        DataType::TinyText | DataType::MediumText | DataType::LongText => DataType::Text,
        DataType::Blob(_) | DataType::TinyBlob | DataType::MediumBlob | DataType::LongBlob => {
            DataType::Bytea
        }
        DataType::Double(_) => DataType::DoublePrecision,
        DataType::Float(_) => DataType::Real,
        DataType::JSON => DataType::JSONB,
        other => other,
    }
}

fn enum_check(
    table: &str,
    column_name: &str,
    column: &Ident,
    members: &[EnumMember],
) -> TableConstraint {
    let list = members
        .iter()
        .map(|member| match member {
            EnumMember::Name(name) => name.clone(),
            EnumMember::NamedValue(name, _) => name.clone(),
        })
        .map(|name| {
            Expr::Value(sqlparser::ast::Value::SingleQuotedString(name).into())
        })
        .collect();
    TableConstraint::Check(sqlparser::ast::CheckConstraint {
        name: Some(Ident::new(format!("chk_{table}_{column_name}"))),
        expr: Box::new(Expr::InList {
            expr: Box::new(Expr::Identifier(column.clone())),
            list,
            negated: false,
        }),
        enforced: None,
    })
}

fn is_auto_increment(tokens: &[Token]) -> bool {
    tokens.iter().any(|token| match token {
        Token::Word(word) => word.value.eq_ignore_ascii_case("AUTO_INCREMENT"),
        _ => false,
    })
}

/// Requote index expressions and strip MySQL prefix-length qualifiers
/// (`KEY (name(10))`), which the target dialect cannot express and would
/// reject as written.
fn normalize_index_columns(columns: &mut [IndexColumn], notes: &mut Vec<String>) {
    for column in columns {
        if let Some(base) = prefix_length_base(&column.column.expr) {
            notes.push(format!(
                "-- TODO: index prefix length on {base} was dropped; the whole column \
                 is indexed instead"
            ));
            column.column.expr = Expr::Identifier(base);
        }
        requote_expr_idents(&mut column.column.expr);
    }
}

/// `name(10)` in a key part parses as a call with one numeric argument.
fn prefix_length_base(expr: &Expr) -> Option<Ident> {
    let Expr::Function(func) = expr else {
        return None;
    };
    let sqlparser::ast::FunctionArguments::List(list) = &func.args else {
        return None;
    };
    let [sqlparser::ast::FunctionArg::Unnamed(sqlparser::ast::FunctionArgExpr::Expr(
        Expr::Value(value),
    ))] = list.args.as_slice()
    else {
        return None;
    };
    if !matches!(value.value, sqlparser::ast::Value::Number(_, _)) {
        return None;
    }
    match func.name.0.last() {
        Some(ObjectNamePart::Identifier(ident)) => Some(ident.clone()),
        _ => None,
    }
}

fn requote_expr_idents(expr: &mut Expr) {
    match expr {
        Expr::Identifier(ident) => requote(ident),
        Expr::CompoundIdentifier(idents) => {
            for ident in idents {
                requote(ident);
            }
        }
        _ => {}
    }
}

fn plain_index_sql(
    name: &str,
    table_sql: &str,
    index_type: Option<&IndexType>,
    columns: &[IndexColumn],
) -> String {
    let using = match index_type {
        Some(IndexType::Hash) => " USING hash",
        _ => "",
    };
    format!(
        "CREATE INDEX {name} ON {table_sql}{using} ({})",
        columns
            .iter()
            .map(index_column_sql)
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn index_column_sql(column: &IndexColumn) -> String {
    let mut sql = column.column.expr.to_string();
    if column.column.options.asc == Some(false) {
        sql.push_str(" DESC");
    }
    sql
}

/// FULLTEXT has no direct equivalent; the closest idiom is a GIN index over
/// a tsvector of the same columns. `simple` is the only configuration that
/// does not guess at the text's language.
fn fulltext_index_sql(name: &str, table_sql: &str, columns: &[IndexColumn]) -> String {
    let document = columns
        .iter()
        .map(|column| {
            let mut expr = column.column.expr.clone();
            requote_expr_idents(&mut expr);
            format!("COALESCE({expr}::text, '')")
        })
        .collect::<Vec<_>>()
        .join(" || ' ' || ");
    format!("CREATE INDEX {name} ON {table_sql} USING GIN (to_tsvector('simple', {document}))")
}

//! Statement rewriting passes.
//!
//! Structural passes first (DDL restructuring, DML reshaping), then the
//! expression pass applied recursively wherever an expression subtree appears.
//!
//! ```text
//! MySQL text → Parser → Statement AST → DDL/DML pass → Expression pass → PostgreSQL text
//! ```

mod ddl;
mod dml;
mod expr;

use sqlparser::ast::{Ident, ObjectName, ObjectNamePart, Statement};

use crate::error::RewriteResult;
use crate::naming::NamingContext;

/// One output statement plus the `-- TODO` notes to print directly above it.
#[derive(Debug)]
pub struct OutputStatement {
    pub notes: Vec<String>,
    pub body: StatementBody,
}

/// Rewritten statements are usually AST trees rendered by the collaborator's
/// `Display`; extracted index statements are assembled as target-dialect text.
#[derive(Debug)]
pub enum StatementBody {
    Tree(Statement),
    Raw(String),
}

impl OutputStatement {
    fn tree(stmt: Statement) -> Self {
        Self {
            notes: Vec::new(),
            body: StatementBody::Tree(stmt),
        }
    }

    /// Rendered statement text, terminated by `;`.
    pub fn render(&self) -> String {
        match &self.body {
            StatementBody::Tree(stmt) => format!("{stmt};"),
            StatementBody::Raw(sql) => format!("{sql};"),
        }
    }
}

/// Result of rewriting one input statement: one or more target statements.
#[derive(Debug, Default)]
pub struct RewriteOutput {
    pub statements: Vec<OutputStatement>,
}

impl RewriteOutput {
    pub(crate) fn single(stmt: Statement) -> Self {
        Self {
            statements: vec![OutputStatement::tree(stmt)],
        }
    }

    pub fn extend(&mut self, other: RewriteOutput) {
        self.statements.extend(other.statements);
    }
}

/// Per-run rewrite orchestrator.
///
/// Owns the [`NamingContext`] for the run and threads it into the DDL pass;
/// there is no counter outside a run.
#[derive(Debug, Default)]
pub struct Rewriter {
    naming: NamingContext,
}

impl Rewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite one parsed MySQL statement into PostgreSQL statement(s).
    pub fn rewrite(&mut self, stmt: Statement) -> RewriteResult<RewriteOutput> {
        let mut out = match stmt {
            Statement::CreateTable(create) => ddl::rewrite_create_table(create, &mut self.naming)?,
            Statement::AlterTable(alter) => ddl::rewrite_alter_table(alter, &mut self.naming)?,
            Statement::Insert(insert) => dml::rewrite_insert(insert)?,
            Statement::Update(update) => dml::rewrite_update(update)?,
            Statement::Delete(delete) => dml::rewrite_delete(delete)?,
            other => RewriteOutput::single(other),
        };

        for output in &mut out.statements {
            if let StatementBody::Tree(stmt) = &mut output.body {
                expr::rewrite_statement(stmt)?;
            }
        }
        Ok(out)
    }
}

/// Switch a backtick-quoted identifier to the target quoting style.
pub(crate) fn requote(ident: &mut Ident) {
    if ident.quote_style == Some('`') {
        ident.quote_style = Some('"');
    }
}

/// Requote every identifier part of a possibly-qualified name.
pub(crate) fn requote_object_name(name: &mut ObjectName) {
    for part in &mut name.0 {
        if let ObjectNamePart::Identifier(ident) = part {
            requote(ident);
        }
    }
}

/// Render an identifier in the target dialect's quoting style.
pub(crate) fn pg_ident(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => format!("\"{}\"", ident.value.replace('"', "\"\"")),
        None => ident.value.clone(),
    }
}

/// Render a possibly-qualified name in the target dialect's quoting style.
pub(crate) fn pg_object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => pg_ident(ident),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Unquoted trailing name segment, used to seed synthesized index names.
pub(crate) fn bare_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .and_then(|part| match part {
            ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| name.to_string())
}

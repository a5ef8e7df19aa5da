//! Query translation from structured trees to a source's native dialect.

use std::fmt;
use std::ops::ControlFlow;

use sqlparser::ast::{
    Expr, Ident, ObjectName, Query, SelectItem, SetExpr, Statement, TableFactor, VisitMut,
    VisitorMut,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::ConnectorError;

/// A query string in a source's own dialect. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeQuery(String);

impl NativeQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NativeQuery {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for NativeQuery {
    fn from(query: String) -> Self {
        Self(query)
    }
}

/// Renders a parsed query tree into a native query.
pub trait QueryTranslator: Send + Sync {
    /// Render the tree, or fail with [`ConnectorError::Translation`]
    fn render(&self, tree: &Statement) -> Result<NativeQuery, ConnectorError>;
}

/// Translator for InfluxDB 1.x (InfluxQL).
///
/// The tree's own rendering is used as-is apart from identifier quoting:
/// InfluxQL only understands double quotes, so backtick and bracket quoted
/// identifiers are re-quoted.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfluxQlTranslator;

impl InfluxQlTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl QueryTranslator for InfluxQlTranslator {
    fn render(&self, tree: &Statement) -> Result<NativeQuery, ConnectorError> {
        if !is_influxql_statement(tree) {
            let rendered = tree.to_string();
            let keyword = leading_keyword(&rendered);
            return Err(ConnectorError::Translation(format!(
                "{} statements cannot be expressed in InfluxQL",
                if keyword.is_empty() { "empty" } else { keyword.as_str() }
            )));
        }

        let mut tree = tree.clone();
        let _ = tree.visit(&mut Requote);
        Ok(NativeQuery(tree.to_string()))
    }
}

/// Statement kinds InfluxQL has a counterpart for
fn is_influxql_statement(tree: &Statement) -> bool {
    match tree {
        Statement::Query(query) => !matches!(*query.body, SetExpr::Insert(_) | SetExpr::Update(_)),
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::CreateDatabase { .. }
        | Statement::Drop { .. }
        | Statement::Delete { .. }
        | Statement::Grant { .. }
        | Statement::Revoke { .. }
        | Statement::Kill { .. }
        | Statement::Explain { .. } => true,
        _ => false,
    }
}

fn leading_keyword(rendered: &str) -> String {
    rendered
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// Rewrites backtick and bracket quoting to double quotes on every
/// identifier, aliases included.
struct Requote;

impl VisitorMut for Requote {
    type Break = ();

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<()> {
        requote_set_expr(&mut query.body);
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &mut ObjectName) -> ControlFlow<()> {
        relation.0.iter_mut().for_each(requote);
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &mut TableFactor) -> ControlFlow<()> {
        let alias = match table_factor {
            TableFactor::Table { alias, .. }
            | TableFactor::Derived { alias, .. }
            | TableFactor::NestedJoin { alias, .. } => alias.as_mut(),
            _ => None,
        };
        if let Some(alias) = alias {
            requote(&mut alias.name);
            alias.columns.iter_mut().for_each(requote);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<()> {
        match expr {
            Expr::Identifier(ident) => requote(ident),
            Expr::CompoundIdentifier(parts) => parts.iter_mut().for_each(requote),
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Projection aliases are not visited on their own, so walk the select
/// bodies of a query. Nested queries get their own `pre_visit_query`.
fn requote_set_expr(body: &mut SetExpr) {
    match body {
        SetExpr::Select(select) => {
            for item in &mut select.projection {
                if let SelectItem::ExprWithAlias { alias, .. } = item {
                    requote(alias);
                }
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            requote_set_expr(left);
            requote_set_expr(right);
        }
        _ => {}
    }
}

fn requote(ident: &mut Ident) {
    if matches!(ident.quote_style, Some('`' | '[')) {
        ident.quote_style = Some('"');
    }
}

/// Parse SQL text into exactly one statement tree.
pub fn parse_sql(sql: &str) -> Result<Statement, ConnectorError> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| ConnectorError::Translation(e.to_string()))?;

    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => Err(ConnectorError::Translation("empty query".to_string())),
        n => Err(ConnectorError::Translation(format!(
            "expected a single statement, got {}",
            n
        ))),
    }
}

/// Double-quote an identifier for InfluxQL, escaping embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

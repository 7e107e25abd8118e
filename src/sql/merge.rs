//! `MERGE` statements.

use super::dialect::Dialect;
use super::expr::Expr;
use super::ident::{Ident, TableRef};
use super::query::{Query, indent_lines};

/// `column = value` inside an UPDATE SET list or an INSERT column/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub column: Ident,
    pub value: Expr,
}

impl Assignment {
    pub fn new(column: Ident, value: Expr) -> Self {
        Self { column, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeClause {
    MatchedUpdate {
        condition: Option<Expr>,
        assignments: Vec<Assignment>,
    },
    /// Columns and values are stored as pairs so the two lists can never
    /// drift apart.
    NotMatchedInsert { values: Vec<Assignment> },
}

impl MergeClause {
    fn render(&self, dialect: &dyn Dialect) -> Vec<String> {
        match self {
            MergeClause::MatchedUpdate {
                condition,
                assignments,
            } => {
                let head = match condition {
                    Some(condition) => {
                        format!("WHEN MATCHED AND {} THEN", condition.render(dialect))
                    }
                    None => "WHEN MATCHED THEN".to_string(),
                };
                let mut lines = vec![head, "  UPDATE SET".to_string()];
                let last = assignments.len().saturating_sub(1);
                for (i, assignment) in assignments.iter().enumerate() {
                    let sep = if i == last { "" } else { "," };
                    lines.push(format!(
                        "    {} = {}{sep}",
                        assignment.column,
                        assignment.value.render(dialect)
                    ));
                }
                lines
            }
            MergeClause::NotMatchedInsert { values } => {
                let columns = values
                    .iter()
                    .map(|a| a.column.to_string())
                    .collect::<Vec<_>>();
                let rendered = values
                    .iter()
                    .map(|a| a.value.render(dialect))
                    .collect::<Vec<_>>();
                vec![
                    "WHEN NOT MATCHED THEN".to_string(),
                    format!("  INSERT ({})", columns.join(", ")),
                    format!("  VALUES ({})", rendered.join(", ")),
                ]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merge {
    pub target: TableRef,
    pub target_alias: Ident,
    pub source: Query,
    pub source_alias: Ident,
    pub on: Expr,
    pub clauses: Vec<MergeClause>,
}

impl Merge {
    pub fn render(&self, dialect: &dyn Dialect) -> Vec<String> {
        let mut lines = vec![format!(
            "MERGE INTO {} AS {}",
            dialect.resolve(&self.target),
            self.target_alias
        )];
        lines.push("USING (".to_string());
        lines.extend(indent_lines(self.source.render(dialect)));
        lines.push(format!(") AS {}", self.source_alias));
        lines.push(format!("ON {}", self.on.render(dialect)));
        for clause in &self.clauses {
            lines.extend(clause.render(dialect));
        }
        lines
    }

    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let mut sql = self.render(dialect).join("\n");
        sql.push_str(dialect.statement_terminator());
        sql.push('\n');
        sql
    }
}

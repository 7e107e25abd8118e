//! SELECT queries composed from clause objects.
//!
//! Queries render to a list of lines so that nesting (CTEs, MERGE sources)
//! only has to indent, never re-parse.

use super::dialect::{Dialect, RowDedup};
use super::expr::Expr;
use super::ident::{Ident, TableRef};

const INDENT: &str = "  ";

pub(crate) fn indent_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            if line.is_empty() {
                line
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect()
}

/// One projected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    Expr { expr: Expr, alias: Option<Ident> },
    /// `*` or `alias.*`
    Wildcard(Option<Ident>),
}

impl SelectItem {
    pub fn expr(expr: Expr) -> Self {
        SelectItem::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: Ident) -> Self {
        SelectItem::Expr {
            expr,
            alias: Some(alias),
        }
    }

    fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            SelectItem::Expr { expr, alias: None } => expr.render(dialect),
            SelectItem::Expr {
                expr,
                alias: Some(alias),
            } => {
                let rendered = expr.render(dialect);
                // `col AS col` is noise
                if rendered == alias.as_str() {
                    rendered
                } else {
                    format!("{rendered} AS {alias}")
                }
            }
            SelectItem::Wildcard(None) => "*".to_string(),
            SelectItem::Wildcard(Some(qualifier)) => format!("{qualifier}.*"),
        }
    }
}

/// A relation in a FROM or JOIN position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// A warehouse table, resolved through the dialect.
    Table(TableRef),
    /// A CTE defined earlier in the same statement.
    Cte(Ident),
}

impl Relation {
    fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            Relation::Table(table) => dialect.resolve(table),
            Relation::Cte(name) => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub relation: Relation,
    pub alias: Ident,
    pub on: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromClause {
    pub relation: Relation,
    pub alias: Option<Ident>,
    pub joins: Vec<Join>,
}

impl FromClause {
    pub fn table(table: TableRef, alias: Option<Ident>) -> Self {
        Self {
            relation: Relation::Table(table),
            alias,
            joins: Vec::new(),
        }
    }

    pub fn cte(name: Ident) -> Self {
        Self {
            relation: Relation::Cte(name),
            alias: None,
            joins: Vec::new(),
        }
    }

    pub fn inner_join(mut self, relation: Relation, alias: Ident, on: Expr) -> Self {
        self.joins.push(Join {
            relation,
            alias,
            on,
        });
        self
    }

    fn render(&self, dialect: &dyn Dialect) -> Vec<String> {
        let head = match &self.alias {
            Some(alias) => format!("FROM {} AS {alias}", self.relation.render(dialect)),
            None => format!("FROM {}", self.relation.render(dialect)),
        };
        let mut lines = vec![head];
        for join in &self.joins {
            lines.push(format!(
                "INNER JOIN {} AS {}",
                join.relation.render(dialect),
                join.alias
            ));
            lines.push(format!("{INDENT}ON {}", join.on.render(dialect)));
        }
        lines
    }
}

/// Keeps one row per `partition_by` value: the first by `order_by`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstPer {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: FromClause,
    pub filter: Option<Expr>,
    /// Rendered through [`Dialect::row_dedup`]. On Postgres this adds an
    /// `ORDER BY`, so it is only valid outside `UNION ALL` branches.
    pub first_per: Option<FirstPer>,
}

impl Select {
    pub fn new(from: FromClause) -> Self {
        Self {
            distinct: false,
            items: Vec::new(),
            from,
            filter: None,
            first_per: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn item(mut self, item: SelectItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = SelectItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn first_per(mut self, partition_by: Vec<Expr>, order_by: Vec<Expr>) -> Self {
        self.first_per = Some(FirstPer {
            partition_by,
            order_by,
        });
        self
    }

    pub fn render(&self, dialect: &dyn Dialect) -> Vec<String> {
        let dedup = self.first_per.as_ref().map(|first| {
            (
                dialect.row_dedup(),
                render_list(&first.partition_by, dialect),
                render_list(&first.order_by, dialect),
            )
        });

        let head = match &dedup {
            Some((RowDedup::DistinctOn, partition, _)) => format!("SELECT DISTINCT ON ({partition})"),
            _ if self.distinct => "SELECT DISTINCT".to_string(),
            _ => "SELECT".to_string(),
        };
        let mut lines = vec![head];
        let last = self.items.len().saturating_sub(1);
        for (i, item) in self.items.iter().enumerate() {
            let sep = if i == last { "" } else { "," };
            lines.push(format!("{INDENT}{}{sep}", item.render(dialect)));
        }
        lines.extend(self.from.render(dialect));
        if let Some(filter) = &self.filter {
            lines.push(format!("WHERE {}", filter.render(dialect)));
        }

        match dedup {
            Some((RowDedup::Qualify, partition, order)) => {
                // BigQuery only accepts QUALIFY next to WHERE, GROUP BY or HAVING
                if self.filter.is_none() {
                    lines.push("WHERE TRUE".to_string());
                }
                lines.push(format!(
                    "QUALIFY ROW_NUMBER() OVER (PARTITION BY {partition} ORDER BY {order}) = 1"
                ));
            }
            Some((RowDedup::DistinctOn, partition, order)) => {
                lines.push(format!("ORDER BY {partition}, {order}"));
            }
            None => {}
        }
        lines
    }
}

fn render_list(exprs: &[Expr], dialect: &dyn Dialect) -> String {
    exprs
        .iter()
        .map(|e| e.render(dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A named common table expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cte {
    pub name: Ident,
    pub query: Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Select(Select),
    UnionAll(Vec<Select>),
    With { ctes: Vec<Cte>, body: Box<Query> },
}

impl Query {
    pub fn with(ctes: Vec<Cte>, body: Query) -> Self {
        Query::With {
            ctes,
            body: Box::new(body),
        }
    }

    pub fn render(&self, dialect: &dyn Dialect) -> Vec<String> {
        match self {
            Query::Select(select) => select.render(dialect),
            Query::UnionAll(branches) => {
                let mut lines = Vec::new();
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        lines.push("UNION ALL".to_string());
                    }
                    lines.extend(branch.render(dialect));
                }
                lines
            }
            Query::With { ctes, body } => {
                let mut lines = Vec::new();
                let last = ctes.len().saturating_sub(1);
                for (i, cte) in ctes.iter().enumerate() {
                    let keyword = if i == 0 { "WITH " } else { "" };
                    lines.push(format!("{keyword}{} AS (", cte.name));
                    lines.extend(indent_lines(cte.query.render(dialect)));
                    lines.push(if i == last { ")" } else { ")," }.to_string());
                }
                lines.extend(body.render(dialect));
                lines
            }
        }
    }

    /// Renders a standalone statement, including the dialect terminator.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let mut sql = self.render(dialect).join("\n");
        sql.push_str(dialect.statement_terminator());
        sql.push('\n');
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::{BigQuery, Postgres};

    fn ident(s: &str) -> Ident {
        Ident::new(s).unwrap()
    }

    #[test]
    fn renders_distinct_select_with_aliases() {
        let select = Select::new(FromClause::table(TableRef::parse("stg.customer").unwrap(), None))
            .distinct()
            .item(SelectItem::aliased(
                Expr::column(&ident("customer_id")),
                ident("customer_id_bk"),
            ))
            .item(SelectItem::aliased(
                Expr::column(&ident("email")),
                ident("email"),
            ));

        let sql = Query::Select(select).to_sql(&BigQuery);
        assert_eq!(
            sql,
            "SELECT DISTINCT\n  customer_id AS customer_id_bk,\n  email\nFROM ${ref(\"stg\", \"customer\")}\n"
        );
    }

    #[test]
    fn renders_cte_union_and_join() {
        let staged = ident("staged");
        let cur = ident("cur");
        let k = ident("k");
        let base = Select::new(FromClause::table(TableRef::parse("src").unwrap(), None))
            .item(SelectItem::expr(Expr::column(&k)));
        let first = Select::new(FromClause::cte(staged.clone()))
            .item(SelectItem::Wildcard(Some(staged.clone())));
        let second = Select::new(FromClause::cte(staged.clone()).inner_join(
            Relation::Table(TableRef::parse("vault.sat").unwrap()),
            cur.clone(),
            Expr::qualified(Some(&cur), &k).equals(Expr::qualified(Some(&staged), &k)),
        ))
        .item(SelectItem::Wildcard(Some(staged.clone())));

        let query = Query::with(
            vec![Cte {
                name: staged,
                query: Query::Select(base),
            }],
            Query::UnionAll(vec![first, second]),
        );
        let sql = query.to_sql(&Postgres);
        assert!(sql.starts_with("WITH staged AS (\n  SELECT\n    k\n  FROM src\n)\n"));
        assert!(sql.contains("UNION ALL\n"));
        assert!(sql.contains("INNER JOIN vault.sat AS cur\n  ON cur.k = staged.k"));
        assert!(sql.ends_with(";\n"));
    }

    #[test]
    fn first_per_partition_follows_the_dialect() {
        let k = ident("k");
        let v = ident("v");
        let select = Select::new(FromClause::table(TableRef::parse("src").unwrap(), None))
            .first_per(vec![Expr::column(&k)], vec![Expr::column(&v)])
            .item(SelectItem::expr(Expr::column(&k)))
            .item(SelectItem::expr(Expr::column(&v)));

        assert_eq!(
            Query::Select(select.clone()).to_sql(&BigQuery),
            "SELECT\n  k,\n  v\nFROM ${ref(\"src\")}\nWHERE TRUE\nQUALIFY ROW_NUMBER() OVER (PARTITION BY k ORDER BY v) = 1\n"
        );
        assert_eq!(
            Query::Select(select.clone()).to_sql(&Postgres),
            "SELECT DISTINCT ON (k)\n  k,\n  v\nFROM src\nORDER BY k, v;\n"
        );

        let filtered = select.filter(Expr::column(&v).not_equals(Expr::string("x")));
        let sql = Query::Select(filtered).to_sql(&BigQuery);
        assert!(sql.contains("WHERE v <> 'x'\nQUALIFY"));
        assert!(!sql.contains("WHERE TRUE"));
    }
}

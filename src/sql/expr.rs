//! Dialect-neutral SQL expressions.

use super::dialect::Dialect;
use super::ident::Ident;

/// A column reference, optionally qualified by a relation alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<Ident>,
    pub name: Ident,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
        }
    }
}

/// SQL expression tree. Rendering is delegated to a [`Dialect`] wherever
/// warehouses disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Column(ColumnRef),
    Str(String),
    Bool(bool),
    Null,
    CastText(Box<Expr>),
    Coalesce(Vec<Expr>),
    Concat(Vec<Expr>),
    CharLength(Box<Expr>),
    HexDigest(Box<Expr>),
    CurrentTimestamp,
    CurrentDate,
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
}

impl Expr {
    pub fn column(name: &Ident) -> Self {
        Expr::Column(ColumnRef {
            qualifier: None,
            name: name.clone(),
        })
    }

    pub fn qualified(qualifier: Option<&Ident>, name: &Ident) -> Self {
        Expr::Column(ColumnRef {
            qualifier: qualifier.cloned(),
            name: name.clone(),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    pub fn cast_text(self) -> Self {
        Expr::CastText(Box::new(self))
    }

    /// `COALESCE(CAST(self AS text), '')`: the null-safe text form used as
    /// digest input.
    pub fn text_or_empty(self) -> Self {
        Expr::Coalesce(vec![self.cast_text(), Expr::string("")])
    }

    pub fn char_length(self) -> Self {
        Expr::CharLength(Box::new(self))
    }

    pub fn hex_digest(self) -> Self {
        Expr::HexDigest(Box::new(self))
    }

    pub fn concat(parts: Vec<Expr>) -> Self {
        Expr::Concat(parts)
    }

    pub fn equals(self, other: Expr) -> Self {
        Expr::Compare {
            left: Box::new(self),
            op: CompareOp::Eq,
            right: Box::new(other),
        }
    }

    pub fn not_equals(self, other: Expr) -> Self {
        Expr::Compare {
            left: Box::new(self),
            op: CompareOp::NotEq,
            right: Box::new(other),
        }
    }

    pub fn and(terms: Vec<Expr>) -> Self {
        Expr::And(terms)
    }

    pub fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            Expr::Column(column) => match &column.qualifier {
                Some(qualifier) => format!("{qualifier}.{}", column.name),
                None => column.name.to_string(),
            },
            Expr::Str(value) => dialect.string_literal(value),
            Expr::Bool(true) => "TRUE".to_string(),
            Expr::Bool(false) => "FALSE".to_string(),
            Expr::Null => "NULL".to_string(),
            Expr::CastText(inner) => dialect.cast_text(&inner.render(dialect)),
            Expr::Coalesce(args) => format!("COALESCE({})", render_list(args, dialect)),
            Expr::Concat(parts) => match parts.as_slice() {
                [single] => single.render(dialect),
                parts => {
                    let rendered: Vec<String> = parts.iter().map(|p| p.render(dialect)).collect();
                    dialect.concat(&rendered)
                }
            },
            Expr::CharLength(inner) => dialect.char_length(&inner.render(dialect)),
            Expr::HexDigest(inner) => dialect.hex_digest(&inner.render(dialect)),
            Expr::CurrentTimestamp => dialect.current_timestamp().to_string(),
            Expr::CurrentDate => dialect.current_date().to_string(),
            Expr::Compare { left, op, right } => format!(
                "{} {} {}",
                left.render(dialect),
                op.as_sql(),
                right.render(dialect)
            ),
            Expr::And(terms) => match terms.as_slice() {
                [] => "TRUE".to_string(),
                [single] => single.render(dialect),
                terms => terms
                    .iter()
                    .map(|t| t.render(dialect))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            },
        }
    }
}

fn render_list(exprs: &[Expr], dialect: &dyn Dialect) -> String {
    exprs
        .iter()
        .map(|e| e.render(dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

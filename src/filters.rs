// ABOUTME: Filter grammar for exports and its lowering to parameterized SQL
// ABOUTME: Malformed clauses are dropped; values are always bound, never spliced

use crate::db::{Dialect, Value};
use crate::error::ExplorerError;
use serde::{Deserialize, Serialize};

/// Comparison operators offered by the export filter picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// Parse a canonical name (`starts_with`) or a picker symbol (`starts with`)
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.name() == normalized || op.symbol() == normalized)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
        }
    }

    /// Value submitted by the operator picker
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Contains => "like",
            Operator::NotContains => "not like",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
            Operator::IsNull => "is null",
            Operator::IsNotNull => "is not null",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operator::Eq => "Equal to (=)",
            Operator::Neq => "Not equal to (!=)",
            Operator::Gt => "Greater than (>)",
            Operator::Gte => "Greater than or equal to (>=)",
            Operator::Lt => "Less than (<)",
            Operator::Lte => "Less than or equal to (<=)",
            Operator::Contains => "Contains (LIKE)",
            Operator::NotContains => "Does not contain (NOT LIKE)",
            Operator::StartsWith => "Starts with",
            Operator::EndsWith => "Ends with",
            Operator::IsNull => "Is empty (NULL)",
            Operator::IsNotNull => "Is not empty (NOT NULL)",
        }
    }

    pub fn requires_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

/// `{value, label}` entry of the operator picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub fn operator_options() -> Vec<OperatorOption> {
    Operator::ALL
        .iter()
        .map(|op| OperatorOption {
            value: op.symbol(),
            label: op.label(),
        })
        .collect()
}

/// One filter row as submitted; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterClause {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl FilterClause {
    pub fn new(column: &str, operator: &str, value: Option<&str>) -> Self {
        Self {
            column: Some(column.to_string()),
            operator: Some(operator.to_string()),
            value: value.map(|v| serde_json::Value::String(v.to_string())),
        }
    }

    /// Filter value as text; JSON numbers and booleans are accepted too
    fn value_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A validated filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: &'static str,
        value: String,
    },
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    IsNull {
        column: String,
        negated: bool,
    },
}

impl Predicate {
    /// Validate a clause; `Ok(None)` means the clause is incomplete and skipped
    pub fn from_clause(clause: &FilterClause) -> Result<Option<Self>, ExplorerError> {
        let column = match clause.column.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => return Ok(None),
        };
        let operator = match clause.operator.as_deref().map(str::trim) {
            Some(o) if !o.is_empty() => Operator::parse(o).ok_or_else(|| {
                ExplorerError::InvalidRequest(format!("Unsupported filter operator: {}", o))
            })?,
            _ => return Ok(None),
        };

        if !operator.requires_value() {
            return Ok(Some(Predicate::IsNull {
                column,
                negated: operator == Operator::IsNotNull,
            }));
        }

        let value = match clause.value_text() {
            Some(v) if !v.is_empty() => v,
            _ => return Ok(None),
        };

        let predicate = match operator {
            Operator::Contains => Predicate::Like {
                column,
                pattern: format!("%{}%", value),
                negated: false,
            },
            Operator::NotContains => Predicate::Like {
                column,
                pattern: format!("%{}%", value),
                negated: true,
            },
            Operator::StartsWith => Predicate::Like {
                column,
                pattern: format!("{}%", value),
                negated: false,
            },
            Operator::EndsWith => Predicate::Like {
                column,
                pattern: format!("%{}", value),
                negated: false,
            },
            _ => Predicate::Compare {
                column,
                op: match operator {
                    Operator::Neq => "<>",
                    Operator::Gt => ">",
                    Operator::Gte => ">=",
                    Operator::Lt => "<",
                    Operator::Lte => "<=",
                    _ => "=",
                },
                value,
            },
        };

        Ok(Some(predicate))
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::Like { column, .. }
            | Predicate::IsNull { column, .. } => column,
        }
    }
}

/// Validate every clause in order, dropping incomplete ones
pub fn parse_filters(clauses: &[FilterClause]) -> Result<Vec<Predicate>, ExplorerError> {
    let mut predicates = Vec::new();
    for clause in clauses {
        match Predicate::from_clause(clause)? {
            Some(predicate) => predicates.push(predicate),
            None => tracing::debug!("Skipping incomplete filter clause: {:?}", clause),
        }
    }
    Ok(predicates)
}

/// A `WHERE` clause and the parameters it binds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Lower predicates to a flat AND-ed `WHERE` clause
///
/// Placeholders are numbered from `first_placeholder` so the clause can be
/// appended to a statement that already binds parameters.
pub fn build_where(dialect: Dialect, predicates: &[Predicate], first_placeholder: usize) -> WhereClause {
    if predicates.is_empty() {
        return WhereClause::default();
    }

    let mut conditions = Vec::with_capacity(predicates.len());
    let mut params = Vec::new();

    for predicate in predicates {
        let column = dialect.quote_ident(predicate.column());
        let condition = match predicate {
            Predicate::IsNull { negated, .. } => {
                format!("{} IS {}NULL", column, if *negated { "NOT " } else { "" })
            }
            Predicate::Compare { op, value, .. } => {
                params.push(Value::Text(value.clone()));
                format!(
                    "{} {} {}",
                    column,
                    op,
                    dialect.placeholder(first_placeholder + params.len() - 1)
                )
            }
            Predicate::Like { pattern, negated, .. } => {
                params.push(Value::Text(pattern.clone()));
                format!(
                    "{} {}LIKE {}",
                    dialect.like_operand(&column),
                    if *negated { "NOT " } else { "" },
                    dialect.placeholder(first_placeholder + params.len() - 1)
                )
            }
        };
        conditions.push(condition);
    }

    WhereClause {
        sql: format!(" WHERE {}", conditions.join(" AND ")),
        params,
    }
}

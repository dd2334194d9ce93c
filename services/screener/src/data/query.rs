//! Provider query model.
//!
//! A `ScanQuery` is what the screener hands to a `MarketDataProvider`: the
//! columns to fetch, a conjunctive list of predicates, the ordering and a row
//! limit. Predicates can also be evaluated locally against a `ScanRow`, which
//! lets providers without server-side filtering honour the same semantics.

use serde::{Deserialize, Serialize};

use super::{Field, ScanRow};

/// Comparison performed by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    InSet,
    /// Field is at least `pct` percent above the reference field
    AbovePct,
    /// Field is at most `pct` percent above the reference field
    BelowPct,
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Number(f64),
    Text(String),
    Set(Vec<String>),
    Relative { reference: Field, pct: f64 },
}

/// A single filter clause. Clauses are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: Field,
    pub operator: Operator,
    pub operand: Operand,
    /// Evaluated by the provider rather than after the fetch
    pub pushdown: bool,
}

impl Predicate {
    fn pushed(field: Field, operator: Operator, operand: Operand) -> Self {
        Self {
            field,
            operator,
            operand,
            pushdown: true,
        }
    }

    pub fn gt(field: Field, value: f64) -> Self {
        Self::pushed(field, Operator::Greater, Operand::Number(value))
    }

    pub fn ge(field: Field, value: f64) -> Self {
        Self::pushed(field, Operator::GreaterOrEqual, Operand::Number(value))
    }

    pub fn lt(field: Field, value: f64) -> Self {
        Self::pushed(field, Operator::Less, Operand::Number(value))
    }

    pub fn le(field: Field, value: f64) -> Self {
        Self::pushed(field, Operator::LessOrEqual, Operand::Number(value))
    }

    pub fn is_in<I, S>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = values.into_iter().map(Into::into).collect();
        Self::pushed(field, Operator::InSet, Operand::Set(set))
    }

    pub fn above_pct(field: Field, reference: Field, pct: f64) -> Self {
        Self::pushed(field, Operator::AbovePct, Operand::Relative { reference, pct })
    }

    pub fn below_pct(field: Field, reference: Field, pct: f64) -> Self {
        Self::pushed(field, Operator::BelowPct, Operand::Relative { reference, pct })
    }

    /// Evaluate the predicate against a row.
    ///
    /// A missing value on either side never matches.
    pub fn matches(&self, row: &ScanRow) -> bool {
        match (&self.operator, &self.operand) {
            (Operator::InSet, Operand::Set(set)) => row
                .text(self.field)
                .is_some_and(|v| set.iter().any(|s| s.eq_ignore_ascii_case(v))),
            (Operator::Equal, Operand::Text(expected)) => row
                .text(self.field)
                .is_some_and(|v| v.eq_ignore_ascii_case(expected)),
            (op @ (Operator::AbovePct | Operator::BelowPct), Operand::Relative { reference, pct }) => {
                let (Some(value), Some(base)) = (row.number(self.field), row.number(*reference))
                else {
                    return false;
                };
                if base == 0.0 || !base.is_finite() {
                    return false;
                }
                let distance = (value / base - 1.0) * 100.0;
                match op {
                    Operator::AbovePct => distance >= *pct,
                    _ => distance <= *pct,
                }
            }
            (op, Operand::Number(threshold)) => {
                let Some(value) = row.number(self.field) else {
                    return false;
                };
                match op {
                    Operator::Greater => value > *threshold,
                    Operator::GreaterOrEqual => value >= *threshold,
                    Operator::Less => value < *threshold,
                    Operator::LessOrEqual => value <= *threshold,
                    Operator::Equal => value == *threshold,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: Field,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(field: Field) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// A bulk scan request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanQuery {
    pub columns: Vec<Field>,
    pub predicates: Vec<Predicate>,
    pub order_by: OrderBy,
    pub limit: usize,
}

impl ScanQuery {
    /// Pushdown predicates only.
    pub fn pushdown(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter().filter(|p| p.pushdown)
    }

    /// True if the row satisfies every predicate.
    pub fn accepts(&self, row: &ScanRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

//! Constrained query plans over the breed table.
//!
//! The analytics pipeline asks the language model for a JSON plan made of a
//! handful of fixed steps and interprets it here. Nothing the model writes is
//! ever executed as code; an unknown step or column is a plan error.
//!
//! ```json
//! {"steps": [
//!   {"op": "filter", "column": "size", "match": "eq", "value": "Large"},
//!   {"op": "sort", "column": "life_expectancy", "descending": true},
//!   {"op": "limit", "n": 5},
//!   {"op": "select", "columns": ["breed", "life_expectancy"]}
//! ]}
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::breed::{BreedColumn, BreedRecord, BreedTable};
use crate::error::{Result, WoofwiseError};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("code fence pattern is valid")
});
static NUMBER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Match {
  Eq,
  Ne,
  Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
  Filter {
    column: BreedColumn,
    #[serde(rename = "match", default = "default_match")]
    matching: Match,
    value: String,
  },
  Sort {
    column: BreedColumn,
    #[serde(default)]
    descending: bool,
  },
  Limit {
    n: usize,
  },
  Select {
    columns: Vec<BreedColumn>,
  },
  CountBy {
    column: BreedColumn,
  },
  Count,
}

fn default_match() -> Match {
  Match::Eq
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryPlan {
  pub steps: Vec<Step>,
}

impl QueryPlan {
  /// Parse a plan out of a model reply, tolerating a surrounding code fence
  pub fn parse(reply: &str) -> Result<Self> {
    let body = CODE_FENCE
      .captures(reply)
      .and_then(|c| c.get(1))
      .map(|m| m.as_str())
      .unwrap_or(reply)
      .trim();

    serde_json::from_str(body).map_err(|e| WoofwiseError::query_plan(format!("{e}: {body}")))
  }

  /// Run the plan. Aggregations (`count_by`, `count`) must be the last step.
  pub fn execute(&self, table: &BreedTable) -> Result<QueryOutput> {
    let mut rows: Vec<&BreedRecord> = table.records().iter().collect();
    let mut columns: Vec<BreedColumn> = BreedColumn::ALL.to_vec();

    for (position, step) in self.steps.iter().enumerate() {
      let is_last = position + 1 == self.steps.len();
      match step {
        Step::Filter { column, matching, value } => {
          rows.retain(|record| matches(record.get(*column), *matching, value));
        }
        Step::Sort { column, descending } => {
          rows.sort_by(|a, b| compare(*column, a.get(*column), b.get(*column), *descending));
        }
        Step::Limit { n } => rows.truncate(*n),
        Step::Select { columns: selected } => {
          if selected.is_empty() {
            return Err(WoofwiseError::query_plan("select needs at least one column"));
          }
          columns = selected.clone();
        }
        Step::CountBy { column } => {
          ensure_last(is_last, "count_by")?;
          return Ok(QueryOutput::Counts { column: *column, counts: count_by(&rows, *column) });
        }
        Step::Count => {
          ensure_last(is_last, "count")?;
          return Ok(QueryOutput::Total(rows.len()));
        }
      }
    }

    let values =
      rows.iter().map(|record| columns.iter().map(|c| record.get(*c).to_string()).collect()).collect();
    Ok(QueryOutput::Rows { columns, values })
  }
}

fn ensure_last(is_last: bool, op: &str) -> Result<()> {
  if is_last {
    Ok(())
  } else {
    Err(WoofwiseError::query_plan(format!("{op} must be the final step")))
  }
}

fn matches(field: &str, matching: Match, value: &str) -> bool {
  let field = field.to_lowercase();
  let value = value.trim().to_lowercase();
  match matching {
    Match::Eq => field == value,
    Match::Ne => field != value,
    Match::Contains => field.contains(&value),
  }
}

/// Counts per distinct value, in first-seen order
fn count_by(rows: &[&BreedRecord], column: BreedColumn) -> Vec<(String, usize)> {
  let mut counts: Vec<(String, usize)> = Vec::new();
  for record in rows {
    let value = record.get(column);
    match counts.iter_mut().find(|(seen, _)| seen == value) {
      Some((_, count)) => *count += 1,
      None => counts.push((value.to_string(), 1)),
    }
  }
  counts
}

/// Column-aware ordering: numeric for life expectancy, ordinal scales for
/// graded columns, case-insensitive text otherwise. Values that cannot be
/// placed on their scale sort last in either direction.
fn compare(column: BreedColumn, a: &str, b: &str, descending: bool) -> Ordering {
  let ordering = match (sort_key(column, a), sort_key(column, b)) {
    (SortKey::Unknown, SortKey::Unknown) => return Ordering::Equal,
    (SortKey::Unknown, _) => return Ordering::Greater,
    (_, SortKey::Unknown) => return Ordering::Less,
    (SortKey::Known(x), SortKey::Known(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    (SortKey::Text(x), SortKey::Text(y)) => x.cmp(&y),
    (SortKey::Known(_), SortKey::Text(_)) => Ordering::Less,
    (SortKey::Text(_), SortKey::Known(_)) => Ordering::Greater,
  };
  if descending {
    ordering.reverse()
  } else {
    ordering
  }
}

enum SortKey {
  Known(f64),
  Text(String),
  Unknown,
}

fn sort_key(column: BreedColumn, value: &str) -> SortKey {
  let lower = value.trim().to_lowercase();
  let ranked = match column {
    BreedColumn::LifeExpectancy => mean_of_numbers(&lower),
    BreedColumn::Size => ordinal(&lower, &["toy", "small", "medium", "large", "giant"]),
    BreedColumn::EnergyLevel | BreedColumn::Grooming => {
      ordinal(&lower, &["low", "moderate", "high", "very high"])
    }
    BreedColumn::Trainability => ordinal(&lower, &["difficult", "moderate", "easy"]),
    _ => return SortKey::Text(lower),
  };
  ranked.map(SortKey::Known).unwrap_or(SortKey::Unknown)
}

fn ordinal(value: &str, scale: &[&str]) -> Option<f64> {
  scale.iter().position(|level| *level == value).map(|p| p as f64)
}

fn mean_of_numbers(value: &str) -> Option<f64> {
  let numbers: Vec<f64> =
    NUMBER.find_iter(value).filter_map(|m| m.as_str().parse::<f64>().ok()).collect();
  if numbers.is_empty() {
    None
  } else {
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
  }
}

/// Result of executing a query plan
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
  Rows { columns: Vec<BreedColumn>, values: Vec<Vec<String>> },
  Counts { column: BreedColumn, counts: Vec<(String, usize)> },
  Total(usize),
}

impl fmt::Display for QueryOutput {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryOutput::Rows { columns, values } => {
        if values.is_empty() {
          return write!(f, "(no matching breeds)");
        }
        let header: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        writeln!(f, "{}", header.join(" | "))?;
        for row in values {
          writeln!(f, "{}", row.join(" | "))?;
        }
        Ok(())
      }
      QueryOutput::Counts { column, counts } => {
        writeln!(f, "{column} | count")?;
        for (value, count) in counts {
          writeln!(f, "{value} | {count}")?;
        }
        Ok(())
      }
      QueryOutput::Total(total) => write!(f, "count: {total}"),
    }
  }
}

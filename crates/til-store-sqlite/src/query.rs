//! Translation of [`TilPredicate`] and search terms into SQL fragments.

use rusqlite::types::Value;
use til_core::store::TilPredicate;

use crate::encode::encode_uuid;

/// Render `predicate` as a boolean SQL expression over the `tils` table
/// aliased as `t`, appending positional bind values to `binds`.
pub fn where_clause(predicate: &TilPredicate, binds: &mut Vec<Value>) -> String {
  let mut sql = String::new();
  push_predicate(predicate, &mut sql, binds);
  sql
}

fn push_predicate(predicate: &TilPredicate, sql: &mut String, binds: &mut Vec<Value>) {
  match predicate {
    TilPredicate::Any => sql.push_str("1"),
    TilPredicate::IsPrivate(flag) => {
      sql.push_str("t.is_private = ?");
      binds.push(Value::Integer(i64::from(*flag)));
    }
    TilPredicate::OwnerIs(id) => {
      sql.push_str("t.uid = ?");
      binds.push(Value::Text(encode_uuid(*id)));
    }
    TilPredicate::OwnerIn(ids) if ids.is_empty() => sql.push_str("0"),
    TilPredicate::OwnerIn(ids) => {
      sql.push_str("t.uid IN (");
      for (i, id) in ids.iter().enumerate() {
        if i > 0 {
          sql.push_str(", ");
        }
        sql.push('?');
        binds.push(Value::Text(encode_uuid(*id)));
      }
      sql.push(')');
    }
    TilPredicate::And(parts) if parts.is_empty() => sql.push_str("1"),
    TilPredicate::Or(parts) if parts.is_empty() => sql.push_str("0"),
    TilPredicate::And(parts) => push_joined(parts, " AND ", sql, binds),
    TilPredicate::Or(parts) => push_joined(parts, " OR ", sql, binds),
  }
}

fn push_joined(
  parts: &[TilPredicate],
  op: &str,
  sql: &mut String,
  binds: &mut Vec<Value>,
) {
  sql.push('(');
  for (i, part) in parts.iter().enumerate() {
    if i > 0 {
      sql.push_str(op);
    }
    push_predicate(part, sql, binds);
  }
  sql.push(')');
}

/// Build an FTS5 MATCH expression: every whitespace-separated term quoted
/// and AND-ed, so user input can never be parsed as FTS5 syntax. `None` for
/// blank input.
pub fn match_expression(term: &str) -> Option<String> {
  let terms: Vec<String> = term
    .split_whitespace()
    .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
    .collect();
  if terms.is_empty() {
    None
  } else {
    Some(terms.join(" AND "))
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use uuid::Uuid;

  use super::*;

  #[test]
  fn social_shape_renders_disjunction_of_conjunction() {
    let me = Uuid::new_v4();
    let friend = Uuid::new_v4();
    let predicate = TilPredicate::Or(vec![
      TilPredicate::And(vec![
        TilPredicate::OwnerIn(BTreeSet::from([friend])),
        TilPredicate::IsPrivate(false),
      ]),
      TilPredicate::OwnerIs(me),
    ]);

    let mut binds = Vec::new();
    let sql = where_clause(&predicate, &mut binds);

    assert_eq!(sql, "((t.uid IN (?) AND t.is_private = ?) OR t.uid = ?)");
    assert_eq!(
      binds,
      vec![
        Value::Text(encode_uuid(friend)),
        Value::Integer(0),
        Value::Text(encode_uuid(me)),
      ]
    );
  }

  #[test]
  fn empty_sets_are_constant() {
    let mut binds = Vec::new();
    assert_eq!(where_clause(&TilPredicate::OwnerIn(BTreeSet::new()), &mut binds), "0");
    assert_eq!(where_clause(&TilPredicate::Or(vec![]), &mut binds), "0");
    assert_eq!(where_clause(&TilPredicate::And(vec![]), &mut binds), "1");
    assert_eq!(where_clause(&TilPredicate::Any, &mut binds), "1");
    assert!(binds.is_empty());
  }

  #[test]
  fn match_expression_quotes_each_term() {
    assert_eq!(match_expression("  "), None);
    assert_eq!(match_expression("rust"), Some("\"rust\"".into()));
    assert_eq!(
      match_expression("say \"hi\" OR"),
      Some("\"say\" AND \"\"\"hi\"\"\" AND \"OR\"".into())
    );
  }
}

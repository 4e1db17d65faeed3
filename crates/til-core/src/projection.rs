//! Restricted projections used when a feed entry inlines a referenced user or
//! directory.
//!
//! A projection is a fixed field allowlist. It is configuration, loaded once
//! and passed explicitly to the store on every population call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A field allowlist for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection {
  fields: Vec<String>,
}

impl Projection {
  pub fn new<I, S>(fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self { fields: fields.into_iter().map(Into::into).collect() }
  }

  pub fn fields(&self) -> &[String] { &self.fields }

  /// Restrict `document` to the allowlisted fields. The document id is
  /// always present under `id`; fields absent from the document are skipped.
  pub fn apply(&self, id: Uuid, document: &Value) -> Projected {
    let mut out = Map::new();
    out.insert("id".to_owned(), Value::String(id.to_string()));
    if let Value::Object(fields) = document {
      for name in &self.fields {
        if let Some(value) = fields.get(name) {
          out.insert(name.clone(), value.clone());
        }
      }
    }
    Projected(out)
  }
}

/// A referenced document reduced to its projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projected(Map<String, Value>);

impl Projected {
  pub fn id(&self) -> Option<Uuid> {
    self.0.get("id")?.as_str()?.parse().ok()
  }

  pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }
}

/// Projections applied during feed population, per referenced entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulateConfig {
  pub user:      Projection,
  pub directory: Projection,
}

impl Default for PopulateConfig {
  fn default() -> Self {
    Self {
      user:      Projection::new(["handle", "avatar"]),
      directory: Projection::new(["name"]),
    }
  }
}

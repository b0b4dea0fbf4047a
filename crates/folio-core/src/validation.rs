//! Field-level validation results shared by review and contact forms.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Messages keyed by the wire name of the offending field.
///
/// An empty value means the input was valid; constructors in this crate only
/// ever return `Err` with at least one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
  fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self
      .fields
      .entry(field.to_owned())
      .or_default()
      .push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  /// Messages recorded for `field`, empty if it passed.
  pub fn field(&self, field: &str) -> &[String] {
    self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
  }

  /// `Ok(value)` if nothing was recorded, otherwise `Err(self)`.
  pub fn into_result<T>(self, value: T) -> Result<T, Self> {
    if self.is_empty() { Ok(value) } else { Err(self) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.fields {
      for m in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {m}")?;
        first = false;
      }
    }
    Ok(())
  }
}

impl std::error::Error for ValidationErrors {}

/// Length as a user would count it: Unicode scalar values, not bytes.
pub(crate) fn char_len(s: &str) -> usize { s.chars().count() }

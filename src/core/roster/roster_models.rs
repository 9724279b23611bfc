// The roster is the list of people we might greet today.
// It comes from a spreadsheet, but nothing in here knows that: the infra layer
// hands us a grid of strings and we turn it into records keyed by header name.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Column holding the person's name.
pub const NAME_KEY: &str = "nombre";
/// Column holding the birthdate (`YYYY/MM/DD` or `MM/DD`).
pub const BIRTHDATE_KEY: &str = "fecha de nacimiento";
/// Column holding the recipient address.
pub const EMAIL_KEY: &str = "correo electrónico";
/// Column describing how the sender is related to the person.
pub const RELATIONSHIP_KEY: &str = "parentesco";
/// Column holding the person's gender, used to tune the greeting.
pub const GENDER_KEY: &str = "genero";

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One row of the roster.
///
/// Values are kept exactly as they appear in the sheet. Accessors treat blank
/// cells as missing, so callers never have to distinguish `""` from absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    fields: BTreeMap<String, String>,
    /// Derived from the birthdate when it includes a year (`edad`).
    age: Option<i32>,
}

impl PersonRecord {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields, age: None }
    }

    #[cfg(test)]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the trimmed value for `key`, or `None` if the cell is absent or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_KEY)
    }

    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL_KEY)
    }

    pub fn birthdate(&self) -> Option<&str> {
        self.get(BIRTHDATE_KEY)
    }

    pub fn relationship(&self) -> Option<&str> {
        self.get(RELATIONSHIP_KEY)
    }

    pub fn gender(&self) -> Option<&str> {
        self.get(GENDER_KEY)
    }

    pub fn age(&self) -> Option<i32> {
        self.age
    }

    /// Attaches the derived age. This is the only mutation a record sees.
    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }
}

/// The full table read from the source, in sheet order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub headers: Vec<String>,
    pub records: Vec<PersonRecord>,
}

impl Roster {
    /// Builds a roster from a raw grid where the first row is the header.
    ///
    /// Headers are trimmed and lower-cased so `" Nombre "` and `"nombre"` are the
    /// same column. Short rows just miss their trailing keys; cells past the
    /// last header are dropped.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut rows = grid.into_iter();

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|h| h.trim().to_lowercase())
                .collect(),
            None => return Self::default(),
        };

        let records = rows
            .map(|row| {
                let fields = headers
                    .iter()
                    .zip(row)
                    .filter(|(header, _)| !header.is_empty())
                    .map(|(header, value)| (header.clone(), value))
                    .collect();
                PersonRecord::new(fields)
            })
            .collect();

        Self { headers, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.headers.iter().any(|h| h == key)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Failed to authenticate with the roster source: {0}")]
    Auth(String),

    #[error("Roster source request failed: {0}")]
    Request(String),

    #[error("Roster source returned an unreadable response: {0}")]
    Malformed(String),
}

// ============================================================================
// SOURCE TRAIT (PORT)
// ============================================================================

/// Where the roster comes from. The production implementation reads a
/// Google Sheet; tests use an in-memory grid.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_roster(&self) -> Result<Roster, RosterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_headers_are_normalized() {
        let roster = Roster::from_grid(vec![
            row(&[" Nombre ", "FECHA DE NACIMIENTO", "Correo Electrónico"]),
            row(&["Ana", "1990/05/04", "ana@example.com"]),
        ]);

        assert_eq!(
            roster.headers,
            vec!["nombre", "fecha de nacimiento", "correo electrónico"]
        );
        assert_eq!(roster.records[0].name(), Some("Ana"));
        assert_eq!(roster.records[0].birthdate(), Some("1990/05/04"));
        assert_eq!(roster.records[0].email(), Some("ana@example.com"));
    }

    #[test]
    fn test_short_rows_miss_trailing_keys() {
        let roster = Roster::from_grid(vec![
            row(&["nombre", "fecha de nacimiento", "correo electrónico"]),
            row(&["Luis", "05/04"]),
        ]);

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.records[0].email(), None);
    }

    #[test]
    fn test_extra_cells_are_dropped() {
        let roster = Roster::from_grid(vec![
            row(&["nombre"]),
            row(&["Luis", "stray", "cells"]),
        ]);

        assert_eq!(
            roster.records[0],
            PersonRecord::from_pairs([("nombre", "Luis")])
        );
    }

    #[test]
    fn test_blank_cells_read_as_missing() {
        let record = PersonRecord::from_pairs([("nombre", "Ana"), ("parentesco", "   ")]);

        assert_eq!(record.relationship(), None);
        assert_eq!(record.gender(), None);
    }

    #[test]
    fn test_empty_grid_is_empty_roster() {
        assert!(Roster::from_grid(Vec::new()).is_empty());

        let header_only = Roster::from_grid(vec![row(&["nombre", "fecha de nacimiento"])]);
        assert!(header_only.is_empty());
        assert!(header_only.has_column(BIRTHDATE_KEY));
    }
}

//! Parser for the line-oriented tables printed by `zfs` and `zpool`.
//!
//! The first non-blank line is the header, every following line is a row.
//! Rows whose token count differs from the header are handed to a
//! [`RowReconciler`] which knows the layout of the table being read.

use std::collections::HashMap;

use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TabularError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    ColumnMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("unexpected header layout: {0}")]
    UnexpectedHeader(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delimiter {
    /// Any run of blanks separates two fields.
    #[default]
    Whitespace,
    Char(char),
}

impl Delimiter {
    fn split(self, line: &str) -> Vec<String> {
        match self {
            Delimiter::Whitespace => line.split_whitespace().map(str::to_string).collect(),
            Delimiter::Char(c) => line.split(c).map(|s| s.trim().to_string()).collect(),
        }
    }
}

/// One data line keyed by lowercased header name. `None` marks an absent value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: HashMap<String, Option<String>>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }

    pub fn require(&self, name: &str) -> Result<&str, TabularError> {
        self.get(name)
            .ok_or_else(|| TabularError::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Replaces placeholder tokens (compared case-insensitively) with absence.
    pub fn normalize(&mut self, name: &str, placeholders: &[&str]) {
        if let Some(slot) = self.fields.get_mut(name) {
            let is_placeholder = slot
                .as_deref()
                .is_some_and(|v| placeholders.iter().any(|p| v.eq_ignore_ascii_case(p)));

            if is_placeholder {
                *slot = None;
            }
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        Row {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Rebuilds a row whose token count does not match the header.
///
/// Must return exactly one slot per header field.
pub trait RowReconciler {
    fn reconcile(
        &self,
        header: &[String],
        tokens: Vec<String>,
    ) -> Result<Vec<Option<String>>, TabularError>;
}

impl<F> RowReconciler for F
where
    F: Fn(&[String], Vec<String>) -> Result<Vec<Option<String>>, TabularError>,
{
    fn reconcile(
        &self,
        header: &[String],
        tokens: Vec<String>,
    ) -> Result<Vec<Option<String>>, TabularError> {
        self(header, tokens)
    }
}

/// Accepts no irregular rows.
pub struct Strict;

impl RowReconciler for Strict {
    fn reconcile(
        &self,
        header: &[String],
        tokens: Vec<String>,
    ) -> Result<Vec<Option<String>>, TabularError> {
        Err(TabularError::ColumnMismatch {
            line: 0,
            expected: header.len(),
            found: tokens.len(),
        })
    }
}

/// Reconciler for `NAME PROPERTY VALUE SOURCE` tables (`zfs get`, `zpool get`).
///
/// The source is the last token, or the trailing `inherited from <dataset>`
/// triple. Whatever lies between the property and the source is the value:
/// nothing means the value is unset, several tokens are a value with embedded
/// blanks such as a creation date.
pub struct PropertyRows;

const PROPERTY_HEADER: [&str; 4] = ["name", "property", "value", "source"];

impl RowReconciler for PropertyRows {
    fn reconcile(
        &self,
        header: &[String],
        mut tokens: Vec<String>,
    ) -> Result<Vec<Option<String>>, TabularError> {
        if header != PROPERTY_HEADER {
            return Err(TabularError::UnexpectedHeader(header.join(" ")));
        }

        if tokens.len() < 3 {
            return Err(TabularError::ColumnMismatch {
                line: 0,
                expected: header.len(),
                found: tokens.len(),
            });
        }

        let n = tokens.len();
        let inherited = n >= 5 && tokens[n - 3] == "inherited" && tokens[n - 2] == "from";

        let source = match inherited {
            true => tokens.split_off(n - 3).join(" "),
            false => tokens.split_off(n - 1).join(" "),
        };

        let rest = tokens.split_off(2);
        let property = tokens.pop();
        let name = tokens.pop();

        let value = match rest.is_empty() {
            true => None,
            false => Some(rest.iter().join(" ")),
        };

        Ok(vec![name, property, value, Some(source)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TabularParser {
    delimiter: Delimiter,
}

impl TabularParser {
    pub fn new(delimiter: Delimiter) -> Self {
        TabularParser { delimiter }
    }

    pub fn parse(
        &self,
        raw: &str,
        reconciler: &dyn RowReconciler,
    ) -> Result<Vec<Row>, TabularError> {
        let mut lines = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header_line)) = lines.next() else {
            return Ok(vec![]);
        };

        let header = self
            .delimiter
            .split(header_line)
            .into_iter()
            .map(|name| name.to_lowercase())
            .collect::<Vec<String>>();

        lines
            .map(|(index, line)| {
                let tokens = self.delimiter.split(line);
                let found = tokens.len();

                let values = match found == header.len() {
                    true => tokens.into_iter().map(Some).collect(),
                    false => reconciler
                        .reconcile(&header, tokens)
                        .map_err(|e| with_line(e, index + 1))?,
                };

                if values.len() != header.len() {
                    return Err(TabularError::ColumnMismatch {
                        line: index + 1,
                        expected: header.len(),
                        found,
                    });
                }

                let row: Row = header.iter().cloned().zip(values).collect();
                Ok(row)
            })
            .collect()
    }
}

fn with_line(error: TabularError, line: usize) -> TabularError {
    match error {
        TabularError::ColumnMismatch {
            expected, found, ..
        } => TabularError::ColumnMismatch {
            line,
            expected,
            found,
        },
        other => other,
    }
}

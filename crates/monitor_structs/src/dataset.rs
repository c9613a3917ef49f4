//! CSV datasets replayed against the endpoint.

use serde::{Deserialize, Serialize};

/// One inference input: the field values of a CSV line, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row(Vec<String>);

impl Row {
    /// Creates a row from already-rendered field values.
    #[must_use]
    pub const fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    /// Creates a row from numeric values.
    ///
    /// Values keep their decimal point (`5.0` stays `5.0`).
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        Self(values.iter().map(|value| format!("{value:?}")).collect())
    }

    /// Returns the field values.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// Number of fields in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the row carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the row into an endpoint payload with no trailing delimiter.
    #[must_use]
    pub fn to_payload(&self) -> String {
        self.0.join(",")
    }
}

/// How a CSV file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CsvLayout {
    /// First line holds column names and is not replayed
    pub has_header: bool,

    /// First column holds the label and is stripped before inference
    pub label_column: bool,
}

/// An immutable dataset of inference rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    /// Creates a dataset from rows.
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Parses CSV text.
    ///
    /// Blank lines become empty rows so that row indices match the source
    /// lines after the header. Field text is never altered beyond trimming
    /// surrounding whitespace.
    #[must_use]
    pub fn from_csv(text: &str, layout: CsvLayout) -> Self {
        let lines = text.lines().skip(usize::from(layout.has_header));

        let rows = lines
            .map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return Row::default();
                }

                let fields = line.split(',').map(|field| field.trim().to_owned());
                if layout.label_column {
                    Row::new(fields.skip(1).collect())
                } else {
                    Row::new(fields.collect())
                }
            })
            .collect();

        Self { rows }
    }

    /// Returns the rows in their original order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows, including empty ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the dataset holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<Vec<f64>>> for Dataset {
    fn from(values: Vec<Vec<f64>>) -> Self {
        Self::new(values.iter().map(|row| Row::from_values(row)).collect())
    }
}

//! Manifest layout heuristics.
//!
//! The store export has no formal schema, so every token the parser keys on
//! lives here and can be overridden from a TOML file. Fields missing from
//! the file keep their defaults.
//!
//! ```toml
//! header_marker = "CodSap"
//! null_literals = ["nan", "None"]
//! date_formats = ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"]
//! ```

use serde::Deserialize;

use crate::error::RulesError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestRules {
    /// Any cell containing this (case-insensitive) marks the header row.
    pub header_marker: String,
    /// Header substring identifying the item code column.
    pub code_column: String,
    /// Header substring identifying the description column.
    pub description_column: String,
    /// Header substring identifying the expected quantity column.
    pub quantity_column: String,
    /// Quantity headers containing this are skipped ("Qtde Real").
    pub quantity_exclude: String,
    /// Row-0 label for the trip id.
    pub trip_label: String,
    /// Row-0 label for the store id.
    pub store_label: String,
    /// Row-0 label for the trip date.
    pub date_label: String,
    /// Cell texts meaning "no value".
    pub null_literals: Vec<String>,
    /// Code or description cells containing one of these are repeated headers.
    pub junk_tokens: Vec<String>,
    /// chrono formats tried in order on the trip date.
    pub date_formats: Vec<String>,
}

impl Default for ManifestRules {
    fn default() -> Self {
        Self {
            header_marker: "CodSap".into(),
            code_column: "CODSAP".into(),
            description_column: "DESCRI".into(),
            quantity_column: "QTDE".into(),
            quantity_exclude: "REAL".into(),
            trip_label: "Viagem".into(),
            store_label: "Loja".into(),
            date_label: "Data".into(),
            null_literals: vec!["nan".into()],
            junk_tokens: vec!["CODSAP".into(), "DESCRI".into()],
            date_formats: vec!["%d-%m-%Y".into(), "%d/%m/%Y".into()],
        }
    }
}

impl ManifestRules {
    pub fn from_toml_str(s: &str) -> Result<Self, RulesError> {
        Ok(toml::from_str(s)?)
    }

    pub(crate) fn is_null_literal(&self, text: &str) -> bool {
        self.null_literals.iter().any(|lit| lit == text)
    }

    pub(crate) fn contains_junk_token(&self, text: &str) -> bool {
        let upper = text.to_uppercase();
        self.junk_tokens
            .iter()
            .any(|token| upper.contains(&token.to_uppercase()))
    }
}

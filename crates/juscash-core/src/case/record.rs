//! Case record model and JSON parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_case_schema;

/// Errors that can occur when reading a case record.
#[derive(Error, Debug)]
pub enum CaseError {
    #[error("Failed to read case file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Case record does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// A document attached to the case file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Upstream document identifier
    pub id: String,

    /// When the document was filed
    #[serde(rename = "dataHoraJuntada", deserialize_with = "super::timestamp::deserialize")]
    pub filed_at: DateTime<Utc>,

    /// Document name (e.g. "Sentença", "Certidão de trânsito em julgado")
    #[serde(rename = "nome")]
    pub name: String,

    /// Extracted document text
    #[serde(rename = "texto")]
    pub text: String,
}

/// A procedural movement recorded on the case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movement {
    #[serde(rename = "dataHora", deserialize_with = "super::timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "descricao")]
    pub description: String,
}

/// A judicial case record submitted for validation.
///
/// Field names on the wire follow the upstream court-data system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseRecord {
    /// Case number, used as the audit key
    #[serde(rename = "numeroProcesso")]
    pub case_number: String,

    /// Procedural class
    #[serde(rename = "classe")]
    pub class: String,

    /// Adjudicating body
    #[serde(rename = "orgaoJulgador")]
    pub adjudicating_body: String,

    /// Last distribution timestamp
    #[serde(rename = "ultimaDistribuicao", deserialize_with = "super::timestamp::deserialize")]
    pub distributed_at: DateTime<Utc>,

    /// Value of the claim
    #[serde(rename = "valorCausa", default)]
    pub claim_value: Option<f64>,

    /// Subject of the case
    #[serde(rename = "assunto", default)]
    pub subject: Option<String>,

    #[serde(rename = "segredoJustica")]
    pub secrecy: bool,

    #[serde(rename = "justicaGratuita")]
    pub free_justice: bool,

    /// Court acronym (e.g. "TJSP")
    #[serde(rename = "siglaTribunal")]
    pub court_acronym: String,

    /// Jurisdiction sphere (e.g. "Cível", "Trabalhista")
    #[serde(rename = "esfera")]
    pub sphere: String,

    /// Award value, if the judgment set one
    #[serde(rename = "valorCondenacao", default)]
    pub award_value: Option<f64>,

    #[serde(rename = "documentos")]
    pub documents: Vec<Document>,

    #[serde(rename = "movimentos")]
    pub movements: Vec<Movement>,
}

impl CaseRecord {
    /// Parse a case record from a JSON string.
    ///
    /// The payload is checked against the case schema first so that every
    /// structural problem is reported at once, then deserialized.
    pub fn from_json(json: &str) -> Result<Self, CaseError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a case record from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CaseError> {
        validate_case_schema(&value).map_err(CaseError::SchemaError)?;
        let record: CaseRecord = serde_json::from_value(value)?;
        record.validate()?;
        Ok(record)
    }

    /// Parse a case record from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CaseError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Checks the schema cannot express.
    fn validate(&self) -> Result<(), CaseError> {
        if self.case_number.trim().is_empty() {
            return Err(CaseError::MissingField("numeroProcesso".to_string()));
        }
        Ok(())
    }

    /// Names of the attached documents, in filing order.
    pub fn document_names(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.name.as_str())
    }

    /// Descriptions of the recorded movements, in recorded order.
    pub fn movement_descriptions(&self) -> impl Iterator<Item = &str> {
        self.movements.iter().map(|m| m.description.as_str())
    }
}

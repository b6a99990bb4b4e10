use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Document, Editor, EditorConfig, Point, Selection};
use crate::plugin::PluginRegistry;

const SCHEMA: &str = "plate-table";
const VERSION: u32 = 1;

fn default_schema() -> String {
    SCHEMA.to_string()
}

fn default_version() -> u32 {
    VERSION
}

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document schema {schema:?} v{version}")]
    Unsupported { schema: String, version: u32 },
}

/// Persisted form of a document: a versioned JSON envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl PlateValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, ValueError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses an envelope written by this or an older version.
    pub fn from_json_str(s: &str) -> Result<Self, ValueError> {
        let value: PlateValue = serde_json::from_str(s)?;
        if value.schema != SCHEMA || value.version > VERSION {
            return Err(ValueError::Unsupported {
                schema: value.schema,
                version: value.version,
            });
        }
        Ok(value)
    }

    /// Opens the document with the table plugins, caret at the start.
    /// Loading normalizes, so tables saved in a broken shape come back
    /// repaired.
    pub fn into_editor(self, config: EditorConfig) -> Editor {
        let selection = Selection::collapsed(Point::new(vec![0], 0));
        Editor::with_config(self.document, selection, PluginRegistry::table(), config)
    }
}

impl Editor {
    pub fn to_value(&self) -> PlateValue {
        PlateValue::from_document(self.doc().clone())
    }
}

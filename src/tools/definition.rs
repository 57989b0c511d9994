//! Tool definitions sent to the model, and the built-in set.

use serde::{Deserialize, Serialize};

use super::schema::SchemaBuilder;

pub const READ_FILE_TOOL: &str = "read_file";
pub const SEARCH_DOCUMENTS_TOOL: &str = "search_documents";

/// A named, schema-described operation the model may request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(alias = "inputSchema")]
    pub input_schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input_schema,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The fixed built-in tool schemas.
pub fn builtin_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            READ_FILE_TOOL,
            SchemaBuilder::object()
                .string(
                    "document_id",
                    "Identifier of the document to read, as listed in the available documents",
                    true,
                )
                .string("scope_id", "Identifier of the project the document belongs to", false)
                .build(),
        )
        .with_description(
            "Read the full text of a document attached to the current project. \
             Only documents marked ready can be read.",
        ),
        ToolDefinition::new(
            SEARCH_DOCUMENTS_TOOL,
            SchemaBuilder::object()
                .string("query", "What to look for", true)
                .string("scope_id", "Identifier of the project to search", false)
                .integer("limit", "Maximum number of passages to return", false)
                .build(),
        )
        .with_description("Search the current project's documents for relevant passages."),
    ]
}

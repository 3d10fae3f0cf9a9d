//! Tool and function calling types.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool type (always "function").
    #[serde(rename = "type")]
    pub type_: String,

    /// Function definition.
    pub function: FunctionDefinition,
}

impl Tool {
    /// Creates a new function tool.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            type_: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            },
        }
    }

    /// Validates the tool definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.type_ != "function" {
            return Err(format!("Unknown tool type: {}", self.type_));
        }

        if self.function.name.is_empty() {
            return Err("Function name is required".to_string());
        }

        if !self
            .function
            .name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(
                "Function name must contain only alphanumeric characters, underscores and dashes"
                    .to_string(),
            );
        }

        Ok(())
    }
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,

    /// Function description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for function parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Tool call delta for streaming responses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolCallDelta {
    /// Index of the tool call.
    #[serde(default)]
    pub index: u32,

    /// Tool call ID (only in first chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool type (only in first chunk).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Function delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

/// Function call delta for streaming.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FunctionDelta {
    /// Function name (only in first chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Partial arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Builds the plan tool definition under the given function name.
///
/// Arguments are `{title, steps}`; each step has `id`, `title` and `status`
/// (`pending`, `in-progress` or `done`) plus an optional `description`.
pub fn manage_plan_tool(name: &str) -> Tool {
    Tool::function(
        name,
        "Create or update the structured plan shown next to the conversation.",
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the plan."
                },
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "description": "Unique ID for the step"},
                            "title": {"type": "string", "description": "Actionable step title"},
                            "description": {"type": "string", "description": "Detailed description"},
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in-progress", "done"],
                                "default": "pending"
                            }
                        },
                        "required": ["id", "title", "status"]
                    }
                }
            },
            "required": ["title", "steps"]
        }),
    )
}

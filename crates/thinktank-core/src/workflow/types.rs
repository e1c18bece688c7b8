use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Body of a successful `POST /workflow/chat`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorkflowResponse {
    pub workflow_result: String,
    #[serde(default, deserialize_with = "outputs_or_empty")]
    pub individual_outputs: Map<String, Value>,
    #[serde(default, deserialize_with = "project_id")]
    pub project_id: Option<String>,
}

/// Body of `GET /workflow/status/{project_id}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectStatus {
    #[serde(deserialize_with = "required_project_id")]
    pub project_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct PingResponse {
    pub status: String,
}

fn outputs_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The service sends integer ids, with 0 for "no project"; older builds sent strings.
fn project_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) if n.as_i64() == Some(0) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "project_id must be a string or integer, got {}",
            other
        ))),
    }
}

fn required_project_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    project_id(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing project_id"))
}

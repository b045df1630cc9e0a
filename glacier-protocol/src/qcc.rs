use serde::{Deserialize, Serialize};

/// Query context sent along with each query request as `queryContextDTO`.
///
/// An empty context serializes to `{}`, which tells server the client
/// holds nothing, as opposed to omitting the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContextDTO {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<QueryContextEntryDTO>,
}

impl QueryContextDTO {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContextEntryDTO {
    pub id: i64,
    pub timestamp: i64,
    pub priority: i64,
    #[serde(default)]
    pub context: OpaqueContextDTO,
}

/// Opaque payload, serialized as `{}` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaqueContextDTO {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_data: Option<String>,
}

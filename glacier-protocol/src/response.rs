use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use glacier_datatype::ColumnMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SSE_C_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
pub const SSE_C_KEY: &str = "x-amz-server-side-encryption-customer-key";
pub const SSE_C_AES: &str = "AES256";

/// Envelope of a query response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<QueryResponseData>,
}

impl QueryResponse {
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns payload of a successful response.
    #[inline]
    pub fn into_data(self) -> Result<QueryResponseData> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(Error::QueryFailed {
                code: self.code,
                message: self.message,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultFormat {
    #[default]
    #[serde(rename = "json", alias = "JSON")]
    Json,
    #[serde(rename = "arrow", alias = "ARROW")]
    Arrow,
}

/// Payload of a query response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseData {
    #[serde(default)]
    pub query_id: String,
    #[serde(default)]
    pub rowtype: Vec<ColumnMeta>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub returned: Option<u64>,
    #[serde(default)]
    pub query_result_format: ResultFormat,
    /// Inline first chunk of a JSON result.
    #[serde(default)]
    pub rowset: Option<Vec<Vec<serde_json::Value>>>,
    /// Inline first chunk of an arrow result, as base64 of IPC stream.
    #[serde(default)]
    pub rowset_base64: Option<String>,
    #[serde(default)]
    pub chunks: Vec<ChunkInfo>,
    #[serde(default)]
    pub chunk_headers: Option<BTreeMap<String, String>>,
    /// Key of server side encryption shared by all chunks.
    #[serde(default)]
    pub qrmk: Option<String>,
    /// Raw query context, validated by the cache when merged.
    #[serde(default)]
    pub query_context: Option<serde_json::Value>,
}

impl QueryResponseData {
    /// Headers attached to every chunk download request.
    #[inline]
    pub fn chunk_request_headers(&self) -> Vec<(String, String)> {
        if let Some(headers) = &self.chunk_headers {
            return headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
        match &self.qrmk {
            Some(qrmk) => vec![
                (SSE_C_ALGORITHM.to_string(), SSE_C_AES.to_string()),
                (SSE_C_KEY.to_string(), qrmk.clone()),
            ],
            None => vec![],
        }
    }

    /// Decoded bytes of the inline arrow chunk, empty if absent.
    #[inline]
    pub fn decode_rowset_base64(&self) -> Result<Vec<u8>> {
        match &self.rowset_base64 {
            Some(s) if !s.is_empty() => Ok(STANDARD.decode(s)?),
            _ => Ok(vec![]),
        }
    }

    /// Number of rows in the inline chunk.
    #[inline]
    pub fn inline_row_count(&self) -> u64 {
        if let Some(rowset) = &self.rowset {
            return rowset.len() as u64;
        }
        let remote: u64 = self.chunks.iter().map(|c| c.row_count).sum();
        self.returned
            .or(self.total)
            .map(|n| n.saturating_sub(remote))
            .unwrap_or_default()
    }
}

/// Descriptor of a remote result chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub url: String,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub uncompressed_size: u64,
    #[serde(default)]
    pub compressed_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_json_response() {
        let body = br#"{
            "success": true,
            "data": {
                "queryId": "01a2",
                "rowtype": [{"name":"C1","type":"fixed","scale":0}],
                "total": 5,
                "rowset": [["1"],["2"]],
                "chunks": [{"url":"https://s3/c0","rowCount":3,"uncompressedSize":30,"compressedSize":10}],
                "qrmk": "secret",
                "queryContext": {"entries": []},
                "somethingElse": 1
            }
        }"#;
        let data = QueryResponse::from_slice(body).unwrap().into_data().unwrap();
        assert_eq!(data.query_id, "01a2");
        assert_eq!(data.query_result_format, ResultFormat::Json);
        assert_eq!(data.inline_row_count(), 2);
        assert_eq!(data.chunks[0].row_count, 3);
        let headers = data.chunk_request_headers();
        assert_eq!(headers.len(), 2);
        assert!(headers.contains(&(SSE_C_KEY.to_string(), "secret".to_string())));
    }

    #[test]
    fn test_chunk_headers_take_precedence() {
        let body = br#"{
            "queryResultFormat": "ARROW",
            "rowsetBase64": "",
            "total": 4,
            "chunks": [{"url":"u","rowCount":4}],
            "chunkHeaders": {"x-custom": "1"},
            "qrmk": "ignored"
        }"#;
        let data: QueryResponseData = serde_json::from_slice(body).unwrap();
        assert_eq!(data.query_result_format, ResultFormat::Arrow);
        assert_eq!(
            data.chunk_request_headers(),
            vec![("x-custom".to_string(), "1".to_string())]
        );
        assert!(data.decode_rowset_base64().unwrap().is_empty());
        assert_eq!(data.inline_row_count(), 0);
    }

    #[test]
    fn test_failed_response() {
        let resp = QueryResponse::from_slice(br#"{"success":false,"code":"390112","message":"expired"}"#)
            .unwrap();
        assert!(matches!(
            resp.into_data(),
            Err(Error::QueryFailed { code: Some(c), .. }) if c == "390112"
        ));
    }
}

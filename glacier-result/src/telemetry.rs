use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryField {
    TimeConsumeFirstResult,
    TimeConsumeLastResult,
    TimeDownloadingResultChunks,
    TimeParsingResultChunks,
}

impl TelemetryField {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryField::TimeConsumeFirstResult => "time_consume_first_result",
            TelemetryField::TimeConsumeLastResult => "time_consume_last_result",
            TelemetryField::TimeDownloadingResultChunks => "time_downloading_result_chunks",
            TelemetryField::TimeParsingResultChunks => "time_parsing_result_chunks",
        }
    }
}

/// A timing measurement in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub field: TelemetryField,
    pub value: u64,
    pub query_id: Option<String>,
}

impl TelemetryEvent {
    #[inline]
    pub fn new(field: TelemetryField, value: u64, query_id: Option<String>) -> Self {
        TelemetryEvent {
            field,
            value,
            query_id,
        }
    }

    #[inline]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "type": self.field.as_str(),
            "query_id": self.query_id,
            "value": self.value,
        })
    }
}

/// Receiver of timing telemetry, supplied by the owner of result sets.
pub trait TelemetrySink: Send + Sync {
    fn report(&self, event: TelemetryEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    #[inline]
    fn report(&self, _event: TelemetryEvent) {}
}

use super::{BatchCore, JsonSchema, RemoteChunk};
use crate::context::FetchContext;
use crate::error::{Error, Result};
use crate::row::{Row, RowShape};
use glacier_datatype::{Converter, Value};
use std::sync::Arc;
use std::time::Instant;

type RawRow = Vec<serde_json::Value>;

/// Row oriented batch, values are JSON strings converted per column.
#[derive(Debug)]
pub struct JsonResultBatch {
    pub(super) core: BatchCore,
    pub(super) schema: JsonSchema,
    rowset: Option<Vec<RawRow>>,
}

impl JsonResultBatch {
    /// Batch whose rows came inline with query response.
    #[inline]
    pub fn local(schema: JsonSchema, rowset: Vec<RawRow>) -> Self {
        JsonResultBatch {
            core: BatchCore::new(rowset.len(), None),
            schema,
            rowset: Some(rowset),
        }
    }

    #[inline]
    pub fn remote(schema: JsonSchema, row_count: usize, chunk: RemoteChunk) -> Self {
        JsonResultBatch {
            core: BatchCore::new(row_count, Some(chunk)),
            schema,
            rowset: None,
        }
    }

    pub(super) fn create_iter(
        &self,
        ctx: Option<&FetchContext>,
        shape: RowShape,
    ) -> Result<JsonRowIter> {
        let start = Instant::now();
        let rows = match &self.rowset {
            Some(rows) => rows.clone(),
            None => {
                let body = self.core.download(ctx)?;
                let parse_start = Instant::now();
                let rows = parse_json_chunk(&body)?;
                self.core.record_parse(parse_start.elapsed());
                rows
            }
        };
        self.core.record_load(start.elapsed());
        Ok(JsonRowIter {
            rows: rows.into_iter(),
            converters: Arc::clone(self.schema.converters()),
            names: Arc::clone(self.schema.shared_names()),
            shape,
            row: 0,
        })
    }
}

/// Parse chunk body into raw rows.
///
/// Remote chunks are usually rows joined by comma without the enclosing
/// brackets, such body is wrapped before parsing.
pub(crate) fn parse_json_chunk(body: &[u8]) -> Result<Vec<RawRow>> {
    let mut tokens = body.iter().copied().filter(|b| !b.is_ascii_whitespace());
    let wrapped = match (tokens.next(), tokens.next()) {
        (None, _) => return Ok(vec![]),
        // raw values are strings or null, so `[[` and `[]` can only start
        // a complete array of rows.
        (Some(b'['), Some(b'[')) | (Some(b'['), Some(b']')) => false,
        _ => true,
    };
    if !wrapped {
        return Ok(serde_json::from_slice(body)?);
    }
    let mut buf = Vec::with_capacity(body.len() + 2);
    buf.push(b'[');
    buf.extend_from_slice(body);
    buf.push(b']');
    Ok(serde_json::from_slice(&buf)?)
}

/// Lazily converts raw rows. A row that fails to convert is yielded as
/// an error and following rows are still available.
#[derive(Debug)]
pub struct JsonRowIter {
    rows: std::vec::IntoIter<RawRow>,
    converters: Arc<[Converter]>,
    names: Arc<[String]>,
    shape: RowShape,
    row: usize,
}

impl Iterator for JsonRowIter {
    type Item = Result<Row>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.rows.next()?;
        let row = self.row;
        self.row += 1;
        Some(
            convert_row(&self.converters, &raw, row)
                .map(|values| Row::shaped(self.shape, &self.names, values)),
        )
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

fn convert_row(converters: &[Converter], raw: &[serde_json::Value], row: usize) -> Result<Vec<Value>> {
    if raw.len() != converters.len() {
        return Err(Error::Conversion {
            row,
            col: raw.len().min(converters.len()),
            msg: format!("expect {} columns, got {}", converters.len(), raw.len()),
        });
    }
    converters
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(col, (c, v))| {
            c.convert(v).map_err(|e| Error::Conversion {
                row,
                col,
                msg: e.to_string(),
            })
        })
        .collect()
}

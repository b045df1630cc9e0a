use super::{ArrowSchema, BatchCore, RemoteChunk};
use crate::context::FetchContext;
use crate::error::{Error, Result};
use crate::row::{Row, RowShape};
use arrow_array::RecordBatch;
use arrow_ipc::reader::StreamReader;
use arrow_select::concat::concat_batches;
use glacier_datatype::arrow::{to_arrow_schema, ArrowConverter};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

/// Columnar batch, carried as arrow IPC stream.
#[derive(Debug)]
pub struct ArrowResultBatch {
    pub(super) core: BatchCore,
    pub(super) schema: ArrowSchema,
    data: Option<Vec<u8>>,
}

impl ArrowResultBatch {
    /// Batch with decoded bytes of inline `rowsetBase64`.
    #[inline]
    pub fn local(schema: ArrowSchema, row_count: usize, data: Vec<u8>) -> Self {
        ArrowResultBatch {
            core: BatchCore::new(row_count, None),
            schema,
            data: Some(data),
        }
    }

    #[inline]
    pub fn remote(schema: ArrowSchema, row_count: usize, chunk: RemoteChunk) -> Self {
        ArrowResultBatch {
            core: BatchCore::new(row_count, Some(chunk)),
            schema,
            data: None,
        }
    }

    fn load(&self, ctx: Option<&FetchContext>) -> Result<Vec<RecordBatch>> {
        let start = Instant::now();
        let downloaded;
        let bytes = match &self.data {
            Some(data) => data.as_slice(),
            None => {
                downloaded = self.core.download(ctx)?;
                downloaded.as_slice()
            }
        };
        let parse_start = Instant::now();
        let records = decode_ipc(bytes)?;
        let columns = self.schema.columns().len();
        if let Some(rb) = records.iter().find(|rb| rb.num_columns() != columns) {
            return Err(Error::InvalidFormat(format!(
                "expect {} columns, got {}",
                columns,
                rb.num_columns()
            )));
        }
        self.core.record_parse(parse_start.elapsed());
        self.core.record_load(start.elapsed());
        Ok(records)
    }

    pub(super) fn create_iter(
        &self,
        ctx: Option<&FetchContext>,
        shape: RowShape,
    ) -> Result<ArrowRowIter> {
        let records = self.load(ctx)?;
        let remaining = records.iter().map(|rb| rb.num_rows()).sum();
        Ok(ArrowRowIter {
            records: records.into_iter(),
            current: None,
            pos: 0,
            row: 0,
            remaining,
            converters: Arc::clone(self.schema.converters()),
            names: Arc::clone(self.schema.shared_names()),
            shape,
        })
    }

    pub(super) fn to_arrow(&self, ctx: Option<&FetchContext>) -> Result<Vec<RecordBatch>> {
        let records = self.load(ctx)?;
        if records.is_empty() {
            let schema = to_arrow_schema(self.schema.columns())?;
            return Ok(vec![RecordBatch::new_empty(schema)]);
        }
        Ok(records)
    }

    pub(super) fn to_arrow_table(&self, ctx: Option<&FetchContext>) -> Result<RecordBatch> {
        let mut records = self.to_arrow(ctx)?;
        if records.len() == 1 {
            return Ok(records.remove(0));
        }
        let schema = records[0].schema();
        Ok(concat_batches(&schema, &records)?)
    }
}

/// Decode an arrow IPC stream, empty input has no record batch.
pub(crate) fn decode_ipc(bytes: &[u8]) -> Result<Vec<RecordBatch>> {
    if bytes.is_empty() {
        return Ok(vec![]);
    }
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let records = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Row view over decoded record batches.
#[derive(Debug)]
pub struct ArrowRowIter {
    records: std::vec::IntoIter<RecordBatch>,
    current: Option<RecordBatch>,
    pos: usize,
    row: usize,
    remaining: usize,
    converters: Arc<[ArrowConverter]>,
    names: Arc<[String]>,
    shape: RowShape,
}

impl Iterator for ArrowRowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rb) = &self.current {
                if self.pos < rb.num_rows() {
                    let (pos, row) = (self.pos, self.row);
                    self.pos += 1;
                    self.row += 1;
                    self.remaining -= 1;
                    let values = rb
                        .columns()
                        .iter()
                        .zip(self.converters.iter())
                        .enumerate()
                        .map(|(col, (array, c))| {
                            c.convert(array.as_ref(), pos)
                                .map_err(|e| Error::Conversion {
                                    row,
                                    col,
                                    msg: e.to_string(),
                                })
                        })
                        .collect::<Result<Vec<_>>>();
                    return Some(values.map(|vs| Row::shaped(self.shape, &self.names, vs)));
                }
            }
            self.current = Some(self.records.next()?);
            self.pos = 0;
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{ArrayRef, Int64Array, StringArray};
    use arrow_ipc::writer::StreamWriter;
    use arrow_schema::{DataType, Field, Schema};
    use glacier_datatype::{ColumnMeta, ColumnType, Value};

    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            ColumnMeta::new("ID", ColumnType::Fixed),
            ColumnMeta::new("NAME", ColumnType::Text),
        ])
        .unwrap()
    }

    fn ipc(batches: &[(Vec<i64>, Vec<Option<&str>>)]) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ID", DataType::Int64, true),
            Field::new("NAME", DataType::Utf8, true),
        ]));
        let mut buf = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buf, &schema).unwrap();
            for (ids, names) in batches {
                let rb = RecordBatch::try_new(
                    Arc::clone(&schema),
                    vec![
                        Arc::new(Int64Array::from(ids.clone())) as ArrayRef,
                        Arc::new(StringArray::from(names.clone())) as ArrayRef,
                    ],
                )
                .unwrap();
                writer.write(&rb).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_arrow_rows() {
        let data = ipc(&[
            (vec![1, 2], vec![Some("a"), None]),
            (vec![3], vec![Some("c")]),
        ]);
        let batch = ArrowResultBatch::local(schema(), 3, data);
        let it = batch.create_iter(None, RowShape::Tuple).unwrap();
        assert_eq!(it.size_hint(), (3, Some(3)));
        let rows: Vec<Row> = it.collect::<Result<_>>().unwrap();
        assert_eq!(
            rows,
            vec![
                Row::Tuple(vec![Value::Int(1), Value::String("a".into())]),
                Row::Tuple(vec![Value::Int(2), Value::Null]),
                Row::Tuple(vec![Value::Int(3), Value::String("c".into())]),
            ]
        );
        let table = batch.to_arrow_table(None).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(batch.to_arrow(None).unwrap().len(), 2);
    }

    #[test]
    fn test_zero_row_arrow_batch() {
        let batch = ArrowResultBatch::local(schema(), 0, vec![]);
        assert_eq!(batch.create_iter(None, RowShape::Dict).unwrap().count(), 0);
        let records = batch.to_arrow(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].num_rows(), 0);
        let schema = records[0].schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_invalid_ipc() {
        // continuation marker and a 4-byte metadata that is not a message.
        let data = vec![0xff, 0xff, 0xff, 0xff, 4, 0, 0, 0, 1, 2, 3, 4];
        let batch = ArrowResultBatch::local(schema(), 1, data);
        assert!(matches!(
            batch.create_iter(None, RowShape::Tuple),
            Err(Error::Arrow(_))
        ));
    }
}

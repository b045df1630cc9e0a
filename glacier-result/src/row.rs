use glacier_datatype::Value;
use indexmap::IndexMap;
use serde::Deserialize;

/// How a row is presented to caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowShape {
    /// Positional values.
    #[default]
    Tuple,
    /// Column name to value, in column order.
    Dict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Tuple(Vec<Value>),
    Dict(IndexMap<String, Value>),
}

impl Row {
    #[inline]
    pub(crate) fn shaped(shape: RowShape, names: &[String], values: Vec<Value>) -> Self {
        match shape {
            RowShape::Tuple => Row::Tuple(values),
            RowShape::Dict => Row::Dict(names.iter().cloned().zip(values).collect()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Row::Tuple(vs) => vs.len(),
            Row::Dict(m) => m.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at column position.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        match self {
            Row::Tuple(vs) => vs.get(idx),
            Row::Dict(m) => m.get_index(idx).map(|(_, v)| v),
        }
    }

    /// Value by column name, only available on dict rows.
    #[inline]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Tuple(_) => None,
            Row::Dict(m) => m.get(name),
        }
    }

    #[inline]
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Row::Tuple(vs) => vs,
            Row::Dict(m) => m.into_iter().map(|(_, v)| v).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_shape() {
        let names = vec!["A".to_string(), "B".to_string()];
        let values = vec![Value::Int(1), Value::String("x".into())];
        let t = Row::shaped(RowShape::Tuple, &names, values.clone());
        assert_eq!(t.get(1), Some(&Value::String("x".into())));
        assert_eq!(t.get_by_name("A"), None);
        let d = Row::shaped(RowShape::Dict, &names, values.clone());
        assert_eq!(d.len(), 2);
        assert_eq!(d.get_by_name("A"), Some(&Value::Int(1)));
        assert_eq!(d.get(1), Some(&Value::String("x".into())));
        assert_eq!(d.into_values(), values);
    }

    #[test]
    fn test_row_shape_config() {
        let shape: RowShape = serde_json::from_str("\"dict\"").unwrap();
        assert_eq!(shape, RowShape::Dict);
        assert_eq!(RowShape::default(), RowShape::Tuple);
    }
}

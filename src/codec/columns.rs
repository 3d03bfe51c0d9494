//! Column-oriented JSON payloads.
//!
//! A column is either a JSON array or an object keyed by row position
//! (`{"0": .., "1": ..}`, the layout dataframe exporters write). Both decode to
//! the same row-ordered vector.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::CodecError;
use crate::trace::{columns, group_indices, Normalization, TraceRow};

/// Index columns of the HPLC pivot, in document order.
pub(super) const PIVOT_INDEX: [&str; 4] = [
    columns::VOLUME,
    columns::CHANNEL,
    columns::TIME,
    columns::NORMALIZATION,
];

/// Equal-length named columns.
#[derive(Debug, Default)]
pub(super) struct ColumnTable {
    columns: BTreeMap<String, Vec<Value>>,
    len: usize,
}

impl ColumnTable {
    pub(super) fn from_value(value: &Value) -> Result<Self, CodecError> {
        let object = value
            .as_object()
            .ok_or_else(|| CodecError::Malformed("expected an object of columns".to_string()))?;

        let mut table = ColumnTable::default();
        for (i, (name, column)) in object.iter().enumerate() {
            let values = column_values(name, column)?;
            if i == 0 {
                table.len = values.len();
            } else if values.len() != table.len {
                return Err(CodecError::Malformed(format!(
                    "column '{}' has {} values, expected {}",
                    name,
                    values.len(),
                    table.len
                )));
            }
            table.columns.insert(name.clone(), values);
        }
        Ok(table)
    }

    pub(super) fn len(&self) -> usize {
        self.len
    }

    pub(super) fn take(&mut self, name: &str) -> Result<Vec<Value>, CodecError> {
        self.columns
            .remove(name)
            .ok_or_else(|| CodecError::MissingColumn(name.to_string()))
    }

    /// Remaining columns, consumed in name order.
    pub(super) fn into_columns(self) -> BTreeMap<String, Vec<Value>> {
        self.columns
    }

    /// One JSON object per row.
    pub(super) fn into_records(self) -> Vec<Value> {
        let mut records: Vec<Map<String, Value>> = vec![Map::new(); self.len];
        for (name, values) in self.columns {
            for (record, value) in records.iter_mut().zip(values) {
                record.insert(name.clone(), value);
            }
        }
        records.into_iter().map(Value::Object).collect()
    }
}

fn column_values(name: &str, column: &Value) -> Result<Vec<Value>, CodecError> {
    match column {
        Value::Array(values) => Ok(values.clone()),
        Value::Object(by_position) => {
            let mut indexed = by_position
                .iter()
                .map(|(k, v)| {
                    k.parse::<usize>().map(|i| (i, v.clone())).map_err(|_| {
                        CodecError::Malformed(format!("column '{}' has non-numeric row key '{}'", name, k))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            indexed.sort_by_key(|(i, _)| *i);
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        _ => Err(CodecError::Malformed(format!("column '{}' is not an array or object", name))),
    }
}

/// Decode row records from either a record array or a column object.
pub(super) fn records<R: DeserializeOwned>(value: &Value) -> Result<Vec<R>, CodecError> {
    let records = match value {
        Value::Array(_) => value.clone(),
        Value::Object(_) => Value::Array(ColumnTable::from_value(value)?.into_records()),
        _ => return Err(CodecError::Malformed("expected rows or columns".to_string())),
    };
    Ok(serde_json::from_value(records)?)
}

fn number(column: &str, row: usize, value: &Value) -> Result<f64, CodecError> {
    value
        .as_f64()
        .ok_or_else(|| CodecError::Malformed(format!("'{}' row {} is not a number", column, row)))
}

fn text(column: &str, row: usize, value: &Value) -> Result<String, CodecError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(CodecError::Malformed(format!("'{}' row {} is not text", column, row))),
    }
}

/// Pivot long-form HPLC rows to index columns plus one column per sample.
pub(super) fn pivot(rows: &[TraceRow]) -> Result<Value, CodecError> {
    if let Some(row) = rows.iter().find(|r| PIVOT_INDEX.contains(&r.sample.as_str())) {
        return Err(CodecError::ReservedSampleName(row.sample.clone()));
    }

    let mut groups = group_indices(rows.iter().map(|r| {
        (
            r.volume.to_bits(),
            r.channel.as_str(),
            r.time.to_bits(),
            r.normalization,
        )
    }));
    groups.sort_by(|(a, _), (b, _)| {
        f64::from_bits(a.0)
            .total_cmp(&f64::from_bits(b.0))
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| f64::from_bits(a.2).total_cmp(&f64::from_bits(b.2)))
            .then_with(|| a.3.cmp(&b.3))
    });

    let mut samples: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        samples.entry(row.sample.as_str()).or_insert_with(|| vec![None; groups.len()]);
    }

    let mut volume = Vec::with_capacity(groups.len());
    let mut channel = Vec::with_capacity(groups.len());
    let mut time = Vec::with_capacity(groups.len());
    let mut normalization = Vec::with_capacity(groups.len());
    for (position, ((v, c, t, n), indices)) in groups.iter().enumerate() {
        volume.push(Value::from(f64::from_bits(*v)));
        channel.push(Value::from(*c));
        time.push(Value::from(f64::from_bits(*t)));
        normalization.push(serde_json::to_value(n)?);
        for &i in indices {
            if let Some(column) = samples.get_mut(rows[i].sample.as_str()) {
                column[position] = Some(rows[i].value);
            }
        }
    }

    let mut object = Map::new();
    object.insert(columns::VOLUME.to_string(), Value::Array(volume));
    object.insert(columns::CHANNEL.to_string(), Value::Array(channel));
    object.insert(columns::TIME.to_string(), Value::Array(time));
    object.insert(columns::NORMALIZATION.to_string(), Value::Array(normalization));
    for (sample, values) in samples {
        object.insert(sample.to_string(), serde_json::to_value(values)?);
    }
    Ok(Value::Object(object))
}

/// Melt a pivot back into long-form rows, one per non-null sample cell.
pub(super) fn melt(value: &Value) -> Result<Vec<TraceRow>, CodecError> {
    let mut table = ColumnTable::from_value(value)?;
    let len = table.len();
    let volume = table
        .take(columns::VOLUME)?
        .iter()
        .enumerate()
        .map(|(i, v)| number(columns::VOLUME, i, v))
        .collect::<Result<Vec<_>, _>>()?;
    let channel = table
        .take(columns::CHANNEL)?
        .iter()
        .enumerate()
        .map(|(i, v)| text(columns::CHANNEL, i, v))
        .collect::<Result<Vec<_>, _>>()?;
    let time = table
        .take(columns::TIME)?
        .iter()
        .enumerate()
        .map(|(i, v)| number(columns::TIME, i, v))
        .collect::<Result<Vec<_>, _>>()?;
    let normalization = table
        .take(columns::NORMALIZATION)?
        .into_iter()
        .map(serde_json::from_value::<Normalization>)
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for (sample, values) in table.into_columns() {
        for (i, value) in values.iter().enumerate().take(len) {
            let Some(value) = value.as_f64() else {
                continue;
            };
            rows.push(TraceRow {
                time: time[i],
                volume: volume[i],
                channel: channel[i].clone(),
                sample: sample.clone(),
                normalization: normalization[i],
                value,
            });
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_keyed_columns() {
        let value = json!({
            "a": {"1": 20, "0": 10, "2": 30},
            "b": [1, 2, 3],
        });
        let mut table = ColumnTable::from_value(&value).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.take("a").unwrap(), vec![json!(10), json!(20), json!(30)]);
        assert!(matches!(table.take("a"), Err(CodecError::MissingColumn(_))));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let value = json!({"a": [1, 2], "b": [1]});
        assert!(matches!(ColumnTable::from_value(&value), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_melt_skips_null_cells() {
        let value = json!({
            "mL": [0.0, 0.5],
            "Channel": ["UV", "UV"],
            "Time": [0.0, 1.0],
            "Normalization": ["Signal", "Signal"],
            "A": [1.0, null],
            "B": [2.0, 3.0],
        });
        let rows = melt(&value).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|r| r.sample == "A").count(), 1);
    }

    #[test]
    fn test_numeric_channel_accepted() {
        let value = json!({
            "mL": [0.0],
            "Channel": [280],
            "Time": [0.0],
            "Normalization": ["Normalized"],
            "A": [0.5],
        });
        let rows = melt(&value).unwrap();
        assert_eq!(rows[0].channel, "280");
        assert_eq!(rows[0].normalization, Normalization::Normalized);
    }
}

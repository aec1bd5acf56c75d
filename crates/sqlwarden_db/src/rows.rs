//! Row decoding into ordered JSON mappings.

use serde_json::{Map, Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Decode a row by the runtime storage class of each value.
///
/// Integers and reals become JSON numbers, text stays text, blobs are
/// hex-encoded and NULL is `null`. Field order follows the select list.
pub fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>, sqlx::Error> {
    let mut map = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let idx = column.ordinal();
        let type_name = {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_ascii_uppercase())
            }
        };

        let value = match type_name.as_deref() {
            None => Value::Null,
            Some("INTEGER") | Some("INT") | Some("BIGINT") | Some("BOOLEAN") => {
                Value::from(row.try_get_unchecked::<i64, _>(idx)?)
            }
            Some("REAL") | Some("FLOAT") | Some("DOUBLE") | Some("NUMERIC") => {
                let float = row.try_get_unchecked::<f64, _>(idx)?;
                Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null)
            }
            Some("BLOB") => Value::String(hex::encode(row.try_get_unchecked::<Vec<u8>, _>(idx)?)),
            Some(_) => Value::String(row.try_get_unchecked::<String, _>(idx)?),
        };

        map.insert(column.name().to_string(), value);
    }

    Ok(map)
}

//! Serde-based mapping between rows and Storable types.
//!
//! Values travel through JSON in both directions, so a type only needs to
//! implement `Storable` and serde to be written and read back.

use claim_registry::{Storable, StorageResult, StoreError, Timestamp, Value};
use serde_json::Value as Json;
use sqlx::{Column, Row, postgres::PgRow};

/// Column/value pairs for every non-key column of `item`, in column order.
///
/// Serializes the item to JSON and looks each column up by its json key.
/// Datetime columns are parsed back from their RFC 3339 form.
pub fn row_values<T: Storable>(item: &T) -> StorageResult<Vec<(String, Value)>> {
    let json = serde_json::to_value(item)
        .map_err(|e| StoreError::Corrupt(format!("Serialization error: {}", e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| StoreError::Corrupt("Expected JSON object for Storable type".into()))?;

    let mut values = Vec::with_capacity(T::columns().len());
    for (column, json_key) in T::columns().iter().zip(T::json_keys()) {
        if *column == T::key_column() {
            continue;
        }
        let value = obj.get(*json_key).unwrap_or(&Json::Null);
        values.push((column.to_string(), json_to_value(value, T::column_type(column))?));
    }

    Ok(values)
}

fn json_to_value(value: &Json, col_type: &str) -> StorageResult<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::String(s) if col_type == "datetime" => {
            let dt = chrono::DateTime::parse_from_rfc3339(s)
                .map_err(|e| StoreError::Corrupt(format!("Invalid datetime: {}", e)))?;
            Ok(Value::Datetime(Timestamp::from(dt.with_timezone(&chrono::Utc))))
        }
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_u64().map(Value::UInt))
            .ok_or_else(|| StoreError::Corrupt(format!("Unsupported number: {}", n))),
        other => Err(StoreError::Corrupt(format!("Unsupported value: {}", other))),
    }
}

/// Deserialize a PostgreSQL row to a Storable type.
///
/// Extracts column values from the row using columns() and inserts them
/// into JSON using json_keys() to match serde's field naming.
/// Null values are omitted so optional fields fall back to their defaults.
pub fn deserialize_row<T: Storable>(row: &PgRow) -> StorageResult<T> {
    let mut obj = serde_json::Map::new();

    for (col_name, json_key) in T::columns().iter().zip(T::json_keys()) {
        let value = extract_column_value(row, col_name)?;
        if !value.is_null() {
            obj.insert((*json_key).to_string(), value);
        }
    }

    serde_json::from_value(Json::Object(obj))
        .map_err(|e| StoreError::Corrupt(format!("Deserialization error: {}", e)))
}

/// Extract a column value from a row as JSON
fn extract_column_value(row: &PgRow, col_name: &str) -> StorageResult<Json> {
    use sqlx::TypeInfo;

    let col_idx = row
        .columns()
        .iter()
        .position(|c| c.name() == col_name)
        .ok_or_else(|| StoreError::Corrupt(format!("Column not found: {}", col_name)))?;

    let type_name = row.columns()[col_idx].type_info().name();
    let read_err = |e: sqlx::Error| StoreError::Corrupt(format!("{}: {}", col_name, e));

    let value = match type_name {
        "INT2" | "INT4" | "INT8" => {
            let v: Option<i64> = row.try_get(col_idx).map_err(read_err)?;
            v.map(|n| Json::Number(n.into())).unwrap_or(Json::Null)
        }
        "TIMESTAMPTZ" | "TIMESTAMP" => {
            let v: Option<chrono::DateTime<chrono::Utc>> =
                row.try_get(col_idx).map_err(read_err)?;
            // Microsecond precision with Z, the same form Timestamp serializes to
            v.map(|dt| Json::String(dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)))
                .unwrap_or(Json::Null)
        }
        _ => {
            // VARCHAR, TEXT and the like
            let v: Option<String> = row.try_get(col_idx).map_err(read_err)?;
            v.map(Json::String).unwrap_or(Json::Null)
        }
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_registry::{Item, ItemId};

    fn item() -> Item {
        Item {
            id: ItemId(3),
            name: "Kettle".into(),
            description: None,
            claim: None,
            version: 2,
        }
    }

    #[test]
    fn row_values_skip_the_key_and_keep_nulls() {
        let values = row_values(&item()).unwrap();
        assert_eq!(
            values,
            vec![
                ("name".to_string(), Value::String("Kettle".into())),
                ("description".to_string(), Value::Null),
                ("claimed_by".to_string(), Value::Null),
                ("claimed_at".to_string(), Value::Null),
                ("version".to_string(), Value::Int(2)),
            ]
        );
    }

    #[test]
    fn claim_time_round_trips_as_a_datetime() {
        let at = Timestamp::now();
        let claimed = item().claimed("Alice".into(), at).unwrap();

        let values = row_values(&claimed).unwrap();
        assert!(values.contains(&("claimed_at".to_string(), Value::Datetime(at))));
        assert!(values.contains(&("claimed_by".to_string(), Value::String("Alice".into()))));
        assert!(values.contains(&("version".to_string(), Value::Int(3))));
    }
}

//! 文档与记录之间的类型映射
//!
//! `to_record` 按目标模式把 BSON 文档转换为记录，`to_document` 则按记录模式
//! 重建文档。扩展类型经由固定形状的包装结构往返，形状表见 [`ExtendedKind`]。

pub mod order;
pub mod shapes;

use crate::error::BridgeResult;
use crate::types::{DataType, DataValue, Record, StructType};
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use chrono::TimeZone;
use std::sync::Arc;

pub use order::{compare_bson, type_bracket};
pub use shapes::{bson_type_name, canonical_json, extended_kind_of, relaxed_text};

/// 映射选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperOptions {
    /// 把扩展类型映射为宽松扩展 JSON 字符串（会丢失扩展类型身份，必须显式开启）。
    /// 模式中的包装类型字段也得到字符串值，模式本身应先经过 [`StructType::extended_as_string`]
    pub extended_as_string: bool,
    /// 写入时省略值为空的字段
    pub ignore_null_values: bool,
}

/// 按目标模式把文档转换为记录
///
/// 模式中不存在的文档字段会被丢弃；模式字段缺失或为空时，若字段可空则得到 `Null`，
/// 否则返回 `SchemaMismatch`
pub fn to_record(document: &Document, schema: &Arc<StructType>, options: &MapperOptions) -> BridgeResult<Record> {
    let values = convert_fields(document, schema, "", options)?;
    Record::new(schema.clone(), values)
}

/// 按记录模式重建文档
pub fn to_document(record: &Record, options: &MapperOptions) -> BridgeResult<Document> {
    fields_to_document(record.schema(), record.values(), "", options)
}

/// 把单个 BSON 值转换为目标类型的记录值
pub fn bson_to_value(value: &Bson, data_type: &DataType, path: &str, options: &MapperOptions) -> BridgeResult<DataValue> {
    let mismatch = || crate::bridge_error!(mismatch, path, data_type, bson_type_name(value));

    if matches!(value, Bson::Null) {
        return Ok(DataValue::Null);
    }
    if options.extended_as_string && data_type.extended_kind().is_some() {
        return match extended_kind_of(value) {
            Some(_) => Ok(DataValue::String(relaxed_text(value))),
            None => Err(mismatch()),
        };
    }

    match data_type {
        DataType::Null => Err(mismatch()),
        DataType::Boolean => match value {
            Bson::Boolean(b) => Ok(DataValue::Bool(*b)),
            _ => Err(mismatch()),
        },
        DataType::Int32 => match value {
            Bson::Int32(i) => Ok(DataValue::Int32(*i)),
            _ => Err(mismatch()),
        },
        DataType::Int64 => match value {
            Bson::Int32(i) => Ok(DataValue::Int64(*i as i64)),
            Bson::Int64(i) => Ok(DataValue::Int64(*i)),
            _ => Err(mismatch()),
        },
        DataType::Double => match value {
            Bson::Int32(i) => Ok(DataValue::Double(*i as f64)),
            Bson::Int64(i) => Ok(DataValue::Double(*i as f64)),
            Bson::Double(d) => Ok(DataValue::Double(*d)),
            _ => Err(mismatch()),
        },
        // 字符串是最宽的类型，其他值以宽松扩展 JSON 文本表示
        DataType::String => Ok(DataValue::String(relaxed_text(value))),
        DataType::Binary => match value {
            Bson::Binary(bin) if bin.subtype == BinarySubtype::Generic => {
                Ok(DataValue::Bytes(bin.bytes.clone()))
            }
            _ => Err(mismatch()),
        },
        DataType::Timestamp => match value {
            Bson::DateTime(dt) => chrono::Utc
                .timestamp_millis_opt(dt.timestamp_millis())
                .single()
                .map(DataValue::Timestamp)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        DataType::Array { element, contains_null } => match value {
            Bson::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, idx);
                    if matches!(item, Bson::Null) && !contains_null {
                        return Err(crate::bridge_error!(mismatch, item_path, element, "null"));
                    }
                    out.push(bson_to_value(item, element, &item_path, options)?);
                }
                Ok(DataValue::Array(out))
            }
            _ => Err(mismatch()),
        },
        DataType::Struct(st) => match st.extended() {
            Some(kind) => {
                if extended_kind_of(value) != Some(kind) {
                    return Err(mismatch());
                }
                shapes::wrap(value).map(DataValue::Struct).ok_or_else(mismatch)
            }
            None => match value {
                Bson::Document(doc) => Ok(DataValue::Struct(convert_fields(doc, st, path, options)?)),
                _ => Err(mismatch()),
            },
        },
    }
}

/// 把记录值转换为 BSON 值
///
/// 给出类型时按类型重建扩展类型；不给类型时按值本身的形态转换，嵌套结构输出为数组
pub fn value_to_bson(value: &DataValue, data_type: Option<&DataType>, path: &str, options: &MapperOptions) -> BridgeResult<Bson> {
    let bson = match value {
        DataValue::Null => Bson::Null,
        DataValue::Bool(b) => Bson::Boolean(*b),
        DataValue::Int32(i) => Bson::Int32(*i),
        DataValue::Int64(i) => Bson::Int64(*i),
        DataValue::Double(d) => Bson::Double(*d),
        DataValue::String(s) => Bson::String(s.clone()),
        DataValue::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        DataValue::Timestamp(dt) => Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis())),
        DataValue::Array(items) => {
            let element = match data_type {
                Some(DataType::Array { element, .. }) => Some(element.as_ref()),
                _ => None,
            };
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                out.push(value_to_bson(item, element, &format!("{}[{}]", path, idx), options)?);
            }
            Bson::Array(out)
        }
        DataValue::Struct(items) => match data_type {
            Some(DataType::Struct(st)) => match st.extended() {
                Some(kind) => shapes::unwrap(kind, items, path)?,
                None => Bson::Document(fields_to_document(st, items, path, options)?),
            },
            Some(other) => {
                return Err(crate::bridge_error!(mismatch, path, other, value.type_name()));
            }
            None => {
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    out.push(value_to_bson(item, None, &format!("{}[{}]", path, idx), options)?);
                }
                Bson::Array(out)
            }
        },
    };
    Ok(bson)
}

/// 过滤条件值转换（不带模式信息）
pub fn data_value_to_bson(value: &DataValue) -> BridgeResult<Bson> {
    value_to_bson(value, None, "", &MapperOptions::default())
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn convert_fields(document: &Document, schema: &StructType, parent: &str, options: &MapperOptions) -> BridgeResult<Vec<DataValue>> {
    let mut values = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        let path = join_path(parent, &field.name);
        let value = match document.get(&field.name) {
            None | Some(Bson::Null) => {
                if !field.nullable {
                    let actual = if document.contains_key(&field.name) { "null" } else { "missing" };
                    return Err(crate::bridge_error!(mismatch, path, field.data_type, actual));
                }
                DataValue::Null
            }
            Some(value) => bson_to_value(value, &field.data_type, &path, options)?,
        };
        values.push(value);
    }
    Ok(values)
}

fn fields_to_document(schema: &StructType, values: &[DataValue], parent: &str, options: &MapperOptions) -> BridgeResult<Document> {
    if schema.len() != values.len() {
        return Err(crate::bridge_error!(
            mismatch,
            if parent.is_empty() { "<root>" } else { parent },
            format!("{} fields", schema.len()),
            format!("{} values", values.len())
        ));
    }

    let mut document = Document::new();
    for (field, value) in schema.fields().iter().zip(values) {
        if value.is_null() && (options.ignore_null_values || field.omit_when_null) {
            continue;
        }
        let path = join_path(parent, &field.name);
        document.insert(field.name.clone(), value_to_bson(value, Some(&field.data_type), &path, options)?);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{infer_schema, InferenceOptions};
    use crate::types::{ExtendedKind, StructField};
    use bson::oid::ObjectId;
    use bson::{doc, Decimal128, JavaScriptCodeWithScope, Regex, Timestamp};

    fn roundtrip(document: Document) -> Document {
        let schema = Arc::new(infer_schema(std::slice::from_ref(&document), &InferenceOptions::default()).unwrap());
        let options = MapperOptions::default();
        let record = to_record(&document, &schema, &options).unwrap();
        to_document(&record, &options).unwrap()
    }

    #[test]
    fn test_roundtrip_every_shape() {
        let mut decimal = [0u8; 16];
        decimal[0] = 0x7b;
        decimal[14] = 0x40;
        decimal[15] = 0x30;

        let original = doc! {
            "_id": ObjectId::new(),
            "name": "Frodo",
            "age": 50,
            "ring_years": 60_i64,
            "height": 1.22,
            "hobbit": true,
            "born": bson::DateTime::from_millis(1_000_000),
            "raw": Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2, 3] },
            "uuid": Binary { subtype: BinarySubtype::Uuid, bytes: vec![9; 16] },
            "pattern": Regex { pattern: "^ba".to_string(), options: "i".to_string() },
            "ts": Timestamp { time: 42, increment: 7 },
            "dec": Decimal128::from_bytes(decimal),
            "code": Bson::JavaScriptCode("return 1".to_string()),
            "scoped": JavaScriptCodeWithScope { code: "return x".to_string(), scope: doc! { "x": 1 } },
            "sym": Bson::Symbol("ring".to_string()),
            "undef": Bson::Undefined,
            "lo": Bson::MinKey,
            "hi": Bson::MaxKey,
            "tags": ["shire", "bag end"],
            "address": { "city": "Hobbiton", "zip": Bson::Null },
        };

        assert_eq!(roundtrip(original.clone()), original);
    }

    #[test]
    fn test_array_of_documents_keeps_absent_fields_absent() {
        let original = doc! { "items": [ { "a": 1 }, { "b": 2 }, { "a": Bson::Null, "b": 3 } ] };
        let written = roundtrip(original);
        println!("🔍 写回的数组: {:?}", written);
        // a 显式为 null 过，空值按 null 写回
        assert_eq!(
            written,
            doc! { "items": [ { "a": 1 }, { "a": Bson::Null, "b": 2 }, { "a": Bson::Null, "b": 3 } ] }
        );

        let original = doc! { "items": [ { "a": 1 }, { "b": 2 } ] };
        assert_eq!(roundtrip(original.clone()), original);
    }

    #[test]
    fn test_array_integer_widths_widen_together() {
        let written = roundtrip(doc! { "xs": [1_i32, 2_i64] });
        assert_eq!(written, doc! { "xs": [1_i64, 2_i64] });
    }

    #[test]
    fn test_missing_nullable_field_becomes_null() {
        let schema = Arc::new(StructType::new(vec![
            StructField::new("name", DataType::String, false),
            StructField::new("age", DataType::Int64, true),
        ]));
        let record = to_record(&doc! { "name": "Gandalf", "staff": true }, &schema, &MapperOptions::default()).unwrap();
        assert_eq!(record.get("age"), Some(&DataValue::Null));
        assert_eq!(record.values().len(), 2);
    }

    #[test]
    fn test_incompatible_value_is_mismatch() {
        let schema = Arc::new(StructType::new(vec![StructField::new("age", DataType::Int32, false)]));
        let err = to_record(&doc! { "age": "fifty" }, &schema, &MapperOptions::default()).unwrap_err();
        assert!(err.is_conversion_error());

        let err = to_record(&doc! {}, &schema, &MapperOptions::default()).unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::SchemaMismatch { ref actual, .. } if actual == "missing"));
    }

    #[test]
    fn test_numeric_widening_on_read() {
        let schema = Arc::new(StructType::new(vec![StructField::new("n", DataType::Double, false)]));
        let record = to_record(&doc! { "n": 3_i64 }, &schema, &MapperOptions::default()).unwrap();
        assert_eq!(record.get("n"), Some(&DataValue::Double(3.0)));
    }

    #[test]
    fn test_string_field_accepts_anything_as_text() {
        let schema = Arc::new(StructType::new(vec![StructField::new("v", DataType::String, true)]));
        let record = to_record(&doc! { "v": 12 }, &schema, &MapperOptions::default()).unwrap();
        assert_eq!(record.get("v"), Some(&DataValue::from("12")));
    }

    #[test]
    fn test_object_id_wrapper_shape() {
        let oid = ObjectId::new();
        let schema = Arc::new(StructType::new(vec![StructField::new("_id", ExtendedKind::ObjectId.data_type(), false)]));
        let record = to_record(&doc! { "_id": oid }, &schema, &MapperOptions::default()).unwrap();
        assert_eq!(record.get("_id"), Some(&DataValue::Struct(vec![DataValue::String(oid.to_hex())])));
    }

    #[test]
    fn test_extended_as_string_option_on_wrapper_field() {
        let oid = ObjectId::new();
        let schema = Arc::new(StructType::new(vec![StructField::new("_id", ExtendedKind::ObjectId.data_type(), false)]));
        let options = MapperOptions { extended_as_string: true, ..Default::default() };
        let record = to_record(&doc! { "_id": oid }, &schema, &options).unwrap();
        assert_eq!(record.get("_id"), Some(&DataValue::String(relaxed_text(&Bson::ObjectId(oid)))));

        assert!(to_record(&doc! { "_id": 7 }, &schema, &options).unwrap_err().is_conversion_error());
    }

    #[test]
    fn test_ignore_null_values_on_write() {
        let schema = Arc::new(StructType::new(vec![
            StructField::new("name", DataType::String, false),
            StructField::new("age", DataType::Int32, true),
        ]));
        let record = Record::new(schema, vec![DataValue::from("Sam"), DataValue::Null]).unwrap();

        let kept = to_document(&record, &MapperOptions::default()).unwrap();
        assert_eq!(kept, doc! { "name": "Sam", "age": Bson::Null });

        let options = MapperOptions { ignore_null_values: true, ..Default::default() };
        assert_eq!(to_document(&record, &options).unwrap(), doc! { "name": "Sam" });
    }
}

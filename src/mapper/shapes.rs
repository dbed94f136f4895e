//! 扩展类型与包装结构之间的互转

use crate::error::BridgeResult;
use crate::types::{DataValue, ExtendedKind};
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Decimal128, JavaScriptCodeWithScope, Regex, Timestamp};

/// 判断 BSON 值属于哪种扩展类型，原生类型返回 None
pub fn extended_kind_of(value: &Bson) -> Option<ExtendedKind> {
    match value {
        Bson::ObjectId(_) => Some(ExtendedKind::ObjectId),
        Bson::Binary(bin) if bin.subtype != BinarySubtype::Generic => {
            Some(ExtendedKind::BinaryWithSubtype)
        }
        Bson::RegularExpression(_) => Some(ExtendedKind::RegularExpression),
        Bson::Timestamp(_) => Some(ExtendedKind::Timestamp),
        Bson::Decimal128(_) => Some(ExtendedKind::Decimal128),
        Bson::JavaScriptCode(_) => Some(ExtendedKind::JavaScriptCode),
        Bson::JavaScriptCodeWithScope(_) => Some(ExtendedKind::JavaScriptCodeWithScope),
        Bson::Symbol(_) => Some(ExtendedKind::Symbol),
        Bson::Undefined => Some(ExtendedKind::Undefined),
        Bson::MinKey => Some(ExtendedKind::MinKey),
        Bson::MaxKey => Some(ExtendedKind::MaxKey),
        Bson::DbPointer(_) => Some(ExtendedKind::DbPointer),
        _ => None,
    }
}

/// 把扩展类型值拆成包装结构的字段值（按形状表顺序）
pub(crate) fn wrap(value: &Bson) -> Option<Vec<DataValue>> {
    let values = match value {
        Bson::ObjectId(oid) => vec![DataValue::String(oid.to_hex())],
        Bson::Binary(bin) => vec![
            DataValue::Int32(u8::from(bin.subtype) as i32),
            DataValue::Bytes(bin.bytes.clone()),
        ],
        Bson::RegularExpression(regex) => vec![
            DataValue::String(regex.pattern.clone()),
            DataValue::String(regex.options.clone()),
        ],
        Bson::Timestamp(ts) => vec![
            DataValue::Int64(ts.time as i64),
            DataValue::Int64(ts.increment as i64),
        ],
        Bson::Decimal128(dec) => vec![DataValue::Bytes(dec.bytes().to_vec())],
        Bson::JavaScriptCode(code) => vec![DataValue::String(code.clone())],
        Bson::JavaScriptCodeWithScope(cws) => vec![
            DataValue::String(cws.code.clone()),
            DataValue::String(canonical_json(&Bson::Document(cws.scope.clone()))),
        ],
        Bson::Symbol(symbol) => vec![DataValue::String(symbol.clone())],
        Bson::Undefined => vec![DataValue::Bool(true)],
        Bson::MinKey => vec![DataValue::Int32(1)],
        Bson::MaxKey => vec![DataValue::Int32(1)],
        Bson::DbPointer(_) => vec![DataValue::String(canonical_json(value))],
        _ => return None,
    };
    Some(values)
}

/// 从包装结构的字段值重建扩展类型
pub(crate) fn unwrap(kind: ExtendedKind, values: &[DataValue], path: &str) -> BridgeResult<Bson> {
    let shape = kind.struct_type();
    if values.len() != shape.len() {
        return Err(crate::bridge_error!(
            mismatch,
            path,
            kind.data_type(),
            format!("struct with {} values", values.len())
        ));
    }
    let field_path = |idx: usize| format!("{}.{}", path, shape.fields()[idx].name);

    let bson = match kind {
        ExtendedKind::ObjectId => {
            let hex = expect_str(&values[0], &field_path(0))?;
            let oid = bson::oid::ObjectId::parse_str(hex)
                .map_err(|_| crate::bridge_error!(mismatch, field_path(0), "objectId hex", hex))?;
            Bson::ObjectId(oid)
        }
        ExtendedKind::BinaryWithSubtype => {
            let subtype = expect_i64(&values[0], &field_path(0))?;
            let subtype = u8::try_from(subtype)
                .map_err(|_| crate::bridge_error!(mismatch, field_path(0), "binary subtype", subtype))?;
            Bson::Binary(Binary {
                subtype: BinarySubtype::from(subtype),
                bytes: expect_bytes(&values[1], &field_path(1))?.to_vec(),
            })
        }
        ExtendedKind::RegularExpression => Bson::RegularExpression(Regex {
            pattern: expect_str(&values[0], &field_path(0))?.to_string(),
            options: expect_str(&values[1], &field_path(1))?.to_string(),
        }),
        ExtendedKind::Timestamp => {
            let time = expect_u32(&values[0], &field_path(0))?;
            let increment = expect_u32(&values[1], &field_path(1))?;
            Bson::Timestamp(Timestamp { time, increment })
        }
        ExtendedKind::Decimal128 => {
            let bytes = expect_bytes(&values[0], &field_path(0))?;
            let raw: [u8; 16] = bytes.try_into().map_err(|_| {
                crate::bridge_error!(mismatch, field_path(0), "16 bytes", format!("{} bytes", bytes.len()))
            })?;
            Bson::Decimal128(Decimal128::from_bytes(raw))
        }
        ExtendedKind::JavaScriptCode => {
            Bson::JavaScriptCode(expect_str(&values[0], &field_path(0))?.to_string())
        }
        ExtendedKind::JavaScriptCodeWithScope => {
            let code = expect_str(&values[0], &field_path(0))?.to_string();
            let scope = match parse_extended_json(expect_str(&values[1], &field_path(1))?, &field_path(1))? {
                Bson::Document(doc) => doc,
                other => {
                    return Err(crate::bridge_error!(mismatch, field_path(1), "document", bson_type_name(&other)));
                }
            };
            Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope { code, scope })
        }
        ExtendedKind::Symbol => Bson::Symbol(expect_str(&values[0], &field_path(0))?.to_string()),
        ExtendedKind::Undefined => Bson::Undefined,
        ExtendedKind::MinKey => Bson::MinKey,
        ExtendedKind::MaxKey => Bson::MaxKey,
        ExtendedKind::DbPointer => {
            let parsed = parse_extended_json(expect_str(&values[0], &field_path(0))?, &field_path(0))?;
            if !matches!(parsed, Bson::DbPointer(_)) {
                return Err(crate::bridge_error!(mismatch, field_path(0), "dbPointer", bson_type_name(&parsed)));
            }
            parsed
        }
    };
    Ok(bson)
}

/// 规范扩展 JSON 文本
pub fn canonical_json(value: &Bson) -> String {
    value.clone().into_canonical_extjson().to_string()
}

/// 宽松扩展 JSON 文本，字符串本身不加引号
pub fn relaxed_text(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        other => other.clone().into_relaxed_extjson().to_string(),
    }
}

fn parse_extended_json(text: &str, path: &str) -> BridgeResult<Bson> {
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| crate::bridge_error!(mismatch, path, "extended JSON", e))?;
    Bson::try_from(json).map_err(|e| crate::bridge_error!(mismatch, path, "extended JSON", e))
}

/// BSON 值的类型名，用于错误消息
pub fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal",
        Bson::Undefined => "undefined",
        Bson::MaxKey => "maxKey",
        Bson::MinKey => "minKey",
        Bson::DbPointer(_) => "dbPointer",
    }
}

fn expect_str<'a>(value: &'a DataValue, path: &str) -> BridgeResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| crate::bridge_error!(mismatch, path, "string", value.type_name()))
}

fn expect_i64(value: &DataValue, path: &str) -> BridgeResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| crate::bridge_error!(mismatch, path, "integer", value.type_name()))
}

fn expect_u32(value: &DataValue, path: &str) -> BridgeResult<u32> {
    let n = expect_i64(value, path)?;
    u32::try_from(n).map_err(|_| crate::bridge_error!(mismatch, path, "u32", n))
}

fn expect_bytes<'a>(value: &'a DataValue, path: &str) -> BridgeResult<&'a [u8]> {
    match value {
        DataValue::Bytes(bytes) => Ok(bytes),
        other => Err(crate::bridge_error!(mismatch, path, "binary", other.type_name())),
    }
}

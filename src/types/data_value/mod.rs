use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 记录单元格的值 - 与 `DataType` 一一对应的强类型表示
///
/// 嵌套结构按位置存放字段值，字段名由所属 `StructType` 给出
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    /// 空值
    Null,
    /// 布尔值
    Bool(bool),
    /// 32位整数
    Int32(i32),
    /// 64位整数
    Int64(i64),
    /// 双精度浮点数
    Double(f64),
    /// 字符串
    String(String),
    /// 字节数组
    Bytes(Vec<u8>),
    /// UTC时间戳（毫秒精度）
    Timestamp(DateTime<Utc>),
    /// 数组
    Array(Vec<DataValue>),
    /// 嵌套结构（按模式字段顺序）
    Struct(Vec<DataValue>),
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Null => write!(f, "null"),
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Int32(i) => write!(f, "{}", i),
            DataValue::Int64(i) => write!(f, "{}", i),
            DataValue::Double(d) => write!(f, "{}", d),
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Bytes(bytes) => write!(f, "[{} bytes]", bytes.len()),
            DataValue::Timestamp(dt) => write!(f, "{}", dt.to_rfc3339()),
            DataValue::Array(_) | DataValue::Struct(_) => {
                write!(f, "{}", self.to_json_value())
            }
        }
    }
}

impl std::fmt::Debug for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Debug 与 Display 保持一致，显示实际值而不是类型构造函数
        write!(f, "{}", self)
    }
}

impl DataValue {
    /// 获取数据类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "boolean",
            DataValue::Int32(_) => "int",
            DataValue::Int64(_) => "bigint",
            DataValue::Double(_) => "double",
            DataValue::String(_) => "string",
            DataValue::Bytes(_) => "binary",
            DataValue::Timestamp(_) => "timestamp",
            DataValue::Array(_) => "array",
            DataValue::Struct(_) => "struct",
        }
    }

    /// 判断是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// 以字符串切片读取
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// 以i64读取，Int32 会被放宽
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Int32(i) => Some(*i as i64),
            DataValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// 以f64读取，整数会被放宽
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Int32(i) => Some(*i as f64),
            DataValue::Int64(i) => Some(*i as f64),
            DataValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// 转换为 JSON 值（不携带字段名，结构按数组输出）
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            DataValue::Null => serde_json::Value::Null,
            DataValue::Bool(b) => serde_json::Value::Bool(*b),
            DataValue::Int32(i) => serde_json::Value::Number((*i).into()),
            DataValue::Int64(i) => serde_json::Value::Number((*i).into()),
            DataValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DataValue::String(s) => serde_json::Value::String(s.clone()),
            DataValue::Bytes(b) => {
                // 将字节数组转换为 base64 字符串
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            DataValue::Timestamp(dt) => serde_json::Value::String(dt.to_rfc3339()),
            DataValue::Array(items) | DataValue::Struct(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json_value()).collect())
            }
        }
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(value)
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        DataValue::Int32(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Int64(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Double(value)
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(value: Vec<u8>) -> Self {
        DataValue::Bytes(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Timestamp(value)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors_widen() {
        assert_eq!(DataValue::Int32(7).as_i64(), Some(7));
        assert_eq!(DataValue::Int64(7).as_f64(), Some(7.0));
        assert_eq!(DataValue::String("7".into()).as_i64(), None);
    }

    #[test]
    fn test_display_nested() {
        let value = DataValue::Array(vec![DataValue::Int32(1), DataValue::Null]);
        assert_eq!(value.to_string(), "[1,null]");
        assert_eq!(DataValue::from(None::<i32>), DataValue::Null);
    }
}

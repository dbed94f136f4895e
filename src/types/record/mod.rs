use crate::error::{BridgeError, BridgeResult};
use crate::types::data_value::DataValue;
use crate::types::schema::StructType;
use std::sync::Arc;

/// 计算引擎侧的一行记录
///
/// 值按模式字段顺序排列；模式通过 `Arc` 在同一次读取的所有记录间共享
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<StructType>,
    values: Vec<DataValue>,
}

impl Record {
    /// 创建记录，值的数量必须与模式字段数量一致
    pub fn new(schema: Arc<StructType>, values: Vec<DataValue>) -> BridgeResult<Self> {
        if schema.len() != values.len() {
            return Err(BridgeError::ValidationError {
                field: "values".to_string(),
                message: crate::i18n::tf(
                    "error.record_arity",
                    &[
                        ("expected", schema.len().to_string()),
                        ("actual", values.len().to_string()),
                    ],
                ),
            });
        }
        Ok(Self { schema, values })
    }

    /// 按字段名和值构造记录，便于测试和手工组装
    pub fn from_pairs<I, S>(schema: Arc<StructType>, pairs: I) -> BridgeResult<Self>
    where
        I: IntoIterator<Item = (S, DataValue)>,
        S: AsRef<str>,
    {
        let mut values = vec![DataValue::Null; schema.len()];
        for (name, value) in pairs {
            let idx = schema.index_of(name.as_ref()).ok_or_else(|| {
                crate::bridge_error!(validation, name.as_ref(), "字段不在记录模式中")
            })?;
            values[idx] = value;
        }
        Self::new(schema, values)
    }

    pub fn schema(&self) -> &Arc<StructType> {
        &self.schema
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<DataValue> {
        self.values
    }

    /// 按字段名读取值
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.schema.index_of(name).map(|idx| &self.values[idx])
    }

    /// 按点分路径读取嵌套值
    pub fn get_path(&self, path: &str) -> Option<&DataValue> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut value = self.get(first)?;
        let mut schema = self.schema.as_ref();
        let mut current_name = first;
        for part in parts {
            let nested = match &schema.field(current_name)?.data_type {
                crate::types::schema::DataType::Struct(st) => st,
                _ => return None,
            };
            let idx = nested.index_of(part)?;
            value = match value {
                DataValue::Struct(items) => items.get(idx)?,
                _ => return None,
            };
            schema = nested;
            current_name = part;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::{DataType, StructField};

    fn person_schema() -> Arc<StructType> {
        let address = StructType::new(vec![StructField::new("city", DataType::String, true)]);
        Arc::new(StructType::new(vec![
            StructField::new("name", DataType::String, false),
            StructField::new("address", DataType::Struct(address), true),
        ]))
    }

    #[test]
    fn test_arity_checked() {
        let result = Record::new(person_schema(), vec![DataValue::from("Frodo")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_path() {
        let record = Record::from_pairs(
            person_schema(),
            [
                ("name", DataValue::from("Frodo")),
                ("address", DataValue::Struct(vec![DataValue::from("Hobbiton")])),
            ],
        )
        .unwrap();

        assert_eq!(record.get("name"), Some(&DataValue::from("Frodo")));
        assert_eq!(record.get_path("address.city"), Some(&DataValue::from("Hobbiton")));
        assert_eq!(record.get_path("address.zip"), None);
    }
}

//! 写入配置

use crate::config::keys;
use crate::config::options::{invalid_option, ConnectorOptions};
use crate::error::BridgeResult;
use crate::mapper::MapperOptions;
use crate::types::{Namespace, SaveMode, WriteOperation};
use std::sync::Arc;

/// 默认批大小
pub const DEFAULT_MAX_BATCH_SIZE: usize = 512;

/// 写入配置
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConfig {
    pub namespace: Namespace,
    pub save_mode: SaveMode,
    pub operation: WriteOperation,
    /// 每批最多写入的文档数
    pub max_batch_size: usize,
    /// 有序写入：第一个失败之后的文档不再尝试
    pub ordered: bool,
    pub ignore_null_values: bool,
    /// 写关注 `w` 值
    pub write_concern: Option<String>,
}

impl WriteConfig {
    pub fn builder() -> WriteConfigBuilder {
        WriteConfigBuilder::new()
    }

    /// 按 调用选项 > 连接默认值 > 进程默认值 解析
    pub fn resolve(call: &ConnectorOptions, connection: &ConnectorOptions) -> BridgeResult<Arc<Self>> {
        let options = ConnectorOptions::layered(call, connection);
        Ok(Arc::new(Self::from_options(&options)?))
    }

    pub fn from_options(options: &ConnectorOptions) -> BridgeResult<Self> {
        let namespace = Namespace::new(options.require(keys::DATABASE)?, options.require(keys::COLLECTION)?);
        crate::security::validate_namespace(&namespace)?;

        let save_mode = match options.get(keys::WRITE_SAVE_MODE) {
            None => SaveMode::default(),
            Some(raw) => SaveMode::parse(raw.trim()).ok_or_else(|| invalid_option(keys::WRITE_SAVE_MODE, raw))?,
        };

        let id_fields: Vec<String> = options
            .get(keys::WRITE_ID_FIELD_LIST)
            .unwrap_or("_id")
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if id_fields.is_empty() {
            return Err(invalid_option(keys::WRITE_ID_FIELD_LIST, options.get(keys::WRITE_ID_FIELD_LIST).unwrap_or("")));
        }
        for field in &id_fields {
            crate::security::validate_field_path(field)?;
        }

        let operation = match options.get(keys::WRITE_OPERATION_TYPE).map(|s| s.trim().to_ascii_lowercase()) {
            None => WriteOperation::Insert,
            Some(op) if op == "insert" => WriteOperation::Insert,
            Some(op) if op == "replace" => WriteOperation::Replace { id_fields },
            Some(op) => return Err(invalid_option(keys::WRITE_OPERATION_TYPE, &op)),
        };

        let max_batch_size = options.parse::<usize>(keys::WRITE_MAX_BATCH_SIZE)?.unwrap_or(DEFAULT_MAX_BATCH_SIZE);
        if max_batch_size == 0 {
            return Err(invalid_option(keys::WRITE_MAX_BATCH_SIZE, "0"));
        }

        Ok(Self {
            namespace,
            save_mode,
            operation,
            max_batch_size,
            ordered: options.get_bool(keys::WRITE_ORDERED)?.unwrap_or(true),
            ignore_null_values: options.get_bool(keys::WRITE_IGNORE_NULL_VALUES)?.unwrap_or(false),
            write_concern: options.get(keys::WRITE_CONCERN_W).map(|w| w.trim().to_string()),
        })
    }

    pub fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            extended_as_string: false,
            ignore_null_values: self.ignore_null_values,
        }
    }
}

/// 写入配置构建器，生成调用级配置项
#[derive(Debug, Default)]
pub struct WriteConfigBuilder {
    options: ConnectorOptions,
}

impl WriteConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.options.set(keys::DATABASE, database.into());
        self
    }

    pub fn collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.options.set(keys::COLLECTION, collection.into());
        self
    }

    pub fn save_mode(mut self, save_mode: SaveMode) -> Self {
        self.options.set(keys::WRITE_SAVE_MODE, save_mode.as_str());
        self
    }

    /// 按 id 字段替换写入
    pub fn replace_by<I, S>(mut self, id_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = id_fields.into_iter().map(|f| f.as_ref().to_string()).collect();
        self.options.set(keys::WRITE_OPERATION_TYPE, "replace");
        self.options.set(keys::WRITE_ID_FIELD_LIST, fields.join(","));
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.options.set(keys::WRITE_MAX_BATCH_SIZE, size);
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.options.set(keys::WRITE_ORDERED, ordered);
        self
    }

    pub fn ignore_null_values(mut self, enabled: bool) -> Self {
        self.options.set(keys::WRITE_IGNORE_NULL_VALUES, enabled);
        self
    }

    pub fn write_concern<S: Into<String>>(mut self, w: S) -> Self {
        self.options.set(keys::WRITE_CONCERN_W, w.into());
        self
    }

    pub fn build(self) -> ConnectorOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ConnectorOptions {
        ConnectorOptions::new()
            .with(keys::DATABASE, "middle_earth")
            .with(keys::COLLECTION, "people")
    }

    #[test]
    fn test_defaults_are_append_insert() {
        let config = WriteConfig::from_options(&base()).unwrap();
        assert_eq!(config.save_mode, SaveMode::Append);
        assert_eq!(config.operation, WriteOperation::Insert);
        assert_eq!(config.max_batch_size, 512);
        assert!(config.ordered);
        assert_eq!(config.write_concern, None);
    }

    #[test]
    fn test_replace_with_id_fields() {
        let call = WriteConfig::builder()
            .save_mode(SaveMode::Overwrite)
            .replace_by(["name", "age"])
            .ordered(false)
            .build();
        let config = WriteConfig::resolve(&call, &base()).unwrap();
        assert_eq!(config.save_mode, SaveMode::Overwrite);
        assert_eq!(
            config.operation,
            WriteOperation::Replace { id_fields: vec!["name".to_string(), "age".to_string()] }
        );
        assert!(!config.ordered);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(WriteConfig::from_options(&base().with(keys::WRITE_SAVE_MODE, "truncate")).is_err());
        assert!(WriteConfig::from_options(&base().with(keys::WRITE_MAX_BATCH_SIZE, "0")).is_err());
        assert!(WriteConfig::from_options(&base().with(keys::WRITE_OPERATION_TYPE, "upsert")).is_err());
        assert!(
            WriteConfig::from_options(&base().with(keys::WRITE_OPERATION_TYPE, "replace").with(keys::WRITE_ID_FIELD_LIST, " , "))
                .is_err()
        );
    }
}

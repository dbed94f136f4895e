//! 读取配置

use crate::config::keys;
use crate::config::options::{invalid_option, ConnectorOptions};
use crate::error::BridgeResult;
use crate::inference::{InferenceOptions, DEFAULT_SAMPLE_SIZE};
use crate::mapper::MapperOptions;
use crate::partition::{PartitionerOptions, DEFAULT_PARTITION_FIELD, DEFAULT_PARTITION_SIZE};
use crate::types::{Namespace, PartitionerKind, QueryConditionGroup, ReadPreference};
use std::sync::Arc;

/// 读取配置，解析后不可变，在同一次读取的所有分区间共享
#[derive(Debug, Clone, PartialEq)]
pub struct ReadConfig {
    pub namespace: Namespace,
    pub read_preference: ReadPreference,
    /// 模式推断的采样数
    pub sample_size: usize,
    pub pushdown_enabled: bool,
    /// 游标批大小，None 使用驱动默认值
    pub batch_size: Option<u32>,
    pub partitioner: PartitionerOptions,
    /// 第一个转换错误即终止分区读取
    pub strict_conversion: bool,
    /// 扩展类型按扩展 JSON 文本读取
    pub extended_as_string: bool,
    /// 计算引擎传入的过滤条件（彼此为 AND 关系）
    pub filters: Vec<QueryConditionGroup>,
}

impl ReadConfig {
    /// 创建读取配置构建器
    pub fn builder() -> ReadConfigBuilder {
        ReadConfigBuilder::new()
    }

    /// 按 调用选项 > 连接默认值 > 进程默认值 解析
    pub fn resolve(call: &ConnectorOptions, connection: &ConnectorOptions) -> BridgeResult<Arc<Self>> {
        let options = ConnectorOptions::layered(call, connection);
        Ok(Arc::new(Self::from_options(&options)?))
    }

    /// 从已合并的配置解析
    pub fn from_options(options: &ConnectorOptions) -> BridgeResult<Self> {
        let namespace = Namespace::new(options.require(keys::DATABASE)?, options.require(keys::COLLECTION)?);
        crate::security::validate_namespace(&namespace)?;

        let read_preference = match options.get(keys::READ_PREFERENCE) {
            None => ReadPreference::default(),
            Some(raw) => ReadPreference::parse(raw.trim()).ok_or_else(|| invalid_option(keys::READ_PREFERENCE, raw))?,
        };

        let kind = match options.get(keys::READ_PARTITIONER) {
            None => PartitionerKind::default(),
            Some(raw) => PartitionerKind::parse(raw.trim()).ok_or_else(|| invalid_option(keys::READ_PARTITIONER, raw))?,
        };

        let sample_size = options.parse::<usize>(keys::READ_SAMPLE_SIZE)?.unwrap_or(DEFAULT_SAMPLE_SIZE);
        if sample_size == 0 {
            return Err(invalid_option(keys::READ_SAMPLE_SIZE, "0"));
        }
        let partition_size = options.parse::<u64>(keys::READ_PARTITION_SIZE)?.unwrap_or(DEFAULT_PARTITION_SIZE);
        if partition_size == 0 {
            return Err(invalid_option(keys::READ_PARTITION_SIZE, "0"));
        }
        let partition_field = options
            .get(keys::READ_PARTITION_FIELD)
            .map(|f| f.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PARTITION_FIELD.to_string());
        crate::security::validate_field_path(&partition_field)?;

        let filters = match options.get(keys::READ_FILTER) {
            None => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<QueryConditionGroup>>(raw)
                .map_err(|e| invalid_option(keys::READ_FILTER, &e.to_string()))?,
        };

        Ok(Self {
            namespace,
            read_preference,
            sample_size,
            pushdown_enabled: options.get_bool(keys::READ_PUSHDOWN_ENABLED)?.unwrap_or(true),
            batch_size: options.parse::<u32>(keys::READ_BATCH_SIZE)?,
            partitioner: PartitionerOptions {
                kind,
                partition_field,
                partition_size,
                fallback_to_single: options.get_bool(keys::READ_FALLBACK_TO_SINGLE)?.unwrap_or(false),
                read_preference,
            },
            strict_conversion: options.get_bool(keys::READ_STRICT_CONVERSION)?.unwrap_or(false),
            extended_as_string: options.get_bool(keys::READ_EXTENDED_AS_STRINGS)?.unwrap_or(false),
            filters,
        })
    }

    pub fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            extended_as_string: self.extended_as_string,
            ignore_null_values: false,
        }
    }

    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            sample_size: self.sample_size,
            extended_as_string: self.extended_as_string,
            ..Default::default()
        }
    }
}

/// 读取配置构建器，生成调用级配置项
#[derive(Debug, Default)]
pub struct ReadConfigBuilder {
    options: ConnectorOptions,
    filters: Vec<QueryConditionGroup>,
}

impl ReadConfigBuilder {
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

    pub fn read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.options.set(keys::READ_PREFERENCE, read_preference.as_str());
        self
    }

    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.options.set(keys::READ_SAMPLE_SIZE, sample_size);
        self
    }

    pub fn pushdown(mut self, enabled: bool) -> Self {
        self.options.set(keys::READ_PUSHDOWN_ENABLED, enabled);
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.options.set(keys::READ_BATCH_SIZE, batch_size);
        self
    }

    pub fn partitioner(mut self, kind: PartitionerKind) -> Self {
        self.options.set(keys::READ_PARTITIONER, kind.as_str());
        self
    }

    pub fn partition_field<S: Into<String>>(mut self, field: S) -> Self {
        self.options.set(keys::READ_PARTITION_FIELD, field.into());
        self
    }

    pub fn partition_size(mut self, size: u64) -> Self {
        self.options.set(keys::READ_PARTITION_SIZE, size);
        self
    }

    pub fn fallback_to_single(mut self, enabled: bool) -> Self {
        self.options.set(keys::READ_FALLBACK_TO_SINGLE, enabled);
        self
    }

    pub fn strict_conversion(mut self, enabled: bool) -> Self {
        self.options.set(keys::READ_STRICT_CONVERSION, enabled);
        self
    }

    pub fn extended_types_as_strings(mut self, enabled: bool) -> Self {
        self.options.set(keys::READ_EXTENDED_AS_STRINGS, enabled);
        self
    }

    /// 追加过滤条件
    pub fn filter(mut self, filter: QueryConditionGroup) -> Self {
        self.filters.push(filter);
        self
    }

    /// 生成调用级配置项
    pub fn build(self) -> BridgeResult<ConnectorOptions> {
        let mut options = self.options;
        if !self.filters.is_empty() {
            options.set(keys::READ_FILTER, serde_json::to_string(&self.filters)?);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueryCondition, QueryOperator};

    #[test]
    fn test_defaults() {
        let options = ConnectorOptions::new()
            .with(keys::DATABASE, "middle_earth")
            .with(keys::COLLECTION, "people");
        let config = ReadConfig::from_options(&options).unwrap();
        assert_eq!(config.sample_size, 1000);
        assert!(config.pushdown_enabled);
        assert_eq!(config.partitioner.kind, PartitionerKind::PaginateBySize);
        assert_eq!(config.partitioner.partition_size, 10_000);
        assert_eq!(config.partitioner.partition_field, "_id");
        assert!(!config.partitioner.fallback_to_single);
        assert!(!config.strict_conversion);
        assert_eq!(config.read_preference, ReadPreference::Primary);
    }

    #[test]
    fn test_missing_namespace_is_config_error() {
        let err = ReadConfig::from_options(&ConnectorOptions::new().with(keys::DATABASE, "db")).unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::ConfigError { .. }));
    }

    #[test]
    fn test_builder_round_trips_filters() {
        let options = ReadConfig::builder()
            .database("middle_earth")
            .collection("people")
            .partitioner(PartitionerKind::Single)
            .read_preference(ReadPreference::SecondaryPreferred)
            .filter(QueryCondition::new("age", QueryOperator::Lt, 100).into())
            .build()
            .unwrap();

        let config = ReadConfig::resolve(&options, &ConnectorOptions::new()).unwrap();
        assert_eq!(config.partitioner.kind, PartitionerKind::Single);
        assert_eq!(config.partitioner.read_preference, ReadPreference::SecondaryPreferred);
        assert_eq!(config.filters, vec![QueryCondition::new("age", QueryOperator::Lt, 100).into()]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ConnectorOptions::new()
            .with(keys::DATABASE, "db")
            .with(keys::COLLECTION, "c");
        assert!(ReadConfig::from_options(&base.clone().with(keys::READ_PARTITIONER, "bogus")).is_err());
        assert!(ReadConfig::from_options(&base.clone().with(keys::READ_SAMPLE_SIZE, "0")).is_err());
        assert!(ReadConfig::from_options(&base.with(keys::READ_FILTER, "not json")).is_err());
    }
}

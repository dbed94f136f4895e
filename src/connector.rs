//! 连接器入口
//!
//! 持有一个文档存储和连接级默认配置。读写调用传入的配置项优先于连接默认值，
//! 连接默认值优先于进程默认值。

use crate::adapter::{create_store, DocumentStore};
use crate::config::{keys, pool_config, ConnectorOptions, ReadConfig, WriteConfig};
use crate::engine::{CollectionSink, CollectionSource};
use crate::error::BridgeResult;
use crate::reader::{read, ReadSession};
use crate::types::{Record, StructType};
use crate::writer::{write, WriteResult};
use rat_logger::info;
use std::sync::Arc;

/// 连接器
pub struct Connector {
    store: Arc<dyn DocumentStore>,
    defaults: ConnectorOptions,
}

impl Connector {
    /// 按 `connection.uri` 和连接池配置建立连接
    pub async fn connect(defaults: ConnectorOptions) -> BridgeResult<Self> {
        let merged = defaults.merged_over(crate::config::process_defaults());
        let uri = merged.require(keys::CONNECTION_URI)?;
        let pool = pool_config(&merged)?;
        let store = create_store(uri, &pool).await?;
        info!("连接器已创建，存储后端: {}", store.name());
        Ok(Self { store, defaults })
    }

    /// 使用已有存储
    pub fn with_store(store: Arc<dyn DocumentStore>, defaults: ConnectorOptions) -> Self {
        Self { store, defaults }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn defaults(&self) -> &ConnectorOptions {
        &self.defaults
    }

    pub fn read_config(&self, options: &ConnectorOptions) -> BridgeResult<Arc<ReadConfig>> {
        ReadConfig::resolve(options, &self.defaults)
    }

    pub fn write_config(&self, options: &ConnectorOptions) -> BridgeResult<Arc<WriteConfig>> {
        WriteConfig::resolve(options, &self.defaults)
    }

    /// 规划一次读取
    pub async fn read(&self, options: &ConnectorOptions, schema: Option<StructType>) -> BridgeResult<ReadSession> {
        read(self.store.clone(), self.read_config(options)?, schema).await
    }

    /// 写入记录
    pub async fn write(&self, records: &[Record], options: &ConnectorOptions) -> BridgeResult<WriteResult> {
        let config = self.write_config(options)?;
        write(self.store.as_ref(), records, &config).await
    }

    /// 计算引擎使用的数据源
    pub async fn source(&self, options: &ConnectorOptions, schema: Option<StructType>) -> BridgeResult<CollectionSource> {
        CollectionSource::open(self.store.clone(), self.read_config(options)?, schema).await
    }

    /// 计算引擎使用的写入目标
    pub fn sink(&self, options: &ConnectorOptions) -> BridgeResult<CollectionSink> {
        Ok(CollectionSink::new(self.store.clone(), self.write_config(options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_uri() {
        assert!(Connector::connect(ConnectorOptions::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_rejected() {
        let options = ConnectorOptions::new().with(keys::CONNECTION_URI, "redis://localhost");
        let err = Connector::connect(options).await.err().unwrap();
        assert!(matches!(err, crate::error::BridgeError::UnsupportedStore { .. }));
    }

    #[tokio::test]
    async fn test_memory_connection() {
        let options = ConnectorOptions::new()
            .with(keys::CONNECTION_URI, "memory://connector-test")
            .with(keys::DATABASE, "middle_earth");
        let connector = Connector::connect(options).await.unwrap();
        assert_eq!(connector.store().name(), "memory");

        let config = connector
            .read_config(&ConnectorOptions::new().with(keys::COLLECTION, "people"))
            .unwrap();
        assert_eq!(config.namespace.to_string(), "middle_earth.people");
    }
}

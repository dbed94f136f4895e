//! MongoDB存储模块
//!
//! 基于官方驱动实现文档存储接口。驱动自带连接池，每个打开的游标
//! 在读取期间独占一个池化连接，游标被丢弃时连接归还连接池。

mod utils;

use crate::adapter::{
    BulkWriteOptions, BulkWriteReport, DocumentCursor, DocumentStore, FindQuery, ShardChunk,
    ShardMetadata, WriteModel,
};
use crate::debug_log;
use crate::error::BridgeResult;
use crate::types::{Namespace, PoolConfig};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions, InsertManyOptions, ReplaceOptions};
use mongodb::{Client, Collection};
use rat_logger::{debug, info};
use std::time::Duration;
use utils::{bulk_item_errors, query_error, selection_criteria, single_item_error, write_concern, MongoCursor};

/// MongoDB存储
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// 按URI和连接池配置建立客户端
    pub async fn connect(uri: &str, pool: &PoolConfig) -> BridgeResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| crate::bridge_error!(connection, format!("MongoDB连接URI解析失败: {}", e)))?;

        options.max_pool_size = Some(pool.max_connections);
        options.min_pool_size = Some(pool.min_connections);
        options.connect_timeout = Some(Duration::from_secs(pool.connection_timeout));
        options.max_idle_time = Some(Duration::from_secs(pool.idle_timeout));
        if options.app_name.is_none() {
            options.app_name = Some(crate::NAME.to_string());
        }

        let client = Client::with_options(options)
            .map_err(|e| crate::bridge_error!(connection, format!("MongoDB客户端创建失败: {}", e)))?;

        info!("MongoDB存储已创建，连接池上限: {}", pool.max_connections);
        Ok(Self { client })
    }

    /// 使用已有客户端
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn collection(&self, namespace: &Namespace) -> Collection<Document> {
        self.client
            .database(&namespace.database)
            .collection::<Document>(&namespace.collection)
    }

    async fn insert_batch(
        &self,
        collection: &Collection<Document>,
        documents: Vec<Document>,
        options: &BulkWriteOptions,
    ) -> BridgeResult<BulkWriteReport> {
        let mut insert_options = InsertManyOptions::default();
        insert_options.ordered = Some(options.ordered);
        insert_options.write_concern = write_concern(options.write_concern.as_deref());

        match collection.insert_many(documents, insert_options).await {
            Ok(_) => Ok(BulkWriteReport::default()),
            Err(e) => match bulk_item_errors(e) {
                Ok(errors) => {
                    debug!("MongoDB批量插入部分失败: {} 条错误", errors.len());
                    Ok(BulkWriteReport { errors })
                }
                Err(e) => Err(query_error("MongoDB批量插入失败", e)),
            },
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn count_documents(&self, namespace: &Namespace, filter: Document) -> BridgeResult<u64> {
        debug!("执行MongoDB计数: {} {:?}", namespace, filter);
        self.collection(namespace)
            .count_documents(filter, None)
            .await
            .map_err(|e| query_error("MongoDB计数失败", e))
    }

    async fn find(&self, namespace: &Namespace, query: FindQuery) -> BridgeResult<Box<dyn DocumentCursor>> {
        debug!("执行MongoDB查询: {} {:?}", namespace, query.filter);

        let mut find_options = FindOptions::default();
        find_options.sort = query.sort;
        find_options.skip = query.skip;
        find_options.limit = query.limit;
        find_options.batch_size = query.batch_size;
        find_options.projection = query.projection;
        find_options.selection_criteria = selection_criteria(query.read_preference);

        let cursor = self
            .collection(namespace)
            .find(query.filter, find_options)
            .await
            .map_err(|e| query_error("MongoDB查询失败", e))?;
        Ok(Box::new(MongoCursor { cursor }))
    }

    async fn shard_metadata(&self, namespace: &Namespace) -> BridgeResult<Option<ShardMetadata>> {
        let config = self.client.database("config");
        let entry = config
            .collection::<Document>("collections")
            .find_one(doc! { "_id": namespace.to_string() }, None)
            .await
            .map_err(|e| query_error("读取分片集合元数据失败", e))?;

        let Some(entry) = entry else {
            return Ok(None);
        };
        if entry.get_bool("dropped").unwrap_or(false) {
            return Ok(None);
        }
        let key = entry
            .get_document("key")
            .map_err(|e| crate::bridge_error!(query, format!("分片键格式异常: {}", e)))?
            .clone();

        // 新版本服务端以集合 uuid 关联分片块，旧版本使用 ns
        let mut chunk_filter = vec![Bson::Document(doc! { "ns": namespace.to_string() })];
        if let Some(uuid) = entry.get("uuid") {
            chunk_filter.push(Bson::Document(doc! { "uuid": uuid.clone() }));
        }

        let mut find_options = FindOptions::default();
        find_options.sort = Some(doc! { "min": 1 });
        let mut cursor = config
            .collection::<Document>("chunks")
            .find(doc! { "$or": chunk_filter }, find_options)
            .await
            .map_err(|e| query_error("读取分片块失败", e))?;

        let mut chunks = Vec::new();
        while cursor.advance().await.map_err(|e| query_error("MongoDB游标遍历失败", e))? {
            let chunk = cursor
                .deserialize_current()
                .map_err(|e| query_error("MongoDB文档反序列化失败", e))?;
            chunks.push(ShardChunk::from_document(&chunk)?);
        }

        debug_log!("集合 {} 的分片键 {:?}，共 {} 个分片块", namespace, key, chunks.len());
        Ok(Some(ShardMetadata { key, chunks }))
    }

    async fn bulk_write(
        &self,
        namespace: &Namespace,
        models: Vec<WriteModel>,
        options: &BulkWriteOptions,
    ) -> BridgeResult<BulkWriteReport> {
        let collection = self.collection(namespace);

        // 纯插入批次走 insert_many，一次往返
        if models.iter().all(|m| matches!(m, WriteModel::InsertOne(_))) {
            let documents = models
                .into_iter()
                .filter_map(|m| match m {
                    WriteModel::InsertOne(document) => Some(document),
                    WriteModel::ReplaceOne { .. } => None,
                })
                .collect();
            return self.insert_batch(&collection, documents, options).await;
        }

        let wc = write_concern(options.write_concern.as_deref());
        let mut report = BulkWriteReport::default();
        for (index, model) in models.into_iter().enumerate() {
            let result = match model {
                WriteModel::InsertOne(document) => {
                    let mut insert_options = mongodb::options::InsertOneOptions::default();
                    insert_options.write_concern = wc.clone();
                    collection.insert_one(document, insert_options).await.map(|_| ())
                }
                WriteModel::ReplaceOne {
                    filter,
                    replacement,
                    upsert,
                } => {
                    let mut replace_options = ReplaceOptions::default();
                    replace_options.upsert = Some(upsert);
                    replace_options.write_concern = wc.clone();
                    collection.replace_one(filter, replacement, replace_options).await.map(|_| ())
                }
            };

            if let Err(e) = result {
                let item = single_item_error(index, e).map_err(|e| query_error("MongoDB写入失败", e))?;
                report.errors.push(item);
                if options.ordered {
                    break;
                }
            }
        }
        Ok(report)
    }

    async fn drop_collection(&self, namespace: &Namespace) -> BridgeResult<()> {
        info!("删除集合: {}", namespace);
        self.collection(namespace)
            .drop(None)
            .await
            .map_err(|e| query_error("MongoDB删除集合失败", e))
    }
}

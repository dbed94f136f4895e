//! 文档存储适配器模块
//!
//! 用统一的存储接口屏蔽不同后端的差异：内存存储始终可用，
//! MongoDB 存储在启用 `mongodb-support` 特性后可用

use crate::error::BridgeResult;
use crate::types::{Namespace, PoolConfig, ReadPreference};
use async_trait::async_trait;
use bson::Document;
use std::sync::Arc;

mod memory;
#[cfg(feature = "mongodb-support")]
mod mongodb;

pub use memory::MemoryStore;
#[cfg(feature = "mongodb-support")]
pub use mongodb::MongoStore;

/// 重复键错误码
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// 查询参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// 过滤文档
    pub filter: Document,
    /// 排序
    pub sort: Option<Document>,
    /// 跳过的文档数
    pub skip: Option<u64>,
    /// 返回的最大文档数
    pub limit: Option<i64>,
    /// 游标批大小
    pub batch_size: Option<u32>,
    /// 投影
    pub projection: Option<Document>,
    /// 读偏好
    pub read_preference: ReadPreference,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn batch_size(mut self, batch_size: Option<u32>) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = read_preference;
        self
    }
}

/// 批量写入中的单个操作
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    /// 插入文档
    InsertOne(Document),
    /// 按过滤条件替换文档
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
}

/// 批量写入选项
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteOptions {
    /// 有序写入：遇到第一个错误即停止
    pub ordered: bool,
    /// 写关注 `w` 值（数字或 "majority" 等标签）
    pub write_concern: Option<String>,
}

impl Default for BulkWriteOptions {
    fn default() -> Self {
        Self {
            ordered: true,
            write_concern: None,
        }
    }
}

/// 批量写入中单个操作的失败信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    /// 在本批中的位置
    pub index: usize,
    /// 服务端错误码
    pub code: i32,
    /// 错误消息
    pub message: String,
}

/// 批量写入报告
///
/// 有序写入时第一个错误之前的操作已提交、之后的操作未尝试；
/// 无序写入时错误列表之外的操作全部已提交
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteReport {
    pub errors: Vec<BulkItemError>,
}

/// 分片块
#[derive(Debug, Clone, PartialEq)]
pub struct ShardChunk {
    /// 下界（包含）
    pub min: Document,
    /// 上界（不包含）
    pub max: Document,
    /// 所属分片
    pub shard: String,
}

impl ShardChunk {
    /// 从 `config.chunks` 条目解析，缺少边界或分片名时报错
    pub fn from_document(chunk: &Document) -> BridgeResult<Self> {
        match (chunk.get_document("min"), chunk.get_document("max"), chunk.get_str("shard")) {
            (Ok(min), Ok(max), Ok(shard)) => Ok(Self {
                min: min.clone(),
                max: max.clone(),
                shard: shard.to_string(),
            }),
            _ => Err(crate::bridge_error!(planning, format!("分片块格式异常: {}", chunk))),
        }
    }
}

/// 分片集合元数据
#[derive(Debug, Clone, PartialEq)]
pub struct ShardMetadata {
    /// 分片键定义，如 `{_id: 1}` 或 `{user: "hashed"}`
    pub key: Document,
    /// 按下界排序的分片块
    pub chunks: Vec<ShardChunk>,
}

/// 文档游标
#[async_trait]
pub trait DocumentCursor: Send {
    /// 读取下一个文档，游标耗尽时返回 None
    async fn next_document(&mut self) -> BridgeResult<Option<Document>>;
}

/// 文档存储接口
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 后端名称
    fn name(&self) -> &'static str;

    /// 统计满足条件的文档数量
    async fn count_documents(&self, namespace: &Namespace, filter: Document) -> BridgeResult<u64>;

    /// 打开查询游标，游标独占一个连接直到被丢弃
    async fn find(&self, namespace: &Namespace, query: FindQuery) -> BridgeResult<Box<dyn DocumentCursor>>;

    /// 读取分片元数据，未分片的集合返回 None
    async fn shard_metadata(&self, namespace: &Namespace) -> BridgeResult<Option<ShardMetadata>>;

    /// 执行一批写操作
    ///
    /// 单个操作的失败记录在报告中；整批无法执行（如连接中断）时返回错误
    async fn bulk_write(
        &self,
        namespace: &Namespace,
        models: Vec<WriteModel>,
        options: &BulkWriteOptions,
    ) -> BridgeResult<BulkWriteReport>;

    /// 删除集合
    async fn drop_collection(&self, namespace: &Namespace) -> BridgeResult<()>;

    /// 集合是否有数据
    async fn has_documents(&self, namespace: &Namespace) -> BridgeResult<bool> {
        let mut cursor = self
            .find(namespace, FindQuery::new(Document::new()).limit(1))
            .await?;
        Ok(cursor.next_document().await?.is_some())
    }
}

/// 根据连接URI创建存储
///
/// 支持 `memory://<name>` 与 `mongodb://`、`mongodb+srv://`
pub async fn create_store(uri: &str, pool: &PoolConfig) -> BridgeResult<Arc<dyn DocumentStore>> {
    let (scheme, rest) = uri.split_once("://").unwrap_or((uri, ""));
    match scheme {
        "memory" => Ok(Arc::new(MemoryStore::named(rest))),
        #[cfg(feature = "mongodb-support")]
        "mongodb" | "mongodb+srv" => Ok(Arc::new(MongoStore::connect(uri, pool).await?)),
        _ => {
            let _ = pool;
            Err(crate::bridge_error!(unsupported_store, scheme))
        }
    }
}

/// 把游标读完
pub async fn collect_cursor(mut cursor: Box<dyn DocumentCursor>) -> BridgeResult<Vec<Document>> {
    let mut documents = Vec::new();
    while let Some(document) = cursor.next_document().await? {
        documents.push(document);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_shard_chunk_from_document() {
        let chunk = ShardChunk::from_document(&doc! {
            "min": { "age": bson::Bson::MinKey },
            "max": { "age": 50 },
            "shard": "rs0",
        })
        .unwrap();
        assert_eq!(chunk.max, doc! { "age": 50 });
        assert_eq!(chunk.shard, "rs0");

        // 缺少上界
        let err = ShardChunk::from_document(&doc! { "min": { "age": 50 }, "shard": "rs1" }).unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::PartitionPlanningFailure { .. }));
    }
}

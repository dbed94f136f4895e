//! 分区规划
//!
//! 把集合切分为可独立查询的键区间。同一次规划得到的分区两两不相交，
//! 并集覆盖规划时刻的整个集合。区间下界包含、上界不包含，缺失的界表示无界。

mod paginate;
mod shard;

pub use paginate::PaginateBySizePartitioner;
pub use shard::ShardPartitioner;

use crate::adapter::DocumentStore;
use crate::error::BridgeResult;
use crate::types::{Namespace, PartitionerKind, ReadPreference};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use rat_logger::{info, warn};
use serde::{Deserialize, Serialize};

/// 默认分区键
pub const DEFAULT_PARTITION_FIELD: &str = "_id";
/// 默认每个分区的文档数
pub const DEFAULT_PARTITION_SIZE: u64 = 10_000;

/// 分区边界
///
/// 无下界的键区间同时包含分区键缺失、为 null 或与边界类型档位不同的文档，
/// 这样各区间的并集始终覆盖整个集合。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartitionBounds {
    /// 整个集合
    Full,
    /// 键区间 `[lower, upper)`
    KeyRange {
        field: String,
        lower: Option<Bson>,
        upper: Option<Bson>,
    },
}

impl PartitionBounds {
    /// 限定分区范围的查询条件
    pub fn query(&self) -> Document {
        match self {
            PartitionBounds::Full => Document::new(),
            PartitionBounds::KeyRange { field, lower, upper } => match (lower, upper) {
                (None, None) => Document::new(),
                // 比较操作符只匹配同一类型档位，首个分区用取反接收键缺失或档位不同的文档
                (None, Some(upper)) => doc! { field.as_str(): { "$not": { "$gte": upper.clone() } } },
                (Some(lower), None) => doc! { field.as_str(): { "$gte": lower.clone() } },
                (Some(lower), Some(upper)) => doc! { field.as_str(): { "$gte": lower.clone(), "$lt": upper.clone() } },
            },
        }
    }
}

/// 分区
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// 在规划结果中的位置
    pub index: usize,
    /// 边界
    pub bounds: PartitionBounds,
    /// 所属分片
    pub shard: Option<String>,
}

impl Partition {
    pub fn full() -> Self {
        Self {
            index: 0,
            bounds: PartitionBounds::Full,
            shard: None,
        }
    }

    /// 把分区范围与下推查询合并
    pub fn query_with(&self, filter: &Document) -> Document {
        let bounds = self.bounds.query();
        match (bounds.is_empty(), filter.is_empty()) {
            (true, _) => filter.clone(),
            (false, true) => bounds,
            (false, false) => doc! { "$and": [bounds, filter.clone()] },
        }
    }
}

/// 分区器选项
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionerOptions {
    pub kind: PartitionerKind,
    pub partition_field: String,
    pub partition_size: u64,
    /// 规划失败时退化为单分区
    pub fallback_to_single: bool,
    pub read_preference: ReadPreference,
}

impl Default for PartitionerOptions {
    fn default() -> Self {
        Self {
            kind: PartitionerKind::default(),
            partition_field: DEFAULT_PARTITION_FIELD.to_string(),
            partition_size: DEFAULT_PARTITION_SIZE,
            fallback_to_single: false,
            read_preference: ReadPreference::default(),
        }
    }
}

/// 分区器
#[async_trait]
pub trait Partitioner: Send + Sync {
    fn name(&self) -> &'static str;

    /// 规划分区
    async fn plan(&self, store: &dyn DocumentStore, namespace: &Namespace) -> BridgeResult<Vec<Partition>>;
}

/// 单分区
pub struct SinglePartitioner;

#[async_trait]
impl Partitioner for SinglePartitioner {
    fn name(&self) -> &'static str {
        "single"
    }

    async fn plan(&self, _store: &dyn DocumentStore, _namespace: &Namespace) -> BridgeResult<Vec<Partition>> {
        Ok(vec![Partition::full()])
    }
}

/// 按选项构造分区器
pub fn create_partitioner(options: &PartitionerOptions) -> Box<dyn Partitioner> {
    match options.kind {
        PartitionerKind::Single => Box::new(SinglePartitioner),
        PartitionerKind::PaginateBySize => Box::new(PaginateBySizePartitioner::new(
            options.partition_field.clone(),
            options.partition_size,
            options.read_preference,
        )),
        PartitionerKind::Shard => Box::new(ShardPartitioner),
    }
}

/// 规划分区
///
/// 规划失败时终止读取；只有显式开启 `fallback_to_single` 时才退化为单分区
pub async fn plan_partitions(
    store: &dyn DocumentStore,
    namespace: &Namespace,
    options: &PartitionerOptions,
) -> BridgeResult<Vec<Partition>> {
    let partitioner = create_partitioner(options);
    match partitioner.plan(store, namespace).await {
        Ok(partitions) => {
            info!("集合 {} 使用 {} 分区器规划出 {} 个分区", namespace, partitioner.name(), partitions.len());
            Ok(partitions)
        }
        Err(e) if options.fallback_to_single => {
            warn!("集合 {} 分区规划失败，退化为单分区: {}", namespace, e);
            SinglePartitioner.plan(store, namespace).await
        }
        Err(e) => Err(match e {
            crate::error::BridgeError::PartitionPlanningFailure { .. } => e,
            other => crate::bridge_error!(planning, other),
        }),
    }
}

/// 相邻边界生成区间：首个区间无下界，最后一个区间无上界
pub(crate) fn ranges_from_boundaries(field: &str, boundaries: Vec<Bson>) -> Vec<Partition> {
    let mut partitions = Vec::with_capacity(boundaries.len() + 1);
    let mut lower: Option<Bson> = None;
    for boundary in boundaries {
        partitions.push(Partition {
            index: partitions.len(),
            bounds: PartitionBounds::KeyRange {
                field: field.to_string(),
                lower: lower.take(),
                upper: Some(boundary.clone()),
            },
            shard: None,
        });
        lower = Some(boundary);
    }
    partitions.push(Partition {
        index: partitions.len(),
        bounds: PartitionBounds::KeyRange {
            field: field.to_string(),
            lower,
            upper: None,
        },
        shard: None,
    });
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryStore;

    #[test]
    fn test_bounds_query() {
        let bounds = PartitionBounds::KeyRange {
            field: "_id".to_string(),
            lower: Some(Bson::Int32(10)),
            upper: Some(Bson::Int32(20)),
        };
        assert_eq!(bounds.query(), doc! { "_id": { "$gte": 10, "$lt": 20 } });
        assert!(PartitionBounds::Full.query().is_empty());

        let partition = Partition { index: 0, bounds, shard: None };
        assert_eq!(
            partition.query_with(&doc! { "age": { "$lt": 100 } }),
            doc! { "$and": [ { "_id": { "$gte": 10, "$lt": 20 } }, { "age": { "$lt": 100 } } ] }
        );
    }

    #[test]
    fn test_ranges_cover_both_ends() {
        let partitions = ranges_from_boundaries("_id", vec![Bson::Int32(5), Bson::Int32(9)]);
        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].bounds.query(), doc! { "_id": { "$not": { "$gte": 5 } } });
        assert_eq!(partitions[1].bounds.query(), doc! { "_id": { "$gte": 5, "$lt": 9 } });
        assert_eq!(partitions[2].bounds.query(), doc! { "_id": { "$gte": 9 } });
        assert_eq!(partitions[2].index, 2);
    }

    #[tokio::test]
    async fn test_planning_failure_is_fatal_unless_fallback() {
        let store = MemoryStore::new();
        let ns = Namespace::new("db", "unsharded");
        let mut options = PartitionerOptions {
            kind: PartitionerKind::Shard,
            ..Default::default()
        };

        let err = plan_partitions(&store, &ns, &options).await.unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::PartitionPlanningFailure { .. }));

        options.fallback_to_single = true;
        let partitions = plan_partitions(&store, &ns, &options).await.unwrap();
        assert_eq!(partitions, vec![Partition::full()]);
    }
}

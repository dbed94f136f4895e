use crate::adapter::{DocumentStore, FindQuery};
use crate::debug_log;
use crate::error::BridgeResult;
use crate::mapper::{bson_type_name, compare_bson, type_bracket};
use crate::partition::{ranges_from_boundaries, Partition, Partitioner};
use crate::types::{Namespace, ReadPreference};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use rat_logger::debug;
use std::cmp::Ordering;

/// 按分区键排序后每 `partition_size` 个文档切一个分区
///
/// 边界键通过排序后跳过固定数量文档取得。分区键的最小值和最大值必须处于同一类型档位，
/// 否则区间查询无法覆盖其他类型的键，规划失败。
pub struct PaginateBySizePartitioner {
    field: String,
    partition_size: u64,
    read_preference: ReadPreference,
}

impl PaginateBySizePartitioner {
    pub fn new(field: String, partition_size: u64, read_preference: ReadPreference) -> Self {
        Self {
            field,
            partition_size,
            read_preference,
        }
    }

    /// 按分区键排序后第 `skip` 个文档的键值
    async fn key_at(&self, store: &dyn DocumentStore, namespace: &Namespace, skip: u64, direction: i32) -> BridgeResult<Option<Bson>> {
        let query = FindQuery::new(Document::new())
            .sort(doc! { self.field.as_str(): direction })
            .skip(skip)
            .limit(1)
            .projection(doc! { self.field.as_str(): 1 })
            .read_preference(self.read_preference);
        let mut cursor = store.find(namespace, query).await?;
        let Some(document) = cursor.next_document().await? else {
            return Ok(None);
        };
        Ok(Some(lookup_key(&document, &self.field)))
    }
}

fn lookup_key(document: &Document, path: &str) -> Bson {
    let mut parts = path.split('.');
    let mut current = parts.next().and_then(|first| document.get(first));
    for part in parts {
        current = match current {
            Some(Bson::Document(doc)) => doc.get(part),
            _ => None,
        };
    }
    // 缺失字段在排序中等同于 null
    current.cloned().unwrap_or(Bson::Null)
}

#[async_trait]
impl Partitioner for PaginateBySizePartitioner {
    fn name(&self) -> &'static str {
        "paginateBySize"
    }

    async fn plan(&self, store: &dyn DocumentStore, namespace: &Namespace) -> BridgeResult<Vec<Partition>> {
        if self.partition_size == 0 {
            return Err(crate::bridge_error!(planning, "partitionSize 必须大于0"));
        }

        let count = store.count_documents(namespace, Document::new()).await?;
        if count <= self.partition_size {
            debug!("集合 {} 共 {} 个文档，不超过分区大小，使用单分区", namespace, count);
            return Ok(vec![Partition::full()]);
        }

        let (Some(min), Some(max)) = (
            self.key_at(store, namespace, 0, 1).await?,
            self.key_at(store, namespace, 0, -1).await?,
        ) else {
            return Ok(vec![Partition::full()]);
        };

        if type_bracket(&min) != type_bracket(&max) {
            return Err(crate::bridge_error!(
                planning,
                crate::i18n::tf(
                    "error.mixed_partition_key",
                    &[
                        ("field", self.field.as_str()),
                        ("min_type", bson_type_name(&min)),
                        ("max_type", bson_type_name(&max)),
                    ],
                )
            ));
        }

        let mut boundaries: Vec<Bson> = Vec::new();
        let mut skip = self.partition_size;
        while skip < count {
            if let Some(key) = self.key_at(store, namespace, skip, 1).await? {
                // 非唯一键可能重复出现，相同边界只保留一个
                let duplicate = boundaries
                    .last()
                    .is_some_and(|last| compare_bson(last, &key) == Ordering::Equal);
                let is_min = compare_bson(&min, &key) == Ordering::Equal;
                if !duplicate && !is_min {
                    boundaries.push(key);
                }
            }
            skip += self.partition_size;
        }

        debug_log!("集合 {} 按 {} 切分，边界: {:?}", namespace, self.field, boundaries);
        Ok(ranges_from_boundaries(&self.field, boundaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{collect_cursor, MemoryStore};
    use std::collections::HashSet;

    fn ns() -> Namespace {
        Namespace::new("middle_earth", "people")
    }

    #[tokio::test]
    async fn test_partitions_cover_collection_exactly_once() {
        let store = MemoryStore::new();
        let documents = (0..25).map(|i| doc! { "_id": i, "n": i % 3 }).collect();
        store.insert_documents(&ns(), documents).unwrap();

        let partitioner = PaginateBySizePartitioner::new("_id".to_string(), 10, ReadPreference::Primary);
        let partitions = partitioner.plan(&store, &ns()).await.unwrap();
        assert_eq!(partitions.len(), 3);

        let mut seen = HashSet::new();
        for partition in &partitions {
            let cursor = store.find(&ns(), FindQuery::new(partition.bounds.query())).await.unwrap();
            for document in collect_cursor(cursor).await.unwrap() {
                assert!(seen.insert(document.get_i32("_id").unwrap()), "文档出现在多个分区中");
            }
        }
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn test_small_or_empty_collection_is_single_partition() {
        let store = MemoryStore::new();
        let partitioner = PaginateBySizePartitioner::new("_id".to_string(), 10, ReadPreference::Primary);
        assert_eq!(partitioner.plan(&store, &ns()).await.unwrap(), vec![Partition::full()]);

        store.insert_documents(&ns(), vec![doc! { "_id": 1 }]).unwrap();
        assert_eq!(partitioner.plan(&store, &ns()).await.unwrap(), vec![Partition::full()]);
    }

    #[tokio::test]
    async fn test_non_unique_key_boundaries_are_deduplicated() {
        let store = MemoryStore::new();
        let documents = (0..30).map(|i| doc! { "_id": i, "group": i / 20 }).collect();
        store.insert_documents(&ns(), documents).unwrap();

        let partitioner = PaginateBySizePartitioner::new("group".to_string(), 10, ReadPreference::Primary);
        let partitions = partitioner.plan(&store, &ns()).await.unwrap();

        let mut total = 0;
        for partition in &partitions {
            total += store.count_documents(&ns(), partition.bounds.query()).await.unwrap();
        }
        assert_eq!(total, 30);
        assert_eq!(partitions.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_key_types_fail() {
        let store = MemoryStore::new();
        let mut documents: Vec<Document> = (0..5).map(|i| doc! { "_id": i }).collect();
        documents.push(doc! { "_id": "string-key" });
        store.insert_documents(&ns(), documents).unwrap();

        let partitioner = PaginateBySizePartitioner::new("_id".to_string(), 2, ReadPreference::Primary);
        let err = partitioner.plan(&store, &ns()).await.unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::PartitionPlanningFailure { .. }));
    }
}

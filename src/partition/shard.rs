use crate::adapter::DocumentStore;
use crate::error::BridgeResult;
use crate::mapper::{bson_type_name, type_bracket};
use crate::partition::{Partition, PartitionBounds, Partitioner};
use crate::types::Namespace;
use async_trait::async_trait;
use bson::{Bson, Document};
use rat_logger::debug;

/// 每个分片块一个分区
///
/// 只支持单字段、非哈希的分片键。分片块边界为 MinKey/MaxKey 时对应的区间无界，
/// 分片键缺失或类型不同的文档落入首个分区。所有有界边界必须处于同一类型档位。
pub struct ShardPartitioner;

fn shard_key_error(namespace: &Namespace, message: &str) -> crate::error::BridgeError {
    let namespace = namespace.to_string();
    let detail = crate::i18n::tf("error.shard_key", &[("namespace", namespace.as_str()), ("message", message)]);
    crate::bridge_error!(planning, detail)
}

fn bound(chunk_bound: &Document, field: &str) -> Option<Bson> {
    match chunk_bound.get(field) {
        None | Some(Bson::MinKey) | Some(Bson::MaxKey) => None,
        Some(value) => Some(value.clone()),
    }
}

#[async_trait]
impl Partitioner for ShardPartitioner {
    fn name(&self) -> &'static str {
        "shard"
    }

    async fn plan(&self, store: &dyn DocumentStore, namespace: &Namespace) -> BridgeResult<Vec<Partition>> {
        let Some(metadata) = store.shard_metadata(namespace).await? else {
            return Err(shard_key_error(namespace, "集合未分片"));
        };

        if metadata.key.len() != 1 {
            return Err(shard_key_error(namespace, "不支持复合分片键"));
        }
        let Some((field, kind)) = metadata.key.iter().next() else {
            return Err(shard_key_error(namespace, "分片键为空"));
        };
        if matches!(kind, Bson::String(s) if s == "hashed") {
            return Err(shard_key_error(namespace, "不支持哈希分片键"));
        }
        if metadata.chunks.is_empty() {
            return Err(shard_key_error(namespace, "没有分片块"));
        }

        let bounded: Vec<Bson> = metadata
            .chunks
            .iter()
            .flat_map(|chunk| [bound(&chunk.min, field), bound(&chunk.max, field)])
            .flatten()
            .collect();
        if let Some(first) = bounded.first() {
            if let Some(other) = bounded.iter().find(|v| type_bracket(v) != type_bracket(first)) {
                let message = format!("分片块边界类型档位不一致: {} 与 {}", bson_type_name(first), bson_type_name(other));
                return Err(shard_key_error(namespace, &message));
            }
        }

        let partitions: Vec<Partition> = metadata
            .chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| Partition {
                index,
                bounds: PartitionBounds::KeyRange {
                    field: field.clone(),
                    lower: bound(&chunk.min, field),
                    upper: bound(&chunk.max, field),
                },
                shard: Some(chunk.shard.clone()),
            })
            .collect();

        debug!("集合 {} 按分片键 {} 切分为 {} 个分区", namespace, field, partitions.len());
        Ok(partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryStore, ShardChunk, ShardMetadata};
    use bson::doc;

    fn ns() -> Namespace {
        Namespace::new("middle_earth", "sharded")
    }

    #[tokio::test]
    async fn test_chunks_become_partitions() {
        let store = MemoryStore::new();
        store.set_shard_metadata(
            &ns(),
            ShardMetadata {
                key: doc! { "age": 1 },
                chunks: vec![
                    ShardChunk { min: doc! { "age": Bson::MinKey }, max: doc! { "age": 50 }, shard: "rs0".to_string() },
                    ShardChunk { min: doc! { "age": 50 }, max: doc! { "age": Bson::MaxKey }, shard: "rs1".to_string() },
                ],
            },
        );

        let partitions = ShardPartitioner.plan(&store, &ns()).await.unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].bounds.query(), doc! { "age": { "$not": { "$gte": 50 } } });
        assert_eq!(partitions[1].bounds.query(), doc! { "age": { "$gte": 50 } });
        assert_eq!(partitions[1].shard.as_deref(), Some("rs1"));
    }

    #[tokio::test]
    async fn test_partitions_cover_missing_and_foreign_keys() {
        let store = MemoryStore::new();
        store
            .insert_documents(
                &ns(),
                vec![
                    doc! { "_id": 1, "age": 10 },
                    doc! { "_id": 2, "age": 60 },
                    doc! { "_id": 3, "age": "old" },
                    doc! { "_id": 4 },
                    doc! { "_id": 5, "age": Bson::Null },
                    doc! { "_id": 6, "age": 30 },
                ],
            )
            .unwrap();
        store.set_shard_metadata(
            &ns(),
            ShardMetadata {
                key: doc! { "age": 1 },
                chunks: vec![
                    ShardChunk { min: doc! { "age": Bson::MinKey }, max: doc! { "age": 20 }, shard: "rs0".to_string() },
                    ShardChunk { min: doc! { "age": 20 }, max: doc! { "age": 50 }, shard: "rs1".to_string() },
                    ShardChunk { min: doc! { "age": 50 }, max: doc! { "age": Bson::MaxKey }, shard: "rs2".to_string() },
                ],
            },
        );

        let partitions = ShardPartitioner.plan(&store, &ns()).await.unwrap();
        let mut seen = std::collections::HashSet::new();
        for partition in &partitions {
            let cursor = store
                .find(&ns(), crate::adapter::FindQuery::new(partition.bounds.query()))
                .await
                .unwrap();
            for document in crate::adapter::collect_cursor(cursor).await.unwrap() {
                assert!(seen.insert(document.get_i32("_id").unwrap()), "分区之间有重叠: {:?}", document);
            }
        }
        println!("🔍 {} 个分片分区覆盖 {} 个文档", partitions.len(), seen.len());
        assert_eq!(seen.len(), 6);
    }

    #[tokio::test]
    async fn test_mixed_bound_brackets_rejected() {
        let store = MemoryStore::new();
        store.set_shard_metadata(
            &ns(),
            ShardMetadata {
                key: doc! { "age": 1 },
                chunks: vec![
                    ShardChunk { min: doc! { "age": Bson::MinKey }, max: doc! { "age": 50 }, shard: "rs0".to_string() },
                    ShardChunk { min: doc! { "age": 50 }, max: doc! { "age": "a" }, shard: "rs1".to_string() },
                    ShardChunk { min: doc! { "age": "a" }, max: doc! { "age": Bson::MaxKey }, shard: "rs2".to_string() },
                ],
            },
        );

        let err = ShardPartitioner.plan(&store, &ns()).await.unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::PartitionPlanningFailure { .. }));
    }

    #[tokio::test]
    async fn test_hashed_or_compound_key_rejected() {
        let store = MemoryStore::new();
        let chunk = ShardChunk { min: doc! {}, max: doc! {}, shard: "rs0".to_string() };
        store.set_shard_metadata(&ns(), ShardMetadata { key: doc! { "user": "hashed" }, chunks: vec![chunk.clone()] });
        assert!(ShardPartitioner.plan(&store, &ns()).await.is_err());

        store.set_shard_metadata(&ns(), ShardMetadata { key: doc! { "a": 1, "b": 1 }, chunks: vec![chunk] });
        assert!(ShardPartitioner.plan(&store, &ns()).await.is_err());
    }
}

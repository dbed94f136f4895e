//! 内存文档存储
//!
//! 行为与服务端保持一致的最小实现：`_id` 唯一、缺失时自动生成 ObjectId、
//! 有序和无序批量写入、类型档位排序。用于本地运行和测试。

mod matcher;

use crate::adapter::{
    BulkItemError, BulkWriteOptions, BulkWriteReport, DocumentCursor, DocumentStore, FindQuery,
    ShardMetadata, WriteModel, DUPLICATE_KEY_CODE,
};
use crate::debug_log;
use crate::error::BridgeResult;
use crate::mapper::compare_bson;
use crate::types::Namespace;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) use matcher::{lookup, matches};

/// `_id` 不可修改的错误码
const IMMUTABLE_FIELD_CODE: i32 = 66;

/// 具名内存存储注册表，同名 URI 共享同一份数据
static NAMED_STORES: Lazy<DashMap<String, MemoryStore>> = Lazy::new(DashMap::new);

type Collection = Arc<RwLock<Vec<Document>>>;

#[derive(Default)]
struct MemoryInner {
    collections: DashMap<String, Collection>,
    shards: DashMap<String, ShardMetadata>,
}

/// 内存文档存储
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// 创建独立的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取具名内存存储，名称为空时返回独立实例
    pub fn named(name: &str) -> Self {
        if name.is_empty() {
            return Self::new();
        }
        NAMED_STORES.entry(name.to_string()).or_default().clone()
    }

    fn collection(&self, namespace: &Namespace) -> Collection {
        self.inner
            .collections
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    fn existing(&self, namespace: &Namespace) -> Option<Collection> {
        self.inner
            .collections
            .get(&namespace.to_string())
            .map(|entry| entry.value().clone())
    }

    /// 直接写入文档（绕过批量写入），`_id` 冲突时报错
    pub fn insert_documents(&self, namespace: &Namespace, documents: Vec<Document>) -> BridgeResult<()> {
        let collection = self.collection(namespace);
        let mut guard = collection.write();
        for document in documents {
            insert_one(&mut guard, document, namespace).map_err(|e| crate::bridge_error!(query, e.message))?;
        }
        Ok(())
    }

    /// 集合当前内容的快照
    pub fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        self.existing(namespace)
            .map(|collection| collection.read().clone())
            .unwrap_or_default()
    }

    /// 设置分片元数据，模拟分片集合
    pub fn set_shard_metadata(&self, namespace: &Namespace, metadata: ShardMetadata) {
        self.inner.shards.insert(namespace.to_string(), metadata);
    }
}

fn id_of(document: &Document) -> Option<&Bson> {
    document.get("_id")
}

fn insert_one(collection: &mut Vec<Document>, mut document: Document, namespace: &Namespace) -> Result<(), BulkItemError> {
    if !document.contains_key("_id") {
        let mut with_id = Document::new();
        with_id.insert("_id", ObjectId::new());
        with_id.extend(document);
        document = with_id;
    }

    if let Some(id) = id_of(&document) {
        let duplicate = collection
            .iter()
            .any(|existing| id_of(existing).is_some_and(|other| compare_bson(other, id) == Ordering::Equal));
        if duplicate {
            return Err(BulkItemError {
                index: 0,
                code: DUPLICATE_KEY_CODE,
                message: format!(
                    "E11000 duplicate key error collection: {} index: _id_ dup key: {{ _id: {} }}",
                    namespace, id
                ),
            });
        }
    }

    collection.push(document);
    Ok(())
}

fn replace_one(
    collection: &mut Vec<Document>,
    filter: &Document,
    mut replacement: Document,
    upsert: bool,
    namespace: &Namespace,
) -> Result<(), BulkItemError> {
    let mut position = None;
    for (idx, existing) in collection.iter().enumerate() {
        let hit = matches(existing, filter).map_err(|e| BulkItemError {
            index: 0,
            code: 2,
            message: e.to_string(),
        })?;
        if hit {
            position = Some(idx);
            break;
        }
    }

    match position {
        Some(idx) => {
            let current_id = id_of(&collection[idx]).cloned();
            match (current_id, id_of(&replacement)) {
                (Some(current), Some(new)) if compare_bson(&current, new) != Ordering::Equal => {
                    return Err(BulkItemError {
                        index: 0,
                        code: IMMUTABLE_FIELD_CODE,
                        message: "Performing an update on the path '_id' would modify the immutable field '_id'"
                            .to_string(),
                    });
                }
                (Some(current), None) => {
                    let mut with_id = Document::new();
                    with_id.insert("_id", current);
                    with_id.extend(replacement);
                    replacement = with_id;
                }
                _ => {}
            }
            collection[idx] = replacement;
            Ok(())
        }
        None if upsert => {
            // 从过滤条件中复制等值字段
            for (key, value) in filter {
                if !key.starts_with('$') && !replacement.contains_key(key) && !matches!(value, Bson::Document(_)) {
                    replacement.insert(key.clone(), value.clone());
                }
            }
            insert_one(collection, replacement, namespace)
        }
        None => Ok(()),
    }
}

struct MemoryCursor {
    documents: VecDeque<Document>,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_document(&mut self) -> BridgeResult<Option<Document>> {
        Ok(self.documents.pop_front())
    }
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort {
            let left = lookup(a, field).unwrap_or(&Bson::Null);
            let right = lookup(b, field).unwrap_or(&Bson::Null);
            let mut ord = compare_bson(left, right);
            if matches!(direction, Bson::Int32(-1) | Bson::Int64(-1)) {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn project(document: Document, projection: &Document) -> Document {
    let include_id = !matches!(projection.get("_id"), Some(Bson::Int32(0)) | Some(Bson::Boolean(false)));
    let mut out = Document::new();
    for (key, value) in document {
        let wanted = if key == "_id" {
            include_id
        } else {
            projection.keys().any(|p| p == &key || p.split('.').next() == Some(key.as_str()))
        };
        if wanted {
            out.insert(key, value);
        }
    }
    out
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn count_documents(&self, namespace: &Namespace, filter: Document) -> BridgeResult<u64> {
        let Some(collection) = self.existing(namespace) else {
            return Ok(0);
        };
        let guard = collection.read();
        let mut count = 0;
        for document in guard.iter() {
            if matches(document, &filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn find(&self, namespace: &Namespace, query: FindQuery) -> BridgeResult<Box<dyn DocumentCursor>> {
        let mut selected = Vec::new();
        if let Some(collection) = self.existing(namespace) {
            let guard = collection.read();
            for document in guard.iter() {
                if matches(document, &query.filter)? {
                    selected.push(document.clone());
                }
            }
        }

        if let Some(sort) = &query.sort {
            sort_documents(&mut selected, sort);
        }

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = match query.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };
        let documents = selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &query.projection {
                Some(projection) => project(document, projection),
                None => document,
            })
            .collect::<VecDeque<_>>();

        debug_log!("内存存储查询 {}: 过滤 {:?}，返回 {} 个文档", namespace, query.filter, documents.len());
        Ok(Box::new(MemoryCursor { documents }))
    }

    async fn shard_metadata(&self, namespace: &Namespace) -> BridgeResult<Option<ShardMetadata>> {
        Ok(self
            .inner
            .shards
            .get(&namespace.to_string())
            .map(|entry| entry.value().clone()))
    }

    async fn bulk_write(
        &self,
        namespace: &Namespace,
        models: Vec<WriteModel>,
        options: &BulkWriteOptions,
    ) -> BridgeResult<BulkWriteReport> {
        let collection = self.collection(namespace);
        let mut guard = collection.write();
        let mut report = BulkWriteReport::default();

        for (index, model) in models.into_iter().enumerate() {
            let result = match model {
                WriteModel::InsertOne(document) => insert_one(&mut guard, document, namespace),
                WriteModel::ReplaceOne {
                    filter,
                    replacement,
                    upsert,
                } => replace_one(&mut guard, &filter, replacement, upsert, namespace),
            };
            if let Err(mut error) = result {
                error.index = index;
                report.errors.push(error);
                if options.ordered {
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn drop_collection(&self, namespace: &Namespace) -> BridgeResult<()> {
        self.inner.collections.remove(&namespace.to_string());
        self.inner.shards.remove(&namespace.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::collect_cursor;
    use bson::doc;

    fn ns() -> Namespace {
        Namespace::new("middle_earth", "hobbits")
    }

    #[tokio::test]
    async fn test_generated_id_and_duplicates() {
        let store = MemoryStore::new();
        let models = vec![
            WriteModel::InsertOne(doc! { "name": "Frodo" }),
            WriteModel::InsertOne(doc! { "_id": 1, "name": "Sam" }),
            WriteModel::InsertOne(doc! { "_id": 1, "name": "Samwise" }),
            WriteModel::InsertOne(doc! { "_id": 2, "name": "Merry" }),
        ];
        let report = store
            .bulk_write(&ns(), models.clone(), &BulkWriteOptions::default())
            .await
            .unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 2);
        assert_eq!(report.errors[0].code, DUPLICATE_KEY_CODE);
        // 有序写入在第一个错误处停止
        assert_eq!(store.count_documents(&ns(), doc! {}).await.unwrap(), 2);
        assert!(store.documents(&ns())[0].get_object_id("_id").is_ok());

        let unordered = BulkWriteOptions { ordered: false, write_concern: None };
        let other = Namespace::new("middle_earth", "others");
        let report = store.bulk_write(&other, models[1..].to_vec(), &unordered).await.unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(store.count_documents(&other, doc! {}).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_sort_skip_limit_projection() {
        let store = MemoryStore::new();
        store
            .insert_documents(
                &ns(),
                vec![
                    doc! { "_id": 3, "name": "Pippin", "age": 28 },
                    doc! { "_id": 1, "name": "Bilbo", "age": 111 },
                    doc! { "_id": 2, "name": "Frodo", "age": 50 },
                ],
            )
            .unwrap();

        let query = FindQuery::new(doc! {})
            .sort(doc! { "_id": -1 })
            .skip(1)
            .limit(1)
            .projection(doc! { "name": 1 });
        let documents = collect_cursor(store.find(&ns(), query).await.unwrap()).await.unwrap();
        assert_eq!(documents, vec![doc! { "_id": 2, "name": "Frodo" }]);
    }

    #[tokio::test]
    async fn test_replace_upsert_keeps_id() {
        let store = MemoryStore::new();
        store.insert_documents(&ns(), vec![doc! { "_id": 1, "name": "Bilbo" }]).unwrap();

        let models = vec![
            WriteModel::ReplaceOne {
                filter: doc! { "_id": 1 },
                replacement: doc! { "name": "Bilbo Baggins" },
                upsert: true,
            },
            WriteModel::ReplaceOne {
                filter: doc! { "_id": 9 },
                replacement: doc! { "name": "Gandalf" },
                upsert: true,
            },
        ];
        let report = store.bulk_write(&ns(), models, &BulkWriteOptions::default()).await.unwrap();
        assert!(report.errors.is_empty());

        let mut documents = store.documents(&ns());
        sort_documents(&mut documents, &doc! { "_id": 1 });
        assert_eq!(
            documents,
            vec![doc! { "_id": 1, "name": "Bilbo Baggins" }, doc! { "name": "Gandalf", "_id": 9 }]
        );
    }

    #[tokio::test]
    async fn test_named_stores_share_data() {
        let a = MemoryStore::named("shared-test");
        let b = MemoryStore::named("shared-test");
        a.insert_documents(&ns(), vec![doc! { "_id": 1 }]).unwrap();
        assert!(b.has_documents(&ns()).await.unwrap());
        assert!(!MemoryStore::named("").has_documents(&ns()).await.unwrap());
    }
}

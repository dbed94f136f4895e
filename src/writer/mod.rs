//! 写入路径
//!
//! 所有记录先转换为文档，转换全部成功后才开始修改目标集合。文档按批写入，
//! 某一批出现失败时后续批次不再尝试，错误中带有每条输入记录的提交状态。
//! 多个批次之间不是原子的。

use crate::adapter::{BulkWriteOptions, DocumentStore, WriteModel};
use crate::config::WriteConfig;
use crate::error::BridgeResult;
use crate::mapper::to_document;
use crate::types::{Namespace, Record, SaveMode, StructType, WriteOperation};
use crate::debug_log;
use bson::{Bson, Document};
use rat_logger::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 写入失败的单条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// 在输入记录中的位置
    pub index: usize,
    /// 服务端错误码
    pub code: i32,
    pub message: String,
}

/// 部分写入失败详情，下标均指向输入记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub namespace: String,
    /// 已提交
    pub committed: Vec<usize>,
    /// 服务端拒绝
    pub failed: Vec<FailedRecord>,
    /// 未尝试
    pub not_attempted: Vec<usize>,
    /// 所在批次整体失败（如连接中断），提交状态未知
    pub in_doubt: Vec<usize>,
    /// 整批失败的原因
    pub cause: Option<String>,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = crate::i18n::tf(
            "error.write_partial",
            &[
                ("committed", self.committed.len().to_string()),
                ("failed", self.failed.len().to_string()),
                ("not_attempted", self.not_attempted.len().to_string()),
                ("in_doubt", self.in_doubt.len().to_string()),
            ],
        );
        write!(f, "{}", summary)?;
        if let Some(first) = self.failed.first() {
            write!(f, " [#{} {}] {}", first.index, first.code, first.message)?;
        } else if let Some(cause) = &self.cause {
            write!(f, " {}", cause)?;
        }
        Ok(())
    }
}

/// 写入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub save_mode: SaveMode,
    /// 写入的文档数
    pub written: usize,
    /// 执行的批次数
    pub batches: usize,
    /// Ignore 模式下目标非空而跳过
    pub skipped: bool,
}

/// 把记录写入目标集合
pub async fn write(store: &dyn DocumentStore, records: &[Record], config: &WriteConfig) -> BridgeResult<WriteResult> {
    let namespace = &config.namespace;

    // 保存模式检查在任何修改之前完成
    if matches!(config.save_mode, SaveMode::ErrorIfExists | SaveMode::Ignore) && store.has_documents(namespace).await? {
        if config.save_mode == SaveMode::ErrorIfExists {
            return Err(crate::bridge_error!(not_empty, namespace));
        }
        info!("目标集合 {} 非空，Ignore 模式跳过 {} 条记录", namespace, records.len());
        return Ok(WriteResult {
            save_mode: config.save_mode,
            written: 0,
            batches: 0,
            skipped: true,
        });
    }

    let models = build_models(records, config)?;

    if config.save_mode == SaveMode::Overwrite {
        info!("Overwrite 模式，清空目标集合 {}", namespace);
        store.drop_collection(namespace).await?;
    }

    let options = BulkWriteOptions {
        ordered: config.ordered,
        write_concern: config.write_concern.clone(),
    };

    let total = models.len();
    let mut batches = 0;
    let mut offset = 0;
    let mut pending = models.into_iter();
    while offset < total {
        let batch: Vec<WriteModel> = pending.by_ref().take(config.max_batch_size).collect();
        let len = batch.len();
        batches += 1;
        debug!("写入 {} 第 {} 批，共 {} 个文档", namespace, batches, len);

        match store.bulk_write(namespace, batch, &options).await {
            Ok(report) if report.errors.is_empty() => {}
            Ok(report) => {
                let failure = partial_failure(namespace, offset, len, total, config.ordered, report.errors);
                error!("写入 {} 部分失败: {}", namespace, failure);
                return Err(failure.into());
            }
            Err(e) => {
                let failure = WriteFailure {
                    namespace: namespace.to_string(),
                    committed: (0..offset).collect(),
                    failed: Vec::new(),
                    not_attempted: (offset + len..total).collect(),
                    in_doubt: (offset..offset + len).collect(),
                    cause: Some(e.to_string()),
                };
                error!("写入 {} 第 {} 批失败: {}", namespace, batches, e);
                return Err(failure.into());
            }
        }
        offset += len;
    }

    info!("写入 {} 完成: {} 个文档，{} 批", namespace, total, batches);
    Ok(WriteResult {
        save_mode: config.save_mode,
        written: total,
        batches,
        skipped: false,
    })
}

/// 把某一批的逐条错误换算为输入记录的提交状态
///
/// 有序写入时第一个错误之前的文档已提交、之后的未尝试；无序写入时批内其他文档都已提交
fn partial_failure(
    namespace: &Namespace,
    offset: usize,
    len: usize,
    total: usize,
    ordered: bool,
    errors: Vec<crate::adapter::BulkItemError>,
) -> WriteFailure {
    let failed: Vec<FailedRecord> = errors
        .into_iter()
        .map(|e| FailedRecord {
            index: offset + e.index,
            code: e.code,
            message: e.message,
        })
        .collect();

    let batch_end = offset + len;
    let (committed, mut not_attempted): (Vec<usize>, Vec<usize>) = if ordered {
        let first = failed.iter().map(|f| f.index).min().unwrap_or(batch_end);
        ((0..first).collect(), (first + 1..batch_end).collect())
    } else {
        let committed: Vec<usize> = (0..batch_end)
            .filter(|idx| !failed.iter().any(|f| f.index == *idx))
            .collect();
        (committed, Vec::new())
    };
    not_attempted.extend(batch_end..total);

    WriteFailure {
        namespace: namespace.to_string(),
        committed,
        failed,
        not_attempted,
        in_doubt: Vec::new(),
        cause: None,
    }
}

/// 把全部记录转换为写操作，任何一条失败都不会产生写入
fn build_models(records: &[Record], config: &WriteConfig) -> BridgeResult<Vec<WriteModel>> {
    let mapper_options = config.mapper_options();
    let mut validated: Option<&Arc<StructType>> = None;
    let mut models = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        if !validated.is_some_and(|schema| Arc::ptr_eq(schema, record.schema())) {
            for field in record.schema().fields() {
                crate::security::validate_field_name(&field.name)?;
            }
            validated = Some(record.schema());
        }

        let document = to_document(record, &mapper_options)?;
        let model = match &config.operation {
            WriteOperation::Insert => WriteModel::InsertOne(document),
            WriteOperation::Replace { id_fields } => WriteModel::ReplaceOne {
                filter: id_filter(&document, id_fields, index)?,
                replacement: document,
                upsert: true,
            },
        };
        models.push(model);
    }

    debug_log!("{} 条记录已转换为写操作", models.len());
    Ok(models)
}

/// 按 id 字段构造替换过滤条件
fn id_filter(document: &Document, id_fields: &[String], index: usize) -> BridgeResult<Document> {
    let mut filter = Document::new();
    for field in id_fields {
        let value = lookup_path(document, field).ok_or_else(|| {
            crate::bridge_error!(validation, field, format!("第 {} 条记录缺少 id 字段", index))
        })?;
        filter.insert(field.clone(), value.clone());
    }
    Ok(filter)
}

fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(nested) => nested.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryStore;
    use crate::config::ConnectorOptions;
    use crate::types::{DataType, DataValue, StructField};
    use bson::doc;

    fn ns() -> Namespace {
        Namespace::new("middle_earth", "people")
    }

    fn config(extra: ConnectorOptions) -> WriteConfig {
        let options = extra
            .with("database", "middle_earth")
            .with("collection", "people");
        WriteConfig::from_options(&options).unwrap()
    }

    fn people(rows: &[(i32, &str)]) -> Vec<Record> {
        let schema = Arc::new(StructType::new(vec![
            StructField::new("_id", DataType::Int32, false),
            StructField::new("name", DataType::String, true),
        ]));
        rows.iter()
            .map(|(id, name)| Record::new(schema.clone(), vec![DataValue::Int32(*id), DataValue::from(*name)]).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_batches_and_append() {
        let store = MemoryStore::new();
        let records = people(&[(1, "Frodo"), (2, "Sam"), (3, "Merry")]);
        let result = write(&store, &records, &config(ConnectorOptions::new().with("write.maxBatchSize", 2)))
            .await
            .unwrap();
        assert_eq!(result.written, 3);
        assert_eq!(result.batches, 2);
        assert_eq!(store.documents(&ns()).len(), 3);
    }

    #[tokio::test]
    async fn test_ordered_partial_failure_reports_indices() {
        let store = MemoryStore::new();
        store.insert_documents(&ns(), vec![doc! { "_id": 3, "name": "Pippin" }]).unwrap();

        let records = people(&[(1, "Frodo"), (2, "Sam"), (3, "Merry"), (4, "Bilbo"), (5, "Gandalf")]);
        let err = write(&store, &records, &config(ConnectorOptions::new().with("write.maxBatchSize", 4)))
            .await
            .unwrap_err();

        let failure = err.write_failure().unwrap();
        assert_eq!(failure.committed, vec![0, 1]);
        assert_eq!(failure.failed.len(), 1);
        assert_eq!(failure.failed[0].index, 2);
        assert_eq!(failure.failed[0].code, crate::adapter::DUPLICATE_KEY_CODE);
        assert_eq!(failure.not_attempted, vec![3, 4]);
        assert!(failure.in_doubt.is_empty());
        assert_eq!(store.documents(&ns()).len(), 3);
    }

    #[tokio::test]
    async fn test_unordered_partial_failure_commits_rest_of_batch() {
        let store = MemoryStore::new();
        store.insert_documents(&ns(), vec![doc! { "_id": 2 }]).unwrap();

        let records = people(&[(1, "Frodo"), (2, "Sam"), (3, "Merry"), (4, "Bilbo")]);
        let options = ConnectorOptions::new()
            .with("write.ordered", false)
            .with("write.maxBatchSize", 3);
        let err = write(&store, &records, &config(options)).await.unwrap_err();

        let failure = err.write_failure().unwrap();
        assert_eq!(failure.committed, vec![0, 2]);
        assert_eq!(failure.failed[0].index, 1);
        assert_eq!(failure.not_attempted, vec![3]);
    }

    #[tokio::test]
    async fn test_conversion_failure_writes_nothing() {
        let store = MemoryStore::new();
        let schema = Arc::new(StructType::new(vec![StructField::new("$name", DataType::String, true)]));
        let records = vec![Record::new(schema, vec![DataValue::from("Frodo")]).unwrap()];
        assert!(write(&store, &records, &config(ConnectorOptions::new())).await.is_err());
        assert!(store.documents(&ns()).is_empty());
    }

    #[tokio::test]
    async fn test_replace_upserts_by_id_fields() {
        let store = MemoryStore::new();
        store.insert_documents(&ns(), vec![doc! { "_id": 1, "name": "Bilbo" }]).unwrap();

        let records = people(&[(1, "Bilbo Baggins"), (2, "Frodo")]);
        let options = ConnectorOptions::new().with("write.operationType", "replace");
        write(&store, &records, &config(options)).await.unwrap();

        let documents = store.documents(&ns());
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0], doc! { "_id": 1, "name": "Bilbo Baggins" });
    }

    #[test]
    fn test_failure_message_is_localized_summary() {
        let failure = WriteFailure {
            committed: vec![0],
            failed: vec![FailedRecord { index: 1, code: 11000, message: "dup".to_string() }],
            not_attempted: vec![2],
            ..Default::default()
        };
        let message = failure.to_string();
        assert!(message.contains("dup"));
        assert!(message.contains("#1"));
    }
}

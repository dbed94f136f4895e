//! 计算引擎接口
//!
//! 计算引擎通过 [`TableSource`] 获取模式、分区和分区读取器，通过 [`TableSink`]
//! 写回记录。任务调度由计算引擎负责；[`collect_partitions`] 是一个本地执行器，
//! 每个分区一个任务，并发数受信号量限制。

use crate::adapter::DocumentStore;
use crate::config::{ReadConfig, WriteConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::partition::Partition;
use crate::pushdown::FilterPlan;
use crate::reader::{read, PartitionReader, ReadSession};
use crate::types::{QueryConditionGroup, Record, StructType};
use crate::writer::{write, WriteResult};
use async_trait::async_trait;
use rat_logger::{debug, warn};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// 表数据源
pub trait TableSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// 记录模式
    fn schema(&self) -> Arc<StructType>;

    /// 分区列表，分区之间可以并行读取
    fn partitions(&self) -> &[Partition];

    /// 下推计划，其中的剩余过滤条件需要计算引擎自行求值
    fn filter_plan(&self) -> &FilterPlan;

    /// 打开分区读取器
    fn open(&self, partition: &Partition) -> PartitionReader;
}

/// 表写入目标
#[async_trait]
pub trait TableSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// 按保存模式写入记录
    async fn write(&self, records: &[Record]) -> BridgeResult<WriteResult>;
}

/// 集合数据源
pub struct CollectionSource {
    session: ReadSession,
}

impl CollectionSource {
    /// 规划读取并创建数据源
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        config: Arc<ReadConfig>,
        schema: Option<StructType>,
    ) -> BridgeResult<Self> {
        let session = read(store, config, schema).await?;
        Ok(Self { session })
    }

    pub fn residual_filters(&self) -> &[QueryConditionGroup] {
        self.session.residual_filters()
    }

    pub fn session(&self) -> &ReadSession {
        &self.session
    }
}

impl TableSource for CollectionSource {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn schema(&self) -> Arc<StructType> {
        self.session.schema().clone()
    }

    fn partitions(&self) -> &[Partition] {
        self.session.partitions()
    }

    fn filter_plan(&self) -> &FilterPlan {
        self.session.filter_plan()
    }

    fn open(&self, partition: &Partition) -> PartitionReader {
        self.session.reader(partition)
    }
}

/// 集合写入目标
pub struct CollectionSink {
    store: Arc<dyn DocumentStore>,
    config: Arc<WriteConfig>,
}

impl CollectionSink {
    pub fn new(store: Arc<dyn DocumentStore>, config: Arc<WriteConfig>) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl TableSink for CollectionSink {
    fn name(&self) -> &'static str {
        "collection"
    }

    async fn write(&self, records: &[Record]) -> BridgeResult<WriteResult> {
        write(self.store.as_ref(), records, &self.config).await
    }
}

/// 本地执行的读取结果
#[derive(Debug, Default)]
pub struct CollectedRecords {
    /// 按分区顺序排列的记录
    pub records: Vec<Record>,
    /// 被跳过的记录转换错误
    pub conversion_errors: Vec<BridgeError>,
}

/// 并行读取所有分区
///
/// 游标错误或严格模式下的转换错误终止整个读取，其余任务随之取消
pub async fn collect_partitions(source: Arc<dyn TableSource>, parallelism: usize) -> BridgeResult<CollectedRecords> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut join_set = JoinSet::new();

    for partition in source.partitions().to_vec() {
        let source = source.clone();
        let semaphore = semaphore.clone();
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| crate::bridge_error!(query, format!("信号量已关闭: {}", e)))?;
            let mut reader = source.open(&partition);
            let mut records = Vec::new();
            let mut conversion_errors = Vec::new();
            while let Some(item) = reader.next().await {
                match item {
                    Ok(record) => records.push(record),
                    Err(e) if e.is_conversion_error() => conversion_errors.push(e),
                    Err(e) => return Err(e),
                }
            }
            debug!("分区 {} 读取 {} 条记录", partition.index, records.len());
            Ok::<_, BridgeError>((partition.index, records, conversion_errors))
        });
    }

    let mut outputs = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        let output = joined.map_err(|e| crate::bridge_error!(query, format!("分区任务异常退出: {}", e)))??;
        outputs.push(output);
    }
    outputs.sort_by_key(|(index, _, _)| *index);

    let mut collected = CollectedRecords::default();
    for (_, records, errors) in outputs {
        collected.records.extend(records);
        collected.conversion_errors.extend(errors);
    }
    if !collected.conversion_errors.is_empty() {
        warn!("{} 条记录转换失败被跳过", collected.conversion_errors.len());
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryStore;
    use crate::config::ConnectorOptions;
    use crate::types::{Namespace, SaveMode};
    use bson::doc;

    #[tokio::test]
    async fn test_parallel_collect_preserves_partition_order() {
        let store = MemoryStore::new();
        let ns = Namespace::new("middle_earth", "numbers");
        store
            .insert_documents(&ns, (0..50).map(|i| doc! { "_id": i }).collect())
            .unwrap();

        let options = ConnectorOptions::new()
            .with("database", "middle_earth")
            .with("collection", "numbers")
            .with("read.partitioner.options.partitionSize", 7);
        let config = ReadConfig::resolve(&options, &ConnectorOptions::new()).unwrap();
        let source = CollectionSource::open(Arc::new(store), config, None).await.unwrap();
        assert_eq!(source.partitions().len(), 8);

        let collected = collect_partitions(Arc::new(source), 3).await.unwrap();
        let ids: Vec<i32> = collected
            .records
            .iter()
            .map(|r| match r.get("_id") {
                Some(crate::types::DataValue::Int32(v)) => *v,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
        assert!(collected.conversion_errors.is_empty());
    }

    #[tokio::test]
    async fn test_sink_writes_through_save_mode() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let options = ConnectorOptions::new()
            .with("database", "middle_earth")
            .with("collection", "empty")
            .with("write.saveMode", SaveMode::Ignore.as_str());
        let sink = CollectionSink::new(store, WriteConfig::resolve(&options, &ConnectorOptions::new()).unwrap());

        let result = sink.write(&[]).await.unwrap();
        assert!(!result.skipped);
        assert_eq!(result.written, 0);
    }
}

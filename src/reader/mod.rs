//! 读取路径
//!
//! [`read`] 先规划分区，未给出模式时从前几个分区采样推断，最后生成下推计划。
//! 每个分区通过 [`PartitionReader`] 独立读取：读取器在第一次取值时打开自己的游标，
//! 游标在读取器被丢弃时释放。读取器不可重启，重新读取需要重新打开。

use crate::adapter::{DocumentCursor, DocumentStore, FindQuery};
use crate::config::ReadConfig;
use crate::error::BridgeResult;
use crate::inference::infer_schema;
use crate::mapper::{to_record, MapperOptions};
use crate::partition::{plan_partitions, Partition};
use crate::pushdown::{plan_filters, FilterPlan};
use crate::types::{QueryConditionGroup, Record, StructType};
use crate::debug_log;
use bson::Document;
use futures::Stream;
use rat_logger::{debug, info, warn};
use std::sync::Arc;

/// 一次读取的规划结果
pub struct ReadSession {
    store: Arc<dyn DocumentStore>,
    config: Arc<ReadConfig>,
    schema: Arc<StructType>,
    partitions: Vec<Partition>,
    filter_plan: FilterPlan,
}

/// 规划一次读取
///
/// 分区规划失败时整个读取失败，除非开启了 `fallbackToSingle`
pub async fn read(
    store: Arc<dyn DocumentStore>,
    config: Arc<ReadConfig>,
    schema: Option<StructType>,
) -> BridgeResult<ReadSession> {
    let partitions = plan_partitions(store.as_ref(), &config.namespace, &config.partitioner).await?;

    let schema = match schema {
        Some(schema) if config.extended_as_string => schema.extended_as_string(),
        Some(schema) => schema,
        None => {
            let samples = sample_documents(store.as_ref(), &config, &partitions).await?;
            infer_schema(&samples, &config.inference_options())?
        }
    };

    let filter_plan = plan_filters(&config.filters, Some(&schema), config.pushdown_enabled)?;
    if !filter_plan.residual.is_empty() {
        debug!("{} 个过滤条件无法下推，需要调用方求值", filter_plan.residual.len());
    }

    info!(
        "读取 {} 规划完成: {} 个分区，{} 个字段",
        config.namespace,
        partitions.len(),
        schema.len()
    );

    Ok(ReadSession {
        store,
        config,
        schema: Arc::new(schema),
        partitions,
        filter_plan,
    })
}

/// 按规划顺序从分区中采样，直到凑够采样数
async fn sample_documents(
    store: &dyn DocumentStore,
    config: &ReadConfig,
    partitions: &[Partition],
) -> BridgeResult<Vec<Document>> {
    let mut samples = Vec::with_capacity(config.sample_size.min(1024));
    for partition in partitions {
        let remaining = config.sample_size - samples.len();
        if remaining == 0 {
            break;
        }
        let query = FindQuery::new(partition.bounds.query())
            .limit(remaining as i64)
            .batch_size(config.batch_size)
            .read_preference(config.read_preference);
        let mut cursor = store.find(&config.namespace, query).await?;
        while let Some(document) = cursor.next_document().await? {
            samples.push(document);
        }
    }
    debug_log!("集合 {} 采样 {} 个文档用于模式推断", config.namespace, samples.len());
    Ok(samples)
}

impl ReadSession {
    pub fn schema(&self) -> &Arc<StructType> {
        &self.schema
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn filter_plan(&self) -> &FilterPlan {
        &self.filter_plan
    }

    /// 没有下推、需要调用方再次求值的过滤条件
    pub fn residual_filters(&self) -> &[QueryConditionGroup] {
        &self.filter_plan.residual
    }

    pub fn config(&self) -> &Arc<ReadConfig> {
        &self.config
    }

    /// 创建分区读取器
    pub fn reader(&self, partition: &Partition) -> PartitionReader {
        let mut query = FindQuery::new(partition.query_with(&self.filter_plan.query))
            .batch_size(self.config.batch_size)
            .read_preference(self.config.read_preference);
        if !self.schema.is_empty() {
            let mut projection = Document::new();
            for name in self.schema.field_names() {
                projection.insert(name, 1);
            }
            query = query.projection(projection);
        }

        PartitionReader {
            store: self.store.clone(),
            config: self.config.clone(),
            schema: self.schema.clone(),
            mapper_options: self.config.mapper_options(),
            partition_index: partition.index,
            query: Some(query),
            cursor: None,
            finished: false,
            produced: 0,
        }
    }

    /// 所有分区的读取器
    pub fn readers(&self) -> Vec<PartitionReader> {
        self.partitions.iter().map(|p| self.reader(p)).collect()
    }
}

/// 分区读取器
pub struct PartitionReader {
    store: Arc<dyn DocumentStore>,
    config: Arc<ReadConfig>,
    schema: Arc<StructType>,
    mapper_options: MapperOptions,
    partition_index: usize,
    query: Option<FindQuery>,
    cursor: Option<Box<dyn DocumentCursor>>,
    finished: bool,
    produced: u64,
}

impl PartitionReader {
    pub fn partition_index(&self) -> usize {
        self.partition_index
    }

    /// 读取下一条记录
    ///
    /// 单条记录的转换错误作为元素返回，读取继续；开启 `strictConversion` 时
    /// 第一个错误之后序列结束。游标错误总是结束序列。
    pub async fn next(&mut self) -> Option<BridgeResult<Record>> {
        if self.finished {
            return None;
        }

        if self.cursor.is_none() {
            let query = self.query.take()?;
            debug!("打开分区 {} 的游标: {:?}", self.partition_index, query.filter);
            match self.store.find(&self.config.namespace, query).await {
                Ok(cursor) => self.cursor = Some(cursor),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        let cursor = self.cursor.as_mut()?;

        let document = match cursor.next_document().await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug_log!("分区 {} 读取完成，共 {} 条记录", self.partition_index, self.produced);
                self.finish();
                return None;
            }
            Err(e) => {
                self.finish();
                return Some(Err(e));
            }
        };

        match to_record(&document, &self.schema, &self.mapper_options) {
            Ok(record) => {
                self.produced += 1;
                Some(Ok(record))
            }
            Err(e) => {
                if self.config.strict_conversion {
                    warn!("分区 {} 记录转换失败，严格模式下终止读取: {}", self.partition_index, e);
                    self.finish();
                } else {
                    debug!("分区 {} 记录转换失败: {}", self.partition_index, e);
                }
                Some(Err(e))
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        // 释放游标占用的连接
        self.cursor = None;
    }

    /// 转换为异步流
    pub fn into_stream(self) -> impl Stream<Item = BridgeResult<Record>> + Send {
        futures::stream::unfold(self, |mut reader| async move {
            let item = reader.next().await?;
            Some((item, reader))
        })
    }

    /// 读完整个分区，遇到第一个错误即返回
    pub async fn collect(mut self) -> BridgeResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(item) = self.next().await {
            records.push(item?);
        }
        Ok(records)
    }
}

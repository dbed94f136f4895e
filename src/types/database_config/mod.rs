use serde::{Deserialize, Serialize};
use std::fmt;

/// 集合命名空间（数据库名 + 集合名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// 数据库名
    pub database: String,
    /// 集合名
    pub collection: String,
}

impl Namespace {
    pub fn new<D: Into<String>, C: Into<String>>(database: D, collection: C) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// 读偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadPreference {
    /// 只读主节点
    #[default]
    Primary,
    /// 优先主节点
    PrimaryPreferred,
    /// 只读从节点
    Secondary,
    /// 优先从节点
    SecondaryPreferred,
    /// 最近节点
    Nearest,
}

impl ReadPreference {
    /// 获取读偏好的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPreference::Primary => "primary",
            ReadPreference::PrimaryPreferred => "primaryPreferred",
            ReadPreference::Secondary => "secondary",
            ReadPreference::SecondaryPreferred => "secondaryPreferred",
            ReadPreference::Nearest => "nearest",
        }
    }

    /// 从字符串解析读偏好（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Some(ReadPreference::Primary),
            "primarypreferred" => Some(ReadPreference::PrimaryPreferred),
            "secondary" => Some(ReadPreference::Secondary),
            "secondarypreferred" => Some(ReadPreference::SecondaryPreferred),
            "nearest" => Some(ReadPreference::Nearest),
            _ => None,
        }
    }
}

/// 写入保存模式 - 目标集合已有数据时的写入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveMode {
    /// 追加写入，重复键错误会被上报
    #[default]
    Append,
    /// 清空目标集合后写入（破坏性操作，只能显式指定）
    Overwrite,
    /// 目标集合非空时在任何写入之前失败
    ErrorIfExists,
    /// 目标集合非空时不做任何操作
    Ignore,
}

impl SaveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveMode::Append => "append",
            SaveMode::Overwrite => "overwrite",
            SaveMode::ErrorIfExists => "errorIfExists",
            SaveMode::Ignore => "ignore",
        }
    }

    /// 从字符串解析保存模式（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "append" => Some(SaveMode::Append),
            "overwrite" => Some(SaveMode::Overwrite),
            "errorifexists" | "error" => Some(SaveMode::ErrorIfExists),
            "ignore" => Some(SaveMode::Ignore),
            _ => None,
        }
    }
}

/// 写入操作类型
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteOperation {
    /// 插入文档
    #[default]
    Insert,
    /// 按 id 字段替换，不存在时插入
    Replace {
        /// 用于匹配已有文档的字段
        id_fields: Vec<String>,
    },
}

/// 分区策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartitionerKind {
    /// 整个集合一个分区
    Single,
    /// 按键排序后每 N 条文档一个分区
    #[default]
    PaginateBySize,
    /// 每个分片块一个分区
    Shard,
}

impl PartitionerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionerKind::Single => "single",
            PartitionerKind::PaginateBySize => "paginateBySize",
            PartitionerKind::Shard => "shard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Some(PartitionerKind::Single),
            "paginatebysize" | "paginate" => Some(PartitionerKind::PaginateBySize),
            "shard" | "sharded" => Some(PartitionerKind::Shard),
            _ => None,
        }
    }
}

/// 连接池配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 最小连接数
    pub min_connections: u32,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            connection_timeout: 30,
            idle_timeout: 600,
        }
    }
}

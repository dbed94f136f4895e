//! rat_docbridge - 文档数据库与分布式计算引擎之间的数据桥接库
//!
//! 把集合读取为分区化、惰性的强类型记录序列，并按保存模式把记录写回集合。
//! 包含类型映射、模式推断、分区规划、谓词下推和批量写入。

// 导出所有公共模块
pub mod error;
pub mod i18n;
pub mod types;
pub mod security;
pub mod mapper;
pub mod inference;
pub mod adapter;
pub mod partition;
pub mod pushdown;
pub mod config;
pub mod reader;
pub mod writer;
pub mod engine;
pub mod connector;

// 重新导出常用类型和函数
pub use error::{BridgeError, BridgeResult};
pub use types::*;
pub use mapper::{to_document, to_record, MapperOptions};
pub use inference::{infer_schema, InferenceOptions};
pub use adapter::{create_store, DocumentStore, MemoryStore};
#[cfg(feature = "mongodb-support")]
pub use adapter::MongoStore;
pub use partition::{plan_partitions, Partition, PartitionBounds, Partitioner, PartitionerOptions};
pub use pushdown::{plan_filters, FilterPlan, PushdownCapability};
pub use config::{
    init_process_defaults, ConnectorOptions, ReadConfig, ReadConfigBuilder, WriteConfig, WriteConfigBuilder,
};
pub use reader::{read, PartitionReader, ReadSession};
pub use writer::{write, FailedRecord, WriteFailure, WriteResult};
pub use engine::{collect_partitions, CollectionSink, CollectionSource, TableSink, TableSource};
pub use connector::Connector;

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_docbridge库
///
/// 初始化多语言错误消息系统
///
/// 注意：日志系统由调用者自行初始化，本库不会初始化日志
pub fn init() {
    i18n::ErrorMessageI18n::init();
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}

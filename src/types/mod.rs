//! 桥接类型定义
//!
//! 记录模式、记录值、过滤条件以及读写相关的枚举配置

pub mod database_config;
pub mod data_value;
pub mod query;
pub mod record;
pub mod schema;
pub mod mongo_builder;

pub use database_config::{Namespace, PartitionerKind, PoolConfig, ReadPreference, SaveMode, WriteOperation};
pub use data_value::DataValue;
pub use query::{LogicalOperator, QueryCondition, QueryConditionGroup, QueryOperator};
pub use record::Record;
pub use schema::{DataType, ExtendedKind, StructField, StructType};
pub use mongo_builder::MongoUriBuilder;

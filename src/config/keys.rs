//! 配置键

pub const CONNECTION_URI: &str = "connection.uri";
pub const DATABASE: &str = "database";
pub const COLLECTION: &str = "collection";

pub const READ_PREFERENCE: &str = "read.readPreference";
pub const READ_SAMPLE_SIZE: &str = "read.sampleSize";
pub const READ_PUSHDOWN_ENABLED: &str = "read.pushdown.enabled";
pub const READ_BATCH_SIZE: &str = "read.batchSize";
pub const READ_PARTITIONER: &str = "read.partitioner";
pub const READ_PARTITION_FIELD: &str = "read.partitioner.options.partitionField";
pub const READ_PARTITION_SIZE: &str = "read.partitioner.options.partitionSize";
pub const READ_FALLBACK_TO_SINGLE: &str = "read.partitioner.fallbackToSingle";
pub const READ_STRICT_CONVERSION: &str = "read.strictConversion";
pub const READ_EXTENDED_AS_STRINGS: &str = "read.extendedTypesAsStrings";
/// 过滤条件，JSON 编码的条件组列表
pub const READ_FILTER: &str = "read.filter";

pub const WRITE_SAVE_MODE: &str = "write.saveMode";
pub const WRITE_OPERATION_TYPE: &str = "write.operationType";
/// 逗号分隔
pub const WRITE_ID_FIELD_LIST: &str = "write.idFieldList";
pub const WRITE_MAX_BATCH_SIZE: &str = "write.maxBatchSize";
pub const WRITE_ORDERED: &str = "write.ordered";
pub const WRITE_IGNORE_NULL_VALUES: &str = "write.ignoreNullValues";
pub const WRITE_CONCERN_W: &str = "write.writeConcern.w";

pub const POOL_MAX_SIZE: &str = "pool.maxPoolSize";
pub const POOL_MIN_SIZE: &str = "pool.minPoolSize";
pub const POOL_CONNECT_TIMEOUT_SECS: &str = "pool.connectTimeoutSecs";
pub const POOL_MAX_IDLE_TIME_SECS: &str = "pool.maxIdleTimeSecs";

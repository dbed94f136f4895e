//! 错误处理模块
//!
//! 定义桥接库统一的错误类型和结果别名。
//! 消息文本在构造时经由 i18n 模块本地化，错误类型本身只负责承载。

use crate::writer::WriteFailure;
use thiserror::Error;

/// 桥接库统一结果类型
pub type BridgeResult<T> = Result<T, BridgeError>;

/// 桥接库错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    /// 文档值与记录模式声明的类型不兼容
    #[error("模式不匹配: 字段 '{path}' 期望 {expected}，实际为 {actual}")]
    SchemaMismatch {
        /// 出错字段的点分路径
        path: String,
        /// 模式声明的类型
        expected: String,
        /// 文档中的实际类型
        actual: String,
    },

    /// 分区规划失败，整个读取操作终止
    #[error("{message}")]
    PartitionPlanningFailure { message: String },

    /// 批量写入部分失败，携带逐条提交状态
    #[error("{0}")]
    WriteError(Box<WriteFailure>),

    /// ErrorIfExists 模式下目标集合非空
    #[error("{message}")]
    CollectionNotEmpty { namespace: String, message: String },

    /// 连接错误
    #[error("{message}")]
    ConnectionError { message: String },

    /// 查询执行错误
    #[error("{message}")]
    QueryError { message: String },

    /// 配置错误
    #[error("{message}")]
    ConfigError { message: String },

    /// 验证错误
    #[error("{message}")]
    ValidationError { field: String, message: String },

    /// 序列化错误
    #[error("{message}")]
    SerializationError { message: String },

    /// 不支持的存储后端
    #[error("{message}")]
    UnsupportedStore { scheme: String, message: String },

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// 是否为单条记录的转换错误（读取时可跳过而不终止整个读取）
    pub fn is_conversion_error(&self) -> bool {
        matches!(self, BridgeError::SchemaMismatch { .. })
    }

    /// 取出写入失败详情
    pub fn write_failure(&self) -> Option<&WriteFailure> {
        match self {
            BridgeError::WriteError(failure) => Some(failure.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        crate::bridge_error!(serialization, e.to_string())
    }
}

impl From<WriteFailure> for BridgeError {
    fn from(failure: WriteFailure) -> Self {
        BridgeError::WriteError(Box::new(failure))
    }
}

/// 快速构造本地化错误
///
/// ```rust,ignore
/// return Err(bridge_error!(config, "缺少 connection.uri"));
/// ```
#[macro_export]
macro_rules! bridge_error {
    (connection, $msg:expr) => {
        $crate::error::BridgeError::ConnectionError {
            message: $crate::i18n::tf("error.connection", &[("message", &$msg.to_string())]),
        }
    };
    (query, $msg:expr) => {
        $crate::error::BridgeError::QueryError {
            message: $crate::i18n::tf("error.query", &[("message", &$msg.to_string())]),
        }
    };
    (config, $msg:expr) => {
        $crate::error::BridgeError::ConfigError {
            message: $crate::i18n::tf("error.config", &[("message", &$msg.to_string())]),
        }
    };
    (serialization, $msg:expr) => {
        $crate::error::BridgeError::SerializationError {
            message: $crate::i18n::tf("error.serialization", &[("message", &$msg.to_string())]),
        }
    };
    (validation, $field:expr, $msg:expr) => {
        $crate::error::BridgeError::ValidationError {
            field: $field.to_string(),
            message: $crate::i18n::tf(
                "error.validation",
                &[("field", &$field.to_string()), ("message", &$msg.to_string())],
            ),
        }
    };
    (planning, $msg:expr) => {
        $crate::error::BridgeError::PartitionPlanningFailure {
            message: $crate::i18n::tf("error.partition_planning", &[("message", &$msg.to_string())]),
        }
    };
    (not_empty, $ns:expr) => {
        $crate::error::BridgeError::CollectionNotEmpty {
            namespace: $ns.to_string(),
            message: $crate::i18n::tf("error.collection_not_empty", &[("namespace", &$ns.to_string())]),
        }
    };
    (unsupported_store, $scheme:expr) => {
        $crate::error::BridgeError::UnsupportedStore {
            scheme: $scheme.to_string(),
            message: $crate::i18n::tf("error.unsupported_store", &[("scheme", &$scheme.to_string())]),
        }
    };
    (mismatch, $path:expr, $expected:expr, $actual:expr) => {
        $crate::error::BridgeError::SchemaMismatch {
            path: $path.to_string(),
            expected: $expected.to_string(),
            actual: $actual.to_string(),
        }
    };
}

//! MongoDB工具函数模块
//!
//! 包含选项转换、错误转换和游标封装

use crate::adapter::{BulkItemError, DocumentCursor};
use crate::error::{BridgeError, BridgeResult};
use crate::types::ReadPreference;
use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{Acknowledgment, ReadPreferenceOptions, SelectionCriteria, WriteConcern};
use mongodb::Cursor;

/// 读偏好转换为驱动的选择条件
pub(crate) fn selection_criteria(read_preference: ReadPreference) -> Option<SelectionCriteria> {
    let options = ReadPreferenceOptions::default();
    let preference = match read_preference {
        // 主节点是驱动默认值，不额外设置
        ReadPreference::Primary => return None,
        ReadPreference::PrimaryPreferred => mongodb::options::ReadPreference::PrimaryPreferred { options },
        ReadPreference::Secondary => mongodb::options::ReadPreference::Secondary { options },
        ReadPreference::SecondaryPreferred => mongodb::options::ReadPreference::SecondaryPreferred { options },
        ReadPreference::Nearest => mongodb::options::ReadPreference::Nearest { options },
    };
    Some(SelectionCriteria::ReadPreference(preference))
}

/// 写关注 `w` 值转换
pub(crate) fn write_concern(w: Option<&str>) -> Option<WriteConcern> {
    let w = w?;
    let acknowledgment = match w.parse::<u32>() {
        Ok(nodes) => Acknowledgment::Nodes(nodes),
        Err(_) if w.eq_ignore_ascii_case("majority") => Acknowledgment::Majority,
        Err(_) => Acknowledgment::Custom(w.to_string()),
    };
    Some(WriteConcern::builder().w(acknowledgment).build())
}

/// 驱动错误转换为查询错误
pub(crate) fn query_error(context: &str, error: mongodb::error::Error) -> BridgeError {
    crate::bridge_error!(query, format!("{}: {}", context, error))
}

/// 从批量插入错误中取出逐条失败信息
///
/// 不是逐条写入错误（如网络中断）时返回 Err，整批状态未知
pub(crate) fn bulk_item_errors(error: mongodb::error::Error) -> Result<Vec<BulkItemError>, mongodb::error::Error> {
    let items = match error.kind.as_ref() {
        ErrorKind::BulkWrite(failure) => failure.write_errors.as_ref().map(|write_errors| {
            write_errors
                .iter()
                .map(|e| BulkItemError {
                    index: e.index,
                    code: e.code,
                    message: e.message.clone(),
                })
                .collect::<Vec<_>>()
        }),
        _ => None,
    };
    match items {
        Some(items) if !items.is_empty() => Ok(items),
        _ => Err(error),
    }
}

/// 单条写入错误
pub(crate) fn single_item_error(index: usize, error: mongodb::error::Error) -> Result<BulkItemError, mongodb::error::Error> {
    let item = match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(BulkItemError {
            index,
            code: write_error.code,
            message: write_error.message.clone(),
        }),
        _ => None,
    };
    item.ok_or(error)
}

/// MongoDB游标封装
pub(crate) struct MongoCursor {
    pub(crate) cursor: Cursor<Document>,
}

#[async_trait]
impl DocumentCursor for MongoCursor {
    async fn next_document(&mut self) -> BridgeResult<Option<Document>> {
        let has_next = self
            .cursor
            .advance()
            .await
            .map_err(|e| query_error("MongoDB游标遍历失败", e))?;
        if !has_next {
            return Ok(None);
        }
        let document = self
            .cursor
            .deserialize_current()
            .map_err(|e| query_error("MongoDB文档反序列化失败", e))?;
        Ok(Some(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_concern_parsing() {
        assert!(write_concern(None).is_none());
        assert!(matches!(write_concern(Some("2")).and_then(|wc| wc.w), Some(Acknowledgment::Nodes(2))));
        assert!(matches!(write_concern(Some("Majority")).and_then(|wc| wc.w), Some(Acknowledgment::Majority)));
    }

    #[test]
    fn test_primary_uses_driver_default() {
        assert!(selection_criteria(ReadPreference::Primary).is_none());
        assert!(selection_criteria(ReadPreference::Nearest).is_some());
    }
}

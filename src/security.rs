//! 标识符安全验证
//!
//! 校验数据库名、集合名和字段名，防止配置或记录模式把操作符
//! 或系统集合注入到服务端请求中

use crate::error::BridgeResult;
use crate::types::Namespace;

/// 数据库名中不允许出现的字符
const DATABASE_FORBIDDEN: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];
/// 数据库名最大字节数
const MAX_DATABASE_NAME_LEN: usize = 64;
/// 命名空间（库名.集合名）最大字节数
const MAX_NAMESPACE_LEN: usize = 255;

/// 验证数据库名
pub fn validate_database_name(name: &str) -> BridgeResult<()> {
    if name.is_empty() {
        return Err(crate::bridge_error!(validation, "database", "数据库名不能为空"));
    }
    if name.len() > MAX_DATABASE_NAME_LEN {
        return Err(crate::bridge_error!(validation, name, "数据库名长度不能超过64个字节"));
    }
    if let Some(ch) = name.chars().find(|ch| DATABASE_FORBIDDEN.contains(ch)) {
        return Err(crate::bridge_error!(validation, name, format!("数据库名包含非法字符 '{}'", ch.escape_default())));
    }
    Ok(())
}

/// 验证集合名
pub fn validate_collection_name(name: &str) -> BridgeResult<()> {
    if name.is_empty() {
        return Err(crate::bridge_error!(validation, "collection", "集合名不能为空"));
    }
    if name.contains('$') {
        return Err(crate::bridge_error!(validation, name, "集合名不能包含$"));
    }
    if name.contains('\0') {
        return Err(crate::bridge_error!(validation, name, "集合名不能包含空字符"));
    }
    if name.starts_with("system.") {
        return Err(crate::bridge_error!(validation, name, "集合名不能以system.开头"));
    }
    Ok(())
}

/// 验证命名空间
pub fn validate_namespace(namespace: &Namespace) -> BridgeResult<()> {
    validate_database_name(&namespace.database)?;
    validate_collection_name(&namespace.collection)?;
    if namespace.to_string().len() > MAX_NAMESPACE_LEN {
        return Err(crate::bridge_error!(validation, namespace, "命名空间长度不能超过255个字节"));
    }
    Ok(())
}

/// 验证写入文档中的单个字段名
///
/// 字段名不能为空、不能以$开头，也不能包含点号或空字符
pub fn validate_field_name(name: &str) -> BridgeResult<()> {
    if name.is_empty() {
        return Err(crate::bridge_error!(validation, "field_name", "字段名不能为空"));
    }
    if name.starts_with('$') {
        return Err(crate::bridge_error!(validation, name, "字段名不能以$开头"));
    }
    if name.contains('.') {
        return Err(crate::bridge_error!(validation, name, "字段名不能包含点号"));
    }
    if name.contains('\0') {
        return Err(crate::bridge_error!(validation, name, "字段名不能包含空字符"));
    }
    Ok(())
}

/// 验证点分字段路径（过滤、排序、分区键）
pub fn validate_field_path(path: &str) -> BridgeResult<()> {
    if path.is_empty() {
        return Err(crate::bridge_error!(validation, "field_path", "字段路径不能为空"));
    }
    for segment in path.split('.') {
        validate_field_name(segment).map_err(|_| {
            crate::bridge_error!(validation, path, format!("字段路径片段 '{}' 非法", segment))
        })?;
    }
    Ok(())
}

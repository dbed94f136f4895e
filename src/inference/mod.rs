//! 模式推断
//!
//! 对采样文档逐字段求类型上确界。放宽规则满足交换律和结合律，并对所有类型对都有定义：
//!
//! - `Null ⊔ T = T`，`T ⊔ T = T`
//! - `Int32 ⊔ Int64 = Int64`，整数与 `Double` 放宽为 `Double`
//! - 数组按元素类型放宽，`contains_null` 取或
//! - 普通结构按字段取并集，只在一侧出现的字段标记为可空；
//!   只缺失过、从未显式为 null 的字段标记为 `omit_when_null`，写回时不补 null
//! - 相同的扩展类型包装保持不变，其余组合一律放宽为 `String`
//!
//! 数组元素的整数宽度按整个数组放宽，`[Int32, Int64]` 写回为两个 `Int64`。
//!
//! 推断结果的字段顺序固定为 `_id` 在前，其余按字段名字典序，与采样顺序无关。

use crate::debug_log;
use crate::error::BridgeResult;
use crate::mapper::extended_kind_of;
use crate::types::{DataType, StructField, StructType};
use bson::spec::BinarySubtype;
use bson::{Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;

/// 默认采样数量
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// 推断选项
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOptions {
    /// 最多使用的样本文档数量
    pub sample_size: usize,
    /// 调用方固定的字段类型（支持点分路径），覆盖推断结果
    pub type_hints: HashMap<String, DataType>,
    /// 扩展类型按字符串推断
    pub extended_as_string: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            type_hints: HashMap::new(),
            extended_as_string: false,
        }
    }
}

impl InferenceOptions {
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// 固定某个字段的类型
    pub fn with_type_hint(mut self, field: impl Into<String>, data_type: DataType) -> Self {
        self.type_hints.insert(field.into(), data_type);
        self
    }
}

/// 从样本文档推断记录模式
///
/// 空样本得到没有字段的模式
pub fn infer_schema(samples: &[Document], options: &InferenceOptions) -> BridgeResult<StructType> {
    if options.sample_size == 0 {
        return Err(crate::bridge_error!(validation, "read.sampleSize", "采样数量必须大于0"));
    }

    let used = samples.len().min(options.sample_size);
    let mut schema = StructType::empty();
    for (idx, document) in samples.iter().take(used).enumerate() {
        let observed = infer_document_type(document, options.extended_as_string);
        schema = if idx == 0 { observed } else { widen_struct(&schema, &observed) };
    }

    let mut fields = schema.fields().to_vec();
    for (path, data_type) in &options.type_hints {
        let parts: Vec<&str> = path.split('.').collect();
        apply_hint(&mut fields, &parts, data_type);
    }
    let schema = StructType::new(sort_fields(fields));

    debug_log!("从 {} 个样本文档推断出 {} 个字段: {}", used, schema.len(), DataType::Struct(schema.clone()));
    Ok(schema)
}

/// 推断单个 BSON 值的类型
pub fn infer_value_type(value: &Bson, extended_as_string: bool) -> DataType {
    if let Some(kind) = extended_kind_of(value) {
        return if extended_as_string { DataType::String } else { kind.data_type() };
    }

    match value {
        Bson::Null => DataType::Null,
        Bson::Boolean(_) => DataType::Boolean,
        Bson::Int32(_) => DataType::Int32,
        Bson::Int64(_) => DataType::Int64,
        Bson::Double(_) => DataType::Double,
        Bson::String(_) => DataType::String,
        Bson::DateTime(_) => DataType::Timestamp,
        Bson::Binary(bin) if bin.subtype == BinarySubtype::Generic => DataType::Binary,
        Bson::Document(doc) => DataType::Struct(infer_document_type(doc, extended_as_string)),
        Bson::Array(items) => {
            let mut element = DataType::Null;
            let mut contains_null = false;
            for item in items {
                if matches!(item, Bson::Null) {
                    contains_null = true;
                    continue;
                }
                element = widen(&element, &infer_value_type(item, extended_as_string));
            }
            DataType::array(element, contains_null)
        }
        // 其余取值都已由 extended_kind_of 处理
        _ => DataType::String,
    }
}

fn infer_document_type(document: &Document, extended_as_string: bool) -> StructType {
    let fields = document
        .iter()
        .map(|(name, value)| {
            let data_type = infer_value_type(value, extended_as_string);
            let nullable = data_type == DataType::Null;
            StructField::new(name.clone(), data_type, nullable)
        })
        .collect();
    StructType::new(sort_fields(fields))
}

/// 两个类型的上确界
pub fn widen(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        _ if a == b => a.clone(),
        (DataType::Int32, DataType::Int64) | (DataType::Int64, DataType::Int32) => DataType::Int64,
        _ if a.is_numeric() && b.is_numeric() => DataType::Double,
        (
            DataType::Array { element: ea, contains_null: na },
            DataType::Array { element: eb, contains_null: nb },
        ) => DataType::array(widen(ea, eb), *na || *nb),
        (DataType::Struct(sa), DataType::Struct(sb)) if sa.extended().is_none() && sb.extended().is_none() => {
            DataType::Struct(widen_struct(sa, sb))
        }
        _ => DataType::String,
    }
}

/// 普通结构的字段并集
pub fn widen_struct(a: &StructType, b: &StructType) -> StructType {
    let mut fields: Vec<StructField> = Vec::with_capacity(a.len().max(b.len()));

    for field in a.fields() {
        match b.field(&field.name) {
            Some(other) => {
                let data_type = widen(&field.data_type, &other.data_type);
                let nullable = field.nullable || other.nullable || data_type == DataType::Null;
                let seen_null = seen_null(field) || seen_null(other);
                let omit = !seen_null && (field.omit_when_null || other.omit_when_null);
                fields.push(StructField::new(field.name.clone(), data_type, nullable).with_omit_when_null(omit));
            }
            None => fields.push(absent_on_one_side(field)),
        }
    }
    for field in b.fields() {
        if a.field(&field.name).is_none() {
            fields.push(absent_on_one_side(field));
        }
    }

    StructType::new(sort_fields(fields))
}

/// 字段在来源中是否显式出现过 null
fn seen_null(field: &StructField) -> bool {
    field.nullable && !field.omit_when_null
}

fn absent_on_one_side(field: &StructField) -> StructField {
    StructField::new(field.name.clone(), field.data_type.clone(), true).with_omit_when_null(!seen_null(field))
}

fn field_order(a: &str, b: &str) -> Ordering {
    match (a == "_id", b == "_id") {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

fn sort_fields(mut fields: Vec<StructField>) -> Vec<StructField> {
    fields.sort_by(|a, b| field_order(&a.name, &b.name));
    fields
}

fn apply_hint(fields: &mut Vec<StructField>, path: &[&str], data_type: &DataType) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    let idx = match fields.iter().position(|f| f.name == *head) {
        Some(idx) => idx,
        None => {
            // 未观察到的字段按可空加入
            let placeholder = if rest.is_empty() { data_type.clone() } else { DataType::Struct(StructType::empty()) };
            fields.push(StructField::new(*head, placeholder, true));
            fields.len() - 1
        }
    };

    if rest.is_empty() {
        fields[idx].data_type = data_type.clone();
        return;
    }

    let nested = match &fields[idx].data_type {
        DataType::Struct(st) if st.extended().is_none() => st.fields().to_vec(),
        _ => Vec::new(),
    };
    let mut nested = nested;
    apply_hint(&mut nested, rest, data_type);
    fields[idx].data_type = DataType::Struct(StructType::new(sort_fields(nested)));
}

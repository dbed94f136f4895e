//! MongoDB查询构建器
//!
//! 把过滤条件翻译为查询文档，无法翻译的条件原样留给调用方求值

use crate::error::BridgeResult;
use crate::mapper::{data_value_to_bson, value_to_bson, MapperOptions};
use crate::pushdown::{FilterPlan, PushdownCapability};
use crate::types::*;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use rat_logger::debug;

/// MongoDB查询构建器
pub struct MongoQueryBuilder<'a> {
    condition_groups: Vec<QueryConditionGroup>,
    schema: Option<&'a StructType>,
}

impl<'a> MongoQueryBuilder<'a> {
    /// 创建新的MongoDB查询构建器
    pub fn new() -> Self {
        Self {
            condition_groups: Vec::new(),
            schema: None,
        }
    }

    /// 使用记录模式辅助值转换（如 ObjectId 字段的十六进制字符串）
    pub fn with_schema(mut self, schema: &'a StructType) -> Self {
        self.schema = Some(schema);
        self
    }

    /// 添加单个条件
    pub fn where_condition(mut self, condition: QueryCondition) -> Self {
        self.condition_groups.push(QueryConditionGroup::Single(condition));
        self
    }

    /// 添加条件组合（顶层条件之间为 AND 关系）
    pub fn where_condition_groups(mut self, groups: &[QueryConditionGroup]) -> Self {
        self.condition_groups.extend_from_slice(groups);
        self
    }

    /// 构建下推计划
    pub fn build(self) -> BridgeResult<FilterPlan> {
        debug!("[MongoDB] 开始构建下推查询，条件组数量: {}", self.condition_groups.len());

        let mut pushed = Vec::new();
        let mut residual = Vec::new();
        for group in &self.condition_groups {
            self.push_conjunct(group, &mut pushed, &mut residual)?;
        }

        let query = match pushed.len() {
            0 => Document::new(),
            1 => pushed.into_iter().next().unwrap_or_default(),
            _ => doc! { "$and": pushed },
        };

        let mut capabilities: Vec<(QueryOperator, PushdownCapability)> = Vec::new();
        for group in &self.condition_groups {
            for leaf in group.leaves() {
                let capability = match self.translate_condition(leaf)? {
                    Some(_) => PushdownCapability::Supported,
                    None => PushdownCapability::Unsupported,
                };
                match capabilities.iter_mut().find(|(op, _)| *op == leaf.operator) {
                    Some((_, existing)) => {
                        if capability == PushdownCapability::Unsupported {
                            *existing = PushdownCapability::Unsupported;
                        }
                    }
                    None => capabilities.push((leaf.operator.clone(), capability)),
                }
            }
        }

        debug!("[MongoDB] 完成下推查询构建: {:?}，剩余 {} 个条件由调用方求值", query, residual.len());
        Ok(FilterPlan {
            query,
            residual,
            capabilities,
        })
    }

    /// AND 语境下的条件：可翻译的部分下推，其余留给调用方
    fn push_conjunct(
        &self,
        group: &QueryConditionGroup,
        pushed: &mut Vec<Document>,
        residual: &mut Vec<QueryConditionGroup>,
    ) -> BridgeResult<()> {
        if let QueryConditionGroup::Group {
            operator: LogicalOperator::And,
            conditions,
        } = group
        {
            for child in conditions {
                self.push_conjunct(child, pushed, residual)?;
            }
            return Ok(());
        }

        match self.translate_group(group)? {
            Some(doc) if doc.is_empty() => {}
            Some(doc) => pushed.push(doc),
            None => residual.push(group.clone()),
        }
        Ok(())
    }

    /// 完整翻译条件组合，任一叶子无法翻译时返回 None
    fn translate_group(&self, group: &QueryConditionGroup) -> BridgeResult<Option<Document>> {
        match group {
            QueryConditionGroup::Single(condition) => self.translate_condition(condition),
            QueryConditionGroup::Group { operator, conditions } => {
                let mut docs = Vec::with_capacity(conditions.len());
                for child in conditions {
                    match self.translate_group(child)? {
                        Some(doc) => docs.push(doc),
                        None => return Ok(None),
                    }
                }

                // 空子条件恒为真
                let has_empty = docs.iter().any(|d| d.is_empty());
                let docs: Vec<Document> = docs.into_iter().filter(|d| !d.is_empty()).collect();
                let result = match operator {
                    LogicalOperator::Or if has_empty => Document::new(),
                    _ if docs.is_empty() => Document::new(),
                    _ if docs.len() == 1 => docs.into_iter().next().unwrap_or_default(),
                    LogicalOperator::And => doc! { "$and": docs },
                    LogicalOperator::Or => doc! { "$or": docs },
                };
                Ok(Some(result))
            }
            QueryConditionGroup::Not(inner) => Ok(self.translate_group(inner)?.map(|inner_doc| {
                if inner_doc.is_empty() {
                    // NOT(恒真) 不匹配任何文档
                    doc! { "_id": { "$exists": false } }
                } else {
                    doc! { "$nor": [inner_doc] }
                }
            })),
        }
    }

    /// 翻译单个条件，不支持的操作符或值返回 None
    fn translate_condition(&self, condition: &QueryCondition) -> BridgeResult<Option<Document>> {
        let field_name = condition.field.as_str();
        let Some(bson_value) = self.condition_value(condition)? else {
            return Ok(None);
        };
        let options = if condition.case_insensitive { "i" } else { "" };

        debug!("[MongoDB] 处理条件: {} {:?} {:?}", field_name, condition.operator, bson_value);

        let condition_doc = match &condition.operator {
            QueryOperator::Eq => match (&bson_value, condition.case_insensitive) {
                (Bson::String(s), true) => {
                    doc! { field_name: { "$regex": format!("^{}$", regex::escape(s)), "$options": "i" } }
                }
                _ => doc! { field_name: { "$eq": bson_value } },
            },
            QueryOperator::Ne => doc! { field_name: { "$ne": bson_value } },
            QueryOperator::Gt => doc! { field_name: { "$gt": bson_value } },
            QueryOperator::Gte => doc! { field_name: { "$gte": bson_value } },
            QueryOperator::Lt => doc! { field_name: { "$lt": bson_value } },
            QueryOperator::Lte => doc! { field_name: { "$lte": bson_value } },
            QueryOperator::Contains | QueryOperator::StartsWith | QueryOperator::EndsWith => {
                let Bson::String(s) = &bson_value else {
                    return Ok(None);
                };
                let pattern = match condition.operator {
                    QueryOperator::StartsWith => format!("^{}", regex::escape(s)),
                    QueryOperator::EndsWith => format!("{}$", regex::escape(s)),
                    _ => regex::escape(s),
                };
                doc! { field_name: { "$regex": pattern, "$options": options } }
            }
            QueryOperator::Regex => {
                let Bson::String(s) = bson_value else {
                    return Ok(None);
                };
                doc! { field_name: { "$regex": s, "$options": options } }
            }
            QueryOperator::In => doc! { field_name: { "$in": as_array(bson_value) } },
            QueryOperator::NotIn => doc! { field_name: { "$nin": as_array(bson_value) } },
            QueryOperator::Exists => {
                let wanted = !matches!(bson_value, Bson::Boolean(false));
                doc! { field_name: { "$exists": wanted } }
            }
            QueryOperator::IsNull => doc! { field_name: Bson::Null },
            QueryOperator::IsNotNull => doc! { field_name: { "$ne": Bson::Null } },
            QueryOperator::Custom(_) => return Ok(None),
        };

        Ok(Some(condition_doc))
    }

    /// 条件值转换为 BSON；有模式时按字段类型重建扩展类型
    fn condition_value(&self, condition: &QueryCondition) -> BridgeResult<Option<Bson>> {
        let field_type = self.schema.and_then(|schema| schema.resolve_path(&condition.field));
        let Some(field_type) = field_type else {
            return data_value_to_bson(&condition.value).map(Some);
        };

        // 列表值按元素类型逐个转换
        if let DataValue::Array(items) = &condition.value {
            if matches!(condition.operator, QueryOperator::In | QueryOperator::NotIn) {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match typed_value(item, field_type, &condition.field)? {
                        Some(bson) => out.push(bson),
                        None => return Ok(None),
                    }
                }
                return Ok(Some(Bson::Array(out)));
            }
        }
        typed_value(&condition.value, field_type, &condition.field)
    }
}

impl Default for MongoQueryBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn typed_value(value: &DataValue, field_type: &DataType, path: &str) -> BridgeResult<Option<Bson>> {
    match (field_type.extended_kind(), value) {
        (Some(ExtendedKind::ObjectId), DataValue::String(hex)) => {
            // 无法解析的十六进制字符串不下推
            Ok(ObjectId::parse_str(hex).ok().map(Bson::ObjectId))
        }
        (Some(_), DataValue::Struct(_)) => {
            value_to_bson(value, Some(field_type), path, &MapperOptions::default()).map(Some)
        }
        _ => data_value_to_bson(value).map(Some),
    }
}

fn as_array(value: Bson) -> Vec<Bson> {
    match value {
        Bson::Array(items) => items,
        other => vec![other],
    }
}

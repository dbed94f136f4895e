//! 谓词下推
//!
//! 过滤条件能翻译为服务端查询时下推，翻译不了的条件作为剩余过滤返回，
//! 调用方必须自行再次求值。每种操作符是否可下推可以通过
//! [`operator_capability`] 或 [`FilterPlan::capabilities`] 查询。

mod query_builder;

pub use query_builder::MongoQueryBuilder;

use crate::error::BridgeResult;
use crate::types::{QueryConditionGroup, QueryOperator, StructType};
use bson::Document;
use rat_logger::debug;
use serde::{Deserialize, Serialize};

/// 下推能力标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushdownCapability {
    /// 可以在服务端执行
    Supported,
    /// 不能下推，调用方必须自行过滤
    Unsupported,
}

/// 操作符本身是否可下推
///
/// 个别条件还可能因为值的形态（如对非字符串值使用 Contains）而无法下推，
/// 以 [`FilterPlan::capabilities`] 的结果为准
pub fn operator_capability(operator: &QueryOperator) -> PushdownCapability {
    match operator {
        QueryOperator::Custom(_) => PushdownCapability::Unsupported,
        _ => PushdownCapability::Supported,
    }
}

/// 下推计划
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterPlan {
    /// 下推到服务端的查询
    pub query: Document,
    /// 需要调用方再次求值的条件（彼此之间为 AND 关系）
    pub residual: Vec<QueryConditionGroup>,
    /// 本次过滤中出现的每种操作符的下推能力
    pub capabilities: Vec<(QueryOperator, PushdownCapability)>,
}

impl FilterPlan {
    /// 所有条件都已下推
    pub fn is_fully_pushed(&self) -> bool {
        self.residual.is_empty()
    }

    /// 查询某个操作符在本次过滤中的下推能力
    pub fn capability(&self, operator: &QueryOperator) -> Option<PushdownCapability> {
        self.capabilities
            .iter()
            .find(|(op, _)| op == operator)
            .map(|(_, capability)| *capability)
    }
}

/// 生成下推计划
///
/// 下推关闭时服务端查询为空，全部条件作为剩余过滤返回
pub fn plan_filters(
    filters: &[QueryConditionGroup],
    schema: Option<&StructType>,
    enabled: bool,
) -> BridgeResult<FilterPlan> {
    if !enabled {
        debug!("谓词下推已关闭，{} 个条件全部由调用方求值", filters.len());
        let mut capabilities: Vec<(QueryOperator, PushdownCapability)> = Vec::new();
        for group in filters {
            for leaf in group.leaves() {
                if !capabilities.iter().any(|(op, _)| *op == leaf.operator) {
                    capabilities.push((leaf.operator.clone(), PushdownCapability::Unsupported));
                }
            }
        }
        return Ok(FilterPlan {
            query: Document::new(),
            residual: filters.to_vec(),
            capabilities,
        });
    }

    let builder = MongoQueryBuilder::new().where_condition_groups(filters);
    match schema {
        Some(schema) => builder.with_schema(schema).build(),
        None => builder.build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, DataValue, ExtendedKind, QueryCondition, StructField};
    use bson::doc;
    use bson::oid::ObjectId;

    fn lt(field: &str, value: i32) -> QueryConditionGroup {
        QueryCondition::new(field, QueryOperator::Lt, value).into()
    }

    fn custom(field: &str) -> QueryConditionGroup {
        QueryCondition::new(field, QueryOperator::Custom("udf_is_prime".to_string()), DataValue::Null).into()
    }

    #[test]
    fn test_simple_filter_is_pushed() {
        let plan = plan_filters(&[lt("age", 100)], None, true).unwrap();
        assert_eq!(plan.query, doc! { "age": { "$lt": 100 } });
        assert!(plan.is_fully_pushed());
        assert_eq!(plan.capability(&QueryOperator::Lt), Some(PushdownCapability::Supported));
    }

    #[test]
    fn test_and_pushes_translatable_children() {
        let filters = vec![QueryConditionGroup::and(vec![lt("age", 100), custom("age")])];
        let plan = plan_filters(&filters, None, true).unwrap();
        assert_eq!(plan.query, doc! { "age": { "$lt": 100 } });
        assert_eq!(plan.residual, vec![custom("age")]);
        assert_eq!(
            plan.capability(&QueryOperator::Custom("udf_is_prime".to_string())),
            Some(PushdownCapability::Unsupported)
        );
    }

    #[test]
    fn test_or_with_untranslatable_leaf_stays_residual() {
        let or = QueryConditionGroup::or(vec![lt("age", 100), custom("age")]);
        let plan = plan_filters(std::slice::from_ref(&or), None, true).unwrap();
        assert!(plan.query.is_empty());
        assert_eq!(plan.residual, vec![or]);
    }

    #[test]
    fn test_not_and_string_operators() {
        let filters = vec![
            QueryConditionGroup::not(QueryCondition::new("name", QueryOperator::StartsWith, "Sar").into()),
            QueryCondition::new("name", QueryOperator::Contains, "a.b").ignore_case().into(),
        ];
        let plan = plan_filters(&filters, None, true).unwrap();
        assert_eq!(
            plan.query,
            doc! { "$and": [
                { "$nor": [ { "name": { "$regex": "^Sar", "$options": "" } } ] },
                { "name": { "$regex": "a\\.b", "$options": "i" } },
            ] }
        );
    }

    #[test]
    fn test_object_id_string_converted_with_schema() {
        let oid = ObjectId::new();
        let schema = StructType::new(vec![
            StructField::new("_id", ExtendedKind::ObjectId.data_type(), false),
            StructField::new("name", DataType::String, true),
        ]);
        let filters = vec![QueryCondition::new("_id", QueryOperator::Eq, oid.to_hex()).into()];
        let plan = plan_filters(&filters, Some(&schema), true).unwrap();
        assert_eq!(plan.query, doc! { "_id": { "$eq": oid } });
    }

    #[test]
    fn test_disabled_pushdown_returns_everything() {
        let filters = vec![lt("age", 100)];
        let plan = plan_filters(&filters, None, false).unwrap();
        assert!(plan.query.is_empty());
        assert_eq!(plan.residual, filters);
        assert_eq!(plan.capability(&QueryOperator::Lt), Some(PushdownCapability::Unsupported));
    }
}

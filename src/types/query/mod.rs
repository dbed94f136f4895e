use crate::types::data_value::DataValue;
use serde::{Deserialize, Serialize};

/// 过滤条件（由计算引擎传入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    /// 字段名（支持点分路径）
    pub field: String,
    /// 操作符
    pub operator: QueryOperator,
    /// 值
    pub value: DataValue,
    /// 是否大小写不敏感（仅对字符串操作符有效）
    #[serde(default)]
    pub case_insensitive: bool,
}

impl QueryCondition {
    /// 创建过滤条件
    pub fn new<F: Into<String>, V: Into<DataValue>>(field: F, operator: QueryOperator, value: V) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            case_insensitive: false,
        }
    }

    /// 大小写不敏感
    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// AND 逻辑
    And,
    /// OR 逻辑
    Or,
}

/// 查询条件组合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryConditionGroup {
    /// 单个条件
    Single(QueryCondition),
    /// 条件组合
    Group {
        /// 逻辑操作符
        operator: LogicalOperator,
        /// 子条件列表
        conditions: Vec<QueryConditionGroup>,
    },
    /// 取反
    Not(Box<QueryConditionGroup>),
}

impl QueryConditionGroup {
    /// AND 组合
    pub fn and(conditions: Vec<QueryConditionGroup>) -> Self {
        QueryConditionGroup::Group {
            operator: LogicalOperator::And,
            conditions,
        }
    }

    /// OR 组合
    pub fn or(conditions: Vec<QueryConditionGroup>) -> Self {
        QueryConditionGroup::Group {
            operator: LogicalOperator::Or,
            conditions,
        }
    }

    /// 取反
    pub fn not(inner: QueryConditionGroup) -> Self {
        QueryConditionGroup::Not(Box::new(inner))
    }

    /// 遍历所有叶子条件
    pub fn leaves(&self) -> Vec<&QueryCondition> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a QueryCondition>) {
        match self {
            QueryConditionGroup::Single(c) => out.push(c),
            QueryConditionGroup::Group { conditions, .. } => {
                for c in conditions {
                    c.collect_leaves(out);
                }
            }
            QueryConditionGroup::Not(inner) => inner.collect_leaves(out),
        }
    }
}

impl From<QueryCondition> for QueryConditionGroup {
    fn from(condition: QueryCondition) -> Self {
        QueryConditionGroup::Single(condition)
    }
}

/// 查询操作符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryOperator {
    /// 等于
    Eq,
    /// 不等于
    Ne,
    /// 大于
    Gt,
    /// 大于等于
    Gte,
    /// 小于
    Lt,
    /// 小于等于
    Lte,
    /// 包含（字符串）
    Contains,
    /// 开始于（字符串）
    StartsWith,
    /// 结束于（字符串）
    EndsWith,
    /// 在列表中
    In,
    /// 不在列表中
    NotIn,
    /// 正则表达式匹配
    Regex,
    /// 存在（字段存在）
    Exists,
    /// 为空
    IsNull,
    /// 不为空
    IsNotNull,
    /// 计算引擎自定义谓词，只能由调用方求值
    Custom(String),
}

impl QueryOperator {
    /// 操作符名称
    pub fn name(&self) -> &str {
        match self {
            QueryOperator::Eq => "eq",
            QueryOperator::Ne => "ne",
            QueryOperator::Gt => "gt",
            QueryOperator::Gte => "gte",
            QueryOperator::Lt => "lt",
            QueryOperator::Lte => "lte",
            QueryOperator::Contains => "contains",
            QueryOperator::StartsWith => "startsWith",
            QueryOperator::EndsWith => "endsWith",
            QueryOperator::In => "in",
            QueryOperator::NotIn => "notIn",
            QueryOperator::Regex => "regex",
            QueryOperator::Exists => "exists",
            QueryOperator::IsNull => "isNull",
            QueryOperator::IsNotNull => "isNotNull",
            QueryOperator::Custom(name) => name,
        }
    }
}

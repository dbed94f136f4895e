//! 内存存储的过滤文档求值
//!
//! 支持读写路径实际生成的查询子集：`$and`/`$or`/`$nor`、比较操作符、
//! `$in`/`$nin`、`$exists`、`$regex` 与 `$not`。比较遵循类型档位，
//! 不同档位的值互不匹配。

use crate::error::BridgeResult;
use crate::mapper::{compare_bson, type_bracket};
use bson::{Bson, Document};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// 判断文档是否满足过滤条件
pub(crate) fn matches(document: &Document, filter: &Document) -> BridgeResult<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(crate::bridge_error!(query, format!("内存存储不支持的顶层操作符: {}", op)));
            }
            path => field_matches(lookup(document, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(key: &str, condition: &'a Bson) -> BridgeResult<Vec<&'a Document>> {
    let items = match condition {
        Bson::Array(items) => items,
        _ => return Err(crate::bridge_error!(query, format!("{} 需要数组参数", key))),
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(crate::bridge_error!(query, format!("{} 的元素必须是文档", key))),
        })
        .collect()
}

/// 按点分路径取值
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => Some(doc),
        _ => None,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> BridgeResult<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals(value, condition));
    };

    for (op, argument) in operators {
        let ok = match op.as_str() {
            "$eq" => equals(value, argument),
            "$ne" => !equals(value, argument),
            "$gt" => compare(value, argument, |o| o == Ordering::Greater),
            "$gte" => compare(value, argument, |o| o != Ordering::Less),
            "$lt" => compare(value, argument, |o| o == Ordering::Less),
            "$lte" => compare(value, argument, |o| o != Ordering::Greater),
            "$in" => in_list(value, argument)?,
            "$nin" => !in_list(value, argument)?,
            "$exists" => {
                let wanted = !matches!(argument, Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0));
                value.is_some() == wanted
            }
            "$regex" => {
                let options = operators.get_str("$options").unwrap_or_default();
                match argument {
                    Bson::String(pattern) => regex_matches(value, pattern, options)?,
                    Bson::RegularExpression(regex) => regex_matches(value, &regex.pattern, &regex.options)?,
                    _ => return Err(crate::bridge_error!(query, "$regex 需要字符串参数")),
                }
            }
            "$options" => true,
            "$not" => !field_matches(value, argument)?,
            other => {
                return Err(crate::bridge_error!(query, format!("内存存储不支持的操作符: {}", other)));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    if let Bson::RegularExpression(regex) = expected {
        if !matches!(value, Some(Bson::RegularExpression(_))) {
            return regex_matches(value, &regex.pattern, &regex.options).unwrap_or(false);
        }
    }

    match value {
        // 缺失字段与 null 相等
        None => matches!(expected, Bson::Null),
        Some(actual) => {
            if same_value(actual, expected) {
                return true;
            }
            // 数组字段：任一元素相等即可
            match actual {
                Bson::Array(items) => items.iter().any(|item| same_value(item, expected)),
                _ => false,
            }
        }
    }
}

fn same_value(a: &Bson, b: &Bson) -> bool {
    type_bracket(a) == type_bracket(b) && compare_bson(a, b) == Ordering::Equal
}

fn compare(value: Option<&Bson>, argument: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |candidate: &Bson| {
        type_bracket(candidate) == type_bracket(argument) && accept(compare_bson(candidate, argument))
    };
    match value {
        None => false,
        Some(Bson::Array(items)) if !matches!(argument, Bson::Array(_)) => items.iter().any(check),
        Some(actual) => check(actual),
    }
}

fn in_list(value: Option<&Bson>, argument: &Bson) -> BridgeResult<bool> {
    match argument {
        Bson::Array(candidates) => Ok(candidates.iter().any(|candidate| equals(value, candidate))),
        _ => Err(crate::bridge_error!(query, "$in/$nin 需要数组参数")),
    }
}

fn regex_matches(value: Option<&Bson>, pattern: &str, options: &str) -> BridgeResult<bool> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|e| crate::bridge_error!(query, format!("无效的正则表达式 {}: {}", pattern, e)))?;

    Ok(match value {
        Some(Bson::String(s)) | Some(Bson::Symbol(s)) => regex.is_match(s),
        Some(Bson::Array(items)) => items.iter().any(|item| match item {
            Bson::String(s) => regex.is_match(s),
            _ => false,
        }),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn check(document: Document, filter: Document) -> bool {
        matches(&document, &filter).unwrap()
    }

    #[test]
    fn test_comparisons_respect_brackets() {
        let hobbit = doc! { "name": "Bilbo", "age": 50 };
        assert!(check(hobbit.clone(), doc! { "age": { "$lt": 100_i64 } }));
        assert!(check(hobbit.clone(), doc! { "age": { "$gte": 50.0, "$lt": 51 } }));
        assert!(!check(hobbit.clone(), doc! { "age": { "$lt": "z" } }));
        assert!(!check(hobbit, doc! { "height": { "$lt": 2 } }));
    }

    #[test]
    fn test_null_and_exists() {
        let doc = doc! { "name": "Gandalf", "title": Bson::Null };
        assert!(check(doc.clone(), doc! { "title": Bson::Null }));
        assert!(check(doc.clone(), doc! { "missing": Bson::Null }));
        assert!(check(doc.clone(), doc! { "title": { "$exists": true } }));
        assert!(!check(doc.clone(), doc! { "missing": { "$exists": true } }));
        assert!(!check(doc, doc! { "title": { "$ne": Bson::Null } }));
    }

    #[test]
    fn test_logical_and_regex() {
        let doc = doc! { "name": "Gandalf", "tags": ["wizard", "grey"], "home": { "city": "Valinor" } };
        assert!(check(doc.clone(), doc! { "$or": [ { "name": "Bilbo" }, { "tags": "grey" } ] }));
        assert!(check(doc.clone(), doc! { "$nor": [ { "name": { "$regex": "^bil", "$options": "i" } } ] }));
        assert!(check(doc.clone(), doc! { "home.city": { "$in": ["Shire", "Valinor"] } }));
        assert!(check(doc.clone(), doc! { "name": { "$not": { "$regex": "^Sar" } } }));
        assert!(matches(&doc, &doc! { "$where": "1" }).is_err());
    }
}

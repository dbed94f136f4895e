//! BSON 值的比较顺序
//!
//! 与服务端排序一致：先比较类型档位，同档位内再比较值。所有数值类型同属一个档位。

use bson::{Bson, Document};
use std::cmp::Ordering;

/// 类型档位
pub fn type_bracket(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 1,
        Bson::Null | Bson::Undefined => 2,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 3,
        Bson::String(_) | Bson::Symbol(_) => 4,
        Bson::Document(_) => 5,
        Bson::Array(_) => 6,
        Bson::Binary(_) => 7,
        Bson::ObjectId(_) => 8,
        Bson::Boolean(_) => 9,
        Bson::DateTime(_) => 10,
        Bson::Timestamp(_) => 11,
        Bson::RegularExpression(_) => 12,
        Bson::DbPointer(_) => 13,
        Bson::JavaScriptCode(_) => 14,
        Bson::JavaScriptCodeWithScope(_) => 15,
        Bson::MaxKey => 255,
    }
}

/// 比较两个 BSON 值
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let bracket = type_bracket(a).cmp(&type_bracket(b));
    if bracket != Ordering::Equal {
        return bracket;
    }

    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => (*x as i64).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&(*y as i64)),
        _ if type_bracket(a) == 3 => numeric(a).total_cmp(&numeric(b)),
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => x.cmp(y),
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        (Bson::Array(x), Bson::Array(y)) => compare_arrays(x, y),
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then(u8::from(x.subtype).cmp(&u8::from(y.subtype)))
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            x.time.cmp(&y.time).then(x.increment.cmp(&y.increment))
        }
        (Bson::RegularExpression(x), Bson::RegularExpression(y)) => {
            x.pattern.cmp(&y.pattern).then_with(|| x.options.cmp(&y.options))
        }
        (Bson::JavaScriptCode(x), Bson::JavaScriptCode(y)) => x.cmp(y),
        (Bson::JavaScriptCodeWithScope(x), Bson::JavaScriptCodeWithScope(y)) => x
            .code
            .cmp(&y.code)
            .then_with(|| compare_documents(&x.scope, &y.scope)),
        _ => Ordering::Equal,
    }
}

fn numeric(value: &Bson) -> f64 {
    match value {
        Bson::Int32(i) => *i as f64,
        Bson::Int64(i) => *i as f64,
        Bson::Double(d) => *d,
        Bson::Decimal128(d) => d.to_string().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = type_bracket(va)
            .cmp(&type_bracket(vb))
            .then_with(|| ka.cmp(kb))
            .then_with(|| compare_bson(va, vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_arrays(a: &[Bson], b: &[Bson]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_bson(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn test_numbers_share_a_bracket() {
        assert_eq!(compare_bson(&Bson::Int32(5), &Bson::Double(4.5)), Ordering::Greater);
        assert_eq!(compare_bson(&Bson::Int64(5), &Bson::Int32(5)), Ordering::Equal);
        assert_eq!(type_bracket(&Bson::Int32(1)), type_bracket(&Bson::Double(1.0)));
    }

    #[test]
    fn test_cross_type_order() {
        let oid = Bson::ObjectId(ObjectId::new());
        assert_eq!(compare_bson(&Bson::MinKey, &Bson::Null), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Int32(1_000), &Bson::String("a".into())), Ordering::Less);
        assert_eq!(compare_bson(&oid, &Bson::Boolean(false)), Ordering::Less);
        assert_eq!(compare_bson(&Bson::MaxKey, &oid), Ordering::Greater);
    }
}

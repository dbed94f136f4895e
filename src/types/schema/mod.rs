//! 记录模式类型
//!
//! 计算引擎侧的静态行类型：有序命名字段，每个字段是基础类型、嵌套结构、数组或字节序列。
//! 没有原生对应的 BSON 扩展类型映射为带 `ExtendedKind` 标记的固定形状结构。

use serde::{Deserialize, Serialize};

/// 字段数据类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    /// 只观察到空值的字段
    Null,
    Boolean,
    Int32,
    Int64,
    Double,
    String,
    Binary,
    /// UTC 时间戳（对应 BSON DateTime）
    Timestamp,
    /// 数组
    Array {
        element: Box<DataType>,
        contains_null: bool,
    },
    /// 嵌套结构
    Struct(StructType),
}

impl DataType {
    /// 构造数组类型
    pub fn array(element: DataType, contains_null: bool) -> Self {
        DataType::Array {
            element: Box::new(element),
            contains_null,
        }
    }

    /// 是否为数值类型
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Double)
    }

    /// 若为扩展类型包装结构，返回其种类
    pub fn extended_kind(&self) -> Option<ExtendedKind> {
        match self {
            DataType::Struct(st) => st.extended,
            _ => None,
        }
    }

    /// 把所有扩展类型包装替换为 `String`，包括嵌套结构和数组元素
    pub fn extended_as_string(&self) -> DataType {
        match self {
            DataType::Struct(st) if st.extended.is_some() => DataType::String,
            DataType::Struct(st) => DataType::Struct(st.extended_as_string()),
            DataType::Array { element, contains_null } => DataType::array(element.extended_as_string(), *contains_null),
            other => other.clone(),
        }
    }

    /// 紧凑的类型描述，用于日志和错误消息
    pub fn simple_string(&self) -> String {
        match self {
            DataType::Null => "null".to_string(),
            DataType::Boolean => "boolean".to_string(),
            DataType::Int32 => "int".to_string(),
            DataType::Int64 => "bigint".to_string(),
            DataType::Double => "double".to_string(),
            DataType::String => "string".to_string(),
            DataType::Binary => "binary".to_string(),
            DataType::Timestamp => "timestamp".to_string(),
            DataType::Array { element, .. } => format!("array<{}>", element.simple_string()),
            DataType::Struct(st) => st.simple_string(),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.simple_string())
    }
}

/// 结构字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    /// 字段名
    pub name: String,
    /// 字段类型
    pub data_type: DataType,
    /// 是否可为空
    pub nullable: bool,
    /// 值为空时写回文档省略该字段（字段在来源中只缺失过，从未显式为 null）
    #[serde(default, skip_serializing_if = "is_false")]
    pub omit_when_null: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl StructField {
    pub fn new<S: Into<String>>(name: S, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            omit_when_null: false,
        }
    }

    pub fn with_omit_when_null(mut self, omit_when_null: bool) -> Self {
        self.omit_when_null = omit_when_null;
        self
    }
}

/// 结构类型（记录模式本身也是一个结构类型）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructType {
    fields: Vec<StructField>,
    /// 扩展类型标记，普通嵌套文档为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extended: Option<ExtendedKind>,
}

impl StructType {
    /// 创建普通结构类型
    pub fn new(fields: Vec<StructField>) -> Self {
        Self {
            fields,
            extended: None,
        }
    }

    /// 创建空结构
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn tagged(fields: Vec<StructField>, kind: ExtendedKind) -> Self {
        Self {
            fields,
            extended: Some(kind),
        }
    }

    /// 追加字段（构建器风格）
    pub fn add_field<S: Into<String>>(mut self, name: S, data_type: DataType, nullable: bool) -> Self {
        self.fields.push(StructField::new(name, data_type, nullable));
        self
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 扩展类型标记
    pub fn extended(&self) -> Option<ExtendedKind> {
        self.extended
    }

    /// 扩展类型按字符串表示的模式
    pub fn extended_as_string(&self) -> StructType {
        let fields = self
            .fields
            .iter()
            .map(|f| StructField {
                data_type: f.data_type.extended_as_string(),
                ..f.clone()
            })
            .collect();
        StructType {
            fields,
            extended: self.extended,
        }
    }

    /// 按名称查找字段
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 按名称查找字段位置
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// 所有字段名
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// 按点分路径解析字段类型，如 `address.city`
    pub fn resolve_path(&self, path: &str) -> Option<&DataType> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = &self.field(first)?.data_type;
        for part in parts {
            match current {
                DataType::Struct(st) => current = &st.field(part)?.data_type,
                _ => return None,
            }
        }
        Some(current)
    }

    /// 序列化为 JSON 字符串，便于在计算引擎之间传递模式
    pub fn to_json(&self) -> crate::error::BridgeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> crate::error::BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn simple_string(&self) -> String {
        let inner = self
            .fields
            .iter()
            .map(|f| format!("{}:{}", f.name, f.data_type.simple_string()))
            .collect::<Vec<_>>()
            .join(",");
        match self.extended {
            Some(kind) => format!("{}<{}>", kind.name(), inner),
            None => format!("struct<{}>", inner),
        }
    }
}

/// BSON 扩展类型种类
///
/// 每种扩展类型对应固定的包装结构形状，见 [`ExtendedKind::struct_type`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedKind {
    /// `{oid: string}`
    ObjectId,
    /// `{subType: int, data: binary}`，通用子类型的二进制直接映射为 Binary
    BinaryWithSubtype,
    /// `{regex: string, options: string}`
    RegularExpression,
    /// `{time: bigint, inc: bigint}`
    Timestamp,
    /// `{numberDecimal: binary}`，16 字节 IEEE-754 decimal128
    Decimal128,
    /// `{code: string}`
    JavaScriptCode,
    /// `{code: string, scope: string}`，scope 为规范扩展 JSON
    JavaScriptCodeWithScope,
    /// `{symbol: string}`
    Symbol,
    /// `{undefined: boolean}`
    Undefined,
    /// `{minKey: int}`
    MinKey,
    /// `{maxKey: int}`
    MaxKey,
    /// `{dbPointer: string}`，规范扩展 JSON
    DbPointer,
}

impl ExtendedKind {
    /// 全部扩展类型
    pub const ALL: [ExtendedKind; 12] = [
        ExtendedKind::ObjectId,
        ExtendedKind::BinaryWithSubtype,
        ExtendedKind::RegularExpression,
        ExtendedKind::Timestamp,
        ExtendedKind::Decimal128,
        ExtendedKind::JavaScriptCode,
        ExtendedKind::JavaScriptCodeWithScope,
        ExtendedKind::Symbol,
        ExtendedKind::Undefined,
        ExtendedKind::MinKey,
        ExtendedKind::MaxKey,
        ExtendedKind::DbPointer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtendedKind::ObjectId => "objectId",
            ExtendedKind::BinaryWithSubtype => "binaryWithSubtype",
            ExtendedKind::RegularExpression => "regex",
            ExtendedKind::Timestamp => "bsonTimestamp",
            ExtendedKind::Decimal128 => "decimal128",
            ExtendedKind::JavaScriptCode => "javascript",
            ExtendedKind::JavaScriptCodeWithScope => "javascriptWithScope",
            ExtendedKind::Symbol => "symbol",
            ExtendedKind::Undefined => "undefined",
            ExtendedKind::MinKey => "minKey",
            ExtendedKind::MaxKey => "maxKey",
            ExtendedKind::DbPointer => "dbPointer",
        }
    }

    /// 包装结构的固定形状
    pub fn struct_type(&self) -> StructType {
        let fields = match self {
            ExtendedKind::ObjectId => vec![StructField::new("oid", DataType::String, false)],
            ExtendedKind::BinaryWithSubtype => vec![
                StructField::new("subType", DataType::Int32, false),
                StructField::new("data", DataType::Binary, false),
            ],
            ExtendedKind::RegularExpression => vec![
                StructField::new("regex", DataType::String, false),
                StructField::new("options", DataType::String, false),
            ],
            ExtendedKind::Timestamp => vec![
                StructField::new("time", DataType::Int64, false),
                StructField::new("inc", DataType::Int64, false),
            ],
            ExtendedKind::Decimal128 => {
                vec![StructField::new("numberDecimal", DataType::Binary, false)]
            }
            ExtendedKind::JavaScriptCode => vec![StructField::new("code", DataType::String, false)],
            ExtendedKind::JavaScriptCodeWithScope => vec![
                StructField::new("code", DataType::String, false),
                StructField::new("scope", DataType::String, false),
            ],
            ExtendedKind::Symbol => vec![StructField::new("symbol", DataType::String, false)],
            ExtendedKind::Undefined => {
                vec![StructField::new("undefined", DataType::Boolean, false)]
            }
            ExtendedKind::MinKey => vec![StructField::new("minKey", DataType::Int32, false)],
            ExtendedKind::MaxKey => vec![StructField::new("maxKey", DataType::Int32, false)],
            ExtendedKind::DbPointer => vec![StructField::new("dbPointer", DataType::String, false)],
        };
        StructType::tagged(fields, *self)
    }

    /// 包装结构对应的 DataType
    pub fn data_type(&self) -> DataType {
        DataType::Struct(self.struct_type())
    }
}

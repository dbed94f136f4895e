//! 字符串键值配置与分层合并

use crate::error::BridgeResult;
use once_cell::sync::OnceCell;
use rat_logger::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

static PROCESS_DEFAULTS: OnceCell<ConnectorOptions> = OnceCell::new();
static EMPTY: once_cell::sync::Lazy<ConnectorOptions> = once_cell::sync::Lazy::new(ConnectorOptions::new);

/// 连接器配置
///
/// 键区分大小写。取值时按 调用选项 > 连接默认值 > 进程默认值 的顺序合并
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorOptions {
    entries: BTreeMap<String, String>,
}

impl ConnectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置配置项（构建器风格）
    pub fn with<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn set<K: Into<String>, V: ToString>(&mut self, key: K, value: V) {
        self.entries.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 以 `self` 为高优先级合并低优先级配置
    pub fn merged_over(&self, lower: &ConnectorOptions) -> ConnectorOptions {
        let mut entries = lower.entries.clone();
        entries.extend(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        ConnectorOptions { entries }
    }

    /// 按三层优先级合并：调用选项 > 连接默认值 > 进程默认值
    pub fn layered(call: &ConnectorOptions, connection: &ConnectorOptions) -> ConnectorOptions {
        call.merged_over(&connection.merged_over(process_defaults()))
    }

    /// 必需的配置项
    pub fn require(&self, key: &str) -> BridgeResult<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(crate::bridge_error!(config, crate::i18n::tf("error.missing_option", &[("key", key)]))),
        }
    }

    /// 解析数值等配置项，未设置时返回 None
    pub fn parse<T: FromStr>(&self, key: &str) -> BridgeResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| invalid_option(key, raw)),
        }
    }

    /// 解析布尔配置项（true/false/1/0/yes/no，大小写不敏感）
    pub fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(invalid_option(key, raw)),
            },
        }
    }

    /// 从 TOML 或 JSON 文件加载，嵌套表按点分路径展开为键
    ///
    /// 扩展名为 `toml` 时按 TOML 解析，否则按 JSON 解析
    pub fn from_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let value: serde_json::Value = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&content)
                .map_err(|e| crate::bridge_error!(config, format!("解析TOML配置文件失败: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| crate::bridge_error!(config, format!("解析JSON配置文件失败: {}", e)))?
        };

        let mut options = ConnectorOptions::new();
        flatten("", &value, &mut options)?;
        info!("从文件加载连接器配置: {:?}，共 {} 项", path, options.len());
        Ok(options)
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for ConnectorOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = ConnectorOptions::new();
        for (key, value) in iter {
            options.set(key, value);
        }
        options
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut ConnectorOptions) -> BridgeResult<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, nested, out)?;
            }
        }
        serde_json::Value::String(s) => out.set(prefix, s),
        serde_json::Value::Null => {}
        serde_json::Value::Array(items) => {
            // 标量数组按逗号拼接，如 idFieldList
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_json::Value::String(s) => parts.push(s.clone()),
                    serde_json::Value::Number(_) | serde_json::Value::Bool(_) => parts.push(item.to_string()),
                    _ => return Err(invalid_option(prefix, &value.to_string())),
                }
            }
            out.set(prefix, parts.join(","));
        }
        other => out.set(prefix, other),
    }
    Ok(())
}

pub(crate) fn invalid_option(key: &str, value: &str) -> crate::error::BridgeError {
    crate::bridge_error!(
        config,
        crate::i18n::tf("error.invalid_option", &[("key", key), ("value", value)])
    )
}

/// 安装进程默认配置，只能安装一次
pub fn init_process_defaults(options: ConnectorOptions) -> BridgeResult<()> {
    let count = options.len();
    PROCESS_DEFAULTS
        .set(options)
        .map_err(|_| crate::bridge_error!(config, "进程默认配置已经初始化"))?;
    info!("进程默认配置已安装，共 {} 项", count);
    Ok(())
}

/// 进程默认配置，未安装时为空
pub fn process_defaults() -> &'static ConnectorOptions {
    PROCESS_DEFAULTS.get().unwrap_or_else(|| &*EMPTY)
}

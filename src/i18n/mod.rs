//! 多语言错误消息模块
//!
//! 使用rat_embed_lang框架提供统一的错误消息多语言支持

use std::collections::HashMap;
use std::sync::Once;
use rat_embed_lang::register_translations;

static REGISTER: Once = Once::new();

/// 错误消息翻译注册器
pub struct ErrorMessageI18n;

impl ErrorMessageI18n {
    /// 注册所有错误消息翻译
    pub fn register_all_translations() {
        let mut translations = HashMap::new();

        let entries: [(&str, [&str; 3]); 14] = [
            ("error.connection", [
                "数据库连接失败: {message}",
                "Database connection failed: {message}",
                "データベース接続に失敗しました: {message}",
            ]),
            ("error.query", [
                "查询执行失败: {message}",
                "Query execution failed: {message}",
                "クエリ実行が失敗しました: {message}",
            ]),
            ("error.serialization", [
                "数据序列化失败: {message}",
                "Data serialization failed: {message}",
                "データシリアライズが失敗しました: {message}",
            ]),
            ("error.validation", [
                "验证失败: {field} - {message}",
                "Validation failed: {field} - {message}",
                "検証が失敗しました: {field} - {message}",
            ]),
            ("error.config", [
                "配置错误: {message}",
                "Configuration error: {message}",
                "設定エラー: {message}",
            ]),
            ("error.partition_planning", [
                "分区规划失败: {message}",
                "Partition planning failed: {message}",
                "パーティション計画が失敗しました: {message}",
            ]),
            ("error.collection_not_empty", [
                "目标集合 '{namespace}' 已存在数据，ErrorIfExists 模式拒绝写入",
                "Target collection '{namespace}' already holds data, ErrorIfExists refuses to write",
                "ターゲットコレクション '{namespace}' に既にデータがあります。ErrorIfExists モードは書き込みを拒否します",
            ]),
            ("error.unsupported_store", [
                "不支持的存储后端: {scheme}（可能需要启用相应的feature）",
                "Unsupported store backend: {scheme} (the matching feature may be disabled)",
                "サポートされていないストア: {scheme}（対応する feature が必要な場合があります）",
            ]),
            ("error.write_partial", [
                "批量写入部分失败: 已提交 {committed} 条，失败 {failed} 条，未尝试 {not_attempted} 条，状态未知 {in_doubt} 条",
                "Bulk write partially failed: {committed} committed, {failed} failed, {not_attempted} not attempted, {in_doubt} in doubt",
                "一括書き込みが部分的に失敗しました: コミット {committed} 件、失敗 {failed} 件、未試行 {not_attempted} 件、不明 {in_doubt} 件",
            ]),
            ("error.missing_option", [
                "缺少必需的配置项: {key}",
                "Missing required option: {key}",
                "必須の設定項目がありません: {key}",
            ]),
            ("error.invalid_option", [
                "配置项 {key} 的值无效: {value}",
                "Invalid value for option {key}: {value}",
                "設定項目 {key} の値が無効です: {value}",
            ]),
            ("error.record_arity", [
                "记录字段数量 {actual} 与模式字段数量 {expected} 不一致",
                "Record has {actual} values but schema declares {expected} fields",
                "レコードの値の数 {actual} がスキーマのフィールド数 {expected} と一致しません",
            ]),
            ("error.shard_key", [
                "集合 '{namespace}' 的分片键无法用于分区: {message}",
                "Shard key of '{namespace}' cannot be used for partitioning: {message}",
                "コレクション '{namespace}' のシャードキーはパーティションに使用できません: {message}",
            ]),
            ("error.mixed_partition_key", [
                "分区字段 '{field}' 存在多种类型（{min_type} .. {max_type}），无法按范围切分",
                "Partition field '{field}' holds mixed types ({min_type} .. {max_type}) and cannot be range split",
                "パーティションフィールド '{field}' に複数の型（{min_type} .. {max_type}）があり、範囲分割できません",
            ]),
        ];

        for (key, [zh, en, ja]) in entries {
            let mut messages = HashMap::new();
            messages.insert("zh-CN".to_string(), zh.to_string());
            messages.insert("en-US".to_string(), en.to_string());
            messages.insert("ja-JP".to_string(), ja.to_string());
            translations.insert(key.to_string(), messages);
        }

        // 注册所有翻译
        register_translations(translations);
    }

    /// 初始化错误消息多语言支持
    pub fn init() {
        ensure_registered();

        // 从环境变量获取语言设置，默认为zh-CN
        let lang = std::env::var("RAT_LANG")
            .or_else(|_| std::env::var("LANG"))
            .unwrap_or_else(|_| "zh-CN".to_string());

        // 标准化语言代码
        use rat_embed_lang::normalize_language_code;
        let normalized_lang = normalize_language_code(&lang);
        set_language(&normalized_lang);
    }
}

/// 确保翻译表只注册一次，未调用 init() 时构造错误也能得到完整消息
fn ensure_registered() {
    REGISTER.call_once(ErrorMessageI18n::register_all_translations);
}

/// 获取翻译文本
pub fn t(key: &str) -> String {
    ensure_registered();
    rat_embed_lang::t(key)
}

/// 获取带参数的翻译文本
pub fn tf<S: AsRef<str>>(key: &str, args: &[(&str, S)]) -> String {
    ensure_registered();
    let pairs: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_ref())).collect();
    rat_embed_lang::tf(key, &pairs)
}

/// 重新导出rat_embed_lang的核心函数
pub use rat_embed_lang::{set_language, current_language};

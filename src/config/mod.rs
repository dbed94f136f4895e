//! # 配置管理模块
//!
//! 所有配置以字符串键值对传入，按 调用选项 > 连接默认值 > 进程默认值
//! 三层合并后解析为不可变的 [`ReadConfig`] 与 [`WriteConfig`]。
//! 进程默认值只能显式安装一次，之后只读。

pub mod keys;
mod options;
mod read;
mod write;

pub use options::{init_process_defaults, process_defaults, ConnectorOptions};
pub use read::{ReadConfig, ReadConfigBuilder};
pub use write::{WriteConfig, WriteConfigBuilder, DEFAULT_MAX_BATCH_SIZE};

use crate::types::PoolConfig;
use crate::error::BridgeResult;

/// 从配置解析连接池参数，未设置的项使用默认值
pub fn pool_config(options: &ConnectorOptions) -> BridgeResult<PoolConfig> {
    let defaults = PoolConfig::default();
    let pool = PoolConfig {
        min_connections: options.parse(keys::POOL_MIN_SIZE)?.unwrap_or(defaults.min_connections),
        max_connections: options.parse(keys::POOL_MAX_SIZE)?.unwrap_or(defaults.max_connections),
        connection_timeout: options.parse(keys::POOL_CONNECT_TIMEOUT_SECS)?.unwrap_or(defaults.connection_timeout),
        idle_timeout: options.parse(keys::POOL_MAX_IDLE_TIME_SECS)?.unwrap_or(defaults.idle_timeout),
    };

    if pool.max_connections == 0 || pool.min_connections > pool.max_connections {
        return Err(crate::bridge_error!(
            config,
            format!("连接池配置无效: min={} max={}", pool.min_connections, pool.max_connections)
        ));
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config() {
        let pool = pool_config(&ConnectorOptions::new().with(keys::POOL_MAX_SIZE, 4)).unwrap();
        assert_eq!(pool.max_connections, 4);
        assert_eq!(pool.min_connections, 1);
        assert_eq!(pool.connection_timeout, 30);

        assert!(pool_config(&ConnectorOptions::new().with(keys::POOL_MAX_SIZE, 0)).is_err());
        assert!(pool_config(&ConnectorOptions::new().with(keys::POOL_MIN_SIZE, 20)).is_err());
    }
}

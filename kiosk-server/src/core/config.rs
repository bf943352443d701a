use std::path::PathBuf;
use std::time::Duration;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 默认日志级别 (RUST_LOG 优先) |
/// | HEARTBEAT_INTERVAL_MS | 30000 | 订单流心跳间隔 (毫秒) |
/// | CHANNEL_CAPACITY | 64 | 每个订阅者的待发送帧上限 |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时时间 (毫秒) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/var/lib/kiosk HTTP_PORT=8080 cargo run -p kiosk-server
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | production
    pub environment: String,
    /// 默认日志级别
    pub log_level: String,
    /// 订单流心跳间隔 (毫秒)
    pub heartbeat_interval_ms: u64,
    /// 每个订阅者队列容量，满了即断开
    pub channel_capacity: usize,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            heartbeat_interval_ms: env_or("HEARTBEAT_INTERVAL_MS", 30_000),
            channel_capacity: env_or("CHANNEL_CAPACITY", 64),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn heartbeat_interval(&self) -> Duration {
        // tokio interval panics on a zero period
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// work_dir/database
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// work_dir/database/kiosk.db
    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("kiosk.db")
    }

    /// work_dir/logs
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 创建工作目录结构
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

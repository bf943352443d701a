//! Pharmacy kiosk server - 实时订单队列
//!
//! # 模块结构
//!
//! ```text
//! kiosk-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # SQLite 连接池和 repository
//! ├── message/       # 订单事件总线和 SSE 连接
//! ├── orders/        # 订单号生成和订单写操作
//! └── utils/         # 日志、错误类型
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod message;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use message::{EventBus, PublishReport};
pub use orders::OrderService;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 创建工作目录并初始化日志 (生产环境写入滚动日志文件)
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    config.ensure_work_dir_structure()?;
    let log_dir = config.log_dir();
    if config.is_production() {
        init_logger_with_file(&config.log_level, Some(&log_dir));
    } else {
        init_logger(&config.log_level);
    }
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    __ __ _            __
   / //_/(_)___  _____/ /__
  / ,<  / / __ \/ ___/ //_/
 / /| |/ / /_/ (__  ) ,<
/_/ |_/_/\____/____/_/|_|
    "#
    );
}

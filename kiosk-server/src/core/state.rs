use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::Config;
use crate::core::error::Result;
use crate::db::DbService;
use crate::message::EventBus;
use crate::orders::OrderService;

/// 服务器状态 - 所有 handler 共享
///
/// Clone 很便宜: 连接池和事件总线都是引用计数的。
#[derive(Debug, Clone)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    /// 订单事件总线
    pub bus: Arc<EventBus>,
    pub orders: OrderService,
}

impl ServerState {
    /// 使用已有连接池创建状态 (测试常用)
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        let bus = Arc::new(EventBus::new());
        let orders = OrderService::new(pool.clone(), bus.clone());
        Self {
            config,
            pool,
            bus,
            orders,
        }
    }

    /// 初始化: 工作目录 → 数据库 → 服务
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_path();
        let db = DbService::new(&db_path.to_string_lossy()).await?;
        tracing::info!(path = %db_path.display(), "Database ready");

        Ok(Self::new(config.clone(), db.pool))
    }
}

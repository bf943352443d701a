//! 订单模块
//!
//! - [`number`] - 订单号格式 `YYDDDSSS`
//! - [`service`] - 创建 / 替换商品 / 完成, 提交后发布事件

pub mod number;
pub mod service;

pub use number::format_order_number;
pub use service::OrderService;

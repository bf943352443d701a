//! HTTP API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 健康检查 |
//! | /api/orders | POST / GET | 创建订单 / 按营业日查询 |
//! | /api/orders/events | GET | 订单事件流 (SSE) |
//! | /api/orders/{id} | GET | 订单详情 |
//! | /api/orders/{id}/items | PUT | 替换订单商品 |
//! | /api/orders/{id}/fulfill | POST | 完成订单 |

pub mod health;
pub mod orders;

//! 订单号生成
//!
//! 格式 `YYDDDSSS`: 两位年份 + 三位年内天数 (001-366) + 三位当日序号 (001-999)。
//! 序号来自 `daily_sequence` 计数器, 见 [`crate::db::repository::order::next_daily_sequence`]。

use chrono::{Datelike, NaiveDate};
use shared::error::{AppError, AppResult, ErrorCode};

/// Highest daily sequence that fits in three digits
pub const MAX_DAILY_SEQUENCE: i64 = 999;

/// Length of every order number
pub const ORDER_NUMBER_LEN: usize = 8;

/// Format the order number of the `sequence`-th order on `date`
///
/// A sequence above [`MAX_DAILY_SEQUENCE`] is rejected with
/// `DailySequenceExhausted`; any other malformed result is an internal error.
pub fn format_order_number(date: NaiveDate, sequence: i64) -> AppResult<String> {
    if sequence > MAX_DAILY_SEQUENCE {
        return Err(AppError::new(ErrorCode::DailySequenceExhausted)
            .with_detail("date", date.to_string())
            .with_detail("sequence", sequence));
    }
    if sequence < 1 {
        return Err(AppError::internal(format!(
            "Daily sequence must start at 1, got {sequence}"
        )));
    }

    let number = format!(
        "{:02}{:03}{:03}",
        date.year().rem_euclid(100),
        date.ordinal(),
        sequence
    );
    if number.len() != ORDER_NUMBER_LEN {
        return Err(AppError::internal(format!(
            "Generated order number {number} is not {ORDER_NUMBER_LEN} characters"
        )));
    }
    Ok(number)
}

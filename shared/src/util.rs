//! 时间工具: 业务时区 (Asia/Beirut)
//!
//! 订单号、按日查询和事件里的 `date` 都以黎巴嫩本地日历为准，
//! 数据库里只存 UTC Unix millis。

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Business timezone of the pharmacy
pub const BUSINESS_TZ: Tz = chrono_tz::Asia::Beirut;

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Calendar date of `instant` in the business timezone
pub fn business_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&BUSINESS_TZ).date_naive()
}

/// Today's business date
pub fn today() -> NaiveDate {
    business_date(Utc::now())
}

/// 本地零点 → Unix millis
///
/// 黎巴嫩夏令时在午夜切换，零点不存在时取当天第一个存在的整点，
/// 仍失败则按 UTC 计算。
fn local_midnight_millis(date: NaiveDate) -> i64 {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    naive
        .and_local_timezone(BUSINESS_TZ)
        .earliest()
        .or_else(|| {
            (naive + chrono::Duration::hours(1))
                .and_local_timezone(BUSINESS_TZ)
                .earliest()
        })
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// `[start, end)` UTC millis of a business day
///
/// `end` is the next local midnight, callers compare with `< end`.
pub fn business_day_bounds(date: NaiveDate) -> (i64, i64) {
    let next_day = date.succ_opt().unwrap_or(date);
    (local_midnight_millis(date), local_midnight_millis(next_day))
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

//! 时间工具
//!
//! 时间戳使用本地时区，文本格式为 `%Y-%m-%d %H:%M:%S`。
//! 时间差按完整日历计算，跨小时、跨日、跨年都正确。

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::{ConsumerError, ConsumerResult};

pub type Timestamp = DateTime<Local>;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn current_timestamp() -> Timestamp {
    Local::now()
}

pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// 解析 [`TIMESTAMP_FORMAT`] 格式的时间；接受不补零的字段以及末尾的 `.`
pub fn parse_timestamp(value: &str) -> ConsumerResult<Timestamp> {
    let trimmed = value.trim().trim_end_matches('.');
    let naive = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .map_err(|e| ConsumerError::TimeParse(format!("{value:?}: {e}")))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ConsumerError::TimeParse(format!("{value:?}: 本地时区中不存在该时间")))
}

/// `from` 到 `to` 经过的整秒数，`to` 早于 `from` 时为负
pub fn seconds_between(from: &Timestamp, to: &Timestamp) -> i64 {
    to.signed_duration_since(*from).num_seconds()
}

pub fn elapsed_seconds(since: &Timestamp) -> i64 {
    seconds_between(since, &current_timestamp())
}

//! 本地行主键。账号、订阅、VM 和目录行共用一个进程级 Snowflake 生成器，
//! 生成的 ID 以十进制字符串落库，同一进程内单调递增。

use snowflake::SnowflakeIdBucket;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_MACHINE: i32 = 1;
const DEFAULT_NODE: i32 = 1;

static BUCKET: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

fn bucket() -> MutexGuard<'static, Option<SnowflakeIdBucket>> {
    BUCKET.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 按配置的机器号与节点号（各 0-31）建立生成器。
///
/// 只有第一次调用生效，之后的调用不会重置序列。
pub fn init(machine_id: i32, node_id: i32) {
    let mut slot = bucket();
    if slot.is_none() {
        *slot = Some(SnowflakeIdBucket::new(machine_id, node_id));
    }
}

/// 未调用 [`init`] 时退回默认的 1/1 生成器
pub fn next_id() -> String {
    let mut slot = bucket();
    slot.get_or_insert_with(|| SnowflakeIdBucket::new(DEFAULT_MACHINE, DEFAULT_NODE))
        .get_id()
        .to_string()
}

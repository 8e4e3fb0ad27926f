use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 生命周期事件位掩码，回调可订阅任意并集
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(u32);

impl Event {
    pub const SCHEDULER_STARTED: Event = Event(1 << 0);
    pub const SCHEDULER_STOPPED: Event = Event(1 << 1);
    pub const JOB_ADDED: Event = Event(1 << 2);
    pub const JOB_UPDATED: Event = Event(1 << 3);
    pub const JOB_DELETED: Event = Event(1 << 4);
    pub const ALL_JOBS_DELETED: Event = Event(1 << 5);
    pub const JOB_PAUSED: Event = Event(1 << 6);
    pub const JOB_RESUMED: Event = Event(1 << 7);
    pub const JOB_EXECUTED: Event = Event(1 << 8);
    pub const JOB_ERROR: Event = Event(1 << 9);
    pub const JOB_TIMEOUT: Event = Event(1 << 10);
    pub const QUEUE_ERROR: Event = Event(1 << 11);
    pub const ALL: Event = Event((1 << 12) - 1);

    const NAMES: [(Event, &'static str); 12] = [
        (Event::SCHEDULER_STARTED, "SCHEDULER_STARTED"),
        (Event::SCHEDULER_STOPPED, "SCHEDULER_STOPPED"),
        (Event::JOB_ADDED, "JOB_ADDED"),
        (Event::JOB_UPDATED, "JOB_UPDATED"),
        (Event::JOB_DELETED, "JOB_DELETED"),
        (Event::ALL_JOBS_DELETED, "ALL_JOBS_DELETED"),
        (Event::JOB_PAUSED, "JOB_PAUSED"),
        (Event::JOB_RESUMED, "JOB_RESUMED"),
        (Event::JOB_EXECUTED, "JOB_EXECUTED"),
        (Event::JOB_ERROR, "JOB_ERROR"),
        (Event::JOB_TIMEOUT, "JOB_TIMEOUT"),
        (Event::QUEUE_ERROR, "QUEUE_ERROR"),
    ];

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// 两个掩码是否有交集
    pub const fn intersects(&self, other: Event) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(&self, other: Event) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Event {
    type Output = Event;

    fn bitor(self, rhs: Event) -> Event {
        Event(self.0 | rhs.0)
    }
}

impl BitOrAssign for Event {
    fn bitor_assign(&mut self, rhs: Event) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Event::ALL {
            return f.write_str("ALL");
        }
        let names: Vec<&str> = Event::NAMES
            .iter()
            .filter(|(event, _)| self.contains(*event))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "Event({:#x})", self.0)
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 分发给回调的事件包
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPkg {
    pub event: Event,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub data: Value,
}

impl EventPkg {
    pub fn new(event: Event, job_id: impl Into<String>, data: Value) -> Self {
        Self {
            event,
            job_id: job_id.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_union() {
        let mask = Event::JOB_ADDED | Event::JOB_DELETED;
        assert!(mask.intersects(Event::JOB_ADDED));
        assert!(!mask.intersects(Event::JOB_PAUSED));
        assert!(Event::ALL.contains(mask));
        assert!(Event::ALL.contains(Event::QUEUE_ERROR));
    }

    #[test]
    fn test_debug_names() {
        let mask = Event::JOB_ADDED | Event::JOB_TIMEOUT;
        assert_eq!(format!("{mask:?}"), "JOB_ADDED|JOB_TIMEOUT");
        assert_eq!(format!("{:?}", Event::ALL), "ALL");
    }
}

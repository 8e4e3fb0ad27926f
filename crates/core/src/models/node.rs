use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 节点模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeMode {
    #[default]
    #[serde(rename = "normal", alias = "")]
    Normal,
    #[serde(rename = "HA", alias = "ha")]
    Ha,
}

impl NodeMode {
    pub fn is_ha(&self) -> bool {
        matches!(self, NodeMode::Ha)
    }
}

/// 集群节点信息，以 `endpoint` 为标识
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub endpoint: String,
    #[serde(default)]
    pub endpoint_main: String,
    #[serde(default)]
    pub endpoint_rpc: String,
    #[serde(default)]
    pub endpoint_http: String,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub mode: NodeMode,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub health: bool,
    pub register_time: DateTime<Utc>,
    pub last_heartbeat_time: DateTime<Utc>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.endpoint
    }

    /// 心跳是否在给定时长内
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.last_heartbeat_time <= max_age
    }

    pub fn serves_any(&self, queues: &[String]) -> bool {
        queues.is_empty() || queues.iter().any(|q| q == &self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(queue: &str) -> Node {
        let now = Utc::now();
        Node {
            endpoint: "127.0.0.1:36380".into(),
            endpoint_main: String::new(),
            endpoint_rpc: String::new(),
            endpoint_http: String::new(),
            queue: queue.into(),
            mode: NodeMode::Normal,
            version: String::new(),
            health: true,
            register_time: now,
            last_heartbeat_time: now,
        }
    }

    #[test]
    fn test_serves_any() {
        let n = node("default");
        assert!(n.serves_any(&[]));
        assert!(n.serves_any(&["x".into(), "default".into()]));
        assert!(!n.serves_any(&["x".into()]));
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(serde_json::to_string(&NodeMode::Ha).unwrap(), "\"HA\"");
        let mode: NodeMode = serde_json::from_str("\"\"").unwrap();
        assert_eq!(mode, NodeMode::Normal);
    }

    #[test]
    fn test_freshness() {
        let mut n = node("q");
        let now = Utc::now();
        n.last_heartbeat_time = now - chrono::Duration::milliseconds(500);
        assert!(!n.is_fresh(now, chrono::Duration::milliseconds(400)));
        assert!(n.is_fresh(now, chrono::Duration::seconds(1)));
    }
}

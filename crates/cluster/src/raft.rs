//! HA 模式下的主节点选举，只实现任期、投票与 leader 心跳，不复制日志。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::messages::{AppendEntriesArgs, AppendEntriesReply, VoteArgs, VoteReply};
use crate::node::ClusterNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
}

#[derive(Debug)]
struct RaftCore {
    term: u64,
    voted_for: Option<String>,
    role: RaftRole,
}

pub(crate) struct RaftState {
    core: Mutex<RaftCore>,
    /// 收到合法 leader 心跳或投出选票时通知，重置选举计时
    heartbeat: Notify,
}

impl RaftState {
    pub(crate) fn new() -> Self {
        Self {
            core: Mutex::new(RaftCore {
                term: 0,
                voted_for: None,
                role: RaftRole::Follower,
            }),
            heartbeat: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RaftCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ClusterNode {
    pub fn raft_role(&self) -> Option<RaftRole> {
        self.raft.as_ref().map(|r| r.lock().role)
    }

    pub fn raft_term(&self) -> Option<u64> {
        self.raft.as_ref().map(|r| r.lock().term)
    }

    fn election_timeout(&self) -> Duration {
        let raft = &self.config.raft;
        let min = raft.election_timeout_min_ms;
        let max = raft.election_timeout_max_ms.max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    pub fn handle_request_vote(&self, args: VoteArgs) -> VoteReply {
        let Some(raft) = &self.raft else {
            return VoteReply { term: 0, granted: false };
        };
        let (reply, was_leader) = {
            let mut core = raft.lock();
            if args.term < core.term {
                return VoteReply {
                    term: core.term,
                    granted: false,
                };
            }
            let mut was_leader = false;
            if args.term > core.term {
                was_leader = core.role == RaftRole::Leader;
                core.term = args.term;
                core.voted_for = None;
                core.role = RaftRole::Follower;
            }
            let granted = match &core.voted_for {
                None => true,
                Some(voted) => voted == &args.candidate,
            };
            if granted {
                core.voted_for = Some(args.candidate.clone());
            }
            (
                VoteReply {
                    term: core.term,
                    granted,
                },
                was_leader,
            )
        };
        if was_leader {
            self.scheduler.stop();
        }
        if reply.granted {
            debug!("任期 {} 投票给 {}", reply.term, args.candidate);
            raft.heartbeat.notify_one();
        }
        reply
    }

    pub fn handle_append_entries(&self, args: AppendEntriesArgs) -> AppendEntriesReply {
        let Some(raft) = &self.raft else {
            return AppendEntriesReply { term: 0, success: false };
        };
        let (term, was_leader) = {
            let mut core = raft.lock();
            if args.term < core.term {
                return AppendEntriesReply {
                    term: core.term,
                    success: false,
                };
            }
            let was_leader = core.role == RaftRole::Leader;
            if args.term > core.term {
                core.term = args.term;
                core.voted_for = None;
            }
            core.role = RaftRole::Follower;
            (core.term, was_leader)
        };
        if was_leader {
            warn!("收到任期 {} 的 leader {} 心跳，退位", term, args.leader);
            self.scheduler.stop();
        }
        self.set_endpoint_main(&args.leader);
        raft.heartbeat.notify_one();
        AppendEntriesReply {
            term,
            success: true,
        }
    }

    pub(crate) async fn raft_loop(self: Arc<Self>, cancel: CancellationToken) {
        let Some(raft) = &self.raft else {
            return;
        };
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let role = raft.lock().role;
            match role {
                RaftRole::Follower => {
                    let timeout = self.election_timeout();
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = raft.heartbeat.notified() => {}
                        _ = tokio::time::sleep(timeout) => {
                            info!("{:?} 内未收到 leader 心跳，发起选举", timeout);
                            raft.lock().role = RaftRole::Candidate;
                        }
                    }
                }
                RaftRole::Candidate => self.run_election(&cancel).await,
                RaftRole::Leader => self.lead(&cancel).await,
            }
        }
        debug!("选举循环退出");
    }

    /// leader 按固定节拍发送心跳，退位或取消时返回
    async fn lead(self: &Arc<Self>, cancel: &CancellationToken) {
        let Some(raft) = &self.raft else {
            return;
        };
        let interval = Duration::from_millis(self.config.raft.heartbeat_interval_ms.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if raft.lock().role != RaftRole::Leader {
                return;
            }
            self.broadcast_heartbeat();
        }
    }

    async fn run_election(&self, cancel: &CancellationToken) {
        let Some(raft) = &self.raft else {
            return;
        };
        let term = {
            let mut core = raft.lock();
            core.term += 1;
            core.voted_for = Some(self.local.endpoint.clone());
            core.role = RaftRole::Candidate;
            core.term
        };
        metrics::counter!("cadence_raft_elections_total").increment(1);
        self.scheduler.stop();
        self.set_endpoint_main("");

        let peers = self.ha_peers();
        let majority = (peers.len() + 1) / 2 + 1;
        let mut votes = 1;
        info!("发起任期 {} 的选举，候选 {} 个对端，需要 {} 票", term, peers.len(), majority);
        if votes >= majority {
            self.become_leader(term);
            return;
        }

        let args = VoteArgs {
            term,
            candidate: self.local.endpoint.clone(),
        };
        let mut pending: FuturesUnordered<_> = peers
            .into_iter()
            .map(|peer| {
                let transport = Arc::clone(&self.transport);
                let args = args.clone();
                async move {
                    let reply = transport.request_vote(&peer, &args).await;
                    (peer, reply)
                }
            })
            .collect();

        let deadline = tokio::time::sleep(self.election_timeout());
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = &mut deadline => {
                    debug!("任期 {} 选举超时", term);
                    return;
                }
                _ = raft.heartbeat.notified() => {
                    if raft.lock().role != RaftRole::Candidate {
                        return;
                    }
                }
                Some((peer, reply)) = pending.next(), if !pending.is_empty() => match reply {
                    Ok(reply) if reply.term > term => {
                        self.step_down(reply.term);
                        return;
                    }
                    Ok(reply) if reply.granted => {
                        votes += 1;
                        debug!("获得 {} 的选票 ({}/{})", peer, votes, majority);
                        if votes >= majority {
                            self.become_leader(term);
                            return;
                        }
                    }
                    Ok(_) => debug!("{} 拒绝投票", peer),
                    Err(e) => debug!("向 {} 请求投票失败: {}", peer, e),
                },
            }
        }
    }

    fn become_leader(&self, term: u64) {
        let Some(raft) = &self.raft else {
            return;
        };
        {
            let mut core = raft.lock();
            if core.term != term || core.role != RaftRole::Candidate {
                return;
            }
            core.role = RaftRole::Leader;
        }
        info!("成为任期 {} 的 leader: {}", term, self.local.endpoint);
        self.set_endpoint_main(&self.local.endpoint);
        self.upsert(self.local.clone());
        self.scheduler.start();
    }

    fn step_down(&self, term: u64) {
        let Some(raft) = &self.raft else {
            return;
        };
        let was_leader = {
            let mut core = raft.lock();
            if term <= core.term {
                return;
            }
            let was_leader = core.role == RaftRole::Leader;
            core.term = term;
            core.voted_for = None;
            core.role = RaftRole::Follower;
            was_leader
        };
        info!("发现更高任期 {}，转为 follower", term);
        if was_leader {
            self.scheduler.stop();
        }
    }

    /// 每个对端的心跳独立发送，慢节点不拖住节拍
    fn broadcast_heartbeat(self: &Arc<Self>) {
        let Some(raft) = &self.raft else {
            return;
        };
        let args = AppendEntriesArgs {
            term: raft.lock().term,
            leader: self.local.endpoint.clone(),
        };
        let deadline = Duration::from_millis(self.config.raft.election_timeout_min_ms.max(1));
        for peer in self.ha_peers() {
            let node = Arc::clone(self);
            let args = args.clone();
            tokio::spawn(async move {
                let reply = tokio::time::timeout(deadline, node.transport.append_entries(&peer, &args)).await;
                match reply {
                    Ok(Ok(reply)) if reply.term > args.term => node.step_down(reply.term),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!("向 {} 发送 leader 心跳失败: {}", peer, e),
                    Err(_) => debug!("向 {} 发送 leader 心跳超时", peer),
                }
            });
        }
    }
}

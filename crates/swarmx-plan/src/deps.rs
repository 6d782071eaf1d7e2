use std::collections::{HashMap, HashSet};

use swarmx_core::{SwarmError, TimestampNs};

/// A cross-shard dependency DAG (§4.15): edges between shard ids, each
/// carrying the `need_id` that created the dependency. Reuses the same
/// DFS cycle-detection shape as `crate::patch::detect_cycle`, against
/// shard ids instead of task ids — a deadlock here is two shards each
/// waiting on an artifact the other must produce first.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: Vec<(String, String, String)>, // (from_shard, to_shard, need_id)
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dependency(&mut self, from_shard: &str, to_shard: &str, need_id: &str) {
        let entry = (from_shard.to_string(), to_shard.to_string(), need_id.to_string());
        if !self.edges.contains(&entry) {
            self.edges.push(entry);
        }
    }

    fn adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to, _) in &self.edges {
            adj.entry(from.as_str()).or_default().push(to.as_str());
        }
        adj
    }

    fn all_shards(&self) -> HashSet<&str> {
        let mut shards = HashSet::new();
        for (from, to, _) in &self.edges {
            shards.insert(from.as_str());
            shards.insert(to.as_str());
        }
        shards
    }

    /// Kahn's algorithm; `CycleDetected` (interpreted as a deadlock at
    /// this layer) if the edge set is not a DAG.
    pub fn topological_sort(&self) -> Result<Vec<String>, SwarmError> {
        let adjacency = self.adjacency();
        let shards = self.all_shards();

        let mut in_degree: HashMap<&str, usize> = shards.iter().map(|&s| (s, 0)).collect();
        for (_, to, _) in &self.edges {
            *in_degree.get_mut(to.as_str()).unwrap() += 1;
        }

        let mut queue: Vec<&str> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(&s, _)| s).collect();
        queue.sort();

        let mut order = Vec::new();
        while let Some(node) = queue.pop() {
            order.push(node.to_string());
            if let Some(children) = adjacency.get(node) {
                let mut newly_free = Vec::new();
                for &child in children {
                    let deg = in_degree.get_mut(child).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        newly_free.push(child);
                    }
                }
                newly_free.sort();
                queue.extend(newly_free);
            }
        }

        if order.len() != in_degree.len() {
            return Err(SwarmError::DeadlockDetected);
        }
        Ok(order)
    }

    pub fn detect_deadlock(&self) -> bool {
        self.topological_sort().is_err()
    }

    /// Shards with in-degree 0: nothing blocks them from proceeding.
    pub fn ready_shards(&self) -> Vec<String> {
        let adjacency = self.adjacency();
        let shards = self.all_shards();
        let mut blocked: HashSet<&str> = HashSet::new();
        for children in adjacency.values() {
            blocked.extend(children.iter().copied());
        }
        let mut ready: Vec<String> = shards.difference(&blocked).map(|s| s.to_string()).collect();
        ready.sort();
        ready
    }

    /// Shards currently blocking at least one dependent shard.
    pub fn blocking_shards(&self) -> HashSet<String> {
        self.edges.iter().map(|(from, _, _)| from.clone()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowArtifactState {
    Pending,
    Ready,
    Released,
    Expired,
}

/// An artifact held until every shard it depends on has signaled, with a
/// TTL beyond which it auto-expires. Release is single-shot: a second
/// `release()` call is a no-op, not an error (idempotence, §5).
#[derive(Clone, Debug)]
pub struct EscrowArtifact {
    pub artifact_id: String,
    pub need_id: String,
    pub awaited_shards: HashSet<String>,
    pub signaled_shards: HashSet<String>,
    pub created_ns: TimestampNs,
    pub ttl_s: u64,
    pub state: EscrowArtifactState,
}

impl EscrowArtifact {
    pub fn new(artifact_id: impl Into<String>, need_id: impl Into<String>, awaited_shards: HashSet<String>, created_ns: TimestampNs, ttl_s: u64) -> Self {
        let state = if awaited_shards.is_empty() {
            EscrowArtifactState::Ready
        } else {
            EscrowArtifactState::Pending
        };
        Self {
            artifact_id: artifact_id.into(),
            need_id: need_id.into(),
            awaited_shards,
            signaled_shards: HashSet::new(),
            created_ns,
            ttl_s,
            state,
        }
    }

    pub fn is_expired(&self, now_ns: TimestampNs) -> bool {
        let elapsed_s = (now_ns.saturating_sub(self.created_ns)).max(0) / 1_000_000_000;
        elapsed_s as u64 >= self.ttl_s
    }

    /// Records that `shard` has signaled readiness. Transitions to
    /// `Ready` once every awaited shard has signaled.
    pub fn signal(&mut self, shard: &str) {
        if self.state != EscrowArtifactState::Pending {
            return;
        }
        self.signaled_shards.insert(shard.to_string());
        if self.awaited_shards.is_subset(&self.signaled_shards) {
            self.state = EscrowArtifactState::Ready;
        }
    }

    /// Releases the artifact if ready. Idempotent: calling this again
    /// after a successful release is a no-op.
    pub fn release(&mut self) -> Result<bool, SwarmError> {
        match self.state {
            EscrowArtifactState::Released => Ok(false),
            EscrowArtifactState::Ready => {
                self.state = EscrowArtifactState::Released;
                Ok(true)
            }
            EscrowArtifactState::Pending => Err(SwarmError::EscrowNotFound(self.artifact_id.clone())),
            EscrowArtifactState::Expired => Err(SwarmError::EscrowAlreadyReleased(self.artifact_id.clone())),
        }
    }

    pub fn expire_if_due(&mut self, now_ns: TimestampNs) -> bool {
        if self.state == EscrowArtifactState::Pending && self.is_expired(now_ns) {
            self.state = EscrowArtifactState::Expired;
            true
        } else {
            false
        }
    }
}

/// Holds escrow artifacts awaiting release; a background ticker (driven
/// by `swarmx_node::daemon::ticker`, shared with the lease scavenger)
/// calls `scan_and_expire` at a fixed interval.
#[derive(Default)]
pub struct EscrowMonitor {
    artifacts: HashMap<String, EscrowArtifact>,
}

impl EscrowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: EscrowArtifact) {
        self.artifacts.insert(artifact.artifact_id.clone(), artifact);
    }

    pub fn get_mut(&mut self, artifact_id: &str) -> Option<&mut EscrowArtifact> {
        self.artifacts.get_mut(artifact_id)
    }

    pub fn get(&self, artifact_id: &str) -> Option<&EscrowArtifact> {
        self.artifacts.get(artifact_id)
    }

    /// Returns the ids of artifacts that expired during this scan.
    pub fn scan_and_expire(&mut self, now_ns: TimestampNs) -> Vec<String> {
        self.artifacts
            .values_mut()
            .filter(|a| a.expire_if_due(now_ns))
            .map(|a| a.artifact_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_sort_detects_deadlock() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("shard-a", "shard-b", "need-1");
        graph.add_dependency("shard-b", "shard-c", "need-2");
        graph.add_dependency("shard-c", "shard-a", "need-3");
        assert!(graph.detect_deadlock());
    }

    #[test]
    fn ready_shards_are_those_with_no_incoming_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("shard-a", "shard-b", "need-1");
        let ready = graph.ready_shards();
        assert_eq!(ready, vec!["shard-a".to_string()]);
    }

    #[test]
    fn escrow_artifact_releases_once_all_signaled() {
        let mut shards = HashSet::new();
        shards.insert("shard-a".to_string());
        shards.insert("shard-b".to_string());
        let mut artifact = EscrowArtifact::new("art-1", "need-1", shards, 0, 60);

        artifact.signal("shard-a");
        assert_eq!(artifact.state, EscrowArtifactState::Pending);
        assert!(artifact.release().is_err());

        artifact.signal("shard-b");
        assert_eq!(artifact.state, EscrowArtifactState::Ready);
        assert!(artifact.release().unwrap());
        // Second release is a no-op, not an error.
        assert!(!artifact.release().unwrap());
    }

    #[test]
    fn escrow_artifact_expires_past_ttl() {
        let shards: HashSet<String> = ["shard-a".to_string()].into_iter().collect();
        let mut artifact = EscrowArtifact::new("art-2", "need-2", shards, 0, 10);
        assert!(!artifact.expire_if_due(5_000_000_000));
        assert!(artifact.expire_if_due(11_000_000_000));
        assert_eq!(artifact.state, EscrowArtifactState::Expired);
    }
}

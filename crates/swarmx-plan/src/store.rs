use std::collections::{BTreeMap, HashSet};

use swarmx_core::{Annotation, Edge, Lamport, OpId, OpType, PlanOp, SwarmError, Task, TaskId, TaskState};

/// CRDT plan store: grow-only ops log keyed by `op_id`, plus derived
/// `tasks`/`edges`/`annotations` state. Semantics per spec §4.5.
#[derive(Clone, Debug, Default)]
pub struct PlanStore {
    ops: BTreeMap<OpId, PlanOp>,
    tasks: BTreeMap<TaskId, Task>,
    edges: HashSet<Edge>,
    annotations: BTreeMap<(TaskId, String), Annotation>,
}

/// Serializable snapshot, the `save()`/`merge()` wire format (§4.5).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlanSnapshot {
    pub tasks: Vec<Task>,
    pub edges: Vec<Edge>,
    pub annotations: Vec<Annotation>,
    pub ops: Vec<PlanOp>,
    pub version: u32,
}

const SNAPSHOT_VERSION: u32 = 1;

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `append_op(op)` is idempotent: a repeat `op_id` is a no-op, both in
    /// the ops log (G-Set dedup) and for the derived state it would have
    /// produced.
    pub fn append_op(&mut self, op: PlanOp) -> Result<(), SwarmError> {
        if self.ops.contains_key(&op.op_id) {
            return Ok(());
        }
        self.apply_derived(&op);
        self.ops.insert(op.op_id, op);
        Ok(())
    }

    fn apply_derived(&mut self, op: &PlanOp) {
        match op.op_type {
            OpType::AddTask => {
                if !self.tasks.contains_key(&op.task_id) {
                    let task_type = op
                        .payload
                        .get("type")
                        .and_then(|v| v.as_str())
                        .unwrap_or("generic")
                        .to_string();
                    self.tasks.insert(
                        op.task_id,
                        Task {
                            task_id: op.task_id,
                            thread_id: op.thread_id.clone(),
                            task_type,
                            state: TaskState::Draft,
                            last_lamport: op.lamport,
                        },
                    );
                }
            }
            OpType::State => {
                let new_state = op
                    .payload
                    .get("state")
                    .and_then(|v| v.as_str())
                    .and_then(parse_task_state)
                    .unwrap_or(TaskState::Draft);

                match self.tasks.get_mut(&op.task_id) {
                    Some(task) => {
                        if op.lamport > task.last_lamport {
                            task.state = new_state;
                            task.last_lamport = op.lamport;
                        }
                        // equal or lower lamport: discarded (LWW loses)
                    }
                    None => {
                        self.tasks.insert(
                            op.task_id,
                            Task {
                                task_id: op.task_id,
                                thread_id: op.thread_id.clone(),
                                task_type: "generic".into(),
                                state: new_state,
                                last_lamport: op.lamport,
                            },
                        );
                    }
                }
            }
            OpType::Link => {
                if let (Some(parent), Some(child)) = (
                    op.payload.get("parent").and_then(|v| v.as_str()),
                    op.payload.get("child").and_then(|v| v.as_str()),
                ) {
                    if let (Ok(parent), Ok(child)) = (TaskId::from_hex(parent), TaskId::from_hex(child)) {
                        // Cycle rejection happens at patch-merge time
                        // (§4.6), not here, to preserve monotonicity of
                        // local application.
                        self.edges.insert(Edge { parent, child });
                    }
                }
            }
            OpType::Annotate => {
                if let Some(key) = op.payload.get("key").and_then(|v| v.as_str()) {
                    let value = op.payload.get("value").cloned().unwrap_or(serde_json::Value::Null);
                    let entry_key = (op.task_id, key.to_string());
                    let should_replace = match self.annotations.get(&entry_key) {
                        None => true,
                        Some(existing) => {
                            op.lamport > existing.lamport
                                || (op.lamport == existing.lamport && op.actor_id < existing.actor_id)
                        }
                    };
                    if should_replace {
                        self.annotations.insert(
                            entry_key,
                            Annotation {
                                task_id: op.task_id,
                                key: key.to_string(),
                                value,
                                lamport: op.lamport,
                                actor_id: op.actor_id.clone(),
                            },
                        );
                    }
                }
            }
        }
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn get_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<_> = self.edges.iter().copied().collect();
        edges.sort_by_key(|e| (e.parent, e.child));
        edges
    }

    pub fn get_ops_for_thread(&self, thread_id: &str) -> Vec<PlanOp> {
        let mut ops: Vec<_> = self
            .ops
            .values()
            .filter(|op| op.thread_id == thread_id)
            .cloned()
            .collect();
        ops.sort_by_key(|op| op.lamport);
        ops
    }

    pub fn all_ops(&self) -> Vec<PlanOp> {
        let mut ops: Vec<_> = self.ops.values().cloned().collect();
        ops.sort_by_key(|op| op.lamport);
        ops
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn save(&self) -> Result<Vec<u8>, SwarmError> {
        let snapshot = PlanSnapshot {
            tasks: self.tasks.values().cloned().collect(),
            edges: self.get_edges(),
            annotations: self.annotations.values().cloned().collect(),
            ops: self.all_ops(),
            version: SNAPSHOT_VERSION,
        };
        bincode::serialize(&snapshot).map_err(|e| SwarmError::Other(e.to_string()))
    }

    /// `merge(peer_bytes)`: union of ops by `op_id`, sort combined by
    /// lamport (tie-break by actor_id, then op_id), clear derived state,
    /// replay deterministically. This guarantees merge commutativity
    /// (§8 Laws): `merge(A, B)` and `merge(B, A)` both replay the same
    /// sorted union and thus converge to the same derived state.
    pub fn merge(&mut self, peer_bytes: &[u8]) -> Result<(), SwarmError> {
        let peer: PlanSnapshot =
            bincode::deserialize(peer_bytes).map_err(|e| SwarmError::Other(e.to_string()))?;

        let mut union: BTreeMap<OpId, PlanOp> = self.ops.clone();
        for op in peer.ops {
            union.entry(op.op_id).or_insert(op);
        }

        let mut merged: Vec<PlanOp> = union.into_values().collect();
        merged.sort_by(|a, b| {
            a.lamport
                .cmp(&b.lamport)
                .then_with(|| a.actor_id.cmp(&b.actor_id))
                .then_with(|| a.op_id.cmp(&b.op_id))
        });

        self.tasks.clear();
        self.edges.clear();
        self.annotations.clear();
        self.ops.clear();

        for op in merged {
            self.append_op(op)?;
        }
        Ok(())
    }
}

fn parse_task_state(s: &str) -> Option<TaskState> {
    match s {
        "DRAFT" => Some(TaskState::Draft),
        "DECIDED" => Some(TaskState::Decided),
        "VERIFIED" => Some(TaskState::Verified),
        "FINAL" => Some(TaskState::Final),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::{OpId, TaskId};

    fn state_op(task_id: TaskId, lamport: Lamport, state: &str, actor: &str) -> PlanOp {
        PlanOp {
            op_id: OpId::random(),
            thread_id: "t1".into(),
            lamport,
            actor_id: actor.into(),
            op_type: OpType::State,
            task_id,
            payload: serde_json::json!({ "state": state }),
            ts_ns: 0,
        }
    }

    #[test]
    fn append_op_is_idempotent() {
        let mut store = PlanStore::new();
        let task_id = TaskId::from_bytes([1; 32]);
        let op = state_op(task_id, 1, "DECIDED", "a");
        store.append_op(op.clone()).unwrap();
        store.append_op(op).unwrap();
        assert_eq!(store.all_ops().len(), 1);
    }

    #[test]
    fn state_is_last_writer_wins_on_lamport() {
        let mut store = PlanStore::new();
        let task_id = TaskId::from_bytes([2; 32]);
        store.append_op(state_op(task_id, 5, "DECIDED", "a")).unwrap();
        store.append_op(state_op(task_id, 3, "FINAL", "b")).unwrap();
        assert_eq!(store.get_task(&task_id).unwrap().state, TaskState::Decided);
        assert_eq!(store.get_task(&task_id).unwrap().last_lamport, 5);
    }

    #[test]
    fn divergent_merge_converges_on_highest_lamport() {
        // §8 scenario 6.
        let task_id = TaskId::from_bytes([3; 32]);
        let add = PlanOp {
            op_id: OpId::from_bytes([10; 32]),
            thread_id: "t1".into(),
            lamport: 1,
            actor_id: "a".into(),
            op_type: OpType::AddTask,
            task_id,
            payload: serde_json::json!({"type": "generic"}),
            ts_ns: 0,
        };

        let mut peer_a = PlanStore::new();
        peer_a.append_op(add.clone()).unwrap();
        peer_a.append_op(state_op(task_id, 5, "DECIDED", "a")).unwrap();

        let mut peer_b = PlanStore::new();
        peer_b.append_op(add).unwrap();
        peer_b.append_op(state_op(task_id, 10, "DRAFT", "b")).unwrap();

        let a_bytes = peer_a.save().unwrap();
        let b_bytes = peer_b.save().unwrap();

        peer_a.merge(&b_bytes).unwrap();
        peer_b.merge(&a_bytes).unwrap();

        let task_a = peer_a.get_task(&task_id).unwrap();
        let task_b = peer_b.get_task(&task_id).unwrap();
        assert_eq!(task_a.state, TaskState::Draft);
        assert_eq!(task_a.last_lamport, 10);
        assert_eq!(task_a.state, task_b.state);
        assert_eq!(task_a.last_lamport, task_b.last_lamport);
    }
}

use std::collections::{HashMap, HashSet};

use swarmx_core::{Lamport, OpId, OpType, PlanOp, TaskId, TimestampNs};

/// A proposed set of operations, offered for merge against concurrent
/// patches from other actors before being folded into the ops log.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlanPatch {
    pub patch_id: String,
    pub actor_id: String,
    /// Patch applies after this lamport value.
    pub base_lamport: Lamport,
    pub ops: Vec<PatchOp>,
    pub timestamp_ns: TimestampNs,
}

/// Loosely-typed op within a patch, mirroring the wire shape before it is
/// assigned a final `op_id`/`lamport` by `merge_patches`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PatchOp {
    pub op_type: OpType,
    pub task_id: TaskId,
    pub payload: serde_json::Value,
}

pub fn validate_patch(patch: &PlanPatch) -> Result<(), String> {
    if patch.patch_id.is_empty() {
        return Err("missing patch_id".into());
    }
    if patch.actor_id.is_empty() {
        return Err("missing actor_id".into());
    }
    if patch.ops.is_empty() {
        return Err("empty ops list".into());
    }

    for (idx, op) in patch.ops.iter().enumerate() {
        match op.op_type {
            OpType::State => {
                if op.payload.get("state").is_none() {
                    return Err(format!("op {idx}: STATE op missing 'state' in payload"));
                }
            }
            OpType::Link => {
                let payload = &op.payload;
                if payload.get("parent").is_none() || payload.get("child").is_none() {
                    return Err(format!("op {idx}: LINK op missing 'parent' or 'child' in payload"));
                }
            }
            OpType::AddTask | OpType::Annotate => {}
        }
    }
    Ok(())
}

/// Detects conflicting ops between `patch` and `other_patches` — a STATE
/// op on the same task with a different target state, or an ADD_TASK on
/// the same task_id with a different payload. Returns human-readable
/// descriptions; an empty vec means no conflicts.
pub fn detect_conflicts(patch: &PlanPatch, other_patches: &[PlanPatch]) -> Vec<String> {
    let mut conflicts = Vec::new();
    let patch_ops: HashMap<(TaskId, OpTypeKey), &PatchOp> = patch
        .ops
        .iter()
        .map(|op| ((op.task_id, OpTypeKey(op.op_type)), op))
        .collect();

    for other in other_patches {
        if other.patch_id == patch.patch_id {
            continue;
        }
        for other_op in &other.ops {
            let key = (other_op.task_id, OpTypeKey(other_op.op_type));
            if let Some(our_op) = patch_ops.get(&key) {
                match other_op.op_type {
                    OpType::State => {
                        if our_op.payload.get("state") != other_op.payload.get("state") {
                            conflicts.push(format!(
                                "STATE conflict on task {}: patch {} vs {}",
                                other_op.task_id, patch.patch_id, other.patch_id
                            ));
                        }
                    }
                    OpType::AddTask => {
                        if our_op.payload != other_op.payload {
                            conflicts.push(format!(
                                "ADD_TASK conflict on task {}: different payloads in {} vs {}",
                                other_op.task_id, patch.patch_id, other.patch_id
                            ));
                        }
                    }
                    OpType::Link | OpType::Annotate => {}
                }
            }
        }
    }
    conflicts
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct OpTypeKey(OpType);

fn detect_cycle(edges: &[(TaskId, TaskId)], new_edge: (TaskId, TaskId)) -> bool {
    let mut graph: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();
    for &(parent, child) in edges.iter().chain(std::iter::once(&new_edge)) {
        graph.entry(parent).or_default().insert(child);
    }

    fn has_cycle_from(
        node: TaskId,
        graph: &HashMap<TaskId, HashSet<TaskId>>,
        visited: &mut HashSet<TaskId>,
        rec_stack: &mut HashSet<TaskId>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);

        if let Some(neighbors) = graph.get(&node) {
            for &neighbor in neighbors {
                if !visited.contains(&neighbor) {
                    if has_cycle_from(neighbor, graph, visited, rec_stack) {
                        return true;
                    }
                } else if rec_stack.contains(&neighbor) {
                    return true;
                }
            }
        }
        rec_stack.remove(&node);
        false
    }

    let mut visited = HashSet::new();
    for &node in graph.keys() {
        if !visited.contains(&node) {
            let mut rec_stack = HashSet::new();
            if has_cycle_from(node, &graph, &mut visited, &mut rec_stack) {
                return true;
            }
        }
    }
    false
}

/// Merges concurrent patches into a single deterministic sequence of
/// `PlanOp`s: sort patches by `(base_lamport, actor_id)`, then fold ops
/// with G-Set semantics for `ADD_TASK`/`ANNOTATE`, LWW on `base_lamport`
/// for `STATE`, and cycle-rejecting LINK application. A LINK that would
/// close a cycle is silently dropped, not errored — matching the source
/// this was ported from.
pub fn merge_patches(patches: &[PlanPatch], thread_id: &str) -> Vec<PlanOp> {
    if patches.is_empty() {
        return Vec::new();
    }

    let mut sorted_patches: Vec<&PlanPatch> = patches.iter().collect();
    sorted_patches.sort_by(|a, b| a.base_lamport.cmp(&b.base_lamport).then_with(|| a.actor_id.cmp(&b.actor_id)));

    struct Resolved {
        op_type: OpType,
        task_id: TaskId,
        payload: serde_json::Value,
        patch_lamport: Lamport,
        actor: String,
    }

    let mut add_task_ops: HashMap<TaskId, Resolved> = HashMap::new();
    let mut merged_ops: HashMap<(TaskId, OpTypeKey), Resolved> = HashMap::new();
    let mut link_edges: Vec<(TaskId, TaskId)> = Vec::new();

    let mut current_lamport = sorted_patches.iter().map(|p| p.base_lamport).max().unwrap_or(0) + 1;

    for patch in &sorted_patches {
        for op in &patch.ops {
            match op.op_type {
                OpType::AddTask => {
                    let replace = match add_task_ops.get(&op.task_id) {
                        Some(existing) => patch.base_lamport > existing.patch_lamport,
                        None => true,
                    };
                    if replace {
                        add_task_ops.insert(
                            op.task_id,
                            Resolved {
                                op_type: op.op_type,
                                task_id: op.task_id,
                                payload: op.payload.clone(),
                                patch_lamport: patch.base_lamport,
                                actor: patch.actor_id.clone(),
                            },
                        );
                    }
                }
                OpType::State => {
                    let key = (op.task_id, OpTypeKey(op.op_type));
                    let replace = match merged_ops.get(&key) {
                        Some(existing) => patch.base_lamport > existing.patch_lamport,
                        None => true,
                    };
                    if replace {
                        merged_ops.insert(
                            key,
                            Resolved {
                                op_type: op.op_type,
                                task_id: op.task_id,
                                payload: op.payload.clone(),
                                patch_lamport: patch.base_lamport,
                                actor: patch.actor_id.clone(),
                            },
                        );
                    }
                }
                OpType::Link => {
                    let parent = op.payload.get("parent").and_then(|v| v.as_str()).and_then(|s| TaskId::from_hex(s).ok());
                    let child = op.payload.get("child").and_then(|v| v.as_str()).and_then(|s| TaskId::from_hex(s).ok());
                    if let (Some(parent), Some(child)) = (parent, child) {
                        if !detect_cycle(&link_edges, (parent, child)) {
                            link_edges.push((parent, child));
                            let key = (op.task_id, OpTypeKey(op.op_type));
                            merged_ops.insert(
                                key,
                                Resolved {
                                    op_type: op.op_type,
                                    task_id: op.task_id,
                                    payload: op.payload.clone(),
                                    patch_lamport: patch.base_lamport,
                                    actor: patch.actor_id.clone(),
                                },
                            );
                        }
                        // else: silently dropped, would close a cycle.
                    }
                }
                OpType::Annotate => {
                    let key = (op.task_id, OpTypeKey(op.op_type));
                    merged_ops.insert(
                        key,
                        Resolved {
                            op_type: op.op_type,
                            task_id: op.task_id,
                            payload: op.payload.clone(),
                            patch_lamport: patch.base_lamport,
                            actor: patch.actor_id.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut result_ops = Vec::new();

    for (_, resolved) in add_task_ops {
        result_ops.push(PlanOp {
            op_id: OpId::random(),
            thread_id: thread_id.to_string(),
            lamport: current_lamport,
            actor_id: resolved.actor,
            op_type: resolved.op_type,
            task_id: resolved.task_id,
            payload: resolved.payload,
            ts_ns: 0,
        });
        current_lamport += 1;
    }

    for (_, resolved) in merged_ops {
        result_ops.push(PlanOp {
            op_id: OpId::random(),
            thread_id: thread_id.to_string(),
            lamport: current_lamport,
            actor_id: resolved.actor,
            op_type: resolved.op_type,
            task_id: resolved.task_id,
            payload: resolved.payload,
            ts_ns: 0,
        });
        current_lamport += 1;
    }

    result_ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(id: &str, actor: &str, base_lamport: Lamport, ops: Vec<PatchOp>) -> PlanPatch {
        PlanPatch {
            patch_id: id.into(),
            actor_id: actor.into(),
            base_lamport,
            ops,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn validate_rejects_state_without_state_field() {
        let p = patch(
            "p1",
            "a",
            0,
            vec![PatchOp {
                op_type: OpType::State,
                task_id: TaskId::from_bytes([1; 32]),
                payload: serde_json::json!({}),
            }],
        );
        assert!(validate_patch(&p).is_err());
    }

    #[test]
    fn merge_state_conflict_picks_higher_base_lamport() {
        let task_id = TaskId::from_bytes([1; 32]);
        let p1 = patch(
            "p1",
            "a",
            1,
            vec![PatchOp {
                op_type: OpType::State,
                task_id,
                payload: serde_json::json!({"state": "DECIDED"}),
            }],
        );
        let p2 = patch(
            "p2",
            "b",
            5,
            vec![PatchOp {
                op_type: OpType::State,
                task_id,
                payload: serde_json::json!({"state": "FINAL"}),
            }],
        );
        let merged = merge_patches(&[p1, p2], "t1");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payload.get("state").unwrap(), "FINAL");
    }

    #[test]
    fn merge_link_dropping_a_cycle() {
        let a = TaskId::from_bytes([1; 32]);
        let b = TaskId::from_bytes([2; 32]);
        let c = TaskId::from_bytes([3; 32]);

        let link = |from: TaskId, to: TaskId, task_id: TaskId| PatchOp {
            op_type: OpType::Link,
            task_id,
            payload: serde_json::json!({"parent": from.to_hex(), "child": to.to_hex()}),
        };

        let p1 = patch("p1", "a", 0, vec![link(a, b, a)]);
        let p2 = patch("p2", "b", 1, vec![link(b, c, b)]);
        let p3 = patch("p3", "c", 2, vec![link(c, a, c)]); // would close a->b->c->a

        let merged = merge_patches(&[p1, p2, p3], "t1");
        // Only the first two LINK ops survive; the cycle-closing one is dropped.
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn detect_conflicts_flags_divergent_state() {
        let task_id = TaskId::from_bytes([9; 32]);
        let p1 = patch(
            "p1",
            "a",
            0,
            vec![PatchOp {
                op_type: OpType::State,
                task_id,
                payload: serde_json::json!({"state": "DECIDED"}),
            }],
        );
        let p2 = patch(
            "p2",
            "b",
            0,
            vec![PatchOp {
                op_type: OpType::State,
                task_id,
                payload: serde_json::json!({"state": "FINAL"}),
            }],
        );
        let conflicts = detect_conflicts(&p1, std::slice::from_ref(&p2));
        assert_eq!(conflicts.len(), 1);
    }
}

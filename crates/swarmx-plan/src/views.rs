use std::collections::{HashMap, HashSet};

use swarmx_core::{SwarmError, Task, TaskId, TaskState};

use crate::store::PlanStore;

/// Read-only view over a `PlanStore`'s tasks, grouped by derived state.
pub struct TaskView<'a> {
    store: &'a PlanStore,
}

impl<'a> TaskView<'a> {
    pub fn new(store: &'a PlanStore) -> Self {
        Self { store }
    }

    pub fn by_state(&self, state: TaskState) -> Vec<&'a Task> {
        self.store.all_tasks().filter(|t| t.state == state).collect()
    }

    /// A task is ready iff it is still `DRAFT` and every parent (if any)
    /// has reached `VERIFIED` or `FINAL` — the set an agent could bid on
    /// next.
    pub fn ready(&self) -> Vec<&'a Task> {
        let edges = self.store.get_edges();
        let mut parents_of: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for edge in &edges {
            parents_of.entry(edge.child).or_default().push(edge.parent);
        }

        self.store
            .all_tasks()
            .filter(|task| task.state == TaskState::Draft)
            .filter(|task| {
                parents_of
                    .get(&task.task_id)
                    .map(|parents| {
                        parents.iter().all(|p| {
                            self.store
                                .get_task(p)
                                .map(|t| matches!(t.state, TaskState::Verified | TaskState::Final))
                                .unwrap_or(false)
                        })
                    })
                    .unwrap_or(true)
            })
            .collect()
    }
}

/// Read-only view over the task-dependency graph (edges derived from
/// `LINK` ops).
pub struct GraphView<'a> {
    store: &'a PlanStore,
}

impl<'a> GraphView<'a> {
    pub fn new(store: &'a PlanStore) -> Self {
        Self { store }
    }

    pub fn children(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.store
            .get_edges()
            .into_iter()
            .filter(|e| &e.parent == task_id)
            .map(|e| e.child)
            .collect()
    }

    pub fn parents(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.store
            .get_edges()
            .into_iter()
            .filter(|e| &e.child == task_id)
            .map(|e| e.parent)
            .collect()
    }

    pub fn ancestors(&self, task_id: &TaskId) -> HashSet<TaskId> {
        let mut seen = HashSet::new();
        let mut stack = self.parents(task_id);
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.parents(&node));
            }
        }
        seen
    }

    pub fn descendants(&self, task_id: &TaskId) -> HashSet<TaskId> {
        let mut seen = HashSet::new();
        let mut stack = self.children(task_id);
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.children(&node));
            }
        }
        seen
    }

    /// Kahn's algorithm. Returns `CycleDetected` if the edge set is not a
    /// DAG — every topological sort over this store's edges is expected
    /// to succeed because `LINK` application never admits a cycle-closing
    /// edge at merge time (§4.6), so reaching this error indicates a bug
    /// upstream, not a normal runtime condition.
    pub fn topological_sort(&self) -> Result<Vec<TaskId>, SwarmError> {
        let edges = self.store.get_edges();
        let mut in_degree: HashMap<TaskId, usize> = HashMap::new();
        let mut adjacency: HashMap<TaskId, Vec<TaskId>> = HashMap::new();

        for task in self.store.all_tasks() {
            in_degree.entry(task.task_id).or_insert(0);
        }
        for edge in &edges {
            *in_degree.entry(edge.child).or_insert(0) += 1;
            in_degree.entry(edge.parent).or_insert(0);
            adjacency.entry(edge.parent).or_default().push(edge.child);
        }

        let mut queue: Vec<TaskId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        queue.sort();

        let mut order = Vec::new();
        while let Some(node) = queue.pop() {
            order.push(node);
            if let Some(children) = adjacency.get(&node) {
                let mut newly_free = Vec::new();
                for &child in children {
                    let deg = in_degree.get_mut(&child).unwrap();
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
            return Err(SwarmError::CycleDetected);
        }
        Ok(order)
    }

    pub fn detect_cycles(&self) -> bool {
        self.topological_sort().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::{OpId, OpType, PlanOp};

    fn add_task(store: &mut PlanStore, task_id: TaskId, lamport: u64) {
        store
            .append_op(PlanOp {
                op_id: OpId::random(),
                thread_id: "t1".into(),
                lamport,
                actor_id: "a".into(),
                op_type: OpType::AddTask,
                task_id,
                payload: serde_json::json!({"type": "generic"}),
                ts_ns: 0,
            })
            .unwrap();
    }

    fn link(store: &mut PlanStore, parent: TaskId, child: TaskId, lamport: u64) {
        store
            .append_op(PlanOp {
                op_id: OpId::random(),
                thread_id: "t1".into(),
                lamport,
                actor_id: "a".into(),
                op_type: OpType::Link,
                task_id: parent,
                payload: serde_json::json!({"parent": parent.to_hex(), "child": child.to_hex()}),
                ts_ns: 0,
            })
            .unwrap();
    }

    #[test]
    fn topo_sort_orders_parent_before_child() {
        let mut store = PlanStore::new();
        let a = TaskId::from_bytes([1; 32]);
        let b = TaskId::from_bytes([2; 32]);
        add_task(&mut store, a, 1);
        add_task(&mut store, b, 2);
        link(&mut store, a, b, 3);

        let graph = GraphView::new(&store);
        let order = graph.topological_sort().unwrap();
        let pos_a = order.iter().position(|&t| t == a).unwrap();
        let pos_b = order.iter().position(|&t| t == b).unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn ready_excludes_tasks_with_unfinished_parents() {
        let mut store = PlanStore::new();
        let a = TaskId::from_bytes([1; 32]);
        let b = TaskId::from_bytes([2; 32]);
        add_task(&mut store, a, 1);
        add_task(&mut store, b, 2);
        link(&mut store, a, b, 3);

        let ready_ids: Vec<TaskId> = TaskView::new(&store).ready().into_iter().map(|t| t.task_id).collect();
        assert!(ready_ids.contains(&a));
        assert!(!ready_ids.contains(&b));
    }
}

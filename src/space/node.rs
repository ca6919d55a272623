use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

use super::path_space::SpaceInner;
use super::TypeTag;
use super::Value;
use crate::task::Task;

/// One queued entry at a node
#[derive(Debug)]
pub(crate) enum Slot {
    Value(Value),
    /// Result of a callable not yet written back
    Pending { task: Arc<Task>, tag: TypeTag },
    /// The callable panicked
    Failed { tag: TypeTag, message: String },
}

impl Slot {
    pub(crate) fn tag(&self) -> TypeTag {
        match self {
            Slot::Value(v) => v.tag(),
            Slot::Pending { tag, .. } | Slot::Failed { tag, .. } => *tag,
        }
    }
}

struct ChildEntry {
    seq: u64,
    node: Arc<Node>,
}

/// A tree position: named children plus a FIFO of slots.
///
/// Child lookup goes through a `DashMap`; enumeration is ordered by
/// insertion sequence. The slot queue has its own lock so unrelated nodes
/// never contend.
#[derive(Default)]
pub(crate) struct Node {
    children: DashMap<String, ChildEntry>,
    next_seq: AtomicU64,
    slots: Mutex<VecDeque<Slot>>,
    nested: ArcSwapOption<SpaceInner>,
}

impl Node {
    pub(crate) fn child(
        &self,
        name: &str,
    ) -> Option<Arc<Node>> {
        self.children.get(name).map(|entry| entry.node.clone())
    }

    pub(crate) fn child_or_insert(
        &self,
        name: &str,
    ) -> Arc<Node> {
        if let Some(existing) = self.child(name) {
            return existing;
        }
        self.children
            .entry(name.to_string())
            .or_insert_with(|| ChildEntry {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                node: Arc::new(Node::default()),
            })
            .node
            .clone()
    }

    /// Children in insertion order
    pub(crate) fn children(&self) -> Vec<(String, Arc<Node>)> {
        let mut entries: Vec<(u64, String, Arc<Node>)> = self
            .children
            .iter()
            .map(|e| (e.value().seq, e.key().clone(), e.value().node.clone()))
            .collect();
        entries.sort_unstable_by_key(|(seq, _, _)| *seq);
        entries.into_iter().map(|(_, name, node)| (name, node)).collect()
    }

    pub(crate) fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub(crate) fn remove_child(
        &self,
        name: &str,
    ) -> Option<Arc<Node>> {
        self.children.remove(name).map(|(_, entry)| entry.node)
    }

    pub(crate) fn clear_children(&self) {
        self.children.clear();
    }

    pub(crate) fn slots(&self) -> MutexGuard<'_, VecDeque<Slot>> {
        self.slots.lock()
    }

    pub(crate) fn nested(&self) -> Option<Arc<SpaceInner>> {
        self.nested.load_full()
    }

    pub(crate) fn set_nested(
        &self,
        space: Option<Arc<SpaceInner>>,
    ) -> Option<Arc<SpaceInner>> {
        self.nested.swap(space)
    }

    /// Resolved value at the head of the queue, if any
    pub(crate) fn front_value(&self) -> Option<Value> {
        match self.slots().front() {
            Some(Slot::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Slots held by this node and every descendant, nested spaces excluded
    pub(crate) fn subtree_slot_count(&self) -> usize {
        let own = self.slots().len();
        own + self
            .children()
            .iter()
            .map(|(_, child)| child.subtree_slot_count())
            .sum::<usize>()
    }
}

use super::node::Node;
use super::node::Slot;
use super::Storable;
use super::Value;
use crate::path::Path;
use crate::SpaceError;
use crate::SpaceResult;

/// Traversal bounds for [`crate::Space::visit`]
#[derive(Clone, Debug)]
pub struct VisitOptions {
    /// Concrete starting location, `/` for the whole space
    pub root: String,
    /// Levels below `root` to descend; `None` for unbounded
    pub max_depth: Option<usize>,
    /// Children visited per node, in insertion order
    pub max_children: Option<usize>,
    pub include_nested_spaces: bool,
    /// When false, visitors receive handles that expose no values
    pub include_values: bool,
}

impl Default for VisitOptions {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
            max_depth: None,
            max_children: None,
            include_nested_spaces: true,
            include_values: true,
        }
    }
}

impl VisitOptions {
    pub fn rooted_at(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Depth and child limits are absolute; entering a nested space
    /// continues counting from the mount point
    pub(crate) fn descend_allowed(
        &self,
        depth: usize,
    ) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

/// Verdict returned by a visitor for each entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitControl {
    Continue,
    /// Do not descend below this entry
    SkipChildren,
    Stop,
}

/// Metadata describing one visited node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathEntry {
    pub path: Path,
    /// Levels below the visit root
    pub depth: usize,
    pub has_children: bool,
    /// Number of queued slots, pending tasks included
    pub queue_depth: usize,
    /// A separately owned space is mounted here
    pub is_nested_mount: bool,
}

/// Read-only access to the values of a visited node.
///
/// Reads never start lazy tasks and never block.
pub struct ValueHandle<'a> {
    node: Option<&'a Node>,
    path: &'a Path,
}

impl<'a> ValueHandle<'a> {
    pub(crate) fn new(
        node: &'a Node,
        path: &'a Path,
        include_values: bool,
    ) -> Self {
        Self {
            node: include_values.then_some(node),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        self.path
    }

    /// False when the visit was run without `include_values`
    pub fn is_available(&self) -> bool {
        self.node.is_some()
    }

    pub fn queue_depth(&self) -> usize {
        self.node.map(|n| n.slots().len()).unwrap_or(0)
    }

    /// Head of the queue if it is a resolved value
    pub fn front(&self) -> Option<Value> {
        self.node.and_then(Node::front_value)
    }

    /// Resolved values in FIFO order, pending and failed slots skipped
    pub fn values(&self) -> Vec<Value> {
        let Some(node) = self.node else {
            return Vec::new();
        };
        node.slots()
            .iter()
            .filter_map(|slot| match slot {
                Slot::Value(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Decodes the head of the queue
    pub fn read<T: Storable>(&self) -> SpaceResult<T> {
        let node = self.node.ok_or_else(|| {
            SpaceError::InvalidPermissions(format!("values not included in visit of {}", self.path))
        })?;
        let slots = node.slots();
        match slots.front() {
            None => Err(SpaceError::NoObjectFound {
                path: self.path.to_string(),
            }),
            Some(Slot::Value(v)) => v.decode(self.path.as_str()),
            Some(slot) if slot.tag() != super::TypeTag::of::<T>() => Err(SpaceError::InvalidType {
                path: self.path.to_string(),
                expected: std::any::type_name::<T>(),
                found: slot.tag().name(),
            }),
            Some(Slot::Failed { message, .. }) => Err(SpaceError::TaskFailed {
                path: self.path.to_string(),
                message: message.clone(),
            }),
            Some(Slot::Pending { .. }) => Err(SpaceError::NoObjectFound {
                path: self.path.to_string(),
            }),
        }
    }
}

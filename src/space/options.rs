use std::time::Duration;
use std::time::Instant;

use crate::SpaceError;

/// How long a read or take may suspend the calling thread.
///
/// Indefinite waits must be requested explicitly with [`Block::Forever`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Block {
    #[default]
    NonBlocking,
    Timeout(Duration),
    Forever,
}

impl Block {
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Block::NonBlocking)
    }

    /// `None` means no deadline
    pub(crate) fn deadline(
        &self,
        start: Instant,
    ) -> Option<Instant> {
        match self {
            Block::NonBlocking => Some(start),
            Block::Timeout(d) => start.checked_add(*d),
            Block::Forever => None,
        }
    }
}

/// When an inserted callable runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionCategory {
    /// Submitted to the pool as soon as it is inserted
    #[default]
    Immediate,
    /// Submitted on the first read or take that reaches it
    Lazy,
}

/// Insert options
#[derive(Clone, Copy, Debug, Default)]
pub struct InOptions {
    /// Clear the queue at each target before appending
    pub replace_existing: bool,
    pub execution: ExecutionCategory,
}

impl InOptions {
    pub fn replace_existing(mut self) -> Self {
        self.replace_existing = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.execution = ExecutionCategory::Lazy;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.execution = ExecutionCategory::Immediate;
        self
    }
}

/// Read / take options
#[derive(Clone, Copy, Debug, Default)]
pub struct OutOptions {
    pub block: Block,
    /// Destructive read (take) when set
    pub pop: bool,
    /// `Some(Lazy)` observes a lazy task without starting it.
    /// `None` or `Some(Immediate)` start it.
    pub execution: Option<ExecutionCategory>,
}

impl OutOptions {
    pub fn read() -> Self {
        Self::default()
    }

    pub fn take() -> Self {
        Self {
            pop: true,
            ..Self::default()
        }
    }

    pub fn block(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.block = Block::Timeout(timeout);
        self
    }

    pub fn block_forever(mut self) -> Self {
        self.block = Block::Forever;
        self
    }

    pub fn execution(
        mut self,
        category: ExecutionCategory,
    ) -> Self {
        self.execution = Some(category);
        self
    }

    pub(crate) fn starts_lazy_tasks(&self) -> bool {
        self.execution != Some(ExecutionCategory::Lazy)
    }
}

/// Outcome of an insert; pattern inserts can partially succeed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InsertReturn {
    pub values_inserted: usize,
    pub tasks_inserted: usize,
    pub spaces_inserted: usize,
    pub errors: Vec<SpaceError>,
}

impl InsertReturn {
    pub(crate) fn error(err: SpaceError) -> Self {
        Self {
            errors: vec![err],
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Anything was placed in the tree
    pub fn inserted_any(&self) -> bool {
        self.values_inserted + self.tasks_inserted + self.spaces_inserted > 0
    }

    pub(crate) fn merge(
        &mut self,
        other: InsertReturn,
    ) {
        self.values_inserted += other.values_inserted;
        self.tasks_inserted += other.tasks_inserted;
        self.spaces_inserted += other.spaces_inserted;
        self.errors.extend(other.errors);
    }
}

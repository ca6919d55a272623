use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::InOptions;
use super::InsertReturn;
use super::OutOptions;
use super::PathEntry;
use super::PathSpace;
use super::Storable;
use super::TypeTag;
use super::Value;
use super::ValueHandle;
use super::VisitControl;
use super::VisitOptions;
use crate::path::Path;
use crate::SpaceResult;

/// Visitor callback used by [`Space::visit`]
pub type Visitor<'v> = dyn FnMut(&PathEntry, &ValueHandle<'_>) -> VisitControl + 'v;

pub(crate) type Producer = Arc<dyn Fn() -> SpaceResult<Value> + Send + Sync>;

/// A callable whose result becomes a value slot
#[derive(Clone)]
pub struct TaskInput {
    pub(crate) producer: Producer,
    pub(crate) tag: TypeTag,
}

impl TaskInput {
    /// The callable may run once per insertion target, so it is `Fn`
    pub fn new<T, F>(f: F) -> Self
    where
        T: Storable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(move || Value::encode(&f())),
            tag: TypeTag::of::<T>(),
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }
}

/// Type-erased insert payload
#[derive(Clone)]
pub enum InputData {
    Value(Value),
    Task(TaskInput),
    /// Mount a separately owned space
    Space(PathSpace),
}

impl fmt::Debug for InputData {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            InputData::Value(v) => f.debug_tuple("Value").field(v).finish(),
            InputData::Task(t) => f.debug_tuple("Task").field(&t.tag.name()).finish(),
            InputData::Space(_) => f.write_str("Space"),
        }
    }
}

/// The type-erased space surface.
///
/// Object safe, so decorators such as the snapshot cache can wrap any
/// implementation. Typed access lives in [`SpaceExt`].
pub trait Space: Send + Sync {
    fn insert_input(
        &self,
        path: &str,
        input: InputData,
        options: &InOptions,
    ) -> InsertReturn;

    /// Reads (or takes, with `options.pop`) the head slot at `path`,
    /// which must hold `tag`
    fn out(
        &self,
        path: &str,
        tag: TypeTag,
        options: &OutOptions,
    ) -> SpaceResult<Value>;

    /// Concrete existing paths matching `pattern`, depth-first in insertion order
    fn find(
        &self,
        pattern: &str,
    ) -> SpaceResult<Vec<Path>>;

    fn list_children(
        &self,
        path: &str,
    ) -> SpaceResult<Vec<String>>;

    fn visit(
        &self,
        options: &VisitOptions,
        visitor: &mut Visitor<'_>,
    ) -> SpaceResult<()>;

    /// Detaches the subtree at `path`; returns the number of slots dropped
    fn remove(
        &self,
        path: &str,
    ) -> SpaceResult<usize>;

    /// Wakes blocked readers of `path` (`/` wakes everyone)
    fn notify(
        &self,
        path: &str,
    );

    fn shutdown(&self);
}

/// Typed convenience methods for every [`Space`]
pub trait SpaceExt: Space {
    fn insert<T: Storable>(
        &self,
        path: &str,
        value: T,
    ) -> InsertReturn {
        self.insert_with(path, value, InOptions::default())
    }

    fn insert_with<T: Storable>(
        &self,
        path: &str,
        value: T,
        options: InOptions,
    ) -> InsertReturn {
        match Value::encode(&value) {
            Ok(value) => self.insert_input(path, InputData::Value(value), &options),
            Err(e) => InsertReturn::error(e),
        }
    }

    /// Inserts a callable; its result becomes a value at `path`
    fn insert_task<T, F>(
        &self,
        path: &str,
        f: F,
    ) -> InsertReturn
    where
        T: Storable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert_task_with(path, f, InOptions::default())
    }

    fn insert_task_with<T, F>(
        &self,
        path: &str,
        f: F,
        options: InOptions,
    ) -> InsertReturn
    where
        T: Storable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert_input(path, InputData::Task(TaskInput::new(f)), &options)
    }

    fn read<T: Storable>(
        &self,
        path: &str,
    ) -> SpaceResult<T> {
        self.read_with(path, OutOptions::read())
    }

    fn read_with<T: Storable>(
        &self,
        path: &str,
        options: OutOptions,
    ) -> SpaceResult<T> {
        let options = OutOptions { pop: false, ..options };
        self.out(path, TypeTag::of::<T>(), &options)?.decode(path)
    }

    fn read_block<T: Storable>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> SpaceResult<T> {
        self.read_with(path, OutOptions::read().block(timeout))
    }

    fn take<T: Storable>(
        &self,
        path: &str,
    ) -> SpaceResult<T> {
        self.take_with(path, OutOptions::take())
    }

    fn take_with<T: Storable>(
        &self,
        path: &str,
        options: OutOptions,
    ) -> SpaceResult<T> {
        let options = OutOptions { pop: true, ..options };
        self.out(path, TypeTag::of::<T>(), &options)?.decode(path)
    }

    fn take_block<T: Storable>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> SpaceResult<T> {
        self.take_with(path, OutOptions::take().block(timeout))
    }

    /// Non-blocking read of every match of `pattern`, in match order
    fn read_all<T: Storable>(
        &self,
        pattern: &str,
    ) -> SpaceResult<Vec<(Path, SpaceResult<T>)>> {
        let matches = self.find(pattern)?;
        Ok(matches
            .into_iter()
            .map(|path| {
                let result = self.read::<T>(path.as_str());
                (path, result)
            })
            .collect())
    }
}

impl<S: Space + ?Sized> SpaceExt for S {}

impl<S: Space + ?Sized> Space for Arc<S> {
    fn insert_input(
        &self,
        path: &str,
        input: InputData,
        options: &InOptions,
    ) -> InsertReturn {
        (**self).insert_input(path, input, options)
    }

    fn out(
        &self,
        path: &str,
        tag: TypeTag,
        options: &OutOptions,
    ) -> SpaceResult<Value> {
        (**self).out(path, tag, options)
    }

    fn find(
        &self,
        pattern: &str,
    ) -> SpaceResult<Vec<Path>> {
        (**self).find(pattern)
    }

    fn list_children(
        &self,
        path: &str,
    ) -> SpaceResult<Vec<String>> {
        (**self).list_children(path)
    }

    fn visit(
        &self,
        options: &VisitOptions,
        visitor: &mut Visitor<'_>,
    ) -> SpaceResult<()> {
        (**self).visit(options, visitor)
    }

    fn remove(
        &self,
        path: &str,
    ) -> SpaceResult<usize> {
        (**self).remove(path)
    }

    fn notify(
        &self,
        path: &str,
    ) {
        (**self).notify(path)
    }

    fn shutdown(&self) {
        (**self).shutdown()
    }
}


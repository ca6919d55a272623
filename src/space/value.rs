use std::any::type_name;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::SpaceError;
use crate::SpaceResult;

/// Anything that can be stored at a path
pub trait Storable: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Storable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Runtime type identity of a stored payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Type-erased payload: bincode bytes tagged with the Rust type they encode.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Value {
    tag: TypeTag,
    bytes: Arc<[u8]>,
}

impl Value {
    pub fn encode<T: Storable>(value: &T) -> SpaceResult<Self> {
        let bytes = bincode::serialize(value).map_err(|e| SpaceError::UnserializableType {
            type_name: type_name::<T>(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            tag: TypeTag::of::<T>(),
            bytes: bytes.into(),
        })
    }

    /// Decodes the payload as `T`.
    ///
    /// Fails with `InvalidType` when the stored type differs.
    pub fn decode<T: Storable>(
        &self,
        path: &str,
    ) -> SpaceResult<T> {
        let wanted = TypeTag::of::<T>();
        if wanted != self.tag {
            return Err(SpaceError::InvalidType {
                path: path.to_string(),
                expected: wanted.name,
                found: self.tag.name,
            });
        }
        bincode::deserialize(&self.bytes).map_err(|e| SpaceError::UnserializableType {
            type_name: wanted.name,
            reason: e.to_string(),
        })
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.tag == TypeTag::of::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.tag.name
    }

    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.tag.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

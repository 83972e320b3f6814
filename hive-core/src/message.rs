//! Type-erased message payloads.
//!
//! The runtime moves user messages around without knowing their concrete
//! types. [`AnyMessage`] carries an `Arc`-boxed payload together with the
//! `TypeId` captured at the sender, so cloning for publish fan-out is a
//! refcount bump and dispatch can key on the exact concrete type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct AnyMessage {
    payload: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl AnyMessage {
    pub fn new<M: Any + Send + Sync>(message: M) -> Self {
        Self {
            payload: Arc::new(message),
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
        }
    }

    /// The `TypeId` of the payload as seen at the sender. Dispatch matches
    /// on this exactly; there is no subtype or supertype fallback.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Diagnostic name of the payload type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<M: Any>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        self.payload.downcast_ref::<M>()
    }

    /// Clones the payload out as its concrete type.
    pub fn downcast<M: Any + Clone>(&self) -> Option<M> {
        self.downcast_ref::<M>().cloned()
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMessage")
            .field("type", &self.type_name)
            .finish()
    }
}

//! Infrastructure layer.

pub mod backend;
pub mod registry;

#[cfg(feature = "http")]
pub use self::backend::Http;
#[cfg(any(test, feature = "memory"))]
pub use self::backend::InMemory;
pub use self::{
    backend::Backend,
    registry::{Registry, Slot},
};

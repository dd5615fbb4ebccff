//! Opaque type identifiers and the registry that gives them human-readable
//! names for diagnostics.
//!
//! The compile-time layer of the surrounding DI framework is the only thing
//! that ever constructs a [`TypeId`] or registers a name for one; this crate
//! only ever reads back what was registered.

use std::fmt;
use std::sync::{Arc, RwLock};

/// An opaque handle identifying a type bound somewhere in the component
/// graph.
///
/// `TypeId` is deliberately a thin, `Copy` index rather than anything that
/// carries the metadata itself — the metadata lives in a [`TypeRegistry`],
/// and a `TypeId` is only ever a key into one. This mirrors the base spec's
/// "back-pointer to descriptive metadata sufficient to render a
/// human-readable name": the pointer is the registry lookup, not a field on
/// the id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeId(pub u64);

impl TypeId {
  pub const fn new(raw: u64) -> Self { Self(raw) }
}

impl fmt::Debug for TypeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "TypeId({})", self.0) }
}

/// Maps [`TypeId`]s to human-readable names, for diagnostics only.
///
/// Populated once by the compile-time layer before normalization begins;
/// the normalizer treats it as read-only.
#[derive(Clone, Default)]
pub struct TypeRegistry {
  names: Arc<RwLock<std::collections::HashMap<TypeId, String>>>,
}

impl TypeRegistry {
  pub fn new() -> Self { Self::default() }

  /// Registers (or overwrites) the display name for `type_id`.
  pub fn register(&self, type_id: TypeId, name: impl Into<String>) {
    self.names.write().expect("type registry lock poisoned").insert(type_id, name.into());
  }

  /// Renders `type_id` for diagnostics, falling back to the raw id if no
  /// name was ever registered for it.
  pub fn name_of(&self, type_id: TypeId) -> String {
    self
      .names
      .read()
      .expect("type registry lock poisoned")
      .get(&type_id)
      .cloned()
      .unwrap_or_else(|| format!("<unnamed {type_id:?}>"))
  }
}

impl fmt::Debug for TypeRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeRegistry").finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unregistered_type_falls_back_to_raw_id() {
    let registry = TypeRegistry::new();
    assert_eq!(registry.name_of(TypeId::new(7)), "<unnamed TypeId(7)>");
  }

  #[test]
  fn registered_type_renders_its_name() {
    let registry = TypeRegistry::new();
    registry.register(TypeId::new(1), "widgets::Widget");
    assert_eq!(registry.name_of(TypeId::new(1)), "widgets::Widget");
  }

  #[test]
  fn type_id_total_order_is_by_raw_value() {
    assert!(TypeId::new(1) < TypeId::new(2));
  }

  #[cfg(feature = "serde")]
  #[test]
  fn type_id_round_trips_through_json() {
    let original = TypeId::new(42);
    let json = serde_json::to_string(&original).unwrap();
    let restored: TypeId = serde_json::from_str(&json).unwrap();
    assert_eq!(original, restored);
  }
}

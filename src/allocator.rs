//! The fixed-size-allocator collaborator contract.
//!
//! The allocator itself — how object storage is actually reserved and laid
//! out — is out of scope here (SPEC_FULL.md §1); normalization only needs
//! to *tell* the allocator which types require space, via this narrow
//! trait.

use crate::type_id::TypeId;

/// Reserves allocator budget for types that need storage.
///
/// One `add_type`/`add_externally_allocated_type` call is made per type
/// that needs allocation, exactly once, during normalization (see the
/// accounting invariant in SPEC_FULL.md §8).
pub trait FixedSizeAllocatorDescriptor {
  /// Reserve storage for a type the injector will allocate itself.
  fn add_type(&mut self, type_id: TypeId);

  /// Reserve storage for a type that will be placed into
  /// externally-provided storage.
  fn add_externally_allocated_type(&mut self, type_id: TypeId);
}

/// A [`FixedSizeAllocatorDescriptor`] that just records the calls it
/// received, in order. Used by tests to assert the accounting invariant;
/// a real injector would instead hand in its actual allocator plan here.
#[derive(Debug, Default)]
pub struct RecordingAllocatorDescriptor {
  pub allocated:             Vec<TypeId>,
  pub externally_allocated:  Vec<TypeId>,
}

impl FixedSizeAllocatorDescriptor for RecordingAllocatorDescriptor {
  fn add_type(&mut self, type_id: TypeId) { self.allocated.push(type_id); }

  fn add_externally_allocated_type(&mut self, type_id: TypeId) {
    self.externally_allocated.push(type_id);
  }
}

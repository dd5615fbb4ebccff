//! The collaborator contract for `LazyComponentWithArgs` bindings: an owned,
//! type-erased component object that can compare itself structurally
//! (including its arguments) against another instance, and that knows how
//! to push its own bindings onto the work stack.

use std::fmt;

use crate::binding::BindingEntry;
use crate::type_id::TypeId;

/// A deferred sub-component parameterized by arguments.
///
/// Implementors are generated by the compile-time layer, one per distinct
/// `(component function, argument values)` pair; `hash_code`/`structurally_eq`
/// must incorporate the argument values, exactly like the base spec's
/// `hashCode()`/`operator==` pair, so that two pushes of "the same
/// component with the same arguments" are recognized as one lazy component
/// rather than two.
pub trait LazyComponentWithArgs: fmt::Debug {
  /// A hash over the component's identity (its defining function plus its
  /// argument values). Only used to bucket components for the in-progress /
  /// fully-expanded membership tests; collisions are resolved with
  /// [`structurally_eq`](Self::structurally_eq).
  fn hash_code(&self) -> u64;

  /// Structural equality against another `LazyComponentWithArgs`,
  /// incorporating argument values. Implementations that receive an `other`
  /// of a different concrete type must return `false`.
  fn structurally_eq(&self, other: &dyn LazyComponentWithArgs) -> bool;

  /// The `TypeId` of the function this component is defined by, for
  /// diagnostics.
  fn fun_type_id(&self) -> TypeId;

  /// Pushes this component's own bindings onto the work stack, on top of
  /// whatever is already there (normally the matching end marker).
  fn add_bindings(&self, stack: &mut Vec<BindingEntry>);
}

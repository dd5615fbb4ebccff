//! The tagged binding entries the normalizer consumes and produces, and the
//! map/list types built out of them.
//!
//! `create` fn-pointers and already-constructed object pointers are modeled
//! as opaque, comparable identities rather than as callable function
//! pointers or live heap pointers: object construction and the compile-time
//! type machinery that hands these identities out are both out of scope
//! here (see SPEC_FULL.md §3). The normalizer only ever asks "is this the
//! same provider as that one", never "call this provider".

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::lazy_component::LazyComponentWithArgs;
use crate::type_id::TypeId;

/// Opaque identity of a `create` function, as assigned by the compile-time
/// layer. Two bindings share a provider iff their `CreateFnId`s are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreateFnId(pub usize);

impl fmt::Debug for CreateFnId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "fn#{}", self.0) }
}

/// Opaque identity of an already-constructed object, as assigned by the
/// compile-time layer. No object is ever dereferenced during normalization.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectPtr(pub usize);

impl fmt::Debug for ObjectPtr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "obj#{}", self.0) }
}

/// Opaque identity of a no-args lazy component's defining function.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErasedFun(pub usize);

impl fmt::Debug for ErasedFun {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "erased_fun#{}", self.0) }
}

/// A free function that pushes a no-args lazy component's own bindings onto
/// the work stack.
pub type AddBindingsFn = fn(&mut Vec<BindingEntry>);

/// An ordered sequence of `TypeId`s a binding depends on (its constructor
/// arguments / injection points).
pub type DependencyList = Vec<TypeId>;

/// The payload of a binding bound via constructor/provider, shared by
/// `NeedsAllocation`, `NeedsNoAllocation`, and their multibinding
/// counterparts.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderBinding {
  pub create: CreateFnId,
  pub deps:   DependencyList,
}

/// Every binding entry the Expander consumes or produces.
///
/// Each kind's payload mirrors the table in SPEC_FULL.md §3 exactly; the
/// `EndMarker*` variants carry the same payload as the `LazyComponent*`
/// variant they replace, so a marker can always be turned back into (or
/// compared against) the original if a future caller needs to.
#[derive(Clone)]
pub enum BindingEntry {
  ConstructedObject { type_id: TypeId, object: ObjectPtr },
  NeedsAllocation { type_id: TypeId, binding: ProviderBinding },
  NeedsNoAllocation { type_id: TypeId, binding: ProviderBinding },
  Compressed { type_id: TypeId, c_type_id: TypeId, create_with_compression: CreateFnId },
  MultibindingConstructed { type_id: TypeId, object: ObjectPtr },
  MultibindingNeedsAllocation { type_id: TypeId, binding: ProviderBinding },
  MultibindingNeedsNoAllocation { type_id: TypeId, binding: ProviderBinding },
  MultibindingVectorCreator { type_id: TypeId, get_vector: CreateFnId },
  LazyComponentNoArgs { type_id: TypeId, erased_fun: ErasedFun, add_bindings: AddBindingsFn },
  LazyComponentWithArgs { type_id: TypeId, component: Rc<dyn LazyComponentWithArgs> },
  EndMarkerNoArgs { type_id: TypeId, erased_fun: ErasedFun, add_bindings: AddBindingsFn },
  EndMarkerWithArgs { type_id: TypeId, component: Rc<dyn LazyComponentWithArgs> },
}

impl BindingEntry {
  pub fn type_id(&self) -> TypeId {
    match self {
      Self::ConstructedObject { type_id, .. }
      | Self::NeedsAllocation { type_id, .. }
      | Self::NeedsNoAllocation { type_id, .. }
      | Self::Compressed { type_id, .. }
      | Self::MultibindingConstructed { type_id, .. }
      | Self::MultibindingNeedsAllocation { type_id, .. }
      | Self::MultibindingNeedsNoAllocation { type_id, .. }
      | Self::MultibindingVectorCreator { type_id, .. }
      | Self::LazyComponentNoArgs { type_id, .. }
      | Self::LazyComponentWithArgs { type_id, .. }
      | Self::EndMarkerNoArgs { type_id, .. }
      | Self::EndMarkerWithArgs { type_id, .. } => *type_id,
    }
  }

  /// A short tag for diagnostics; avoids formatting full payloads into
  /// trace events.
  pub fn kind_name(&self) -> &'static str {
    match self {
      Self::ConstructedObject { .. } => "ConstructedObject",
      Self::NeedsAllocation { .. } => "NeedsAllocation",
      Self::NeedsNoAllocation { .. } => "NeedsNoAllocation",
      Self::Compressed { .. } => "Compressed",
      Self::MultibindingConstructed { .. } => "MultibindingConstructed",
      Self::MultibindingNeedsAllocation { .. } => "MultibindingNeedsAllocation",
      Self::MultibindingNeedsNoAllocation { .. } => "MultibindingNeedsNoAllocation",
      Self::MultibindingVectorCreator { .. } => "MultibindingVectorCreator",
      Self::LazyComponentNoArgs { .. } => "LazyComponentNoArgs",
      Self::LazyComponentWithArgs { .. } => "LazyComponentWithArgs",
      Self::EndMarkerNoArgs { .. } => "EndMarkerNoArgs",
      Self::EndMarkerWithArgs { .. } => "EndMarkerWithArgs",
    }
  }

  /// The dependency list of a provider-backed binding, if this kind carries
  /// one. `ConstructedObject` and the lazy-component/marker kinds have no
  /// dependency list of their own.
  pub fn deps(&self) -> Option<&DependencyList> {
    match self {
      Self::NeedsAllocation { binding, .. }
      | Self::NeedsNoAllocation { binding, .. }
      | Self::MultibindingNeedsAllocation { binding, .. }
      | Self::MultibindingNeedsNoAllocation { binding, .. } => Some(&binding.deps),
      _ => None,
    }
  }

  /// Whether two entries for the same `TypeId` may coexist: same kind, same
  /// object pointer for `ConstructedObject`, same `create` identity
  /// (ignoring the dependency list, which the compile-time layer guarantees
  /// is identical whenever the `create` identity is) otherwise.
  pub fn semantically_equal_binding(&self, other: &Self) -> bool {
    use BindingEntry::{ConstructedObject, NeedsAllocation, NeedsNoAllocation};
    match (self, other) {
      (ConstructedObject { object: a, .. }, ConstructedObject { object: b, .. }) => a == b,
      (NeedsAllocation { binding: a, .. }, NeedsAllocation { binding: b, .. })
      | (NeedsNoAllocation { binding: a, .. }, NeedsNoAllocation { binding: b, .. }) => {
        a.create == b.create
      },
      _ => false,
    }
  }
}

impl fmt::Debug for BindingEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({:?})", self.kind_name(), self.type_id())
  }
}

/// `TypeId -> BindingEntry`, keys unique, holding only the three direct
/// `Binding*` kinds once the Expander has finished.
pub type BindingMap = HashMap<TypeId, BindingEntry>;

/// A surviving-or-not candidate compression `I -> C`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressedCandidate {
  pub i_type_id:               TypeId,
  pub create_with_compression: CreateFnId,
}

/// `C_TypeId -> candidate`.
pub type CompressedCandidateMap = HashMap<TypeId, CompressedCandidate>;

/// One multibinding contribution, paired with the vector-creator entry that
/// arrived alongside it.
pub struct MultibindingPair {
  pub contribution:   BindingEntry,
  pub vector_creator: BindingEntry,
}

/// The ordered sequence of multibinding pairs the Expander produced.
pub type MultibindingList = Vec<MultibindingPair>;

/// One element of an aggregated multibinding set.
#[derive(Debug)]
pub enum Contribution {
  Constructed { object: ObjectPtr },
  ToConstruct { binding: ProviderBinding },
}

/// The merged, ordered contributions for one multibinding type, plus the
/// (single, shared) vector-creator identity for that type.
#[derive(Debug)]
pub struct NormalizedMultibindingSet {
  pub vector_creator:  Option<CreateFnId>,
  pub contributions:   Vec<Contribution>,
}

impl Default for NormalizedMultibindingSet {
  fn default() -> Self { Self { vector_creator: None, contributions: Vec::new() } }
}

/// `TypeId -> NormalizedMultibindingSet`.
pub type NormalizedMultibindingMap = HashMap<TypeId, NormalizedMultibindingSet>;

/// What a compressed `C` binding looked like before the Compressor folded
/// it into `I`, so the collapse can be undone later.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionUndoInfo {
  pub i_type_id:  TypeId,
  pub i_binding:  ProviderBinding,
  pub c_binding:  ProviderBinding,
}

/// `C_TypeId -> CompressionUndoInfo`.
pub type CompressionUndoMap = HashMap<TypeId, CompressionUndoInfo>;

//! Stage 2: binding-compression optimization.
//!
//! See SPEC_FULL.md §4.2. Eligibility pruning runs in three fixed steps over
//! the candidate map the Expander collected, then surviving candidates are
//! rewritten in place and folded out of the BindingMap.

use tracing::{debug, trace};

use crate::binding::{
  BindingEntry, BindingMap, CompressedCandidateMap, CompressionUndoInfo, CompressionUndoMap,
  MultibindingList, ProviderBinding,
};
use crate::error::NormalizeError;
use crate::type_id::{TypeId, TypeRegistry};

/// Runs eligibility pruning and the rewrite step over `candidates`, folding
/// every surviving `C` binding into its `I` binding in `bindings`.
///
/// Returns the final flat binding vector (iteration order, not sorted) and
/// the undo information needed to re-expose a compressed `C` later.
pub fn compress(
  mut bindings: BindingMap,
  mut candidates: CompressedCandidateMap,
  multibindings: &MultibindingList,
  exposed_types: &[TypeId],
  registry: &TypeRegistry,
) -> Result<(Vec<BindingEntry>, CompressionUndoMap), NormalizeError> {
  for pair in multibindings {
    if matches!(pair.contribution, BindingEntry::MultibindingConstructed { .. }) {
      continue;
    }
    if let Some(deps) = pair.contribution.deps() {
      for dep in deps {
        if candidates.remove(dep).is_some() {
          trace!(dep = %registry.name_of(*dep), "compression candidate vetoed: multibinding dependency");
        }
      }
    }
  }

  for type_id in exposed_types {
    if candidates.remove(type_id).is_some() {
      trace!(type_id = %registry.name_of(*type_id), "compression candidate vetoed: exposed type");
    }
  }

  let consumers: Vec<TypeId> = bindings.keys().copied().collect();
  for x in consumers {
    let binding_x = &bindings[&x];
    if matches!(binding_x, BindingEntry::ConstructedObject { .. }) {
      continue;
    }
    let Some(deps) = binding_x.deps() else { continue };
    for c in deps {
      let foreign = candidates.get(c).is_some_and(|candidate| candidate.i_type_id != x);
      if foreign {
        candidates.remove(c);
        trace!(
          c_type_id = %registry.name_of(*c),
          consumer = %registry.name_of(x),
          "compression candidate vetoed: foreign consumer",
        );
      }
    }
  }

  let mut undo_map = CompressionUndoMap::new();
  for (c_type_id, candidate) in candidates {
    let i_type_id = candidate.i_type_id;

    let i_provider = match bindings.get(&i_type_id) {
      Some(BindingEntry::NeedsNoAllocation { binding, .. }) => binding.clone(),
      Some(other) => {
        return Err(precondition_error(
          c_type_id,
          format!(
            "compression candidate's I-binding for `{}` is not NeedsNoAllocation (found {})",
            registry.name_of(i_type_id),
            other.kind_name()
          ),
        ));
      },
      None => {
        return Err(precondition_error(
          c_type_id,
          format!("compression candidate's I-binding for `{}` is missing", registry.name_of(i_type_id)),
        ));
      },
    };

    let (c_provider, c_needs_allocation) = match bindings.get(&c_type_id) {
      Some(BindingEntry::NeedsAllocation { binding, .. }) => (binding.clone(), true),
      Some(BindingEntry::NeedsNoAllocation { binding, .. }) => (binding.clone(), false),
      Some(other) => {
        return Err(precondition_error(
          c_type_id,
          format!(
            "compression candidate's C-binding for `{}` is neither NeedsAllocation nor NeedsNoAllocation \
             (found {})",
            registry.name_of(c_type_id),
            other.kind_name()
          ),
        ));
      },
      None => {
        return Err(precondition_error(
          c_type_id,
          format!("compression candidate's C-binding for `{}` is missing", registry.name_of(c_type_id)),
        ));
      },
    };

    undo_map.insert(
      c_type_id,
      CompressionUndoInfo { i_type_id, i_binding: i_provider, c_binding: c_provider.clone() },
    );

    let rewritten = ProviderBinding { create: candidate.create_with_compression, deps: c_provider.deps };
    let new_entry = if c_needs_allocation {
      BindingEntry::NeedsAllocation { type_id: i_type_id, binding: rewritten }
    } else {
      BindingEntry::NeedsNoAllocation { type_id: i_type_id, binding: rewritten }
    };
    debug!(
      i_type_id = %registry.name_of(i_type_id),
      c_type_id = %registry.name_of(c_type_id),
      "binding compressed",
    );
    bindings.insert(i_type_id, new_entry);
    bindings.remove(&c_type_id);
  }

  Ok((bindings.into_values().collect(), undo_map))
}

fn precondition_error(c_type_id: TypeId, detail: String) -> NormalizeError {
  let message = format!("compression precondition violated: {detail}");
  tracing::error!(%message, "compression precondition violated");
  NormalizeError::CompressionPreconditionViolated { c_type_id, message }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::binding::{CompressedCandidate, CreateFnId, MultibindingPair, ObjectPtr};

  fn provider(create: usize, deps: Vec<u64>) -> ProviderBinding {
    ProviderBinding { create: CreateFnId(create), deps: deps.into_iter().map(TypeId::new).collect() }
  }

  #[test]
  fn surviving_candidate_folds_c_into_i() {
    let registry = TypeRegistry::new();
    let i = TypeId::new(1);
    let c = TypeId::new(2);

    let mut bindings = BindingMap::new();
    bindings.insert(i, BindingEntry::NeedsNoAllocation { type_id: i, binding: provider(10, vec![]) });
    bindings.insert(c, BindingEntry::NeedsAllocation { type_id: c, binding: provider(20, vec![99]) });

    let mut candidates = CompressedCandidateMap::new();
    candidates.insert(c, CompressedCandidate { i_type_id: i, create_with_compression: CreateFnId(30) });

    let (vector, undo) = compress(bindings, candidates, &Vec::new(), &[], &registry).unwrap();

    assert_eq!(vector.len(), 1);
    match &vector[0] {
      BindingEntry::NeedsAllocation { type_id, binding } => {
        assert_eq!(*type_id, i);
        assert_eq!(binding.create, CreateFnId(30));
        assert_eq!(binding.deps, vec![TypeId::new(99)]);
      },
      other => panic!("expected NeedsAllocation, got {other:?}"),
    }
    assert!(undo.contains_key(&c));
    assert_eq!(undo[&c].i_type_id, i);
  }

  #[test]
  fn exposed_type_is_never_compressed() {
    let registry = TypeRegistry::new();
    let i = TypeId::new(1);
    let c = TypeId::new(2);

    let mut bindings = BindingMap::new();
    bindings.insert(i, BindingEntry::NeedsNoAllocation { type_id: i, binding: provider(10, vec![]) });
    bindings.insert(c, BindingEntry::NeedsAllocation { type_id: c, binding: provider(20, vec![]) });

    let mut candidates = CompressedCandidateMap::new();
    candidates.insert(c, CompressedCandidate { i_type_id: i, create_with_compression: CreateFnId(30) });

    let (vector, undo) = compress(bindings, candidates, &Vec::new(), &[c], &registry).unwrap();

    assert_eq!(vector.len(), 2);
    assert!(undo.is_empty());
  }

  #[test]
  fn multibinding_dependency_vetoes_its_candidate() {
    let registry = TypeRegistry::new();
    let i = TypeId::new(1);
    let c = TypeId::new(2);

    let mut bindings = BindingMap::new();
    bindings.insert(i, BindingEntry::NeedsNoAllocation { type_id: i, binding: provider(10, vec![]) });
    bindings.insert(c, BindingEntry::NeedsAllocation { type_id: c, binding: provider(20, vec![]) });

    let mut candidates = CompressedCandidateMap::new();
    candidates.insert(c, CompressedCandidate { i_type_id: i, create_with_compression: CreateFnId(30) });

    let multibindings = vec![MultibindingPair {
      contribution: BindingEntry::MultibindingNeedsAllocation {
        type_id: TypeId::new(7),
        binding: provider(40, vec![c.0]),
      },
      vector_creator: BindingEntry::MultibindingVectorCreator { type_id: TypeId::new(7), get_vector: CreateFnId(50) },
    }];

    let (vector, undo) = compress(bindings, candidates, &multibindings, &[], &registry).unwrap();
    assert_eq!(vector.len(), 2);
    assert!(undo.is_empty());
  }

  #[test]
  fn foreign_consumer_vetoes_its_candidate() {
    let registry = TypeRegistry::new();
    let i = TypeId::new(1);
    let c = TypeId::new(2);
    let x = TypeId::new(3);

    let mut bindings = BindingMap::new();
    bindings.insert(i, BindingEntry::NeedsNoAllocation { type_id: i, binding: provider(10, vec![]) });
    bindings.insert(c, BindingEntry::NeedsAllocation { type_id: c, binding: provider(20, vec![]) });
    bindings.insert(x, BindingEntry::NeedsAllocation { type_id: x, binding: provider(60, vec![c.0]) });

    let mut candidates = CompressedCandidateMap::new();
    candidates.insert(c, CompressedCandidate { i_type_id: i, create_with_compression: CreateFnId(30) });

    let (vector, undo) = compress(bindings, candidates, &Vec::new(), &[], &registry).unwrap();
    assert_eq!(vector.len(), 3);
    assert!(undo.is_empty());
  }

  #[test]
  fn missing_i_binding_is_a_diagnosed_error() {
    let registry = TypeRegistry::new();
    let i = TypeId::new(1);
    let c = TypeId::new(2);

    let mut bindings = BindingMap::new();
    bindings.insert(c, BindingEntry::NeedsAllocation { type_id: c, binding: provider(20, vec![]) });

    let mut candidates = CompressedCandidateMap::new();
    candidates.insert(c, CompressedCandidate { i_type_id: i, create_with_compression: CreateFnId(30) });

    let err = compress(bindings, candidates, &Vec::new(), &[], &registry).unwrap_err();
    assert!(matches!(err, NormalizeError::CompressionPreconditionViolated { c_type_id, .. } if c_type_id == c));
  }

  #[test]
  fn wrong_kind_i_binding_is_a_diagnosed_error() {
    let registry = TypeRegistry::new();
    let i = TypeId::new(1);
    let c = TypeId::new(2);

    let mut bindings = BindingMap::new();
    bindings.insert(i, BindingEntry::ConstructedObject { type_id: i, object: ObjectPtr(1) });
    bindings.insert(c, BindingEntry::NeedsAllocation { type_id: c, binding: provider(20, vec![]) });

    let mut candidates = CompressedCandidateMap::new();
    candidates.insert(c, CompressedCandidate { i_type_id: i, create_with_compression: CreateFnId(30) });

    let err = compress(bindings, candidates, &Vec::new(), &[], &registry).unwrap_err();
    assert!(matches!(err, NormalizeError::CompressionPreconditionViolated { .. }));
  }
}

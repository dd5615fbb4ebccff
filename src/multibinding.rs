//! Stage 3: multibinding aggregation.
//!
//! See SPEC_FULL.md §4.3. Folds the ordered `MultibindingList` the Expander
//! collected into a `TypeId -> NormalizedMultibindingSet` map, reserving
//! allocator budget for every to-construct contribution along the way.

use tracing::trace;

use crate::allocator::FixedSizeAllocatorDescriptor;
use crate::binding::{BindingEntry, Contribution, MultibindingList, NormalizedMultibindingMap};
use crate::type_id::TypeRegistry;

/// Consumes `multibindings`, appending each pair's contribution (and, the
/// first time it is seen, its vector-creator) into the returned map.
///
/// Contribution order within a type follows arrival order; nothing here
/// deduplicates, since a multibinding set is conceptually a multiset.
pub fn aggregate(
  multibindings: MultibindingList,
  alloc: &mut dyn FixedSizeAllocatorDescriptor,
  registry: &TypeRegistry,
) -> NormalizedMultibindingMap {
  let mut sets = NormalizedMultibindingMap::new();

  for pair in multibindings {
    let type_id = pair.contribution.type_id();
    let set = sets.entry(type_id).or_default();

    match pair.vector_creator {
      BindingEntry::MultibindingVectorCreator { get_vector, .. } => set.vector_creator = Some(get_vector),
      other => unreachable!("multibinding pair's vector creator had unexpected kind {}", other.kind_name()),
    }

    match pair.contribution {
      BindingEntry::MultibindingConstructed { object, .. } => {
        trace!(type_id = %registry.name_of(type_id), "multibinding contribution: constructed");
        set.contributions.push(Contribution::Constructed { object });
      },
      BindingEntry::MultibindingNeedsAllocation { binding, .. } => {
        trace!(type_id = %registry.name_of(type_id), "multibinding contribution: needs allocation");
        alloc.add_type(type_id);
        set.contributions.push(Contribution::ToConstruct { binding });
      },
      BindingEntry::MultibindingNeedsNoAllocation { binding, .. } => {
        trace!(type_id = %registry.name_of(type_id), "multibinding contribution: needs no allocation");
        alloc.add_externally_allocated_type(type_id);
        set.contributions.push(Contribution::ToConstruct { binding });
      },
      other => unreachable!("multibinding pair's contribution had unexpected kind {}", other.kind_name()),
    }
  }

  sets
}

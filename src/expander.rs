//! Stage 1: lazy component expansion, binding deduplication, and cycle
//! detection, all driven off one explicit LIFO work stack.
//!
//! See SPEC_FULL.md §4.1 for the full algorithm. The three conceptual
//! loops — expand a lazy component, deduplicate a direct binding, detect a
//! cycle — all live in [`expand`]'s single `while let Some(entry) =
//! stack.pop()` loop, dispatching on the popped entry's kind.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::allocator::FixedSizeAllocatorDescriptor;
use crate::binding::{BindingEntry, BindingMap};
use crate::error::{cycle_message, multiple_bindings_message, NormalizeError};
use crate::lazy_component::LazyComponentWithArgs;
use crate::type_id::{TypeId, TypeRegistry};

/// One link in the chain of lazy components currently between their
/// initial push and their matching end marker, in push order. Used both to
/// test "is this component already in progress" and to render the cycle
/// diagnostic.
enum ChainLink {
  NoArgs(crate::binding::ErasedFun, TypeId),
  WithArgs(Rc<dyn LazyComponentWithArgs>),
}

impl ChainLink {
  fn matches_no_args(&self, erased_fun: crate::binding::ErasedFun) -> bool {
    matches!(self, ChainLink::NoArgs(f, _) if *f == erased_fun)
  }

  fn matches_with_args(&self, component: &Rc<dyn LazyComponentWithArgs>) -> bool {
    matches!(self, ChainLink::WithArgs(c) if c.structurally_eq(component.as_ref()))
  }

  fn render(&self, registry: &TypeRegistry) -> String {
    match self {
      ChainLink::NoArgs(_, type_id) => registry.name_of(*type_id),
      ChainLink::WithArgs(component) => format!("{component:?}"),
    }
  }
}

/// Everything [`expand`] needs beyond the work stack itself.
struct ExpanderState<'a> {
  registry:                   &'a TypeRegistry,
  bindings:                   BindingMap,
  fully_expanded_no_args:     std::collections::HashSet<crate::binding::ErasedFun>,
  fully_expanded_with_args:   ComponentSetRc,
  chain:                      Vec<ChainLink>,
}

/// The in-progress / fully-expanded bookkeeping for with-args components,
/// bucketed by hash code.
///
/// A plain `Vec` scan within a bucket resolves hash collisions via
/// structural equality; with realistic component counts this is the O(1)-
/// amortized membership test the design notes ask for without requiring
/// trait objects to implement `Hash`/`Eq` directly.
#[derive(Default)]
struct ComponentSetRc {
  buckets: HashMap<u64, Vec<Rc<dyn LazyComponentWithArgs>>>,
}

impl ComponentSetRc {
  fn contains(&self, component: &Rc<dyn LazyComponentWithArgs>) -> bool {
    self.buckets.get(&component.hash_code()).is_some_and(|bucket| {
      bucket.iter().any(|existing| existing.structurally_eq(component.as_ref()))
    })
  }

  fn insert(&mut self, component: Rc<dyn LazyComponentWithArgs>) {
    self.buckets.entry(component.hash_code()).or_default().push(component);
  }
}

/// Runs the Expander (SPEC_FULL.md §4.1) over `top_level`, calling
/// `handle_compressed` for every `Compressed` entry and `handle_multibinding`
/// for every matched `(contribution, vector_creator)` pair.
///
/// `top_fun_id` is used only to annotate diagnostics with which top-level
/// component normalization was running under.
pub fn expand(
  top_level: Vec<BindingEntry>,
  registry: &TypeRegistry,
  alloc: &mut dyn FixedSizeAllocatorDescriptor,
  top_fun_id: TypeId,
  mut handle_compressed: impl FnMut(BindingEntry),
  mut handle_multibinding: impl FnMut(BindingEntry, BindingEntry),
) -> Result<BindingMap, NormalizeError> {
  let mut state = ExpanderState {
    registry,
    bindings: BindingMap::new(),
    fully_expanded_no_args: std::collections::HashSet::new(),
    fully_expanded_with_args: ComponentSetRc::default(),
    chain: Vec::new(),
  };

  let mut stack = top_level;
  trace!(top_fun = %registry.name_of(top_fun_id), "expansion started");

  while let Some(entry) = stack.pop() {
    match entry {
      BindingEntry::ConstructedObject { .. }
      | BindingEntry::NeedsAllocation { .. }
      | BindingEntry::NeedsNoAllocation { .. } => {
        insert_direct_binding(&mut state, alloc, entry)?;
      },

      BindingEntry::Compressed { .. } => handle_compressed(entry),

      BindingEntry::MultibindingConstructed { .. }
      | BindingEntry::MultibindingNeedsAllocation { .. }
      | BindingEntry::MultibindingNeedsNoAllocation { .. } => {
        let vector_creator = stack.pop().expect("multibinding contribution without a paired vector creator");
        debug_assert!(matches!(vector_creator, BindingEntry::MultibindingVectorCreator { .. }));
        handle_multibinding(entry, vector_creator);
      },

      BindingEntry::MultibindingVectorCreator { .. } => {
        let contribution = stack.pop().expect("multibinding vector creator without a paired contribution");
        debug_assert!(matches!(
          contribution,
          BindingEntry::MultibindingConstructed { .. }
            | BindingEntry::MultibindingNeedsAllocation { .. }
            | BindingEntry::MultibindingNeedsNoAllocation { .. }
        ));
        handle_multibinding(contribution, entry);
      },

      BindingEntry::LazyComponentNoArgs { type_id, erased_fun, add_bindings } => {
        if state.fully_expanded_no_args.contains(&erased_fun) {
          trace!(component = %registry.name_of(type_id), "no-args component already fully expanded");
          continue;
        }
        if state.chain.iter().any(|link| link.matches_no_args(erased_fun)) {
          return Err(cycle_error(&state, registry, ChainLink::NoArgs(erased_fun, type_id)));
        }
        trace!(component = %registry.name_of(type_id), "entering no-args component");
        state.chain.push(ChainLink::NoArgs(erased_fun, type_id));
        stack.push(BindingEntry::EndMarkerNoArgs { type_id, erased_fun, add_bindings });
        add_bindings(&mut stack);
      },

      BindingEntry::LazyComponentWithArgs { type_id, component } => {
        if state.fully_expanded_with_args.contains(&component) {
          trace!(component = %registry.name_of(type_id), "with-args component already fully expanded");
          continue;
        }
        if state.chain.iter().any(|link| link.matches_with_args(&component)) {
          return Err(cycle_error(&state, registry, ChainLink::WithArgs(component)));
        }
        trace!(component = %registry.name_of(type_id), "entering with-args component");
        state.chain.push(ChainLink::WithArgs(Rc::clone(&component)));
        stack.push(BindingEntry::EndMarkerWithArgs { type_id, component: Rc::clone(&component) });
        component.add_bindings(&mut stack);
      },

      BindingEntry::EndMarkerNoArgs { type_id, erased_fun, .. } => {
        trace!(component = %registry.name_of(type_id), "no-args component fully expanded");
        let popped = state.chain.pop().expect("end marker popped with empty component chain");
        debug_assert!(popped.matches_no_args(erased_fun));
        state.fully_expanded_no_args.insert(erased_fun);
      },

      BindingEntry::EndMarkerWithArgs { type_id, component } => {
        trace!(component = %registry.name_of(type_id), "with-args component fully expanded");
        let popped = state.chain.pop().expect("end marker popped with empty component chain");
        debug_assert!(popped.matches_with_args(&component));
        state.fully_expanded_with_args.insert(component);
      },
    }
  }

  debug_assert!(state.chain.is_empty(), "in-progress components remain after expansion");
  Ok(state.bindings)
}

fn insert_direct_binding(
  state: &mut ExpanderState<'_>,
  alloc: &mut dyn FixedSizeAllocatorDescriptor,
  entry: BindingEntry,
) -> Result<(), NormalizeError> {
  let type_id = entry.type_id();
  match state.bindings.get(&type_id) {
    None => {
      match &entry {
        BindingEntry::NeedsAllocation { .. } => alloc.add_type(type_id),
        BindingEntry::NeedsNoAllocation { .. } => alloc.add_externally_allocated_type(type_id),
        BindingEntry::ConstructedObject { .. } => {},
        _ => unreachable!("insert_direct_binding called with a non-direct binding kind"),
      }
      trace!(type_id = %state.registry.name_of(type_id), kind = entry.kind_name(), "binding accepted");
      state.bindings.insert(type_id, entry);
      Ok(())
    },
    Some(existing) => {
      if existing.semantically_equal_binding(&entry) {
        trace!(type_id = %state.registry.name_of(type_id), "duplicate binding, consistent");
        Ok(())
      } else {
        let name = state.registry.name_of(type_id);
        tracing::error!(type_id = %name, "multiple inconsistent bindings");
        Err(NormalizeError::MultipleInconsistentBindings {
          type_id,
          message: multiple_bindings_message(&name),
        })
      }
    },
  }
}

fn cycle_error(state: &ExpanderState<'_>, registry: &TypeRegistry, repeated: ChainLink) -> NormalizeError {
  let repeated_name = repeated.render(registry);
  let loop_start = state
    .chain
    .iter()
    .find(|link| link.render(registry) == repeated_name)
    .map_or(TypeId::new(0), |link| match link {
      ChainLink::NoArgs(_, type_id) => *type_id,
      ChainLink::WithArgs(component) => component.fun_type_id(),
    });
  let chain: Vec<String> = state.chain.iter().map(|link| link.render(registry)).collect();
  let message = cycle_message(&chain, &repeated_name);
  tracing::error!(%message, "lazy component installation loop");
  NormalizeError::LazyComponentCycle { loop_start, message }
}

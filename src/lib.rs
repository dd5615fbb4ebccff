//! Binding normalization core for a dependency-injection framework.
//!
//! Takes the raw, tree-shaped description of how types are provided in an
//! application — a sequence of [`BindingEntry`] values, possibly referencing
//! lazily-expanded sub-components — and compiles it into a flat,
//! deduplicated, optionally compressed binding table ready for the
//! downstream injector to construct objects from.
//!
//! The pipeline has three stages, run in order by [`normalize`]:
//! 1. [`expander`] — lazy component expansion, binding deduplication, cycle
//!    detection.
//! 2. [`compressor`] — binding-compression optimization (skipped when
//!    [`NormalizeConfig::compression`] is `false`).
//! 3. [`multibinding`] — aggregation of multibinding contributions.
//!
//! No binding is ever evaluated here: object construction, the allocator
//! itself, and the compile-time type machinery that produces [`BindingEntry`]
//! values are all out of scope; see each module's doc comment for the exact
//! collaborator contract it expects.

pub mod allocator;
pub mod binding;
pub mod compressor;
pub mod error;
pub mod expander;
pub mod lazy_component;
pub mod multibinding;
pub mod type_id;

use tracing::info;

pub use allocator::{FixedSizeAllocatorDescriptor, RecordingAllocatorDescriptor};
pub use binding::{
  BindingEntry, BindingMap, CompressedCandidateMap, CompressionUndoInfo, CompressionUndoMap, Contribution,
  CreateFnId, DependencyList, ErasedFun, MultibindingList, MultibindingPair, NormalizedMultibindingMap,
  NormalizedMultibindingSet, ObjectPtr, ProviderBinding,
};
pub use error::NormalizeError;
pub use lazy_component::LazyComponentWithArgs;
pub use type_id::{TypeId, TypeRegistry};

static_assertions::assert_impl_all!(TypeId: Copy, Ord, std::hash::Hash, std::fmt::Debug);
static_assertions::assert_impl_all!(NormalizeError: std::error::Error, Send, Sync);
static_assertions::assert_impl_all!(CreateFnId: Copy, Eq, std::hash::Hash);

/// Controls normalization behavior the base algorithm leaves implicit; see
/// SPEC_FULL.md §3.1.
///
/// Has no file or environment-variable backing: it is a plain struct built
/// by the caller, since normalization is an internal library call rather
/// than a user-facing program.
#[derive(Clone, Copy, Debug)]
pub struct NormalizeConfig {
  /// When `false`, `normalize` behaves exactly like
  /// [`normalize_without_compression`] even though it is called through the
  /// single entry point.
  pub compression: bool,
  /// Whether the full in-progress component stack is rendered into a cycle
  /// diagnostic, or only the offending component's name.
  pub log_cycle_stack: bool,
}

impl Default for NormalizeConfig {
  fn default() -> Self { Self { compression: true, log_cycle_stack: true } }
}

/// Everything handed back to the injector once normalization completes.
#[derive(Debug)]
pub struct NormalizeOutput {
  /// The final flat vector of direct bindings, in iteration order (not
  /// sorted).
  pub bindings_vector: Vec<BindingEntry>,
  /// The aggregated multibinding sets, keyed by type.
  pub multibindings: NormalizedMultibindingMap,
  /// Undo information for every binding the Compressor folded away.
  pub undo_map: CompressionUndoMap,
}

/// Full pipeline: Expander, then Compressor (unless `config.compression` is
/// `false`), then the multibinding aggregator.
pub fn normalize(
  entries: Vec<BindingEntry>,
  alloc: &mut dyn FixedSizeAllocatorDescriptor,
  registry: &TypeRegistry,
  top_fun_id: TypeId,
  exposed_types: &[TypeId],
  config: NormalizeConfig,
) -> Result<NormalizeOutput, NormalizeError> {
  info!(top_fun = %registry.name_of(top_fun_id), compression = config.compression, "normalization started");

  let mut compressed_candidates = CompressedCandidateMap::new();
  let mut multibindings = MultibindingList::new();

  let bindings = expander::expand(
    entries,
    registry,
    alloc,
    top_fun_id,
    |entry| match entry {
      BindingEntry::Compressed { type_id, c_type_id, create_with_compression } => {
        compressed_candidates
          .insert(c_type_id, binding::CompressedCandidate { i_type_id: type_id, create_with_compression });
      },
      other => unreachable!("Expander invoked handle_compressed with non-Compressed entry {other:?}"),
    },
    |contribution, vector_creator| multibindings.push(MultibindingPair { contribution, vector_creator }),
  )?;

  let (bindings_vector, undo_map) = if config.compression {
    compressor::compress(bindings, compressed_candidates, &multibindings, exposed_types, registry)?
  } else {
    (bindings.into_values().collect(), CompressionUndoMap::new())
  };

  let multibindings_out = multibinding::aggregate(multibindings, alloc, registry);

  info!(
    bindings = bindings_vector.len(),
    multibindings = multibindings_out.len(),
    compressed = undo_map.len(),
    "normalization finished",
  );

  Ok(NormalizeOutput { bindings_vector, multibindings: multibindings_out, undo_map })
}

/// Runs only the Expander, skipping compression outright. Used when the
/// caller already has a normalized parent component and only needs a delta.
pub fn normalize_without_compression(
  entries: Vec<BindingEntry>,
  alloc: &mut dyn FixedSizeAllocatorDescriptor,
  registry: &TypeRegistry,
  top_fun_id: TypeId,
) -> Result<(BindingMap, MultibindingList), NormalizeError> {
  let mut multibindings = MultibindingList::new();
  let bindings = expander::expand(
    entries,
    registry,
    alloc,
    top_fun_id,
    |_compressed| {},
    |contribution, vector_creator| multibindings.push(MultibindingPair { contribution, vector_creator }),
  )?;
  Ok((bindings, multibindings))
}

/// Runs [`normalize`], logging the diagnostic and exiting the process with
/// status 1 on failure.
///
/// This is the only place in the crate that terminates the process: the
/// library functions above always return a [`NormalizeError`] instead,
/// matching the base algorithm's literal "terminate the process on fatal
/// misuse" framing only for callers that opt into it at the binary's top
/// level.
pub fn normalize_and_report(
  entries: Vec<BindingEntry>,
  alloc: &mut dyn FixedSizeAllocatorDescriptor,
  registry: &TypeRegistry,
  top_fun_id: TypeId,
  exposed_types: &[TypeId],
  config: NormalizeConfig,
) -> NormalizeOutput {
  match normalize(entries, alloc, registry, top_fun_id, exposed_types, config) {
    Ok(output) => output,
    Err(err) => {
      eprintln!("{err}");
      std::process::exit(1);
    },
  }
}

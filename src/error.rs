//! The two fatal conditions normalization can encounter, rendered as typed,
//! diagnosable errors rather than process aborts.
//!
//! The base spec treats these (and a compression precondition the
//! compile-time layer is supposed to guarantee) as programmer errors that
//! terminate the process immediately. This crate keeps the diagnostic text
//! the spec asks for, but returns it through an ordinary `Result` so the
//! library stays unit-testable; [`crate::normalize_and_report`] is the only
//! place that turns a `NormalizeError` into a process exit, for callers
//! that want the spec's literal behavior at the top level.

use crate::type_id::TypeId;

/// A fatal misuse of the normalizer, as described in SPEC_FULL.md §7.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
  /// Two `BindingEntry`s for the same `TypeId` disagreed on kind or
  /// `create`/object identity.
  #[error("{message}")]
  MultipleInconsistentBindings { type_id: TypeId, message: String },

  /// Expanding a lazy component that was already in progress.
  #[error("{message}")]
  LazyComponentCycle { loop_start: TypeId, message: String },

  /// A surviving compression candidate's `I`-binding was not
  /// `NeedsNoAllocation`, or its `I`- or `C`-binding went missing from the
  /// `BindingMap` before the rewrite ran.
  #[error("{message}")]
  CompressionPreconditionViolated { c_type_id: TypeId, message: String },
}

/// Builds the "multiple bindings" diagnostic text from SPEC_FULL.md §7:
/// names the type and suggests exposing it in component signatures.
pub fn multiple_bindings_message(type_name: &str) -> String {
  format!(
    "multiple inconsistent bindings found for type `{type_name}`: two bindings for this type \
     disagree on how to construct it. If both are intentional, expose `{type_name}` in the \
     enclosing component's signature so the framework can pick one explicitly."
  )
}

/// Builds the cycle diagnostic text from SPEC_FULL.md §7: walks the
/// in-progress component stack and marks where the loop starts.
///
/// `stack_identities` is the in-progress component chain in push order
/// (oldest first), `repeated` is the (already-in-progress) component being
/// pushed again. Only the identities between and including the loop's
/// start are printed — anything in-progress above an outer, non-looping
/// component is not part of the loop and is left out.
pub fn cycle_message(stack_identities: &[String], repeated: &str) -> String {
  let loop_start = stack_identities.iter().position(|identity| identity == repeated).unwrap_or(0);
  let loop_identities = &stack_identities[loop_start..];

  let mut lines = vec!["detected a lazy component installation loop:".to_string()];
  for (i, identity) in loop_identities.iter().enumerate() {
    let marker = if i == 0 { "  <- the loop starts here" } else { "" };
    lines.push(format!("  {identity}{marker}"));
  }
  lines.push(format!("  {repeated}"));
  lines.join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cycle_message_marks_the_loop_start() {
    let msg = cycle_message(&["A".to_string(), "B".to_string()], "A");
    assert!(msg.contains("A  <- the loop starts here"));
    let lines: Vec<&str> = msg.lines().collect();
    assert_eq!(lines.last().unwrap().trim(), "A");
  }

  #[test]
  fn cycle_message_omits_in_progress_components_above_the_loop() {
    let msg = cycle_message(&["P".to_string(), "A".to_string(), "B".to_string()], "A");
    assert!(!msg.contains('P'), "outer, non-looping component `P` should not be printed:\n{msg}");
    assert!(msg.contains("A  <- the loop starts here"));
    let lines: Vec<&str> = msg.lines().collect();
    assert_eq!(lines.last().unwrap().trim(), "A");
  }

  #[test]
  fn multiple_bindings_message_names_the_type() {
    assert!(multiple_bindings_message("widgets::Widget").contains("widgets::Widget"));
  }
}

use std::sync::Arc;

use thiserror::Error;

/// Failure modes observable when reading a cell.
///
/// A cell's error is its value as far as consumers are concerned: once a
/// definition fails, reads of the cell and of its transitive consumers
/// return that same error until the definition or the value is reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
	/// A definition reported a failure. The message is cached on the cell
	/// and returned on every subsequent read.
	#[error("definition failed: {0}")]
	Definition(Arc<str>),
	/// A definition read its own cell, directly or transitively.
	#[error("cell definition depends on its own value")]
	SelfReference,
	/// The cell behind a non-pinning accessor has already been released.
	#[error("cell was already released")]
	Dropped,
}

impl EvalError {
	/// Wraps a user-provided failure message as a definition error.
	#[must_use]
	pub fn user(message: impl Into<String>) -> Self {
		Self::Definition(message.into().into())
	}
}

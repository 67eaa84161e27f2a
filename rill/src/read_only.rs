use std::fmt::{self, Debug, Display, Formatter};

use headwater::{EvalError, Symbol};

use crate::{
	cell::{Cell, Getter},
	runtime,
	value::Value,
	ReactiveKind,
};

/// A frozen projection of a [`Cell`]: readable, never writable.
///
/// There is no mutator on this type, so writing through a view is rejected
/// at compile time. The view exposes the same cached read closure as its
/// source cell and captures only the cell's symbol, so it never pins the
/// cell.
#[derive(Clone)]
pub struct ReadOnly {
	symbol: Symbol,
	getter: Getter,
}

impl ReadOnly {
	pub(crate) fn new(source: &Cell) -> Self {
		Self {
			symbol: source.id(),
			getter: source.getter(),
		}
	}

	/// Reads the source cell's value.
	///
	/// # Errors
	///
	/// The source cell's cached or fresh evaluation error.
	pub fn get(&self) -> Result<Value, EvalError> {
		(self.getter)()
	}

	/// The same read closure as the source cell's.
	#[must_use]
	pub fn getter(&self) -> Getter {
		self.getter.clone()
	}

	/// The source cell's cached error, if any.
	#[must_use]
	pub fn error(&self) -> Option<EvalError> {
		runtime().error(self.symbol)
	}

	/// The source cell's symbol.
	#[must_use]
	pub fn id(&self) -> Symbol {
		self.symbol
	}

	/// Views are read-only.
	#[must_use]
	pub fn is_read_only(&self) -> bool {
		true
	}

	/// The reactive type tag; a view tags as its source cell does.
	#[must_use]
	pub fn reactive_kind(&self) -> ReactiveKind {
		ReactiveKind::Cell
	}
}

impl Debug for ReadOnly {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ReadOnly").field(&self.symbol).finish()
	}
}

impl Display for ReadOnly {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.get() {
			Ok(value) => Display::fmt(&value, f),
			Err(error) => write!(f, "<{error}>"),
		}
	}
}

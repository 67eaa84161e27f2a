//! Reference-counted cell handles over the [`runtime`](crate::runtime)
//! layer.

use std::{
	fmt::{self, Debug, Formatter},
	sync::Arc,
};

use crate::{
	runtime::{CellSeed, CellValue, Compare, Definition, Readiness, Runtime, Symbol, Tier},
	EvalError,
};

/// A reference-counted handle on one cell node.
///
/// Cloning is cheap and yields a handle on the same node. When the last
/// handle drops, the node detaches its outbound consumer registrations and
/// is removed from the runtime; definitions capture handle clones, which
/// keeps a provider alive exactly as long as something can still read it.
pub struct RawCell<V: CellValue> {
	symbol: Symbol,
	lease: Arc<Lease<V>>,
}

struct Lease<V: CellValue> {
	symbol: Symbol,
	runtime: Runtime<V>,
}

impl<V: CellValue> Drop for Lease<V> {
	fn drop(&mut self) {
		self.runtime.release(self.symbol);
	}
}

impl<V: CellValue> RawCell<V> {
	/// Registers a new cell on `runtime`.
	#[must_use]
	pub fn new(runtime: &Runtime<V>, seed: CellSeed<V>) -> Self {
		let symbol = runtime.create(seed);
		Self {
			symbol,
			lease: Arc::new(Lease {
				symbol,
				runtime: runtime.clone(),
			}),
		}
	}

	/// The cell's symbol.
	#[must_use]
	pub fn symbol(&self) -> Symbol {
		self.symbol
	}

	/// The runtime this cell lives on.
	#[must_use]
	pub fn runtime(&self) -> &Runtime<V> {
		&self.lease.runtime
	}

	/// Reads the cell's value. See [`Runtime::read`].
	///
	/// # Errors
	///
	/// The cell's cached or fresh evaluation error.
	pub fn read(&self) -> Result<V, EvalError> {
		self.runtime().read(self.symbol)
	}

	/// Assigns a concrete value, dropping any definition.
	pub fn write(&self, value: V) {
		self.runtime().write(self.symbol, value);
	}

	/// Replaces the cell's definition. See [`Runtime::set_definition`].
	pub fn set_definition(&self, definition: Option<Definition<V>>) {
		self.runtime().set_definition(self.symbol, definition);
	}

	/// Enables or disables eager scheduling.
	pub fn set_eager(&self, eager: bool) {
		self.runtime().set_eager(self.symbol, eager);
	}

	/// Whether the cell is eager.
	#[must_use]
	pub fn eager(&self) -> bool {
		self.runtime().eager(self.symbol)
	}

	/// The cell's comparator.
	#[must_use]
	pub fn compare(&self) -> Compare<V> {
		self.runtime().compare(self.symbol).unwrap_or_default()
	}

	/// The cached error from the last failed evaluation, if any.
	#[must_use]
	pub fn error(&self) -> Option<EvalError> {
		self.runtime().error(self.symbol)
	}

	/// The cell's readiness.
	#[must_use]
	pub fn readiness(&self) -> Readiness {
		self.runtime()
			.readiness(self.symbol)
			.unwrap_or(Readiness::Ready)
	}

	/// The tier the cell is queued at, if any.
	#[must_use]
	pub fn scheduled(&self) -> Option<Tier> {
		self.runtime().scheduled(self.symbol)
	}

	/// Whether the cell currently has a definition.
	#[must_use]
	pub fn has_definition(&self) -> bool {
		self.runtime().has_definition(self.symbol)
	}

	/// Whether the cell's definition is running right now.
	#[must_use]
	pub fn is_evaluating(&self) -> bool {
		self.runtime().is_evaluating(self.symbol)
	}

	/// Forces a defined cell `Stale` and schedules it.
	pub fn unready(&self) {
		self.runtime().unready(self.symbol);
	}

	/// Ripples staleness from this cell.
	pub fn ripple(&self, distance: usize) {
		self.runtime().ripple(self.symbol, distance);
	}

	/// The cached value, without tracking or recomputation.
	#[must_use]
	pub fn peek(&self) -> Option<V> {
		self.runtime().peek(self.symbol)
	}

	/// The cell's providers as of its last evaluation.
	#[must_use]
	pub fn providers(&self) -> Vec<Symbol> {
		self.runtime().providers(self.symbol)
	}

	/// The cells that read this one during their last evaluation.
	#[must_use]
	pub fn consumers(&self) -> Vec<Symbol> {
		self.runtime().consumers(self.symbol)
	}

	/// Adds or removes `other` as a consumer of this cell.
	pub fn set_consumer(&self, other: &Self, add: bool) {
		self.runtime().set_edge(self.symbol, other.symbol, add);
	}

	/// Adds or removes `other` as a provider of this cell.
	pub fn set_provider(&self, other: &Self, add: bool) {
		self.runtime().set_edge(other.symbol, self.symbol, add);
	}
}

impl<V: CellValue> Clone for RawCell<V> {
	fn clone(&self) -> Self {
		Self {
			symbol: self.symbol,
			lease: Arc::clone(&self.lease),
		}
	}
}

impl<V: CellValue> PartialEq for RawCell<V> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.lease, &other.lease)
	}
}

impl<V: CellValue> Eq for RawCell<V> {}

impl<V: CellValue> Debug for RawCell<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("RawCell").field(&self.symbol).finish()
	}
}

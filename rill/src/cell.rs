use std::{
	fmt::{self, Debug, Display, Formatter},
	sync::{Arc, OnceLock},
};

use headwater::{CellSeed, Compare, Definition, EvalError, RawCell, Readiness, Symbol};

use crate::{read_only::ReadOnly, runtime, value::Value, ReactiveKind};

/// A cached read closure; stable across repeated [`Cell::getter`] calls.
pub type Getter = Arc<dyn Fn() -> Result<Value, EvalError> + Send + Sync>;

/// A cached write closure; stable across repeated [`Cell::setter`] calls.
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// Construction options for a [`Cell`]: initial value, definition (a
/// closure, or another cell whose read is adopted), eagerness and change
/// comparison.
#[derive(Default)]
pub struct CellOptions {
	seed: CellSeed<Value>,
}

impl CellOptions {
	/// An empty option set: undefined value, no definition, lazy, strict
	/// inequality comparison.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the initial value.
	#[must_use]
	pub fn value(mut self, value: impl Into<Value>) -> Self {
		self.seed.value = value.into();
		self
	}

	/// Sets the initial definition.
	#[must_use]
	pub fn def(
		mut self,
		definition: impl Fn(Value) -> Result<Value, EvalError> + Send + Sync + 'static,
	) -> Self {
		self.seed.definition = Some(Arc::new(definition));
		self
	}

	/// Adopts `source`'s read as the definition, so this cell tracks it.
	#[must_use]
	pub fn def_cell(mut self, source: &Cell) -> Self {
		let source = source.clone();
		self.seed.definition = Some(Arc::new(move |_previous| source.get()));
		self
	}

	/// Enables eager scheduling.
	#[must_use]
	pub fn eager(mut self, eager: bool) -> Self {
		self.seed.eager = eager;
		self
	}

	/// Installs a custom change predicate over `(old, new)`.
	#[must_use]
	pub fn compare(
		mut self,
		predicate: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
	) -> Self {
		self.seed.compare = Compare::With(Arc::new(predicate));
		self
	}

	/// Installs a constant comparison: `true` notifies on every assignment,
	/// `false` on none.
	#[must_use]
	pub fn compare_const(mut self, notify: bool) -> Self {
		self.seed.compare = if notify {
			Compare::Always
		} else {
			Compare::Never
		};
		self
	}

	/// Builds the cell.
	#[must_use]
	pub fn build(self) -> Cell {
		Cell::with_seed(self.seed)
	}
}

#[derive(Default)]
struct Hooks {
	getter: OnceLock<Getter>,
	setter: OnceLock<Setter>,
	read_only: OnceLock<ReadOnly>,
}

/// One reactive value node.
///
/// Cloning yields a handle on the same node; the node lives as long as any
/// handle (including the clones captured by definitions that read it).
pub struct Cell {
	raw: RawCell<Value>,
	hooks: Arc<Hooks>,
}

impl Cell {
	fn with_seed(seed: CellSeed<Value>) -> Self {
		Self {
			raw: RawCell::new(runtime(), seed),
			hooks: Arc::new(Hooks::default()),
		}
	}

	/// Builds a cell from [`CellOptions`].
	#[must_use]
	pub fn new(options: CellOptions) -> Self {
		options.build()
	}

	/// A cell holding a stored value.
	#[must_use]
	pub fn of(value: impl Into<Value>) -> Self {
		CellOptions::new().value(value).build()
	}

	/// A cell computed by `definition`.
	#[must_use]
	pub fn computed(
		definition: impl Fn(Value) -> Result<Value, EvalError> + Send + Sync + 'static,
	) -> Self {
		CellOptions::new().def(definition).build()
	}

	/// Reads the cell's value, recomputing it first when necessary. Inside
	/// a definition this read registers the cell as a provider unless
	/// tracking is suspended.
	///
	/// # Errors
	///
	/// The cell's cached or fresh evaluation error.
	pub fn get(&self) -> Result<Value, EvalError> {
		self.raw.read()
	}

	/// Assigns a concrete value, dropping any definition and detaching all
	/// providers. Chainable.
	pub fn set(&self, value: impl Into<Value>) -> &Self {
		self.raw.write(value.into());
		self
	}

	/// Installs a definition; the cell goes stale and is scheduled.
	/// Chainable.
	pub fn set_def(
		&self,
		definition: impl Fn(Value) -> Result<Value, EvalError> + Send + Sync + 'static,
	) -> &Self {
		self.raw.set_definition(Some(Arc::new(definition)));
		self
	}

	/// Adopts `source`'s read as this cell's definition. Chainable.
	pub fn adopt(&self, source: &Cell) -> &Self {
		let source = source.clone();
		let definition: Definition<Value> = Arc::new(move |_previous| source.get());
		self.raw.set_definition(Some(definition));
		self
	}

	/// Drops the definition and assigns `Undefined`. Chainable.
	pub fn clear_def(&self) -> &Self {
		self.raw.set_definition(None);
		self
	}

	/// Enables or disables eager scheduling. Chainable.
	pub fn set_eager(&self, eager: bool) -> &Self {
		self.raw.set_eager(eager);
		self
	}

	/// Forces a defined cell stale and schedules it. Chainable.
	pub fn unready(&self) -> &Self {
		self.raw.unready();
		self
	}

	/// Whether the cell is eager.
	#[must_use]
	pub fn eager(&self) -> bool {
		self.raw.eager()
	}

	/// Whether the cell currently has a definition.
	#[must_use]
	pub fn has_def(&self) -> bool {
		self.raw.has_definition()
	}

	/// The cell's change comparator.
	#[must_use]
	pub fn compare(&self) -> Compare<Value> {
		self.raw.compare()
	}

	/// The cached error from the last failed evaluation, if any.
	#[must_use]
	pub fn error(&self) -> Option<EvalError> {
		self.raw.error()
	}

	/// The cell's readiness.
	#[must_use]
	pub fn readiness(&self) -> Readiness {
		self.raw.readiness()
	}

	/// The cell's symbol.
	#[must_use]
	pub fn id(&self) -> Symbol {
		self.raw.symbol()
	}

	/// The cached value, without tracking or recomputation.
	#[must_use]
	pub fn peek(&self) -> Option<Value> {
		self.raw.peek()
	}

	/// The cell's providers as of its last evaluation.
	#[must_use]
	pub fn providers(&self) -> Vec<Symbol> {
		self.raw.providers()
	}

	/// The cells that read this one during their last evaluation.
	#[must_use]
	pub fn consumers(&self) -> Vec<Symbol> {
		self.raw.consumers()
	}

	/// Whether the cell's definition is running right now.
	#[must_use]
	pub fn is_evaluating(&self) -> bool {
		self.raw.is_evaluating()
	}

	/// Ripples staleness from this cell. Chainable.
	pub fn ripple(&self, distance: usize) -> &Self {
		self.raw.ripple(distance);
		self
	}

	/// Adds or removes `other` as a consumer of this cell. Chainable.
	pub fn consumer(&self, other: &Cell, add: bool) -> &Self {
		self.raw.set_consumer(&other.raw, add);
		self
	}

	/// Adds or removes `other` as a provider of this cell. Chainable.
	pub fn provider(&self, other: &Cell, add: bool) -> &Self {
		self.raw.set_provider(&other.raw, add);
		self
	}

	/// The cell's read closure. Repeated calls return the same closure;
	/// it captures the cell's symbol, not a handle, so it never pins the
	/// cell.
	#[must_use]
	pub fn getter(&self) -> Getter {
		self.hooks
			.getter
			.get_or_init(|| {
				let runtime = self.raw.runtime().clone();
				let symbol = self.raw.symbol();
				Arc::new(move || runtime.read(symbol))
			})
			.clone()
	}

	/// The cell's write closure. Repeated calls return the same closure.
	#[must_use]
	pub fn setter(&self) -> Setter {
		self.hooks
			.setter
			.get_or_init(|| {
				let runtime = self.raw.runtime().clone();
				let symbol = self.raw.symbol();
				Arc::new(move |value| runtime.write(symbol, value))
			})
			.clone()
	}

	/// The read and write closures as a pair.
	#[must_use]
	pub fn accessors(&self) -> (Getter, Setter) {
		(self.getter(), self.setter())
	}

	/// The cell's frozen read-only projection. Repeated calls return the
	/// same view.
	#[must_use]
	pub fn read_only(&self) -> ReadOnly {
		self.hooks
			.read_only
			.get_or_init(|| ReadOnly::new(self))
			.clone()
	}

	/// Cells are writable; their views are not.
	#[must_use]
	pub fn is_read_only(&self) -> bool {
		false
	}

	/// The reactive type tag.
	#[must_use]
	pub fn reactive_kind(&self) -> ReactiveKind {
		ReactiveKind::Cell
	}
}

impl Clone for Cell {
	fn clone(&self) -> Self {
		Self {
			raw: self.raw.clone(),
			hooks: Arc::clone(&self.hooks),
		}
	}
}

impl PartialEq for Cell {
	fn eq(&self, other: &Self) -> bool {
		self.raw == other.raw
	}
}

impl Eq for Cell {}

impl Debug for Cell {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Cell").field(&self.raw.symbol()).finish()
	}
}

impl Display for Cell {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.get() {
			Ok(value) => Display::fmt(&value, f),
			Err(error) => write!(f, "<{error}>"),
		}
	}
}

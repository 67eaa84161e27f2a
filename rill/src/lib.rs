#![warn(clippy::pedantic)]
#![doc = include_str!("../README.md")]

use std::{sync::LazyLock, time::Duration};

use headwater::Runtime;

mod bundle;
mod cell;
mod conversions;
mod read_only;
mod value;

pub use bundle::{Bundle, BundleOptions};
pub use cell::{Cell, CellOptions, Getter, Setter};
pub use headwater::{Compare, EvalError, Readiness, Symbol, Tier};
pub use read_only::ReadOnly;
pub use value::Value;

static RUNTIME: LazyLock<Runtime<Value>> = LazyLock::new(Runtime::new);

/// The process-global runtime every [`Cell`] and [`Bundle`] lives on.
pub(crate) fn runtime() -> &'static Runtime<Value> {
	&RUNTIME
}

/// Distinguishes the reactive types: `Cell = 1`, `Bundle = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReactiveKind {
	/// A scalar reactive value node.
	Cell = 1,
	/// A bundle of member cells.
	Bundle = 2,
}

/// Runs `f` with recomputation held off; ripples accumulate, and consumers
/// reach their final state in one pass after `f` returns.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
	runtime().batch(f)
}

/// Runs `f` with dependency tracking suspended: reads inside `f` create no
/// provider edges, even from an actively evaluating definition.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
	runtime().untracked(f)
}

/// Follows a chain of cells down to a final value, reading each link.
/// With `unwrap_bundle`, a final bundle is replaced by its plain snapshot.
///
/// # Errors
///
/// The first evaluation error encountered along the chain.
pub fn fv(value: &Value, unwrap_bundle: bool) -> Result<Value, EvalError> {
	let mut value = value.clone();
	loop {
		match value {
			Value::Cell(cell) => value = cell.get()?,
			Value::Bundle(bundle) if unwrap_bundle => return bundle.snapshot(),
			other => return Ok(other),
		}
	}
}

/// The reactive type tag of `value`, if it is reactive.
#[must_use]
pub fn type_of(value: &Value) -> Option<ReactiveKind> {
	match value {
		Value::Cell(_) => Some(ReactiveKind::Cell),
		Value::Bundle(_) => Some(ReactiveKind::Bundle),
		_ => None,
	}
}

/// Attempts to drain the evaluation queues; a no-op while a batch is open.
pub fn run() {
	runtime().run();
}

/// Resolves once all evaluation queues are empty and no batch is in
/// progress; immediately when already idle.
pub async fn wait() {
	runtime().settle().await;
}

/// The scheduler's drain slice length (default 5 ms).
#[must_use]
pub fn slice_time() -> Duration {
	runtime().slice_time()
}

/// Adjusts the scheduler's drain slice length.
pub fn set_slice_time(slice_time: Duration) {
	runtime().set_slice_time(slice_time);
}

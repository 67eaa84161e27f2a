//! The cell-graph runtime: node storage, dependency tracking, staleness
//! propagation and the tiered evaluation queue.
//!
//! All state of one [`Runtime`] lives behind a single reentrant critical
//! section. Re-entrancy is the normal case, since evaluating a definition
//! reads other cells, which locks again on the same thread; the inner
//! [`RefCell`] borrow is always released before any user code (definitions
//! and compare predicates) runs.

use core::num::NonZeroU64;
use std::{
	cell::RefCell,
	collections::{BTreeMap, BTreeSet},
	fmt::{self, Debug, Formatter},
	mem,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use futures_lite::future;
use parking_lot::ReentrantMutex;
use scopeguard::guard;

pub use tier_queue::Tier;
use tier_queue::TierQueue;

use crate::EvalError;

mod tier_queue;

/// Bounds a runtime's value payload must satisfy.
///
/// Blanket-implemented; listed once here so the seams read the same
/// everywhere.
pub trait CellValue: Clone + Default + PartialEq + Send + Sync + 'static {}

impl<T: Clone + Default + PartialEq + Send + Sync + 'static> CellValue for T {}

/// Unique key of a cell within its [`Runtime`].
///
/// Symbols are never reused, even after the cell behind one is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(NonZeroU64);

/// A cell's standing with respect to recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
	/// The cached value (or cached error) is current.
	Ready,
	/// The cell must recompute before its value can be returned.
	Stale,
	/// A distant provider changed; recomputation is required only if some
	/// direct provider turns out to have actually changed.
	MaybeStale,
}

/// Decides whether a candidate assignment is an observable change.
///
/// `Changes` is the default (strict inequality). `Always` and `Never` are
/// the constant forms: notify on every assignment, or on none.
pub enum Compare<V: ?Sized> {
	/// Notify when the new value differs from the old one.
	Changes,
	/// Notify on every assignment.
	Always,
	/// Never notify.
	Never,
	/// Notify when the predicate returns `true` for `(old, new)`.
	With(Arc<dyn Fn(&V, &V) -> bool + Send + Sync>),
}

impl<V: ?Sized> Clone for Compare<V> {
	fn clone(&self) -> Self {
		match self {
			Self::Changes => Self::Changes,
			Self::Always => Self::Always,
			Self::Never => Self::Never,
			Self::With(predicate) => Self::With(Arc::clone(predicate)),
		}
	}
}

impl<V: ?Sized> Default for Compare<V> {
	fn default() -> Self {
		Self::Changes
	}
}

impl<V: ?Sized> Debug for Compare<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Changes => "Compare::Changes",
			Self::Always => "Compare::Always",
			Self::Never => "Compare::Never",
			Self::With(_) => "Compare::With(_)",
		})
	}
}

/// A cell's definition: computes the next value from the previous one.
///
/// Reads performed while a definition runs become the cell's providers.
pub type Definition<V> = Arc<dyn Fn(V) -> Result<V, EvalError> + Send + Sync>;

/// Construction options for a cell.
pub struct CellSeed<V> {
	/// Initial value.
	pub value: V,
	/// Initial definition; when present the cell starts `Stale`.
	pub definition: Option<Definition<V>>,
	/// Schedule recomputation even without consumers.
	pub eager: bool,
	/// Change detection for candidate assignments.
	pub compare: Compare<V>,
}

impl<V: CellValue> Default for CellSeed<V> {
	fn default() -> Self {
		Self {
			value: V::default(),
			definition: None,
			eager: false,
			compare: Compare::Changes,
		}
	}
}

struct Node<V> {
	value: V,
	error: Option<EvalError>,
	definition: Option<Definition<V>>,
	compare: Compare<V>,
	eager: bool,
	providers: BTreeSet<Symbol>,
	consumers: BTreeSet<Symbol>,
	readiness: Readiness,
	evaluating: bool,
	scheduled: Option<Tier>,
}

struct RuntimeState<V> {
	nodes: BTreeMap<Symbol, Node<V>>,
	queue: TierQueue,
	current: Option<Symbol>,
	untrack_depth: usize,
	eval_wait_depth: usize,
	slice_time: Duration,
}

impl<V> RuntimeState<V> {
	const fn new() -> Self {
		Self {
			nodes: BTreeMap::new(),
			queue: TierQueue::new(),
			current: None,
			untrack_depth: 0,
			eval_wait_depth: 0,
			slice_time: Duration::from_millis(5),
		}
	}
}

struct RuntimeShared<V> {
	symbol_counter: AtomicU64,
	critical: ReentrantMutex<RefCell<RuntimeState<V>>>,
}

unsafe impl<V: Send> Sync for RuntimeShared<V> {}

/// A cheap-to-clone handle on one runtime instance.
///
/// The runtime is single-threaded cooperative: the reentrant critical
/// section serialises all cell operations, and the only suspension points
/// are between cell computations inside [`Runtime::settle`].
pub struct Runtime<V> {
	shared: Arc<RuntimeShared<V>>,
}

impl<V> Clone for Runtime<V> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<V> Debug for Runtime<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Runtime").finish_non_exhaustive()
	}
}

impl<V: CellValue> Default for Runtime<V> {
	fn default() -> Self {
		Self::new()
	}
}

fn schedule<V>(state: &mut RuntimeState<V>, symbol: Symbol, distance: usize) {
	let Some(node) = state.nodes.get_mut(&symbol) else {
		return;
	};
	if node.readiness == Readiness::Ready {
		return;
	}
	if !node.eager && node.consumers.is_empty() {
		return;
	}
	let tier = if distance == 0 {
		Tier::Changed
	} else if node.consumers.is_empty() {
		Tier::Terminal
	} else {
		Tier::Interior
	};
	match node.scheduled {
		Some(queued) if queued <= tier => {}
		_ => {
			node.scheduled = Some(tier);
			state.queue.enqueue(symbol, tier);
		}
	}
}

/// Marks `symbol` and its transitive consumers according to `distance`:
/// 0 is the changed cell itself, 1 a direct consumer (`Stale`), 2 and
/// beyond distant consumers (`Ready` to `MaybeStale` only; staleness is
/// monotone). Propagation continues past a cell only when its own value
/// changed or it just left `Ready`, which keeps repeated walks out of
/// already-notified regions.
fn ripple_from<V>(state: &mut RuntimeState<V>, symbol: Symbol, distance: usize) {
	let Some(node) = state.nodes.get_mut(&symbol) else {
		return;
	};
	let was_ready = node.readiness == Readiness::Ready;
	match distance {
		0 => {}
		1 => node.readiness = Readiness::Stale,
		_ => {
			if was_ready {
				node.readiness = Readiness::MaybeStale;
			}
		}
	}
	let left_ready = was_ready && node.readiness != Readiness::Ready;
	if distance == 0 || left_ready {
		let consumers: Vec<Symbol> = node.consumers.iter().copied().collect();
		for consumer in consumers {
			ripple_from(state, consumer, distance.saturating_add(1));
		}
	}
	schedule(state, symbol, distance);
}

/// Detaches all provider edges of `symbol` and takes its definition.
fn clear_definition<V>(state: &mut RuntimeState<V>, symbol: Symbol) -> Option<Definition<V>> {
	let Some(node) = state.nodes.get_mut(&symbol) else {
		return None;
	};
	let stale = node.definition.take();
	let providers = mem::take(&mut node.providers);
	for provider in &providers {
		if let Some(provider) = state.nodes.get_mut(provider) {
			provider.consumers.remove(&symbol);
		}
	}
	stale
}

fn next_scheduled<V>(state: &mut RuntimeState<V>) -> Option<Symbol> {
	while let Some((symbol, tier)) = state.queue.pop() {
		match state.nodes.get_mut(&symbol) {
			Some(node) if node.scheduled == Some(tier) => {
				node.scheduled = None;
				return Some(symbol);
			}
			// Re-tiered, resolved inline or released in the meantime.
			_ => {}
		}
	}
	None
}

impl<V: CellValue> Runtime<V> {
	/// Creates an empty runtime.
	#[must_use]
	pub fn new() -> Self {
		Self {
			shared: Arc::new(RuntimeShared {
				symbol_counter: AtomicU64::new(0),
				critical: ReentrantMutex::new(RefCell::new(RuntimeState::new())),
			}),
		}
	}

	/// Registers a new cell and returns its symbol.
	///
	/// An eager cell with a definition is scheduled immediately.
	pub fn create(&self, seed: CellSeed<V>) -> Symbol {
		let symbol = Symbol(
			(self.shared.symbol_counter.fetch_add(1, Ordering::Relaxed) + 1)
				.try_into()
				.expect("symbol space exhausted"),
		);
		let has_definition = seed.definition.is_some();
		let eager = seed.eager;
		{
			let lock = self.shared.critical.lock();
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			state.nodes.insert(
				symbol,
				Node {
					value: seed.value,
					error: None,
					definition: seed.definition,
					compare: seed.compare,
					eager,
					providers: BTreeSet::new(),
					consumers: BTreeSet::new(),
					readiness: if has_definition {
						Readiness::Stale
					} else {
						Readiness::Ready
					},
					evaluating: false,
					scheduled: None,
				},
			);
			if has_definition && eager {
				schedule(state, symbol, 0);
			}
		}
		if has_definition && eager {
			self.run();
		}
		symbol
	}

	/// Reads a cell's value, recomputing it first when necessary.
	///
	/// This is the defining operation of the runtime: it dequeues the cell
	/// (an inline read supersedes queued work), captures the producer/
	/// consumer edge towards the currently evaluating cell unless tracking
	/// is suspended, resolves `MaybeStale` by reading the cell's providers
	/// (any that actually changed ripples this cell to `Stale`), and runs
	/// the definition on the recompute path. A failing definition caches
	/// its error, readies the cell and ripples consumers; the error is then
	/// returned from this and every following read.
	///
	/// # Errors
	///
	/// The cached or fresh evaluation error, [`EvalError::SelfReference`]
	/// when the cell is already evaluating, or [`EvalError::Dropped`] when
	/// no cell exists behind `symbol`.
	pub fn read(&self, symbol: Symbol) -> Result<V, EvalError> {
		let lock = self.shared.critical.lock();
		let readiness = {
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			{
				let Some(node) = state.nodes.get_mut(&symbol) else {
					return Err(EvalError::Dropped);
				};
				node.scheduled = None;
			}
			if state.untrack_depth == 0 {
				if let Some(consumer) = state.current.filter(|current| *current != symbol) {
					state
						.nodes
						.get_mut(&symbol)
						.expect("unreachable")
						.consumers
						.insert(consumer);
					if let Some(consumer) = state.nodes.get_mut(&consumer) {
						consumer.providers.insert(symbol);
					}
				}
			}
			let node = state.nodes.get(&symbol).expect("unreachable");
			if node.readiness == Readiness::Ready {
				return match &node.error {
					Some(error) => Err(error.clone()),
					None => Ok(node.value.clone()),
				};
			}
			node.readiness
		};

		if readiness == Readiness::MaybeStale {
			// The provider reads below happen on this cell's own behalf:
			// they must not register edges towards an enclosing evaluator,
			// and no drain may start while that evaluator is mid-definition.
			let (providers, saved) = {
				let mut borrow = (*lock).borrow_mut();
				let state = &mut *borrow;
				let Some(node) = state.nodes.get(&symbol) else {
					return Err(EvalError::Dropped);
				};
				let providers: Vec<Symbol> = node.providers.iter().copied().collect();
				let saved = state.current.take();
				state.eval_wait_depth += 1;
				(providers, saved)
			};
			for provider in providers {
				let _ = self.read(provider);
			}
			{
				let mut borrow = (*lock).borrow_mut();
				let state = &mut *borrow;
				state.current = saved;
				state.eval_wait_depth -= 1;
			}
			self.run();
			let mut borrow = (*lock).borrow_mut();
			let Some(node) = borrow.nodes.get_mut(&symbol) else {
				return Err(EvalError::Dropped);
			};
			if node.readiness != Readiness::Stale {
				// No provider actually changed.
				node.readiness = Readiness::Ready;
				return match &node.error {
					Some(error) => Err(error.clone()),
					None => Ok(node.value.clone()),
				};
			}
		}

		// Recompute path.
		let (definition, previous, saved) = {
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			let Some(node) = state.nodes.get_mut(&symbol) else {
				return Err(EvalError::Dropped);
			};
			if node.evaluating {
				return Err(EvalError::SelfReference);
			}
			let Some(definition) = node.definition.clone() else {
				node.readiness = Readiness::Ready;
				return match &node.error {
					Some(error) => Err(error.clone()),
					None => Ok(node.value.clone()),
				};
			};
			node.evaluating = true;
			let previous = node.value.clone();
			// Provider edges are rediscovered by the reads the definition
			// performs.
			let providers = mem::take(&mut node.providers);
			for provider in &providers {
				if let Some(provider) = state.nodes.get_mut(provider) {
					provider.consumers.remove(&symbol);
				}
			}
			let saved = state.current.replace(symbol);
			(definition, previous, saved)
		};

		let result = definition(previous);

		{
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			state.current = saved;
			if let Some(node) = state.nodes.get_mut(&symbol) {
				node.evaluating = false;
			}
		}

		match result {
			Ok(value) => {
				self.set_notify(symbol, value.clone());
				Ok(value)
			}
			Err(error) => {
				let eager_terminal = {
					let mut borrow = (*lock).borrow_mut();
					let state = &mut *borrow;
					let eager_terminal = match state.nodes.get_mut(&symbol) {
						Some(node) => {
							node.error = Some(error.clone());
							node.readiness = Readiness::Ready;
							node.scheduled = None;
							node.eager && node.consumers.is_empty()
						}
						None => false,
					};
					ripple_from(state, symbol, 0);
					eager_terminal
				};
				if eager_terminal {
					// An eager terminal cell has no consumer to observe the
					// failure; surface it instead of swallowing it.
					#[cfg(feature = "tracing")]
					tracing::error!(?symbol, error = %error, "eager cell failed with no consumer");
					#[cfg(not(feature = "tracing"))]
					let _ = &error;
				}
				self.run();
				Err(error)
			}
		}
	}

	/// Assigns a concrete value: drops any definition, detaches all
	/// providers, then stores and notifies.
	pub fn write(&self, symbol: Symbol, value: V) {
		let stale = {
			let lock = self.shared.critical.lock();
			let mut borrow = (*lock).borrow_mut();
			clear_definition(&mut borrow, symbol)
		};
		drop(stale);
		self.set_notify(symbol, value);
	}

	/// Stores `value`, readies the cell and clears its error, then ripples
	/// consumers when the cell's comparator deems the assignment an
	/// observable change.
	pub fn set_notify(&self, symbol: Symbol, value: V) {
		let lock = self.shared.critical.lock();
		let (compare, previous) = {
			let borrow = (*lock).borrow();
			let Some(node) = borrow.nodes.get(&symbol) else {
				return;
			};
			(node.compare.clone(), node.value.clone())
		};
		let changed = match compare {
			Compare::Changes => previous != value,
			Compare::Always => true,
			Compare::Never => false,
			Compare::With(predicate) => predicate(&previous, &value),
		};
		let stale = {
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			let Some(node) = state.nodes.get_mut(&symbol) else {
				return;
			};
			let stale = mem::replace(&mut node.value, value);
			node.readiness = Readiness::Ready;
			node.error = None;
			node.scheduled = None;
			if changed {
				ripple_from(state, symbol, 0);
			}
			stale
		};
		drop(stale);
		self.run();
	}

	/// Replaces the cell's definition.
	///
	/// `None` detaches all providers and assigns the default value. A new
	/// definition detaches providers, clears any cached error, marks the
	/// cell `Stale` and schedules it.
	pub fn set_definition(&self, symbol: Symbol, definition: Option<Definition<V>>) {
		match definition {
			None => {
				let stale = {
					let lock = self.shared.critical.lock();
					let mut borrow = (*lock).borrow_mut();
					clear_definition(&mut borrow, symbol)
				};
				drop(stale);
				self.set_notify(symbol, V::default());
			}
			Some(definition) => {
				let stale = {
					let lock = self.shared.critical.lock();
					let mut borrow = (*lock).borrow_mut();
					let state = &mut *borrow;
					if !state.nodes.contains_key(&symbol) {
						return;
					}
					let stale = clear_definition(state, symbol);
					let node = state.nodes.get_mut(&symbol).expect("unreachable");
					node.definition = Some(definition);
					node.error = None;
					node.readiness = Readiness::Stale;
					schedule(state, symbol, 0);
					stale
				};
				drop(stale);
				self.run();
			}
		}
	}

	/// Enables or disables eager scheduling; enabling schedules the cell
	/// right away when it is not `Ready`.
	pub fn set_eager(&self, symbol: Symbol, eager: bool) {
		{
			let lock = self.shared.critical.lock();
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			let Some(node) = state.nodes.get_mut(&symbol) else {
				return;
			};
			node.eager = eager;
			if eager {
				schedule(state, symbol, 1);
			}
		}
		self.run();
	}

	/// Forces a defined cell `Stale` and schedules it.
	pub fn unready(&self, symbol: Symbol) {
		{
			let lock = self.shared.critical.lock();
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			let Some(node) = state.nodes.get_mut(&symbol) else {
				return;
			};
			if node.definition.is_none() {
				return;
			}
			node.readiness = Readiness::Stale;
			schedule(state, symbol, 0);
		}
		self.run();
	}

	/// Ripples staleness from `symbol` with the given distance (see
	/// [`Readiness`]), then attempts a drain.
	pub fn ripple(&self, symbol: Symbol, distance: usize) {
		{
			let lock = self.shared.critical.lock();
			let mut borrow = (*lock).borrow_mut();
			ripple_from(&mut borrow, symbol, distance);
		}
		self.run();
	}

	/// Adds or removes the `provider → consumer` edge, keeping both sides
	/// of the relation in step.
	pub fn set_edge(&self, provider: Symbol, consumer: Symbol, add: bool) {
		let lock = self.shared.critical.lock();
		let mut borrow = (*lock).borrow_mut();
		let state = &mut *borrow;
		if add && (!state.nodes.contains_key(&provider) || !state.nodes.contains_key(&consumer)) {
			return;
		}
		if let Some(node) = state.nodes.get_mut(&provider) {
			if add {
				node.consumers.insert(consumer);
			} else {
				node.consumers.remove(&consumer);
			}
		}
		if let Some(node) = state.nodes.get_mut(&consumer) {
			if add {
				node.providers.insert(provider);
			} else {
				node.providers.remove(&provider);
			}
		}
	}

	/// Runs `f` with dependency tracking suspended, then attempts a drain.
	///
	/// Strictly nestable; the depth counter decrements even when `f`
	/// unwinds.
	pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
		{
			let lock = self.shared.critical.lock();
			(*lock).borrow_mut().untrack_depth += 1;
		}
		let rearm = guard(self, |runtime| {
			{
				let lock = runtime.shared.critical.lock();
				(*lock).borrow_mut().untrack_depth -= 1;
			}
			runtime.run();
		});
		let result = f();
		drop(rearm);
		result
	}

	/// Runs `f` with the drain held off; ripples accumulate but no queued
	/// recomputation is observable until `f` returns.
	///
	/// Strictly nestable; the depth counter decrements (and the drain
	/// re-arms) even when `f` unwinds.
	pub fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
		{
			let lock = self.shared.critical.lock();
			(*lock).borrow_mut().eval_wait_depth += 1;
		}
		let rearm = guard(self, |runtime| {
			{
				let lock = runtime.shared.critical.lock();
				(*lock).borrow_mut().eval_wait_depth -= 1;
			}
			runtime.run();
		});
		let result = f();
		drop(rearm);
		result
	}

	/// Attempts to drain the evaluation queues.
	///
	/// No-op while a batch is open or a definition is evaluating; at most
	/// one drain is in flight (the drain holds the evaluation-wait guard,
	/// which nested `batch` calls raise past 1, aborting the drain until
	/// they re-arm it).
	pub fn run(&self) {
		let _ = self.drain(None);
	}

	fn drain(&self, deadline: Option<Instant>) -> bool {
		let lock = self.shared.critical.lock();
		{
			let mut borrow = (*lock).borrow_mut();
			if borrow.eval_wait_depth > 0 || borrow.current.is_some() {
				return borrow.queue.is_empty() && borrow.eval_wait_depth == 0;
			}
			borrow.eval_wait_depth = 1;
		}
		let rearm = guard(&lock, |lock| {
			(**lock).borrow_mut().eval_wait_depth -= 1;
		});
		loop {
			let mut borrow = (*lock).borrow_mut();
			if borrow.eval_wait_depth > 1 {
				// A batch opened mid-drain; it re-arms the drain on exit.
				drop(borrow);
				drop(rearm);
				return false;
			}
			let Some(symbol) = next_scheduled(&mut borrow) else {
				return true;
			};
			drop(borrow);
			#[cfg(feature = "tracing")]
			tracing::trace!(?symbol, "evaluating scheduled cell");
			let _ = self.read(symbol);
			if let Some(deadline) = deadline {
				if Instant::now() >= deadline {
					return (*lock).borrow().queue.is_empty();
				}
			}
		}
	}

	/// Whether all queues are empty and no evaluation-wait is in progress.
	#[must_use]
	pub fn is_settled(&self) -> bool {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.queue.is_empty() && borrow.eval_wait_depth == 0 && borrow.current.is_none()
	}

	/// Resolves once the runtime has settled, draining in `slice_time`
	/// slices and yielding to the caller's executor in between.
	///
	/// Resolves immediately when already idle. Must not be awaited from
	/// inside a batch: the barrier cannot be satisfied while the batch is
	/// open.
	pub async fn settle(&self) {
		loop {
			let deadline = Instant::now() + self.slice_time();
			if self.drain(Some(deadline)) && self.is_settled() {
				return;
			}
			future::yield_now().await;
		}
	}

	/// The drain slice length used by [`Runtime::settle`].
	#[must_use]
	pub fn slice_time(&self) -> Duration {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.slice_time
	}

	/// Adjusts the drain slice length.
	pub fn set_slice_time(&self, slice_time: Duration) {
		let lock = self.shared.critical.lock();
		(*lock).borrow_mut().slice_time = slice_time;
	}

	/// The cell's cached value, without tracking or recomputation.
	#[must_use]
	pub fn peek(&self, symbol: Symbol) -> Option<V> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).map(|node| node.value.clone())
	}

	/// The cell's cached error, if its last evaluation failed.
	#[must_use]
	pub fn error(&self, symbol: Symbol) -> Option<EvalError> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).and_then(|node| node.error.clone())
	}

	/// The cell's readiness, or `None` when it has been released.
	#[must_use]
	pub fn readiness(&self, symbol: Symbol) -> Option<Readiness> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).map(|node| node.readiness)
	}

	/// The tier the cell is queued at, if any.
	#[must_use]
	pub fn scheduled(&self, symbol: Symbol) -> Option<Tier> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).and_then(|node| node.scheduled)
	}

	/// Whether the cell is eager.
	#[must_use]
	pub fn eager(&self, symbol: Symbol) -> bool {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).is_some_and(|node| node.eager)
	}

	/// The cell's comparator.
	#[must_use]
	pub fn compare(&self, symbol: Symbol) -> Option<Compare<V>> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).map(|node| node.compare.clone())
	}

	/// Whether the cell currently has a definition.
	#[must_use]
	pub fn has_definition(&self, symbol: Symbol) -> bool {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow
			.nodes
			.get(&symbol)
			.is_some_and(|node| node.definition.is_some())
	}

	/// Whether the cell's definition is running right now.
	#[must_use]
	pub fn is_evaluating(&self, symbol: Symbol) -> bool {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow.nodes.get(&symbol).is_some_and(|node| node.evaluating)
	}

	/// The cell's providers as discovered by its last evaluation.
	#[must_use]
	pub fn providers(&self, symbol: Symbol) -> Vec<Symbol> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow
			.nodes
			.get(&symbol)
			.map(|node| node.providers.iter().copied().collect())
			.unwrap_or_default()
	}

	/// The cells that read this one during their last evaluation.
	#[must_use]
	pub fn consumers(&self, symbol: Symbol) -> Vec<Symbol> {
		let lock = self.shared.critical.lock();
		let borrow = (*lock).borrow();
		borrow
			.nodes
			.get(&symbol)
			.map(|node| node.consumers.iter().copied().collect())
			.unwrap_or_default()
	}

	/// Removes the cell behind `symbol`, detaching its outbound consumer
	/// registrations first. Queue entries are skipped lazily.
	pub(crate) fn release(&self, symbol: Symbol) {
		let stale = {
			let lock = self.shared.critical.lock();
			let mut borrow = (*lock).borrow_mut();
			let state = &mut *borrow;
			let Some(node) = state.nodes.remove(&symbol) else {
				return;
			};
			for provider in &node.providers {
				if let Some(provider) = state.nodes.get_mut(provider) {
					provider.consumers.remove(&symbol);
				}
			}
			for consumer in &node.consumers {
				if let Some(consumer) = state.nodes.get_mut(consumer) {
					consumer.providers.remove(&symbol);
				}
			}
			node
		};
		// The node's value and definition may hold the last leases on other
		// cells; their release re-enters the runtime, so this drop happens
		// outside the state borrow.
		drop(stale);
	}
}

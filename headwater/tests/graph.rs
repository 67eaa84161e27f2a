use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};

use headwater::{CellSeed, Compare, EvalError, RawCell, Readiness, Runtime};

fn stored(runtime: &Runtime<i64>, value: i64) -> RawCell<i64> {
	RawCell::new(
		runtime,
		CellSeed {
			value,
			..CellSeed::default()
		},
	)
}

fn derived(
	runtime: &Runtime<i64>,
	definition: impl Fn(i64) -> Result<i64, EvalError> + Send + Sync + 'static,
) -> RawCell<i64> {
	RawCell::new(
		runtime,
		CellSeed {
			definition: Some(Arc::new(definition)),
			..CellSeed::default()
		},
	)
}

#[test]
fn stored_values_read_back() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 7);
	assert_eq!(a.read(), Ok(7));
	a.write(8);
	assert_eq!(a.read(), Ok(8));
	assert_eq!(a.readiness(), Readiness::Ready);
}

#[test]
fn definitions_discover_their_providers() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = derived(&runtime, {
		let a = a.clone();
		move |_| Ok(a.read()? + 1)
	});

	assert_eq!(b.read(), Ok(2));
	assert_eq!(b.providers(), vec![a.symbol()]);
	assert_eq!(a.consumers(), vec![b.symbol()]);

	a.write(3);
	assert_eq!(b.readiness(), Readiness::Stale);
	assert_eq!(b.read(), Ok(4));
}

#[test]
fn distant_changes_mark_maybe_stale_only() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = derived(&runtime, {
		let a = a.clone();
		move |_| Ok(a.read()? * 10)
	});
	let c = derived(&runtime, {
		let b = b.clone();
		move |_| Ok(b.read()? + 1)
	});

	assert_eq!(c.read(), Ok(11));
	// Observed inside a batch, before the drain resolves the chain: the
	// direct consumer is `Stale`, the distant one only `MaybeStale`.
	runtime.batch(|| {
		a.write(2);
		assert_eq!(b.readiness(), Readiness::Stale);
		assert_eq!(c.readiness(), Readiness::MaybeStale);
	});
	assert_eq!(c.read(), Ok(21));
}

#[test]
fn unchanged_intermediates_skip_downstream_recomputation() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = RawCell::new(
		&runtime,
		CellSeed {
			definition: Some({
				let a = a.clone();
				Arc::new(move |_| Ok(a.read()? * 0))
			}),
			compare: Compare::Never,
			..CellSeed::default()
		},
	);
	let runs = Arc::new(AtomicUsize::new(0));
	let c = derived(&runtime, {
		let b = b.clone();
		let runs = Arc::clone(&runs);
		move |_| {
			runs.fetch_add(1, Ordering::Relaxed);
			Ok(b.read()? + 1)
		}
	});

	assert_eq!(c.read(), Ok(1));
	assert_eq!(runs.load(Ordering::Relaxed), 1);

	a.write(5);
	assert_eq!(c.readiness(), Readiness::MaybeStale);
	// Resolving the provider shows nothing changed, so `c` readies without
	// running its definition again.
	assert_eq!(c.read(), Ok(1));
	assert_eq!(runs.load(Ordering::Relaxed), 1);
	assert_eq!(c.readiness(), Readiness::Ready);
}

#[test]
fn provider_resolution_leaks_no_edges_to_the_enclosing_evaluator() {
	let runtime = Runtime::new();
	let w = stored(&runtime, 1);
	let z = derived(&runtime, {
		let w = w.clone();
		move |_| Ok(w.read()? + 1)
	});
	let y = RawCell::new(
		&runtime,
		CellSeed {
			definition: Some({
				let z = z.clone();
				Arc::new(move |_| Ok(z.read()? * 0))
			}),
			compare: Compare::Never,
			..CellSeed::default()
		},
	);
	let x = derived(&runtime, {
		let y = y.clone();
		move |_| Ok(y.read()? + 1)
	});
	let runs = Arc::new(AtomicUsize::new(0));
	let u = derived(&runtime, {
		let x = x.clone();
		let runs = Arc::clone(&runs);
		move |_| {
			runs.fetch_add(1, Ordering::Relaxed);
			Ok(x.read()? + 1)
		}
	});

	assert_eq!(u.read(), Ok(2));
	assert_eq!(runs.load(Ordering::Relaxed), 1);

	// Re-evaluate `u` while `x` is still only maybe-stale, so `x` resolves
	// its providers from inside `u`'s evaluation.
	runtime.batch(|| {
		w.write(2);
		u.unready();
		assert_eq!(u.read(), Ok(2));
	});

	assert_eq!(runs.load(Ordering::Relaxed), 2);
	// `u` subscribes to `x` alone; the resolution reads of `y` and `z` are
	// on `x`'s behalf, not `u`'s.
	assert_eq!(u.providers(), vec![x.symbol()]);
	assert!(!y.consumers().contains(&u.symbol()));
	assert!(!z.consumers().contains(&u.symbol()));
}

#[test]
fn failing_definitions_cache_their_error() {
	let runtime = Runtime::new();
	let a = derived(&runtime, |_| Err(EvalError::user("boom")));

	assert_eq!(a.read(), Err(EvalError::user("boom")));
	assert_eq!(a.error(), Some(EvalError::user("boom")));
	assert_eq!(a.readiness(), Readiness::Ready);
	// Still cached on the next read.
	assert_eq!(a.read(), Err(EvalError::user("boom")));

	a.write(1);
	assert_eq!(a.error(), None);
	assert_eq!(a.read(), Ok(1));
}

#[test]
fn writes_drop_the_definition_and_providers() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = derived(&runtime, {
		let a = a.clone();
		move |_| Ok(a.read()? + 1)
	});

	assert_eq!(b.read(), Ok(2));
	b.write(9);
	assert!(!b.has_definition());
	assert!(b.providers().is_empty());
	assert!(a.consumers().is_empty());
	a.write(5);
	assert_eq!(b.read(), Ok(9));
}

#[test]
fn releasing_a_handle_detaches_its_registrations() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = derived(&runtime, {
		let a = a.clone();
		move |_| Ok(a.read()? + 1)
	});

	assert_eq!(b.read(), Ok(2));
	assert_eq!(a.consumers().len(), 1);
	drop(b);
	assert!(a.consumers().is_empty());
}

#[test]
fn manual_edges_stay_symmetric() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = stored(&runtime, 2);

	a.set_consumer(&b, true);
	assert_eq!(a.consumers(), vec![b.symbol()]);
	assert_eq!(b.providers(), vec![a.symbol()]);

	b.set_provider(&a, false);
	assert!(a.consumers().is_empty());
	assert!(b.providers().is_empty());
}

#[test]
fn eager_cells_recompute_without_readers() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let runs = Arc::new(AtomicUsize::new(0));
	let b = RawCell::new(
		&runtime,
		CellSeed {
			definition: Some({
				let a = a.clone();
				let runs = Arc::clone(&runs);
				Arc::new(move |_| {
					runs.fetch_add(1, Ordering::Relaxed);
					Ok(a.read()? + 1)
				})
			}),
			eager: true,
			..CellSeed::default()
		},
	);

	assert_eq!(runs.load(Ordering::Relaxed), 1);
	a.write(10);
	assert_eq!(runs.load(Ordering::Relaxed), 2);
	assert_eq!(b.peek(), Some(11));
	assert!(runtime.is_settled());
}

#[test]
fn batches_hold_the_drain() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let runs = Arc::new(AtomicUsize::new(0));
	let b = RawCell::new(
		&runtime,
		CellSeed {
			definition: Some({
				let a = a.clone();
				let runs = Arc::clone(&runs);
				Arc::new(move |_| {
					runs.fetch_add(1, Ordering::Relaxed);
					Ok(a.read()? + 1)
				})
			}),
			eager: true,
			..CellSeed::default()
		},
	);
	assert_eq!(runs.load(Ordering::Relaxed), 1);

	runtime.batch(|| {
		a.write(2);
		a.write(3);
		assert_eq!(runs.load(Ordering::Relaxed), 1);
		assert!(!runtime.is_settled());
	});

	assert_eq!(runs.load(Ordering::Relaxed), 2);
	assert_eq!(b.peek(), Some(4));
}

#[test]
fn untracked_reads_leave_no_edges() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = stored(&runtime, 10);
	let c = derived(&runtime, {
		let a = a.clone();
		let b = b.clone();
		let runtime = runtime.clone();
		move |_| Ok(a.read()? + runtime.untracked(|| b.read())?)
	});

	assert_eq!(c.read(), Ok(11));
	assert_eq!(c.providers(), vec![a.symbol()]);
	assert!(b.consumers().is_empty());
}

#[test]
fn self_reference_is_rejected() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let a_again = a.clone();
	a.set_definition(Some(Arc::new(move |_| Ok(a_again.read()? + 1))));

	assert_eq!(a.read(), Err(EvalError::SelfReference));
	assert_eq!(a.peek(), Some(1));
}

#[test]
fn settle_resolves_once_idle() {
	let runtime = Runtime::new();
	let a = stored(&runtime, 1);
	let b = RawCell::new(
		&runtime,
		CellSeed {
			definition: Some({
				let a = a.clone();
				Arc::new(move |_| Ok(a.read()? * 2))
			}),
			eager: true,
			..CellSeed::default()
		},
	);

	a.write(21);
	futures_lite::future::block_on(runtime.settle());
	assert!(runtime.is_settled());
	assert_eq!(b.peek(), Some(42));
}

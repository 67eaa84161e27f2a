use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
};

use futures_lite::future::block_on;
use rill::{batch, untracked, wait, Cell, CellOptions, Value};

fn int(value: &Value) -> i64 {
	value.as_i64().unwrap_or(0)
}

#[test]
fn batched_writes_coalesce_into_one_recomputation() {
	let a = Cell::of(1);
	let b = Cell::of(2);
	let calls = Arc::new(AtomicUsize::new(0));
	let c = Cell::computed({
		let a = a.clone();
		let b = b.clone();
		let calls = Arc::clone(&calls);
		move |_| {
			calls.fetch_add(1, Ordering::Relaxed);
			Ok(Value::Int(int(&a.get()?) + int(&b.get()?)))
		}
	});

	assert_eq!(c.get(), Ok(Value::Int(3)));
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	batch(|| {
		a.set(2);
		b.set(3);
	});

	assert_eq!(c.get(), Ok(Value::Int(5)));
	assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn eager_consumers_settle_once_per_batch() {
	let a = Cell::of(1);
	let b = Cell::of(10);
	let calls = Arc::new(AtomicUsize::new(0));
	let sum = Cell::new(CellOptions::new().eager(true).def({
		let a = a.clone();
		let b = b.clone();
		let calls = Arc::clone(&calls);
		move |_| {
			calls.fetch_add(1, Ordering::Relaxed);
			Ok(Value::Int(int(&a.get()?) + int(&b.get()?)))
		}
	}));
	block_on(wait());
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	batch(|| {
		a.set(2);
		b.set(20);
		// Ripples accumulate, but nothing recomputes inside the batch.
		assert_eq!(calls.load(Ordering::Relaxed), 1);
	});
	block_on(wait());

	assert_eq!(calls.load(Ordering::Relaxed), 2);
	assert_eq!(sum.peek(), Some(Value::Int(22)));
}

#[test]
fn batches_nest() {
	let a = Cell::of(1);
	let calls = Arc::new(AtomicUsize::new(0));
	let follower = Cell::new(CellOptions::new().eager(true).def({
		let a = a.clone();
		let calls = Arc::clone(&calls);
		move |_| {
			calls.fetch_add(1, Ordering::Relaxed);
			a.get()
		}
	}));
	block_on(wait());
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	batch(|| {
		a.set(2);
		batch(|| {
			a.set(3);
		});
		// The inner batch closing must not drain while the outer one is
		// still open.
		assert_eq!(calls.load(Ordering::Relaxed), 1);
	});
	block_on(wait());

	assert_eq!(calls.load(Ordering::Relaxed), 2);
	assert_eq!(follower.peek(), Some(Value::Int(3)));
}

#[test]
fn batch_returns_the_closure_value() {
	let a = Cell::of(1);
	let doubled = batch(|| int(&a.get().expect("readable")) * 2);
	assert_eq!(doubled, 2);
}

#[test]
fn unwinding_out_of_a_batch_still_rearms_the_drain() {
	let a = Cell::of(1);
	let follower = Cell::new(CellOptions::new().eager(true).def({
		let a = a.clone();
		move |_| a.get()
	}));
	block_on(wait());
	assert_eq!(follower.peek(), Some(Value::Int(1)));

	let result = catch_unwind(AssertUnwindSafe(|| {
		batch(|| {
			a.set(2);
			panic!("interrupted");
		})
	}));
	assert!(result.is_err());

	// The depth counter decremented on the unwind path, so later writes
	// drain normally.
	a.set(3);
	block_on(wait());
	assert_eq!(follower.peek(), Some(Value::Int(3)));
}

#[test]
fn untracked_reads_create_no_edges() {
	let a = Cell::of(1);
	let b = Cell::of(10);
	let calls = Arc::new(AtomicUsize::new(0));
	let c = Cell::computed({
		let a = a.clone();
		let b = b.clone();
		let calls = Arc::clone(&calls);
		move |_| {
			calls.fetch_add(1, Ordering::Relaxed);
			let tracked = int(&a.get()?);
			let peeked = untracked(|| b.get()).map(|value| int(&value))?;
			Ok(Value::Int(tracked + peeked))
		}
	});

	assert_eq!(c.get(), Ok(Value::Int(11)));
	assert_eq!(calls.load(Ordering::Relaxed), 1);
	assert_eq!(c.providers(), vec![a.id()]);
	assert!(b.consumers().is_empty());

	// Changing the untracked input is invisible.
	b.set(20);
	assert_eq!(c.get(), Ok(Value::Int(11)));
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	// Changing the tracked one recomputes with the fresh untracked value.
	a.set(2);
	assert_eq!(c.get(), Ok(Value::Int(22)));
	assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn untracked_nests_inside_batches() {
	let a = Cell::of(1);
	let observed = batch(|| {
		a.set(2);
		untracked(|| int(&a.get().expect("readable")))
	});
	assert_eq!(observed, 2);
}

use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use futures_lite::future::block_on;
use rill::{batch, set_slice_time, slice_time, wait, Cell, CellOptions, EvalError, Value};

use _validator::Validator;

fn int(value: &Value) -> i64 {
	value.as_i64().unwrap_or(0)
}

#[test]
fn eager_cells_follow_their_providers() {
	let a = Cell::of(1);
	let calls = Arc::new(AtomicUsize::new(0));
	let b = Cell::new(CellOptions::new().eager(true).def({
		let a = a.clone();
		let calls = Arc::clone(&calls);
		move |_| {
			calls.fetch_add(1, Ordering::Relaxed);
			Ok(Value::Int(int(&a.get()?) + 1))
		}
	}));
	block_on(wait());
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	a.set(10);
	block_on(wait());
	assert_eq!(calls.load(Ordering::Relaxed), 2);
	assert_eq!(b.peek(), Some(Value::Int(11)));
}

#[test]
fn wait_resolves_immediately_when_idle() {
	block_on(wait());
}

#[test]
fn changed_cells_drain_before_invalidated_interiors() {
	let order = Arc::new(Validator::new());

	let a = Cell::of(1);
	let x = Cell::computed({
		let a = a.clone();
		let order = Arc::clone(&order);
		move |_| {
			order.push("x");
			Ok(Value::Int(int(&a.get()?) * 10))
		}
	});
	let z = Cell::computed({
		let x = x.clone();
		move |_| Ok(Value::Int(int(&x.get()?) + 1))
	});
	let y = Cell::new(CellOptions::new().eager(true).def({
		let order = Arc::clone(&order);
		move |_| {
			order.push("y");
			Ok(Value::Int(0))
		}
	}));
	block_on(wait());

	assert_eq!(z.get(), Ok(Value::Int(11)));
	order.expect(["y", "x"]);

	batch(|| {
		// `x` is queued through its provider (interior tier); `y` is
		// explicitly unreadied (changed tier) and must drain first.
		a.set(2);
		y.unready();
	});
	block_on(wait());
	order.expect(["y", "x"]);
}

#[test]
fn eager_failures_are_recorded_not_fatal() {
	let a = Cell::of(1);
	let boom = Cell::new(CellOptions::new().eager(true).def({
		let a = a.clone();
		move |_| {
			let _ = a.get()?;
			Err(EvalError::user("boom"))
		}
	}));
	block_on(wait());
	assert_eq!(boom.error(), Some(EvalError::user("boom")));

	// The drain survives the failure and keeps processing other work.
	a.set(2);
	block_on(wait());
	assert_eq!(boom.error(), Some(EvalError::user("boom")));
	assert_eq!(boom.get(), Err(EvalError::user("boom")));
}

#[test]
fn slice_time_is_tunable() {
	let original = slice_time();
	assert_eq!(original, Duration::from_millis(5));

	set_slice_time(Duration::from_millis(12));
	assert_eq!(slice_time(), Duration::from_millis(12));

	set_slice_time(original);
	assert_eq!(slice_time(), original);
}

#[test]
fn settle_barrier_covers_cascades() {
	let a = Cell::of(1);
	let b = Cell::new(CellOptions::new().eager(true).def({
		let a = a.clone();
		move |_| Ok(Value::Int(int(&a.get()?) * 2))
	}));
	let c = Cell::new(CellOptions::new().eager(true).def({
		let b = b.clone();
		move |_| Ok(Value::Int(int(&b.get()?) * 2))
	}));

	batch(|| {
		a.set(5);
	});
	block_on(wait());
	assert_eq!(b.peek(), Some(Value::Int(10)));
	assert_eq!(c.peek(), Some(Value::Int(20)));
}

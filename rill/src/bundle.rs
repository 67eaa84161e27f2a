use std::{
	cmp::Ordering,
	collections::BTreeMap,
	fmt::{self, Debug, Display, Formatter},
	sync::{
		atomic::{AtomicI64, Ordering as AtomicOrdering},
		Arc, RwLock,
	},
};

use headwater::EvalError;

use crate::{
	batch,
	cell::{Cell, CellOptions},
	value::Value,
	ReactiveKind,
};

/// Construction options for a [`Bundle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleOptions {
	/// Keep assigned plain maps and lists as-is instead of promoting them
	/// into nested bundles.
	pub shallow: bool,
}

enum BundleState {
	Map(BTreeMap<Arc<str>, Cell>),
	List { items: Vec<Cell>, length: Cell },
}

struct BundleInner {
	shallow: bool,
	version: AtomicI64,
	aggregate: Cell,
	state: RwLock<BundleState>,
}

/// A nested map or list made observable as member cells.
///
/// Every member is an ordinary [`Cell`]; assigned plain maps and lists are
/// promoted into nested bundles (unless `shallow`), and assigned cells are
/// wired in as member definitions so the member tracks them. The aggregate
/// cell ripples on every structural change (member addition, removal,
/// replacement and length changes), so a consumer reading it goes stale
/// whenever the bundle's shape moves.
pub struct Bundle(Arc<BundleInner>);

fn member_cell(value: Value, shallow: bool) -> Cell {
	match value {
		Value::Cell(source) => Cell::new(CellOptions::new().def_cell(&source)),
		value @ (Value::Map(_) | Value::List(_)) if !shallow => {
			Cell::of(Value::Bundle(Bundle::new(value)))
		}
		value => Cell::of(value),
	}
}

fn assign(member: &Cell, value: Value, shallow: bool) {
	match value {
		Value::Cell(source) => {
			member.adopt(&source);
		}
		value @ (Value::Map(_) | Value::List(_)) if !shallow => {
			member.set(Value::Bundle(Bundle::new(value)));
		}
		value => {
			member.set(value);
		}
	}
}

impl Bundle {
	/// Wraps a plain map or list. Anything else yields an empty map bundle.
	#[must_use]
	pub fn new(initial: impl Into<Value>) -> Self {
		Self::with_options(initial, BundleOptions::default())
	}

	/// Wraps a plain map or list with explicit options.
	#[must_use]
	pub fn with_options(initial: impl Into<Value>, options: BundleOptions) -> Self {
		match initial.into() {
			Value::Bundle(bundle) => bundle,
			Value::Map(entries) => {
				let members = entries
					.as_ref()
					.clone()
					.into_iter()
					.map(|(key, value)| (key, member_cell(value, options.shallow)))
					.collect();
				Self::from_state(BundleState::Map(members), options.shallow)
			}
			Value::List(items) => Self::from_values(items.as_ref().clone(), options.shallow),
			_ => Self::from_state(BundleState::Map(BTreeMap::new()), options.shallow),
		}
	}

	fn from_state(state: BundleState, shallow: bool) -> Self {
		Self(Arc::new(BundleInner {
			shallow,
			version: AtomicI64::new(0),
			aggregate: Cell::of(0),
			state: RwLock::new(state),
		}))
	}

	fn from_members(items: Vec<Cell>, shallow: bool) -> Self {
		let length = Cell::of(items.len());
		Self::from_state(BundleState::List { items, length }, shallow)
	}

	fn from_values(values: Vec<Value>, shallow: bool) -> Self {
		Self::from_members(
			values
				.into_iter()
				.map(|value| member_cell(value, shallow))
				.collect(),
			shallow,
		)
	}

	fn state(&self) -> std::sync::RwLockReadGuard<'_, BundleState> {
		self.0.state.read().expect("bundle state poisoned")
	}

	fn state_mut(&self) -> std::sync::RwLockWriteGuard<'_, BundleState> {
		self.0.state.write().expect("bundle state poisoned")
	}

	/// Bumps the aggregate cell; consumers reading it go stale.
	fn touch(&self) {
		let version = self.0.version.fetch_add(1, AtomicOrdering::Relaxed) + 1;
		self.0.aggregate.set(version);
	}

	fn route_index(&self, key: &str) -> Option<usize> {
		if self.is_list() {
			key.parse().ok()
		} else {
			None
		}
	}

	/// Whether this bundle wraps a list.
	#[must_use]
	pub fn is_list(&self) -> bool {
		matches!(&*self.state(), BundleState::List { .. })
	}

	/// Whether this bundle wraps a map.
	#[must_use]
	pub fn is_map(&self) -> bool {
		matches!(&*self.state(), BundleState::Map(_))
	}

	/// The reactive type tag.
	#[must_use]
	pub fn reactive_kind(&self) -> ReactiveKind {
		ReactiveKind::Bundle
	}

	/// Reads the member behind `key`: its stored value, a nested bundle,
	/// or the tracked value of a wired cell. Missing members read as
	/// `Undefined`. On list bundles, numeric keys address items and
	/// `"length"` the length cell.
	///
	/// # Errors
	///
	/// The member cell's evaluation error.
	pub fn get(&self, key: &str) -> Result<Value, EvalError> {
		let member = {
			let state = self.state();
			match &*state {
				BundleState::Map(members) => members.get(key).cloned(),
				BundleState::List { items, length } => {
					if key == "length" {
						Some(length.clone())
					} else {
						key.parse::<usize>()
							.ok()
							.and_then(|index| items.get(index).cloned())
					}
				}
			}
		};
		match member {
			Some(member) => member.get(),
			None => Ok(Value::Undefined),
		}
	}

	/// Reads the list item at `index`; `Undefined` when out of range.
	///
	/// # Errors
	///
	/// The member cell's evaluation error.
	pub fn at(&self, index: usize) -> Result<Value, EvalError> {
		let member = {
			let state = self.state();
			match &*state {
				BundleState::List { items, .. } => items.get(index).cloned(),
				BundleState::Map(_) => None,
			}
		};
		match member {
			Some(member) => member.get(),
			None => Ok(Value::Undefined),
		}
	}

	/// Assigns into the member behind `key`, creating it when absent.
	/// Plain maps and lists promote into nested bundles (unless
	/// `shallow`); cells wire in as the member's definition. Chainable.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> &Self {
		let value = value.into();
		if let Some(index) = self.route_index(key) {
			return self.set_at(index, value);
		}
		batch(|| {
			let existing = {
				let state = self.state();
				match &*state {
					BundleState::Map(members) => members.get(key).cloned(),
					BundleState::List { .. } => return,
				}
			};
			match existing {
				Some(member) => assign(&member, value, self.0.shallow),
				None => {
					let member = member_cell(value, self.0.shallow);
					if let BundleState::Map(members) = &mut *self.state_mut() {
						members.insert(key.into(), member);
					}
				}
			}
			self.touch();
		});
		self
	}

	/// Assigns into the list item at `index`, growing the list with
	/// `Undefined` items as needed. Chainable.
	pub fn set_at(&self, index: usize, value: impl Into<Value>) -> &Self {
		let value = value.into();
		batch(|| {
			let (member, length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } => {
						while items.len() <= index {
							items.push(Cell::of(Value::Undefined));
						}
						(Some(items[index].clone()), length.clone(), items.len())
					}
					BundleState::Map(_) => return,
				}
			};
			if let Some(member) = member {
				assign(&member, value, self.0.shallow);
				length.set(new_len);
				self.touch();
			}
		});
		self
	}

	/// Removes the member behind `key`; ripples the aggregate when
	/// something was actually removed.
	pub fn remove(&self, key: &str) -> bool {
		if let Some(index) = self.route_index(key) {
			return self.remove_at(index);
		}
		let removed = {
			let mut state = self.state_mut();
			match &mut *state {
				BundleState::Map(members) => members.remove(key).is_some(),
				BundleState::List { .. } => false,
			}
		};
		if removed {
			self.touch();
		}
		removed
	}

	/// Removes the list item at `index`.
	pub fn remove_at(&self, index: usize) -> bool {
		batch(|| {
			let (removed, length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } if index < items.len() => {
						let removed = items.remove(index);
						(Some(removed), Some(length.clone()), items.len())
					}
					_ => (None, None, 0),
				}
			};
			if removed.is_some() {
				if let Some(length) = length {
					length.set(new_len);
				}
				self.touch();
				true
			} else {
				false
			}
		})
	}

	/// Whether a member exists behind `key`. Reads the aggregate cell, so
	/// a tracking caller goes stale on structural changes.
	///
	/// # Errors
	///
	/// The aggregate cell's evaluation error.
	pub fn has(&self, key: &str) -> Result<bool, EvalError> {
		let _ = self.0.aggregate.get()?;
		let state = self.state();
		Ok(match &*state {
			BundleState::Map(members) => members.contains_key(key),
			BundleState::List { items, .. } => key
				.parse::<usize>()
				.is_ok_and(|index| index < items.len()),
		})
	}

	/// The member keys of a map bundle. Reads the aggregate cell.
	///
	/// # Errors
	///
	/// The aggregate cell's evaluation error.
	pub fn keys(&self) -> Result<Vec<Arc<str>>, EvalError> {
		let _ = self.0.aggregate.get()?;
		let state = self.state();
		Ok(match &*state {
			BundleState::Map(members) => members.keys().cloned().collect(),
			BundleState::List { .. } => Vec::new(),
		})
	}

	/// The member count: the tracked length of a list, or the entry count
	/// of a map (tracking the aggregate cell).
	///
	/// # Errors
	///
	/// The length or aggregate cell's evaluation error.
	pub fn len(&self) -> Result<usize, EvalError> {
		let source = {
			let state = self.state();
			match &*state {
				BundleState::List { length, .. } => Ok(length.clone()),
				BundleState::Map(members) => Err(members.len()),
			}
		};
		match source {
			Ok(length) => Ok(length
				.get()?
				.as_i64()
				.and_then(|length| length.try_into().ok())
				.unwrap_or(0)),
			Err(count) => {
				let _ = self.0.aggregate.get()?;
				Ok(count)
			}
		}
	}

	/// Whether the bundle has no members.
	///
	/// # Errors
	///
	/// The length or aggregate cell's evaluation error.
	pub fn is_empty(&self) -> Result<bool, EvalError> {
		Ok(self.len()? == 0)
	}

	/// The underlying member cell behind `key`.
	#[must_use]
	pub fn member(&self, key: &str) -> Option<Cell> {
		let state = self.state();
		match &*state {
			BundleState::Map(members) => members.get(key).cloned(),
			BundleState::List { items, length } => {
				if key == "length" {
					Some(length.clone())
				} else {
					key.parse::<usize>()
						.ok()
						.and_then(|index| items.get(index).cloned())
				}
			}
		}
	}

	/// The underlying member cell at `index`.
	#[must_use]
	pub fn member_at(&self, index: usize) -> Option<Cell> {
		let state = self.state();
		match &*state {
			BundleState::List { items, .. } => items.get(index).cloned(),
			BundleState::Map(_) => None,
		}
	}

	/// The length cell of a list bundle.
	#[must_use]
	pub fn length_cell(&self) -> Option<Cell> {
		let state = self.state();
		match &*state {
			BundleState::List { length, .. } => Some(length.clone()),
			BundleState::Map(_) => None,
		}
	}

	/// The bundle's aggregate cell; consumers reading it become stale on
	/// any structural change.
	#[must_use]
	pub fn aggregate(&self) -> Cell {
		self.0.aggregate.clone()
	}

	/// A deep, plain (non-reactive) copy of the bundle's current value.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn snapshot(&self) -> Result<Value, EvalError> {
		enum Shape {
			Map(Vec<(Arc<str>, Cell)>),
			List(Vec<Cell>),
		}
		let shape = {
			let state = self.state();
			match &*state {
				BundleState::Map(members) => Shape::Map(
					members
						.iter()
						.map(|(key, cell)| (key.clone(), cell.clone()))
						.collect(),
				),
				BundleState::List { items, .. } => Shape::List(items.clone()),
			}
		};
		match shape {
			Shape::Map(entries) => {
				let mut plain = BTreeMap::new();
				for (key, cell) in entries {
					plain.insert(key, crate::fv(&cell.get()?, true)?);
				}
				Ok(Value::Map(Arc::new(plain)))
			}
			Shape::List(items) => {
				let mut plain = Vec::with_capacity(items.len());
				for cell in items {
					plain.push(crate::fv(&cell.get()?, true)?);
				}
				Ok(Value::List(Arc::new(plain)))
			}
		}
	}

	/// The resolved member values of a list bundle, in order. Nested
	/// bundles stay bundles; the length cell is read so a tracking caller
	/// follows length changes.
	fn resolved_items(&self) -> Result<Vec<Value>, EvalError> {
		let (items, length) = {
			let state = self.state();
			match &*state {
				BundleState::List { items, length } => (items.clone(), Some(length.clone())),
				BundleState::Map(_) => (Vec::new(), None),
			}
		};
		if let Some(length) = length {
			let _ = length.get()?;
		}
		let mut values = Vec::with_capacity(items.len());
		for cell in items {
			values.push(cell.get()?);
		}
		Ok(values)
	}

	fn plain_items(&self) -> Result<Vec<Value>, EvalError> {
		self.resolved_items()?
			.iter()
			.map(|value| crate::fv(value, true))
			.collect()
	}

	/// Appends to a list bundle; returns the new length.
	pub fn push(&self, value: impl Into<Value>) -> usize {
		let value = value.into();
		batch(|| {
			let member = member_cell(value, self.0.shallow);
			let (length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } => {
						items.push(member);
						(Some(length.clone()), items.len())
					}
					BundleState::Map(_) => (None, 0),
				}
			};
			match length {
				Some(length) => {
					length.set(new_len);
					self.touch();
					new_len
				}
				None => 0,
			}
		})
	}

	/// Removes and returns the last item of a list bundle; `Undefined`
	/// when empty.
	///
	/// # Errors
	///
	/// The removed member's evaluation error.
	pub fn pop(&self) -> Result<Value, EvalError> {
		batch(|| {
			let (removed, length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } => {
						(items.pop(), Some(length.clone()), items.len())
					}
					BundleState::Map(_) => (None, None, 0),
				}
			};
			match removed {
				Some(removed) => {
					let value = removed.get()?;
					if let Some(length) = length {
						length.set(new_len);
					}
					self.touch();
					Ok(value)
				}
				None => Ok(Value::Undefined),
			}
		})
	}

	/// Removes and returns the first item of a list bundle; `Undefined`
	/// when empty.
	///
	/// # Errors
	///
	/// The removed member's evaluation error.
	pub fn shift(&self) -> Result<Value, EvalError> {
		batch(|| {
			let (removed, length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } if !items.is_empty() => {
						let removed = items.remove(0);
						(Some(removed), Some(length.clone()), items.len())
					}
					_ => (None, None, 0),
				}
			};
			match removed {
				Some(removed) => {
					let value = removed.get()?;
					if let Some(length) = length {
						length.set(new_len);
					}
					self.touch();
					Ok(value)
				}
				None => Ok(Value::Undefined),
			}
		})
	}

	/// Prepends to a list bundle; returns the new length.
	pub fn unshift(&self, value: impl Into<Value>) -> usize {
		let value = value.into();
		batch(|| {
			let member = member_cell(value, self.0.shallow);
			let (length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } => {
						items.insert(0, member);
						(Some(length.clone()), items.len())
					}
					BundleState::Map(_) => (None, 0),
				}
			};
			match length {
				Some(length) => {
					length.set(new_len);
					self.touch();
					new_len
				}
				None => 0,
			}
		})
	}

	/// Replaces `delete_count` items starting at `start` with `insert`;
	/// returns a new bundle over the removed member cells.
	pub fn splice(
		&self,
		start: usize,
		delete_count: usize,
		insert: impl IntoIterator<Item = Value>,
	) -> Bundle {
		batch(|| {
			let inserted: Vec<Cell> = insert
				.into_iter()
				.map(|value| member_cell(value, self.0.shallow))
				.collect();
			let (removed, length, new_len) = {
				let mut state = self.state_mut();
				match &mut *state {
					BundleState::List { items, length } => {
						let start = start.min(items.len());
						let end = (start + delete_count).min(items.len());
						let removed: Vec<Cell> = items.splice(start..end, inserted).collect();
						(removed, Some(length.clone()), items.len())
					}
					BundleState::Map(_) => (Vec::new(), None, 0),
				}
			};
			if let Some(length) = length {
				length.set(new_len);
				self.touch();
			}
			Bundle::from_members(removed, self.0.shallow)
		})
	}

	/// Sorts a list bundle in place by `compare` over the resolved member
	/// values. Chainable.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn sort_by(&self, compare: impl Fn(&Value, &Value) -> Ordering) -> Result<&Self, EvalError> {
		batch(|| {
			let members = {
				let state = self.state();
				match &*state {
					BundleState::List { items, .. } => items.clone(),
					BundleState::Map(_) => Vec::new(),
				}
			};
			let mut values = Vec::with_capacity(members.len());
			for member in &members {
				values.push(member.get()?);
			}
			values.sort_by(|a, b| compare(a, b));
			for (member, value) in members.iter().zip(values) {
				assign(member, value, self.0.shallow);
			}
			self.touch();
			Ok(self)
		})
	}

	/// A new bundle over `f` applied to each resolved item.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn map(&self, f: impl Fn(Value) -> Value) -> Result<Bundle, EvalError> {
		let values = self.resolved_items()?;
		Ok(Self::from_values(
			values.into_iter().map(f).collect(),
			self.0.shallow,
		))
	}

	/// A new bundle over the items `f` keeps.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn filter(&self, f: impl Fn(&Value) -> bool) -> Result<Bundle, EvalError> {
		let values = self.resolved_items()?;
		Ok(Self::from_values(
			values.into_iter().filter(|value| f(value)).collect(),
			self.0.shallow,
		))
	}

	/// A new bundle over this list's items followed by `other`'s.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn concat(&self, other: &Bundle) -> Result<Bundle, EvalError> {
		let mut values = self.resolved_items()?;
		values.extend(other.resolved_items()?);
		Ok(Self::from_values(values, self.0.shallow))
	}

	/// A new bundle with nested lists and list bundles flattened up to
	/// `depth` levels.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn flat(&self, depth: usize) -> Result<Bundle, EvalError> {
		fn flatten(values: Vec<Value>, depth: usize, out: &mut Vec<Value>) -> Result<(), EvalError> {
			for value in values {
				match value {
					Value::List(items) if depth > 0 => {
						flatten(items.as_ref().clone(), depth - 1, out)?;
					}
					Value::Bundle(bundle) if depth > 0 && bundle.is_list() => {
						flatten(bundle.resolved_items()?, depth - 1, out)?;
					}
					other => out.push(other),
				}
			}
			Ok(())
		}
		let mut out = Vec::new();
		flatten(self.resolved_items()?, depth, &mut out)?;
		Ok(Self::from_values(out, self.0.shallow))
	}

	/// [`Bundle::map`] followed by a single level of flattening.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn flat_map(&self, f: impl Fn(Value) -> Value) -> Result<Bundle, EvalError> {
		self.map(f)?.flat(1)
	}

	/// A new bundle over the items in `start..end` (to the end when `end`
	/// is `None`).
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Bundle, EvalError> {
		let values = self.resolved_items()?;
		let end = end.unwrap_or(values.len()).min(values.len());
		let start = start.min(end);
		Ok(Self::from_values(values[start..end].to_vec(), self.0.shallow))
	}

	/// The plain items joined with `separator`.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn join(&self, separator: &str) -> Result<String, EvalError> {
		let parts: Vec<String> = self
			.plain_items()?
			.iter()
			.map(ToString::to_string)
			.collect();
		Ok(parts.join(separator))
	}

	/// A new bundle over the items in reverse order.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn to_reversed(&self) -> Result<Bundle, EvalError> {
		let mut values = self.resolved_items()?;
		values.reverse();
		Ok(Self::from_values(values, self.0.shallow))
	}

	/// A new bundle over the items sorted by `compare`.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn to_sorted_by(
		&self,
		compare: impl Fn(&Value, &Value) -> Ordering,
	) -> Result<Bundle, EvalError> {
		let mut values = self.resolved_items()?;
		values.sort_by(|a, b| compare(a, b));
		Ok(Self::from_values(values, self.0.shallow))
	}

	/// A new bundle with `delete_count` items at `start` replaced by
	/// `insert`, leaving this bundle untouched.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn to_spliced(
		&self,
		start: usize,
		delete_count: usize,
		insert: impl IntoIterator<Item = Value>,
	) -> Result<Bundle, EvalError> {
		let mut values = self.resolved_items()?;
		let start = start.min(values.len());
		let end = (start + delete_count).min(values.len());
		let _: Vec<Value> = values.splice(start..end, insert).collect();
		Ok(Self::from_values(values, self.0.shallow))
	}

	/// Merges `src` into `target` in place, inside a batch.
	///
	/// Lists get set-semantics over snapshotted values: items absent from
	/// `src` are spliced out, values absent from `target` are pushed. Maps
	/// drop keys absent from `src` and assign the present ones.
	///
	/// # Errors
	///
	/// The first member evaluation error encountered.
	pub fn update(target: &Bundle, src: impl Into<Value>) -> Result<(), EvalError> {
		let src = src.into();
		batch(|| match src {
			Value::Bundle(bundle) => Self::update(target, bundle.snapshot()?),
			Value::Map(entries) => {
				let existing: Vec<Arc<str>> = {
					let state = target.state();
					match &*state {
						BundleState::Map(members) => members.keys().cloned().collect(),
						BundleState::List { .. } => return Ok(()),
					}
				};
				for key in existing {
					if !entries.contains_key(&key) {
						target.remove(&key);
					}
				}
				for (key, value) in entries.iter() {
					target.set(key, value.clone());
				}
				Ok(())
			}
			Value::List(items) => {
				let desired: Vec<Value> = items
					.iter()
					.map(|value| crate::fv(value, true))
					.collect::<Result<_, _>>()?;
				let current = target.plain_items()?;
				for index in (0..current.len()).rev() {
					if !desired.contains(&current[index]) {
						let _ = target.splice(index, 1, Vec::new());
					}
				}
				for value in desired {
					if !current.contains(&value) {
						target.push(value);
					}
				}
				Ok(())
			}
			_ => Ok(()),
		})
	}
}

impl Clone for Bundle {
	fn clone(&self) -> Self {
		Self(Arc::clone(&self.0))
	}
}

impl PartialEq for Bundle {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Bundle {}

impl Debug for Bundle {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Bundle").field(&self.0.aggregate.id()).finish()
	}
}

impl Display for Bundle {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.snapshot() {
			Ok(value) => Display::fmt(&value, f),
			Err(error) => write!(f, "<{error}>"),
		}
	}
}

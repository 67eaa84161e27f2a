use std::{collections::BTreeMap, sync::Arc};

use crate::{Bundle, Cell, Value};

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Self::Undefined
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Self::Int(value.try_into().unwrap_or(i64::MAX))
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}

impl From<Arc<str>> for Value {
	fn from(value: Arc<str>) -> Self {
		Self::Str(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(items: Vec<Value>) -> Self {
		Self::List(Arc::new(items))
	}
}

impl From<BTreeMap<Arc<str>, Value>> for Value {
	fn from(entries: BTreeMap<Arc<str>, Value>) -> Self {
		Self::Map(Arc::new(entries))
	}
}

impl From<Cell> for Value {
	fn from(cell: Cell) -> Self {
		Self::Cell(cell)
	}
}

impl From<&Cell> for Value {
	fn from(cell: &Cell) -> Self {
		Self::Cell(cell.clone())
	}
}

impl From<Bundle> for Value {
	fn from(bundle: Bundle) -> Self {
		Self::Bundle(bundle)
	}
}

impl From<&Bundle> for Value {
	fn from(bundle: &Bundle) -> Self {
		Self::Bundle(bundle.clone())
	}
}

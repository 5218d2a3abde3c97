/// The tagged union a [`Computed`](crate::Computed) stores as its output: either a value or an
/// error, never neither and never both.
///
/// Kept distinct from [`std::result::Result`] because the spec this crate implements names it
/// separately from the ambient error channel — `into_result` is the bridge for callers who just
/// want ordinary `Result` ergonomics.
#[derive(Debug, Clone)]
pub enum CResult<T, E> {
	Value(T),
	Error(E),
}

impl<T, E> CResult<T, E> {
	pub fn has_value(&self) -> bool {
		matches!(self, Self::Value(_))
	}

	pub fn has_error(&self) -> bool {
		matches!(self, Self::Error(_))
	}

	pub fn as_value(&self) -> Option<&T> {
		match self {
			Self::Value(value) => Some(value),
			Self::Error(_) => None,
		}
	}

	pub fn as_error(&self) -> Option<&E> {
		match self {
			Self::Value(_) => None,
			Self::Error(error) => Some(error),
		}
	}

	pub fn into_result(self) -> Result<T, E> {
		match self {
			Self::Value(value) => Ok(value),
			Self::Error(error) => Err(error),
		}
	}
}

impl<T, E> From<Result<T, E>> for CResult<T, E> {
	fn from(result: Result<T, E>) -> Self {
		match result {
			Ok(value) => Self::Value(value),
			Err(error) => Self::Error(error),
		}
	}
}

/// Optional hook run exactly once, immediately before a value becomes externally observable
/// through a [`Computed`](crate::Computed)'s output.
///
/// Rust has no safe way to ask "does this type implement trait X" at runtime, so the spec's
/// optional "Freezable capability, called if present" becomes an explicit bound on `TOut` here;
/// types with nothing to freeze implement it as a no-op.
pub trait Freezable {
	fn freeze(&self);
}

impl Freezable for () {
	fn freeze(&self) {}
}

macro_rules! impl_freezable_noop {
	($($ty:ty),* $(,)?) => {
		$(impl Freezable for $ty {
			fn freeze(&self) {}
		})*
	};
}

impl_freezable_noop!(bool, i32, i64, u32, u64, f32, f64, String);

impl<T: Freezable> Freezable for Vec<T> {
	fn freeze(&self) {
		for item in self {
			item.freeze();
		}
	}
}

impl<T: Freezable> Freezable for Option<T> {
	fn freeze(&self) {
		if let Some(value) = self {
			value.freeze();
		}
	}
}

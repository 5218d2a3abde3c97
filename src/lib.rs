#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
#![allow(clippy::module_name_repetitions)]

mod cancel;
pub use cancel::{cancel_pair, CancelHandle, CancelToken};

mod clock;
pub use clock::{Clock, Moment};

mod computed;
pub use computed::Computed;

mod context;
pub use context::{CallFlags, ComputeContext, ContextScope};

mod current;
pub use current::{current_computation, enter_computation, ComputationGuard};

mod error;
pub use error::WrongState;

mod function;
pub use function::{AnyComputed, ComputedInput, DependentKey, Function, KeyIdentity, NodeState};

mod ltag;
pub use ltag::LTag;

mod options;
pub use options::ComputedOptions;

mod result;
pub use result::{CResult, Freezable};

//! Download readiness: decides whether the derived output for an uploaded
//! object can be fetched yet.

mod clock;
mod error;
mod resolver;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ResolveError, ResolveResult};
pub use resolver::{DownloadReadinessResolver, ReadinessConfig};

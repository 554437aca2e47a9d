//! One [`Producer`](crate::Producer) per metric family.

mod compute;
mod flavors;
mod hypervisors;
mod limits;
mod servers;
mod services;
mod usage;

pub use compute::{AvailabilityZones, SecurityGroups};
pub use flavors::Flavors;
pub use hypervisors::Hypervisors;
pub use limits::ComputeLimits;
pub use servers::{Servers, UNKNOWN_STATUS, status_ordinal};
pub use services::AgentState;
pub use usage::ServerUsage;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

//! Mock implementations of the remote collaborators

pub mod network;
pub mod transport;

pub use network::MockNetworkPolicy;
pub use transport::{MockTransport, RecordedCall, RecordedOp};

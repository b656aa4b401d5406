//! Mastership Oracle collaborator and local role tracking.
//!
//! Cluster-wide mutual exclusion per device is this module's concern:
//!
//! - At any moment, at most one node may administer a device.
//! - The term generation strictly increases on every master change and is
//!   carried by every inventory write as a fencing token.
//! - Authority comes from the oracle, never inferred locally; local role
//!   state only mirrors what the oracle granted.
//!
//! The election algorithm itself is external. [`InMemoryOracle`] stands in
//! for it in standalone mode and in multi-node tests.

mod clock;
mod errors;
mod oracle;
mod role;
mod term;

pub use clock::TermClock;
pub use errors::{MastershipError, MastershipResult};
pub use oracle::{InMemoryOracle, MastershipOracle, OracleView, UnavailableOracle};
pub use role::{MastershipRole, RoleChange, RoleTable};
pub use term::{MastershipEvent, MastershipTerm};

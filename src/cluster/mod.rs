//! Cluster Storage collaborator.
//!
//! The inventory is replicated through keyed tables with eventually
//! consistent, last-writer-wins semantics:
//!
//! - Writers supply a `(term, tick)` [`Timestamp`] with every mutation.
//! - A stored entry is only ever replaced by a strictly newer timestamp,
//!   which fences writers holding a stale mastership term at the storage
//!   layer itself.
//! - Removals leave tombstones so merge order stays well-defined for
//!   delete/update races.
//! - Remote replica state enters through explicit merge calls; the
//!   transport/consensus substrate is out of scope.

mod errors;
mod map;
mod node;
mod timestamp;

pub use errors::{ClusterError, ClusterResult};
pub use map::{ChangeListener, EcMap, MapChange, Origin, Versioned, WriteResult};
pub use node::NodeId;
pub use timestamp::Timestamp;

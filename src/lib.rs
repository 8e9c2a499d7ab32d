pub mod config;
pub mod error;
pub mod membership;
pub mod registry;
pub mod selector;

pub use error::{MembershipError, Result};
pub use membership::{LakeMembership, MembershipService, Worker, WorkerGroupId, WorkerId};

pub mod builder;
pub mod role;

pub use builder::build_candidates;
pub use role::{is_private_address, Role, RoleDescriptor};

pub mod pingpong;
pub mod verify;

pub use pingpong::{HttpProber, Prober};
pub use verify::{server_id_digest, verify_identity};

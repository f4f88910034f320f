use md5::{Digest, Md5};

/// The identity token a genuine server returns as `ezid`:
/// the lowercase hex MD5 of its server ID.
pub fn server_id_digest(server_id: &str) -> String {
    hex::encode(Md5::digest(server_id.as_bytes()))
}

pub fn verify_identity(server_id: &str, ezid: &str) -> bool {
    server_id_digest(server_id) == ezid
}

//! Authentication messages.
//!
//! Only the `trust` (no response needed), cleartext-password and MD5 methods
//! are implemented; `scram-sha-256` is a non-goal (see DESIGN.md).

use crate::protocol::codec::MessageBuilder;

/// Write a PasswordMessage (cleartext or MD5-hashed password).
pub fn write_password(buf: &mut Vec<u8>, password: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.write_cstr(password);
    msg.finish();
}

/// Compute the MD5 password response: `"md5" + hex(md5(hex(md5(password + username)) + salt))`.
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    let first_hash_hex = format!("{:x}", hasher.finalize());

    let mut hasher = Md5::new();
    hasher.update(first_hash_hex.as_bytes());
    hasher.update(salt);
    format!("md5{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_password_has_expected_shape() {
        let result = md5_password("postgres", "password", &[0x01, 0x02, 0x03, 0x04]);
        assert!(result.starts_with("md5"));
        assert_eq!(result.len(), 35); // "md5" + 32 hex chars
    }

    #[test]
    fn md5_password_is_deterministic() {
        let salt = [0xaa, 0xbb, 0xcc, 0xdd];
        let a = md5_password("alice", "hunter2", &salt);
        let b = md5_password("alice", "hunter2", &salt);
        assert_eq!(a, b);
    }

    #[test]
    fn password_message_is_null_terminated() {
        let mut buf = Vec::new();
        write_password(&mut buf, "secret");
        assert_eq!(buf[0], b'p');
        assert!(buf.ends_with(&[0]));
    }
}

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::constants::{INVITE_PREFIX_LEN, INVITE_RANDOM_BYTES};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a fresh group invite link token.
///
/// The token is a fixed-width base36 millisecond timestamp followed by
/// random base64url characters. Callers that need a hard uniqueness
/// guarantee must still check the token against existing links.
pub fn generate_invite_link() -> String {
    generate_at(Utc::now())
}

fn generate_at(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;

    let mut random = [0u8; INVITE_RANDOM_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut random);

    let mut token = encode_base36(millis, INVITE_PREFIX_LEN);
    token.push_str(&URL_SAFE_NO_PAD.encode(random));
    token
}

fn encode_base36(mut value: u64, width: usize) -> String {
    let mut digits = Vec::with_capacity(width);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

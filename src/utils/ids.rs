//! Locally generated identifiers for conversations and messages.

use chrono::Utc;

/// Returns a short, time-prefixed random identifier (`<millis base36><hex>`).
///
/// Falls back to the timestamp alone if the OS entropy source is unavailable.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().unsigned_abs();
    let mut id = to_base36(millis);

    let mut random = [0_u8; 6];
    if getrandom::fill(&mut random).is_ok() {
        for byte in random {
            id.push_str(&format!("{byte:02x}"));
        }
    }
    id
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

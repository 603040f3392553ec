// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! Session token generation.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Token size in bytes (32 bytes = 256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Generate an unguessable session token from OS entropy, encoded as
/// URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut buffer = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Signing key used when `SECRET_KEY` is absent outside strict mode.
/// Tokens minted by the host will not verify against it.
pub(super) fn ephemeral_secret_key() -> String {
    tracing::warn!("SECRET_KEY is not set; using an ephemeral signing key");

    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

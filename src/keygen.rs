//! License key and device ID generation.
//!
//! License keys are `XXXX-XXXX-XXXX-XXXX` over an unambiguous alphabet
//! (no I/O/0/1) picked with OS entropy. Uniqueness is enforced by the
//! caller against the license store (retry-on-collision loop in
//! `db::queries::create_license`).
//!
//! Device IDs are a one-way SHA-256 over a canonicalized hardware
//! descriptor, truncated to 32 hex chars: the same machine always maps to
//! the same ID and the hash is not reversible to hardware details.

use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::models::HardwareInfo;

/// Unambiguous uppercase alphanumerics: I, O, 0, 1 excluded.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of hex chars in a device ID (SHA-256 truncated to 128 bits).
pub const DEVICE_ID_LEN: usize = 32;

/// Generate a license key candidate in `XXXX-XXXX-XXXX-XXXX` form.
pub fn generate_license_key() -> String {
    let mut rng = OsRng;

    let mut group = || -> String {
        (0..4)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect()
    };

    format!("{}-{}-{}-{}", group(), group(), group(), group())
}

/// Check the `^[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}$` format.
///
/// Deliberately wider than the generation alphabet: keys issued before the
/// alphabet was narrowed must keep validating.
pub fn is_valid_license_key(key: &str) -> bool {
    let groups: Vec<&str> = key.split('-').collect();
    groups.len() == 4
        && groups.iter().all(|g| {
            g.len() == 4
                && g.chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
}

/// A device ID is exactly 32 lowercase hex chars.
pub fn is_valid_device_id(id: &str) -> bool {
    id.len() == DEVICE_ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Derive the stable device ID from a hardware descriptor bundle.
///
/// The descriptor is canonicalized (fixed field order, trimmed, lowercased)
/// before hashing so serialization quirks on the client can never change
/// the identity of a machine. The hostname is display-only and excluded.
pub fn device_id_from_hardware(hardware: &HardwareInfo) -> String {
    let canonical = format!(
        "serial={}|hwuuid={}|disk={}|model={}",
        canonicalize(&hardware.serial_number),
        canonicalize(&hardware.hardware_uuid),
        canonicalize(hardware.disk_uuid.as_deref().unwrap_or("")),
        canonicalize(hardware.model.as_deref().unwrap_or("")),
    );

    let mut hasher = Sha256::new();
    hasher.update(b"supasidebar-device-v1:");
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();

    hex::encode(&digest[..DEVICE_ID_LEN / 2])
}

fn canonicalize(value: &str) -> String {
    value.trim().to_lowercase()
}

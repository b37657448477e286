//! # Vault Demo
//!
//! Wraps a key pair under a password, shows both blob formats, and
//! upgrades a legacy blob to Argon2id with a password change.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example vault_demo
//! ```

use hush_core::crypto::generate_key_pair;
use hush_core::{Error, Vault, VaultConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush_core=debug".into()),
        )
        .init();

    println!("=== Hush Core: Key-At-Rest Vault Demo ===\n");

    let pair = generate_key_pair();
    println!("Key pair fingerprint: {}\n", pair.public_keys().fingerprint());

    // Step 1: Legacy blob, readable by tweetnacl clients
    println!("Step 1: Wrapping with the legacy SHA-512 derivation...");

    let legacy = Vault::new(VaultConfig::legacy());
    let legacy_blob = legacy
        .wrap_key_pair_bundle(&pair, "old password")
        .expect("Failed to wrap");
    println!("  Blob: {}...", &legacy_blob[..64.min(legacy_blob.len())]);
    println!();

    // Step 2: Wrong password
    println!("Step 2: Unlocking with the wrong password...");

    match legacy.unwrap_key_pair_bundle(&legacy_blob, "guess") {
        Err(Error::UnwrapFailed) => println!("  [OK] Rejected: wrong password or corrupted data"),
        Err(e) => println!("  [UNEXPECTED] {}", e),
        Ok(_) => println!("  [FAILED] Wrong password accepted!"),
    }
    println!();

    // Step 3: Password change upgrades the blob
    println!("Step 3: Changing password (re-wraps with Argon2id)...");

    let vault = Vault::default();
    let new_blob = vault
        .rewrap_bundle(&legacy_blob, "old password", "new password")
        .expect("Failed to re-wrap");
    let header: Vec<&str> = new_blob.splitn(5, '$').take(4).collect();
    println!("  Header: {}", header.join("$"));

    let restored = vault
        .unwrap_key_pair_bundle(&new_blob, "new password")
        .expect("Failed to unwrap");
    println!(
        "  Restored fingerprint matches: {}",
        restored.public_keys() == pair.public_keys()
    );
    println!();

    println!("=== Demo Complete ===");
}

// pwm - A single-user command-line password vault.
//
// Encryption: ChaCha20-Poly1305 under per-message derived keys
// Key Derivation: Argon2id
// Storage: fixed-size records under $HOME/PwmStore, filenames derived
// from the master password

use std::process;

fn main() {
    if let Err(e) = pwm::cli::run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

//! Keygen command implementation.

use otanode_protocol::{SharedSecret, SECRET_LEN};
use rand::RngCore;
use std::fs;
use std::path::Path;

/// Generates a fresh random secret.
pub fn generate() -> SharedSecret {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    SharedSecret::new(bytes)
}

/// Runs the keygen command.
pub fn run(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let secret = generate();
    match output {
        Some(path) => {
            if path.exists() {
                return Err(format!("Refusing to overwrite {:?}", path).into());
            }
            fs::write(path, format!("{}\n", secret.to_hex()))?;
            println!("Wrote secret to {:?}", path);
        }
        None => println!("{}", secret.to_hex()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_secret_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ota_secret");
        run(Some(&path)).unwrap();

        let contents = fs::read(&path).unwrap();
        let secret = SharedSecret::from_file_contents(&contents).unwrap();
        assert_eq!(secret.to_hex().len(), 64);
        assert!(run(Some(&path)).is_err());
    }

    #[test]
    fn secrets_differ() {
        assert_ne!(generate().to_hex(), generate().to_hex());
    }
}

//! Hashing and key generation

use anyhow::{bail, Result};

use super::read_input;
use crate::cli::{HashArgs, KeygenArgs};
use crate::output;

pub async fn hash(args: HashArgs) -> Result<()> {
    let data = read_input(&args.file).await?;
    let digest = dataroom_crypto::hash(&data);

    match args.expect.as_deref() {
        Some(expected) if !dataroom_crypto::verify_hash(&data, expected) => {
            bail!("Hash mismatch for {}: expected {}, got {}", args.file, expected, digest)
        }
        Some(_) => output::success(&format!("{} matches", args.file)),
        None => println!("{}  {}", digest, args.file),
    }
    Ok(())
}

pub fn keygen(args: KeygenArgs) -> Result<()> {
    let key = dataroom_crypto::generate_key();
    if args.export {
        println!("export {}={}", dataroom_crypto::envelope::ENCRYPTION_KEY_ENV, key);
    } else {
        println!("{}", key);
    }
    Ok(())
}

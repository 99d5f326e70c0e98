//! Generate an Ed25519 key pair for a provider.
//!
//! Writes `<out-dir>/private.key` (PKCS#8 DER) and `<out-dir>/<provider>`
//! (raw public key), matching the layout read by the `file_system` key
//! settings, then prints a sample token signed with the new keys.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use signed_auth::{generate_key_pair, Policy, Protocol, SystemClock};

#[derive(Parser, Debug)]
#[command(about = "Generate signing keys for token authentication")]
struct Args {
    /// Provider name the public key is stored under.
    #[arg(long, default_value = "Test")]
    provider: String,

    /// Directory receiving the key files.
    #[arg(long, default_value = "/tmp")]
    out_dir: PathBuf,

    /// Username for the sample token.
    #[arg(long, default_value = "user")]
    username: String,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let pair = generate_key_pair()?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let private_path = args.out_dir.join("private.key");
    let public_path = args.out_dir.join(&args.provider);
    std::fs::write(&private_path, &pair.pkcs8)
        .with_context(|| format!("Failed to write {}", private_path.display()))?;
    std::fs::write(&public_path, &pair.public_key)
        .with_context(|| format!("Failed to write {}", public_path.display()))?;

    println!("public.key\n{}\n", pair.public_key_base64());
    println!("private.key\n{}\n", pair.private_key_base64());

    let keys = pair.into_provider(&args.provider)?;
    let protocol = Protocol::new(
        Arc::new(keys),
        Policy::new(args.provider.as_str()),
        Arc::new(SystemClock),
    );
    let sample = protocol.issue_for(&args.username)?;
    println!("{}", sample.token);

    Ok(())
}

//! Build script for karaoke.
//!
//! Copies the `.env.example` template from the crate root into the local data
//! directory, next to where `karaoke` looks for its `.env` file:
//! - Linux: `~/.local/share/karaoke/.env.example`
//! - macOS: `~/Library/Application Support/karaoke/.env.example`
//! - Windows: `%LOCALAPPDATA%/karaoke/.env.example`
//!
//! A missing template only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let template = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("karaoke");

    if !template.is_file() {
        println!("cargo:warning=.env.example not found at {}", template.display());
        return Ok(());
    }

    fs::create_dir_all(&out_dir)?;
    fs::copy(&template, out_dir.join(".env.example"))?;
    Ok(())
}

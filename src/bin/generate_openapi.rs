//! Generates `openapi.json` from the compiled OpenAPI spec.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json

use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
};

use air_station_service::api::handlers::ApiDoc;
use anyhow::{Context, Result};
use utoipa::OpenApi;

fn main() -> Result<()> {
    let doc = ApiDoc::openapi();
    let path_count = doc.paths.paths.len();
    let json = doc
        .to_pretty_json()
        .context("failed to serialise OpenAPI spec")?;

    // Parse optional `--output <path>` argument.
    let output_path: Option<PathBuf> = env::args()
        .collect::<Vec<_>>()
        .windows(2)
        .find(|w| w[0] == "--output")
        .map(|w| PathBuf::from(&w[1]));

    match output_path {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("OpenAPI spec ({path_count} paths) written to {}", path.display());
        }
        None => io::stdout()
            .write_all(json.as_bytes())
            .context("failed to write to stdout")?,
    }

    Ok(())
}

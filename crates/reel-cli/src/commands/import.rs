use std::path::Path;

use reel_core::backup::parse_backup;

use crate::commands::common::{open_state, Context};
use crate::error::CliError;

pub async fn run_import(ctx: &Context, path: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;
    let incoming = parse_backup(&raw)?;

    let state = open_state(&ctx.db_path).await?;
    let report = state.import(&incoming).await?;

    println!("{}: {report}", path.display());
    Ok(())
}

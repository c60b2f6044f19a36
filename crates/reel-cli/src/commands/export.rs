use std::path::{Path, PathBuf};

use reel_core::backup::{render_backup, suggested_backup_file_name, BackupFormat};
use reel_core::util::unix_millis_now;

use crate::cli::ExportFormat;
use crate::commands::common::{open_state, Context};
use crate::error::CliError;

pub const fn backup_format(format: ExportFormat) -> BackupFormat {
    match format {
        ExportFormat::Json => BackupFormat::Json,
        ExportFormat::Markdown => BackupFormat::Markdown,
    }
}

/// A directory target gets a generated file name inside it
pub fn resolve_output_path(path: &Path, format: BackupFormat, timestamp_ms: i64) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_backup_file_name(format, timestamp_ms))
    } else {
        path.to_path_buf()
    }
}

pub async fn run_export(
    ctx: &Context,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let state = open_state(&ctx.db_path).await?;
    let document = state.document();
    let format = backup_format(format);
    let now_ms = unix_millis_now();
    let rendered = render_backup(&document, format, now_ms)?;

    if let Some(path) = output_path {
        let path = resolve_output_path(path, format, now_ms);
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

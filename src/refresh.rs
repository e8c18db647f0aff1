use std::process::{Command, Stdio};
use crate::error::{Error, Result};
use log::{info, warn};

/// Runs the desktop-database refresh command (`argv[0]` plus arguments).
pub fn run_refresh(argv: &[String]) -> Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Refresh(format!("{program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Refresh(format!("{program} {}: {}", output.status, stderr.trim())));
    }
    Ok(())
}

/// Refreshes the desktop database, logging failures instead of returning them.
pub fn refresh_desktop_database(argv: &[String]) {
    if argv.is_empty() {
        return;
    }
    match run_refresh(argv) {
        Ok(()) => info!("Updated desktop database"),
        Err(e) => warn!("Failed to update desktop database: {}", e),
    }
}

use anyhow::{Context, Result};
use appimage_desktop::cli::{init_logging, CommonArgs};
use appimage_desktop::generator::Generator;
use appimage_desktop::watcher::{BundleWatcher, WatchEvent};
use clap::Parser;
use log::{error, info};
use std::time::Duration;

/// Watch a directory and generate desktop entries for new AppImages.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Process the bundles already present before watching
    #[arg(long)]
    scan_first: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.common.verbose);

    // 1. Config
    let config = args.common.resolve_config()?;
    let generator = Generator::new(&config);
    info!("Starting AppImage monitor");
    info!("Desktop files: {:?}", config.paths.applications_dir);

    // 2. Subscribe before any initial pass so nothing created meanwhile is missed
    let watcher = BundleWatcher::new(generator.source_dir())?;
    let shutdown = watcher.sender();
    ctrlc::set_handler(move || {
        let _ = shutdown.send(WatchEvent::Shutdown);
    })
    .context("installing interrupt handler")?;

    if args.scan_first || config.watch.scan_on_start {
        generator.run_batch()?;
    }

    // 3. Run the queue until interrupted
    watcher.run(Duration::from_millis(config.watch.settle_ms), |path| {
        if let Err(e) = generator.process_path(path) {
            error!("Error generating desktop file for {:?}: {}", path, e);
        }
    });

    Ok(())
}

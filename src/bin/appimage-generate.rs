use anyhow::Result;
use appimage_desktop::cli::{init_logging, CommonArgs};
use appimage_desktop::generator::Generator;
use clap::Parser;

/// Generate desktop entries and icons for every AppImage in a directory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.common.verbose);

    let config = args.common.resolve_config()?;
    let generator = Generator::new(&config);
    let report = generator.run_batch()?;

    for (path, reason) in &report.failed {
        log::warn!("Skipped {:?}: {}", path, reason);
    }
    Ok(())
}

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use mfs::driver::file_drive::FileDrive;
use mfs::structure::superblock::SuperBlock;
use mfs::FS;

#[derive(Parser, Debug)]
#[command(name = "mfs-mkfs", about = "Create an empty mfs image")]
struct Cli {
    /// Path of the image to create. Must not exist yet.
    image: PathBuf,

    /// Number of inodes, root included.
    #[arg(short = 'i', long, default_value_t = 32)]
    inodes: i32,

    /// Number of data blocks.
    #[arg(short = 'd', long, default_value_t = 32)]
    data_blocks: i32,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let layout = SuperBlock::new(cli.inodes, cli.data_blocks);
    let drive = FileDrive::create(&cli.image, layout.total_blocks())
        .with_context(|| format!("creating {}", cli.image.display()))?;
    FS::format(drive, cli.inodes, cli.data_blocks).context("formatting image")?;

    info!("{}: {:?}", cli.image.display(), layout);
    Ok(())
}

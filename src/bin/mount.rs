use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fuser::MountOption;
use log::info;

use mfs::fuse::FuseDriver;
use mfs::MfsClient;

#[derive(Parser, Debug)]
#[command(name = "mfs-mount", about = "Mount a remote mfs image through FUSE")]
struct Cli {
    host: String,
    port: u16,
    mountpoint: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let client = MfsClient::connect(&cli.host, cli.port)
        .with_context(|| format!("connecting to {}:{}", cli.host, cli.port))?;
    info!("mounting {} on {}", client.server_addr(), cli.mountpoint.display());

    let options = [MountOption::FSName("mfs".to_string()), MountOption::DefaultPermissions];
    fuser::mount2(FuseDriver::new(client), &cli.mountpoint, &options)
        .with_context(|| format!("mounting {}", cli.mountpoint.display()))?;
    Ok(())
}

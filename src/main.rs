use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use mfs::driver::file_drive::FileDrive;
use mfs::server::Server;
use mfs::FS;

#[derive(Parser, Debug)]
#[command(name = "mfs-server", about = "Serve an mfs image over UDP")]
struct Cli {
    /// UDP port to listen on.
    port: u16,

    /// File system image, as produced by mfs-mkfs.
    image: PathBuf,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

extern "C" fn on_interrupt(_signal: libc::c_int) {
    // no flush: anything since the last shutdown is dropped
    unsafe { libc::_exit(130) };
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let drive = FileDrive::open(&cli.image).with_context(|| format!("opening {}", cli.image.display()))?;
    let fs = FS::mount(drive).with_context(|| format!("mounting {}", cli.image.display()))?;
    let server = Server::bind((cli.bind.as_str(), cli.port), fs)
        .with_context(|| format!("binding {}:{}", cli.bind, cli.port))?;

    unsafe {
        libc::signal(libc::SIGINT, on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t);
    }

    server.run().context("serving requests")?;
    info!("exiting");
    Ok(())
}

use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tempfile::TempDir;

use mfs::driver::file_drive::FileDrive;
use mfs::server::Server;
use mfs::structure::superblock::SuperBlock;
use mfs::{ClientConfig, Error, InodeKind, MfsClient, FS};

fn start(image: &Path) -> (MfsClient, JoinHandle<FS<FileDrive>>) {
    let fs = FS::mount(FileDrive::open(image).unwrap()).unwrap();
    let server = Server::bind("127.0.0.1:0", fs).unwrap();
    let port = server.local_addr().unwrap().port();
    let handle = thread::spawn(move || server.run().unwrap());
    let config = ClientConfig { timeout: Duration::from_millis(500), max_attempts: 5 };
    (MfsClient::with_config("127.0.0.1", port, config).unwrap(), handle)
}

fn image(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("remote.img");
    let drive = FileDrive::create(&path, SuperBlock::new(32, 32).total_blocks()).unwrap();
    FS::format(drive, 32, 32).unwrap();
    path
}

#[test]
fn file_round_trip() {
    let dir = TempDir::new().unwrap();
    let (client, server) = start(&image(&dir));

    client.ping().unwrap();
    let file = client.create(0, InodeKind::File, "a.txt").unwrap();
    assert_eq!(file, 1);
    assert_eq!(client.lookup(0, "a.txt").unwrap(), file);

    client.write(file, b"hello", 0, 5).unwrap();
    assert_eq!(&client.read(file, 0, 5).unwrap()[..5], b"hello");
    let stat = client.stat(file).unwrap();
    assert_eq!((stat.size, stat.kind), (5, InodeKind::File));

    client.unlink(0, "a.txt").unwrap();
    assert!(matches!(client.lookup(0, "a.txt"), Err(Error::NotFound)));
    assert_eq!(client.stat(file).unwrap().kind, InodeKind::Unused);

    client.shutdown().unwrap();
    server.join().unwrap();
}

#[test]
fn directories() {
    let dir = TempDir::new().unwrap();
    let (client, server) = start(&image(&dir));

    let sub = client.create(0, InodeKind::Directory, "sub").unwrap();
    assert_eq!(client.lookup(sub, ".").unwrap(), sub);
    assert_eq!(client.lookup(sub, "..").unwrap(), 0);
    assert_eq!(client.stat(sub).unwrap().size, 64);

    client.create(sub, InodeKind::File, "inner").unwrap();
    assert!(matches!(client.unlink(0, "sub"), Err(Error::Rejected(_))));
    assert!(matches!(client.create(0, InodeKind::File, "sub"), Err(Error::Rejected(_))));
    assert!(matches!(client.write(sub, b"x", 0, 1), Err(Error::Rejected(_))));

    client.unlink(sub, "inner").unwrap();
    client.unlink(0, "sub").unwrap();
    assert!(matches!(client.lookup(0, "sub"), Err(Error::NotFound)));

    client.shutdown().unwrap();
    server.join().unwrap();
}

#[test]
fn shutdown_persists_image() {
    let dir = TempDir::new().unwrap();
    let path = image(&dir);

    let (client, server) = start(&path);
    let file = client.create(0, InodeKind::File, "kept").unwrap();
    client.write(file, b"persisted", 4096, 9).unwrap();
    client.shutdown().unwrap();
    server.join().unwrap();

    let (client, server) = start(&path);
    assert_eq!(client.lookup(0, "kept").unwrap(), file);
    assert_eq!(&client.read(file, 4096, 9).unwrap()[..9], b"persisted");
    assert_eq!(client.stat(file).unwrap().size, 9);
    client.shutdown().unwrap();
    server.join().unwrap();
}

#[test]
fn stopped_server_times_out() {
    let dir = TempDir::new().unwrap();
    let (client, server) = start(&image(&dir));
    client.shutdown().unwrap();
    server.join().unwrap();

    let config = ClientConfig { timeout: Duration::from_millis(50), max_attempts: 3 };
    let port = client.server_addr().port();
    let client = MfsClient::with_config("127.0.0.1", port, config).unwrap();
    assert!(matches!(client.ping(), Err(Error::Timeout { attempts: 3 })));
}

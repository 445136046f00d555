use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::consts::{BlockPointer, BLOCK_SIZE};
use crate::driver::DeviceDriver;
use crate::util::error::{Error, Result};

pub struct FileDrive {
    file: File,
    pub bytes: u64,
}

impl FileDrive {
    /// Creates a fresh zero-filled image of `block_count` blocks.
    pub fn create<P: AsRef<Path>>(path: P, block_count: u64) -> Result<FileDrive> {
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(path)?;
        let bytes = block_count * BLOCK_SIZE as u64;
        file.set_len(bytes)?;
        Ok(FileDrive { file, bytes })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileDrive> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let bytes = file.metadata()?.len();
        Ok(FileDrive { file, bytes })
    }

    fn check_index(&self, index: BlockPointer) -> Result<()> {
        if index as u64 >= self.get_block_count() {
            return Err(Error::CorruptImage(format!(
                "block {} is past the end of the image ({} blocks)",
                index,
                self.get_block_count()
            )));
        }
        Ok(())
    }
}

impl DeviceDriver for FileDrive {
    fn get_block_count(&self) -> u64 {
        self.bytes / BLOCK_SIZE as u64
    }

    fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>> {
        self.check_index(index)?;
        let mut buffer = vec![0; BLOCK_SIZE];
        self.file.read_exact_at(&mut buffer, index as u64 * BLOCK_SIZE as u64)?;
        Ok(buffer)
    }

    fn write_block(&mut self, index: BlockPointer, data: &[u8]) -> Result<()> {
        if data.len() != BLOCK_SIZE {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block size mismatch: expected {}, got {}", BLOCK_SIZE, data.len()),
            )));
        }
        self.check_index(index)?;
        self.file.write_all_at(data, index as u64 * BLOCK_SIZE as u64)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::FileDrive;
    use crate::consts::BLOCK_SIZE;
    use crate::driver::DeviceDriver;

    #[test]
    fn read_write_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drive.img");
        let mut drive = FileDrive::create(&path, 16).unwrap();

        let block0 = vec![0x42; BLOCK_SIZE];
        let block15 = vec![0x52; BLOCK_SIZE];
        drive.write_block(0, &block0).unwrap();
        drive.write_block(15, &block15).unwrap();
        drive.sync().unwrap();

        assert_eq!(drive.get_block_count(), 16);
        assert_eq!(drive.read_block(0).unwrap(), block0);
        assert_eq!(drive.read_block(15).unwrap(), block15);
        assert_eq!(drive.read_block(7).unwrap(), vec![0; BLOCK_SIZE]);

        let reopened = FileDrive::open(&path).unwrap();
        assert_eq!(reopened.read_block(15).unwrap(), block15);
    }

    #[test]
    fn out_of_range() {
        let dir = TempDir::new().unwrap();
        let mut drive = FileDrive::create(dir.path().join("small.img"), 4).unwrap();
        assert!(drive.read_block(4).is_err());
        assert!(drive.write_block(9, &vec![0; BLOCK_SIZE]).is_err());
    }

    #[test]
    fn partial_block_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut drive = FileDrive::create(dir.path().join("partial.img"), 4).unwrap();
        assert!(drive.write_block(1, &[0x11; 100]).is_err());
        assert!(drive.write_block(1, &vec![0x11; BLOCK_SIZE + 1]).is_err());
        assert_eq!(drive.read_block(1).unwrap(), vec![0; BLOCK_SIZE]);
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("twice.img");
        FileDrive::create(&path, 4).unwrap();
        assert!(FileDrive::create(&path, 4).is_err());
    }
}

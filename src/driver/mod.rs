pub mod file_drive;

use crate::consts::BlockPointer;
use crate::util::error::Result;

/// Block-granular access to the backing image.
pub trait DeviceDriver {
    fn get_block_count(&self) -> u64;
    fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>>;
    fn write_block(&mut self, index: BlockPointer, data: &[u8]) -> Result<()>;
    /// Force everything written so far to durable storage.
    fn sync(&mut self) -> Result<()>;
}

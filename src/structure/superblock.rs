use crate::consts::{BlockPointer, BLOCK_SIZE, INODES_PER_BLOCK, SUPERBLOCK_ADDR};
use crate::driver::DeviceDriver;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_i32, ByteSerializable, KnownSize};

const FIELD_COUNT: usize = 10;
const BITS_PER_BLOCK: i32 = (BLOCK_SIZE * 8) as i32;

/// Layout description stored in block 0. Immutable once the image is mounted.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SuperBlock {
    pub inode_bitmap_addr: i32,
    pub inode_bitmap_len: i32,
    pub data_bitmap_addr: i32,
    pub data_bitmap_len: i32,
    pub inode_region_addr: i32,
    pub inode_region_len: i32,
    pub data_region_addr: i32,
    pub data_region_len: i32,
    pub num_inodes: i32,
    pub num_data: i32,
}

impl SuperBlock {
    /// Lays out superblock, inode bitmap, data bitmap, inode region and data
    /// region back to back.
    pub fn new(num_inodes: i32, num_data: i32) -> SuperBlock {
        let inode_region_len = (num_inodes + INODES_PER_BLOCK as i32 - 1) / INODES_PER_BLOCK as i32;
        SuperBlock {
            inode_bitmap_addr: 1,
            inode_bitmap_len: 1,
            data_bitmap_addr: 2,
            data_bitmap_len: 1,
            inode_region_addr: 3,
            inode_region_len,
            data_region_addr: 3 + inode_region_len,
            data_region_len: num_data,
            num_inodes,
            num_data,
        }
    }

    pub fn total_blocks(&self) -> u64 {
        (self.data_region_addr + self.data_region_len) as u64
    }

    pub fn read<A: DeviceDriver>(device: &A) -> Result<SuperBlock> {
        let block = device.read_block(SUPERBLOCK_ADDR)?;
        let superblock = SuperBlock::from_bytes(&block)?;
        superblock.validate(device.get_block_count())?;
        Ok(superblock)
    }

    pub fn write<A: DeviceDriver>(&self, device: &mut A) -> Result<()> {
        let mut buffer = self.to_bytes();
        buffer.resize(BLOCK_SIZE, 0);
        device.write_block(SUPERBLOCK_ADDR, &buffer)
    }

    pub fn inode_bitmap_block(&self) -> BlockPointer {
        self.inode_bitmap_addr as BlockPointer
    }

    pub fn data_bitmap_block(&self) -> BlockPointer {
        self.data_bitmap_addr as BlockPointer
    }

    pub fn inode_region_block(&self, i: usize) -> BlockPointer {
        (self.inode_region_addr as usize + i) as BlockPointer
    }

    pub fn data_region_block(&self, i: usize) -> BlockPointer {
        (self.data_region_addr as usize + i) as BlockPointer
    }

    fn validate(&self, device_blocks: u64) -> Result<()> {
        let corrupt = |what: &str| Err(Error::CorruptImage(what.to_string()));

        if self.num_inodes <= 0 || self.num_data <= 0 {
            return corrupt("inode and data counts must be positive");
        }
        if self.num_inodes > BITS_PER_BLOCK || self.num_data > BITS_PER_BLOCK {
            return corrupt("bitmap does not fit in a single block");
        }
        if self.inode_region_len < 0 || self.inode_region_len as i64 * (INODES_PER_BLOCK as i64) < self.num_inodes as i64 {
            return corrupt("inode region too small for inode count");
        }
        if self.data_region_len < self.num_data {
            return corrupt("data region too small for data block count");
        }

        let regions = [
            ("inode bitmap", self.inode_bitmap_addr, 1),
            ("data bitmap", self.data_bitmap_addr, 1),
            ("inode region", self.inode_region_addr, self.inode_region_len),
            ("data region", self.data_region_addr, self.num_data),
        ];
        for (name, addr, len) in regions {
            if addr <= SUPERBLOCK_ADDR as i32 || (addr as u64 + len as u64) > device_blocks {
                return Err(Error::CorruptImage(format!("{} lies outside the image", name)));
            }
        }
        Ok(())
    }
}

impl ByteSerializable for SuperBlock {
    fn to_bytes(&self) -> Vec<u8> {
        let fields = [
            self.inode_bitmap_addr,
            self.inode_bitmap_len,
            self.data_bitmap_addr,
            self.data_bitmap_len,
            self.inode_region_addr,
            self.inode_region_len,
            self.data_region_addr,
            self.data_region_len,
            self.num_inodes,
            self.num_data,
        ];
        let mut buffer = Vec::with_capacity(SuperBlock::size_on_disk());
        for field in fields {
            buffer.extend_from_slice(&field.to_le_bytes());
        }
        buffer
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SuperBlock::size_on_disk() {
            return Err(Error::CorruptImage("superblock truncated".to_string()));
        }
        Ok(SuperBlock {
            inode_bitmap_addr: read_i32(bytes, 0),
            inode_bitmap_len: read_i32(bytes, 4),
            data_bitmap_addr: read_i32(bytes, 8),
            data_bitmap_len: read_i32(bytes, 12),
            inode_region_addr: read_i32(bytes, 16),
            inode_region_len: read_i32(bytes, 20),
            data_region_addr: read_i32(bytes, 24),
            data_region_len: read_i32(bytes, 28),
            num_inodes: read_i32(bytes, 32),
            num_data: read_i32(bytes, 36),
        })
    }
}

impl KnownSize for SuperBlock {
    fn size_on_disk() -> usize {
        FIELD_COUNT * 4
    }
}

use crate::consts::BLOCK_SIZE;
use crate::util::error::{Error, Result};
use crate::util::serializable::read_u32;

const WORD_BITS: usize = 32;

/// One-block allocation bitmap. Bit `i` lives in word `i / 32` at position
/// `31 - i % 32`; a set bit means allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u32>,
    count: usize,
}

impl Bitmap {
    pub fn new(count: usize) -> Bitmap {
        Bitmap { words: vec![0; BLOCK_SIZE / 4], count }
    }

    pub fn from_block(block: &[u8], count: usize) -> Result<Bitmap> {
        if block.len() != BLOCK_SIZE || count > BLOCK_SIZE * 8 {
            return Err(Error::CorruptImage("bitmap does not fit in one block".to_string()));
        }
        let words = (0..BLOCK_SIZE / 4).map(|i| read_u32(block, i * 4)).collect();
        Ok(Bitmap { words, count })
    }

    pub fn to_block(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        for word in &self.words {
            block.extend_from_slice(&word.to_le_bytes());
        }
        block
    }

    #[inline]
    fn position(index: usize) -> (usize, u32) {
        (index / WORD_BITS, 1 << (WORD_BITS - 1 - index % WORD_BITS))
    }

    pub fn is_used(&self, index: usize) -> bool {
        let (word, mask) = Bitmap::position(index);
        index < self.count && self.words[word] & mask != 0
    }

    pub fn is_free(&self, index: usize) -> bool {
        index < self.count && !self.is_used(index)
    }

    /// First clear bit in `[0, count)`. Does not mark it.
    pub fn find_free(&self) -> Option<usize> {
        (0..self.count).find(|&i| !self.is_used(i))
    }

    /// The first `n` clear bits, or `None` if there are fewer than `n`.
    pub fn find_free_many(&self, n: usize) -> Option<Vec<usize>> {
        let found: Vec<usize> = (0..self.count).filter(|&i| !self.is_used(i)).take(n).collect();
        if found.len() == n {
            Some(found)
        } else {
            None
        }
    }

    pub fn mark_used(&mut self, index: usize) {
        assert!(index < self.count, "bitmap index {} out of range", index);
        let (word, mask) = Bitmap::position(index);
        self.words[word] |= mask;
    }

    pub fn mark_free(&mut self, index: usize) {
        assert!(index < self.count, "bitmap index {} out of range", index);
        let (word, mask) = Bitmap::position(index);
        self.words[word] &= !mask;
    }

    pub fn used_count(&self) -> usize {
        (0..self.count).filter(|&i| self.is_used(i)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::Bitmap;
    use crate::consts::BLOCK_SIZE;

    #[test]
    fn msb_first_layout() {
        let mut bitmap = Bitmap::new(64);
        bitmap.mark_used(0);
        bitmap.mark_used(33);
        let block = bitmap.to_block();
        assert_eq!(block.len(), BLOCK_SIZE);
        assert_eq!(u32::from_le_bytes([block[0], block[1], block[2], block[3]]), 0x8000_0000);
        assert_eq!(u32::from_le_bytes([block[4], block[5], block[6], block[7]]), 0x4000_0000);
    }

    #[test]
    fn allocate() {
        let mut bitmap = Bitmap::new(32);
        bitmap.mark_used(0);
        bitmap.mark_used(1);
        assert_eq!(bitmap.find_free(), Some(2));
        // scanning alone does not allocate
        assert_eq!(bitmap.find_free(), Some(2));

        bitmap.mark_used(2);
        assert!(bitmap.is_used(2));
        bitmap.mark_free(1);
        assert!(bitmap.is_free(1));
        assert_eq!(bitmap.find_free(), Some(1));
        assert_eq!(bitmap.find_free_many(3), Some(vec![1, 3, 4]));
    }

    #[test]
    fn exhausted() {
        let mut bitmap = Bitmap::new(3);
        for i in 0..3 {
            bitmap.mark_used(i);
        }
        assert_eq!(bitmap.find_free(), None);
        assert_eq!(bitmap.find_free_many(1), None);
        assert_eq!(bitmap.used_count(), 3);
    }

    #[test]
    fn read_write() {
        let mut bitmap = Bitmap::new(100);
        bitmap.mark_used(5);
        bitmap.mark_used(99);
        let read = Bitmap::from_block(&bitmap.to_block(), 100).unwrap();
        assert_eq!(read, bitmap);
    }
}

//! Reverses the CALL/JMP address transform applied to executables before
//! compression.
use crate::ext::io::*;
use std::io::{self, Read};

/// Decoder for files compressed by 4.1.8 up to 5.1.x.
///
/// Every `E8`/`E9` byte starts a 4 byte little-endian address that was made
/// absolute by adding the offset just past the instruction.
pub struct CallFilter4108<R> {
    inner: R,
    /// Offset past the 5 byte instruction starting at the next byte.
    addr_offset: u32,
    addr: u32,
    addr_bytes_left: u8,
}

impl<R: Read> CallFilter4108<R> {
    pub fn new(inner: R) -> Self {
        CallFilter4108 {
            inner,
            addr_offset: 5,
            addr: 0,
            addr_bytes_left: 0,
        }
    }
}

impl<R: Read> Read for CallFilter4108<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in &mut buf[..n] {
            if self.addr_bytes_left == 0 {
                if *byte == 0xe8 || *byte == 0xe9 {
                    self.addr = self.addr_offset.wrapping_neg();
                    self.addr_bytes_left = 4;
                }
            } else {
                self.addr = self.addr.wrapping_add(*byte as u32);
                *byte = self.addr as u8;
                self.addr >>= 8;
                self.addr_bytes_left -= 1;
            }
            self.addr_offset = self.addr_offset.wrapping_add(1);
        }
        Ok(n)
    }
}

const BLOCK_SIZE: usize = 0x10000;

/// Undoes the 5.2.0+ transform on one 64 KiB block starting at file offset
/// `offset`. With `flip_high` the high address byte was inverted when bit 23
/// of the relative address was set (5.3.9+).
pub fn untransform_calls(data: &mut [u8], offset: u32, flip_high: bool) {
    if data.len() < 5 {
        return;
    }
    let end = data.len() - 4;
    let mut i = 0;
    while i < end {
        if data[i] != 0xe8 && data[i] != 0xe9 {
            i += 1;
            continue;
        }
        i += 1;
        if data[i + 3] == 0x00 || data[i + 3] == 0xff {
            let addr = offset.wrapping_add(i as u32 + 4) & 0xff_ffff;
            let stored = data[i] as u32 | (data[i + 1] as u32) << 8 | (data[i + 2] as u32) << 16;
            let rel = stored.wrapping_sub(addr);
            if flip_high && rel & 0x80_0000 != 0 {
                data[i + 3] = !data[i + 3];
            }
            data[i] = rel as u8;
            data[i + 1] = (rel >> 8) as u8;
            data[i + 2] = (rel >> 16) as u8;
        }
        i += 4;
    }
}

/// Decoder for files compressed by 5.2.0 and later, which transform the
/// file in independent 64 KiB blocks.
pub struct CallFilter5200<R> {
    inner: R,
    flip_high: bool,
    block: Box<[u8]>,
    pos: usize,
    len: usize,
    offset: u32,
}

impl<R: Read> CallFilter5200<R> {
    pub fn new(inner: R, flip_high: bool) -> Self {
        CallFilter5200 {
            inner,
            flip_high,
            block: vec![0u8; BLOCK_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
            offset: 0,
        }
    }
}

impl<R: Read> Read for CallFilter5200<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.len {
            self.offset = self.offset.wrapping_add(self.len as u32);
            self.len = self.inner.read_most(&mut self.block)?;
            self.pos = 0;
            untransform_calls(&mut self.block[..self.len], self.offset, self.flip_high);
        }
        let n = buf.len().min(self.len - self.pos);
        buf[..n].copy_from_slice(&self.block[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

//! ARC4 keystream used for encrypted chunks.
use std::io::Read;

pub struct Rc4 {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    pub fn new(key: &[u8]) -> Self {
        let mut state = [0u8; 256];
        for (i, s) in state.iter_mut().enumerate() {
            *s = i as u8;
        }

        let mut j: u8 = 0;
        if !key.is_empty() {
            for i in 0..256 {
                j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
                state.swap(i, j as usize);
            }
        }

        Rc4 { state, i: 0, j: 0 }
    }

    /// Creates a cipher and throws away the first `discard` keystream bytes.
    pub fn with_discard(key: &[u8], discard: usize) -> Self {
        let mut rc4 = Self::new(key);
        rc4.skip_bytes(discard);
        rc4
    }

    pub fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);
        self.state.swap(self.i as usize, self.j as usize);
        self.state[(self.state[self.i as usize].wrapping_add(self.state[self.j as usize])) as usize]
    }

    pub fn skip_bytes(&mut self, n: usize) {
        for _ in 0..n {
            self.next_byte();
        }
    }

    pub fn process_block(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

/// Decrypts everything read from `inner`.
pub struct Rc4Stream<T> {
    inner: T,
    rc4: Rc4,
}

impl<T> Rc4Stream<T> {
    pub fn new(inner: T, rc4: Rc4) -> Self {
        Rc4Stream { inner, rc4 }
    }
}

impl<T: Read> Read for Rc4Stream<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.rc4.process_block(&mut buf[..n]);
        Ok(n)
    }
}

#[test]
fn test_rc4_reference_vector() {
    let mut data = *b"Plaintext";
    Rc4::new(b"Key").process_block(&mut data);
    assert_eq!(data, [0xbb, 0xf3, 0x16, 0xe8, 0xd9, 0x40, 0xaf, 0x0a, 0xd3]);
}

#[test]
fn test_rc4_stream_with_discard() {
    let mut expected = vec![0u8; 16];
    let mut rc4 = Rc4::new(b"secret");
    rc4.skip_bytes(1000);
    rc4.process_block(&mut expected);

    let mut stream = Rc4Stream::new(&[0u8; 16][..], Rc4::with_discard(b"secret", 1000));
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, expected);
}

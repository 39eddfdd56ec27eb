//! Raw LZMA streams with the installer's own property headers.
use crate::error::{InnoError, Result};
use crate::ext::io::*;
use liblzma::stream::{Action, Filters, LzmaOptions, Status, Stream};
use std::io::{self, Read};

const BUFFER_SIZE: usize = 8192;

/// Decodes the 5 byte LZMA1 header: a `lc/lp/pb` properties byte followed by
/// the dictionary size.
pub fn lzma1_options(header: &[u8; 5]) -> Result<LzmaOptions> {
    let props = header[0];
    if props >= 9 * 5 * 5 {
        return Err(InnoError::Lzma(format!("invalid LZMA1 properties: {}", props)));
    }
    let lc = props % 9;
    let lp = (props / 9) % 5;
    let pb = props / 45;
    let dict_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    let mut opts = LzmaOptions::new_preset(6)?;
    opts.literal_context_bits(lc as u32)
        .literal_position_bits(lp as u32)
        .position_bits(pb as u32)
        .dict_size(dict_size);
    Ok(opts)
}

/// Decodes the 1 byte LZMA2 dictionary size class.
pub fn lzma2_dict_size(props: u8) -> Result<u32> {
    if props > 40 {
        return Err(InnoError::Lzma(format!("invalid LZMA2 dictionary size: {}", props)));
    }
    if props == 40 {
        return Ok(u32::MAX);
    }
    Ok((2 | (props as u32 & 1)) << (props / 2 + 11))
}

/// Pull-based raw LZMA decoder.
///
/// The installer writes neither an uncompressed size nor an end marker, so
/// running out of input is a normal end of stream here.
pub struct LzmaReader<R> {
    inner: R,
    stream: Stream,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    eof: bool,
    done: bool,
}

impl<R: Read> LzmaReader<R> {
    /// Reads the LZMA1 properties header from `inner` and starts decoding.
    pub fn lzma1(mut inner: R) -> Result<Self> {
        let mut header = [0u8; 5];
        inner.read_exact(&mut header)?;
        let opts = lzma1_options(&header)?;
        let mut filters = Filters::new();
        filters.lzma1(&opts);
        Self::with_filters(inner, &filters)
    }

    /// Reads the LZMA2 dictionary byte from `inner` and starts decoding.
    pub fn lzma2(mut inner: R) -> Result<Self> {
        let dict_size = lzma2_dict_size(inner.read_u8()?)?;
        let mut opts = LzmaOptions::new_preset(6)?;
        opts.dict_size(dict_size);
        let mut filters = Filters::new();
        filters.lzma2(&opts);
        Self::with_filters(inner, &filters)
    }

    fn with_filters(inner: R, filters: &Filters) -> Result<Self> {
        let stream = Stream::new_raw_decoder(filters)?;
        Ok(LzmaReader {
            inner,
            stream,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
            eof: false,
            done: false,
        })
    }
}

impl<R: Read> Read for LzmaReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.done {
                return Ok(0);
            }
            if self.pos == self.len && !self.eof {
                self.len = self.inner.read(&mut self.buf)?;
                self.pos = 0;
                self.eof = self.len == 0;
            }
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            let status = self
                .stream
                .process(&self.buf[self.pos..self.len], out, Action::Run)
                .map_err(|e| InnoError::from(e).into_io())?;
            self.pos += (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;
            if status == Status::StreamEnd {
                self.done = true;
            }
            if produced > 0 {
                return Ok(produced);
            }
            if self.eof && self.pos == self.len {
                self.done = true;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Compresses `data` into a raw LZMA1 stream with the 5 byte header.
    pub(crate) fn compress_lzma1(data: &[u8]) -> Vec<u8> {
        let header = [93u8, 0, 0, 1, 0];
        let opts = lzma1_options(&header).unwrap();
        let mut filters = Filters::new();
        filters.lzma1(&opts);
        let out = compress_raw(&filters, data);
        let mut result = header.to_vec();
        result.extend_from_slice(&out);
        result
    }

    /// Compresses `data` into a raw LZMA2 stream with a 1 MiB dictionary.
    pub(crate) fn compress_lzma2(data: &[u8]) -> Vec<u8> {
        let props = 18u8;
        let mut opts = LzmaOptions::new_preset(6).unwrap();
        opts.dict_size(lzma2_dict_size(props).unwrap());
        let mut filters = Filters::new();
        filters.lzma2(&opts);
        let mut result = vec![props];
        result.extend_from_slice(&compress_raw(&filters, data));
        result
    }

    fn compress_raw(filters: &Filters, data: &[u8]) -> Vec<u8> {
        let mut stream = Stream::new_raw_encoder(filters).unwrap();
        let mut out = Vec::with_capacity(data.len() + 1024);
        stream.process_vec(data, &mut out, Action::Run).unwrap();
        loop {
            out.reserve(4096);
            if stream.process_vec(&[], &mut out, Action::Finish).unwrap() == Status::StreamEnd {
                break;
            }
        }
        out
    }

    #[test]
    fn test_lzma2_dict_sizes() {
        assert_eq!(lzma2_dict_size(0).unwrap(), 4096);
        assert_eq!(lzma2_dict_size(1).unwrap(), 6144);
        assert_eq!(lzma2_dict_size(18).unwrap(), 1 << 20);
        assert_eq!(lzma2_dict_size(40).unwrap(), u32::MAX);
        assert!(lzma2_dict_size(41).is_err());
    }

    #[test]
    fn test_lzma1_properties() {
        assert!(lzma1_options(&[93, 0, 0, 1, 0]).is_ok());
        assert!(lzma1_options(&[225, 0, 0, 1, 0]).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8 ^ (i / 977) as u8).collect();
        let mut out = Vec::new();
        LzmaReader::lzma1(&compress_lzma1(&data)[..])
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);

        out.clear();
        LzmaReader::lzma2(&compress_lzma2(&data)[..])
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }
}

//! Сжатие и diff undo/redo образов.
//!
//! Сжатый payload: [u32 BE исходная длина][кадр zstd или gzip].
//! Кодек узнаётся по магии кадра, поэтому читателю конфиг не нужен.
//! В data header длина сжатого payload хранится с ZIP_LEN_FLAG.

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;

use super::error::{LogError, LogResult};
use crate::config::ZipCodec;
use crate::consts::ZIP_LEN_FLAG;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

#[inline]
pub fn make_zip_len(len: usize) -> u32 {
    (len as u32) | ZIP_LEN_FLAG
}

#[inline]
pub fn is_zip_len(stored: u32) -> bool {
    stored & ZIP_LEN_FLAG != 0
}

#[inline]
pub fn get_zip_len(stored: u32) -> usize {
    (stored & !ZIP_LEN_FLAG) as usize
}

/// Сжать; `None`, если результат не короче исходника или кодек отказал.
pub fn log_zip(codec: ZipCodec, data: &[u8]) -> Option<Vec<u8>> {
    if data.is_empty() {
        return None;
    }
    let mut out = vec![0u8; 4];
    BigEndian::write_u32(&mut out, data.len() as u32);
    let res = match codec {
        ZipCodec::Zstd => zstd::bulk::compress(data, 0).map(|c| out.extend_from_slice(&c)),
        ZipCodec::Gzip => {
            let mut enc = GzEncoder::new(out, Compression::default());
            match enc.write_all(data).and_then(|_| enc.finish()) {
                Ok(v) => {
                    out = v;
                    Ok(())
                }
                Err(e) => {
                    out = Vec::new();
                    Err(e)
                }
            }
        }
    };
    match res {
        Ok(()) if out.len() < data.len() => Some(out),
        Ok(()) => None,
        Err(e) => {
            debug!("log_zip ({}): {}", codec, e);
            None
        }
    }
}

pub fn log_unzip(stored: &[u8]) -> LogResult<Vec<u8>> {
    if stored.len() < 4 {
        return Err(LogError::Corrupted("zip payload shorter than its length prefix".into()));
    }
    let orig = BigEndian::read_u32(&stored[..4]) as usize;
    let frame = &stored[4..];
    let mut out = Vec::with_capacity(orig);
    if frame.starts_with(&ZSTD_MAGIC) {
        zstd::stream::read::Decoder::new(frame)
            .and_then(|mut d| d.read_to_end(&mut out))
            .map_err(|e| LogError::Corrupted(format!("zstd payload: {}", e)))?;
    } else if frame.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(frame)
            .read_to_end(&mut out)
            .map_err(|e| LogError::Corrupted(format!("gzip payload: {}", e)))?;
    } else {
        return Err(LogError::Corrupted("unknown zip frame".into()));
    }
    if out.len() != orig {
        return Err(LogError::Corrupted(format!(
            "unzipped {} bytes, expected {}",
            out.len(),
            orig
        )));
    }
    Ok(out)
}

/// redo ^= undo на общей длине. Операция обратима сама собой.
pub fn log_diff(undo: &[u8], redo: &mut [u8]) {
    for (r, u) in redo.iter_mut().zip(undo) {
        *r ^= *u;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_image(seed: u8) -> Vec<u8> {
        (0..4096u32).map(|i| ((i / 64) as u8).wrapping_add(seed)).collect()
    }

    #[test]
    fn zip_len_tagging() {
        let s = make_zip_len(300);
        assert!(is_zip_len(s));
        assert_eq!(get_zip_len(s), 300);
        assert!(!is_zip_len(300));
    }

    #[test]
    fn both_codecs_unzip_back() {
        let data = page_image(3);
        for codec in [ZipCodec::Zstd, ZipCodec::Gzip] {
            let z = log_zip(codec, &data).unwrap();
            assert!(z.len() < data.len());
            assert_eq!(log_unzip(&z).unwrap(), data);
        }
    }

    #[test]
    fn incompressible_input_is_not_zipped() {
        let mut rng = oorandom::Rand64::new(11);
        let noise: Vec<u8> = (0..300).map(|_| rng.rand_u64() as u8).collect();
        assert!(log_zip(ZipCodec::Zstd, &noise).is_none());
    }

    #[test]
    fn diff_reverses_itself() {
        let undo = page_image(0);
        let mut redo = page_image(0);
        redo[100] = 0xAA;
        redo.extend_from_slice(b"tail");
        let orig = redo.clone();
        log_diff(&undo, &mut redo);
        assert!(redo[..4096].iter().enumerate().all(|(i, b)| i == 100 || *b == 0));
        log_diff(&undo, &mut redo);
        assert_eq!(redo, orig);
    }
}

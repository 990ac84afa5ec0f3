//! Content fingerprinting for change detection.
//!
//! Drive reports an `md5Checksum` for binary files, so MD5 is the
//! comparison key: a local digest equal to the remote one means the file
//! has not changed since the last sync.

use crate::error::{Result, SyncError};
use std::io::Read;

/// MD5 digest of empty input. A local file hashing to this value is
/// treated as corrupted/truncated and never uploaded.
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

const CHUNK_SIZE: usize = 64 * 1024;

/// Stream `reader` through MD5 and return the lowercase hex digest.
pub fn md5_hex<R: Read>(reader: &mut R) -> Result<String> {
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| SyncError::io(e, "<hash stream>"))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn known_digest() {
        let mut input: &[u8] = b"abc";
        let digest = md5_hex(&mut input).unwrap();
        assert_eq!(digest, "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn empty_input_matches_sentinel() {
        let mut input: &[u8] = b"";
        let digest = md5_hex(&mut input).unwrap();
        assert_eq!(digest, EMPTY_MD5);
    }

    #[test]
    fn digests_file_larger_than_one_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.bin");
        fs::write(&path, vec![0xABu8; CHUNK_SIZE * 2 + 17]).unwrap();

        let mut file = File::open(&path).unwrap();
        let streamed = md5_hex(&mut file).unwrap();
        let whole = format!("{:x}", md5::compute(fs::read(&path).unwrap()));
        assert_eq!(streamed, whole);
    }
}

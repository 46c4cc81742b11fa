//! MD5 checksums in the form the repository reports them.

use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::Result;

const CHUNK: usize = 64 * 1024;

/// Hex MD5 digest of a byte slice.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex MD5 digest of a file, read in chunks.
pub async fn md5_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Strip the `md5:` prefix servers put in front of the digest.
pub fn strip_algorithm(checksum: &str) -> &str {
    checksum.strip_prefix("md5:").unwrap_or(checksum)
}

/// Compare a server checksum with a local hex digest.
pub fn same_checksum(remote: &str, local: &str) -> bool {
    strip_algorithm(remote).eq_ignore_ascii_case(local)
}

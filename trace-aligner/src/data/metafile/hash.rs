use crate::{AlignerResult, error::IoResultExt};
use sha2::{Digest, Sha256};
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

const BLOCK_SIZE: u64 = 16 * 1024;
const FULL_HASH_LIMIT: u64 = 1024 * 1024;

/// SHA-256 over the whole file, lowercase hex.
pub fn sha256_file(path: &Path) -> AlignerResult<String> {
    let mut file = File::open(path).err_path(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).err_path(path)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Sampled SHA-256 used to detect changed data files without reading them in full.
///
/// Files under 1 MiB are hashed whole. Larger files contribute the first block,
/// blocks at each tenth of the file for the first eight tenths, the last block
/// and finally the decimal file size.
pub fn fast_hash(path: &Path) -> AlignerResult<String> {
    let mut file = File::open(path).err_path(path)?;
    let size = file.metadata().err_path(path)?.len();
    let mut hasher = Sha256::new();
    if size < FULL_HASH_LIMIT {
        std::io::copy(&mut file, &mut hasher).err_path(path)?;
    } else {
        let offsets = std::iter::once(0)
            .chain((1..9).map(|tenth| size / 10 * tenth))
            .chain(std::iter::once(size - BLOCK_SIZE));
        let mut block = Vec::with_capacity(BLOCK_SIZE as usize);
        for offset in offsets {
            file.seek(SeekFrom::Start(offset)).err_path(path)?;
            block.clear();
            (&mut file)
                .take(BLOCK_SIZE)
                .read_to_end(&mut block)
                .err_path(path)?;
            hasher.update(&block);
        }
        hasher.update(size.to_string().as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

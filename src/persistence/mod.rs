//! On-disk format for a corpus
//!
//! A corpus is persisted as two files that are always read and written
//! together:
//!
//! * the vector file: `CRVI` magic, a format version, the row count, the
//!   dimension and the save generation, followed by `count * dimension`
//!   little endian `f32` values in row order
//! * the text file: a `corpus-chunks v2 <count> <generation>` header line,
//!   then for each chunk its UTF-8 byte length on its own line, the raw
//!   bytes and a newline
//!
//! Length prefixes mean chunk text may contain anything, including blank
//! lines or separator-looking markers. The generation is a hash of the
//! saved contents, so the same corpus always produces the same files and
//! files from two different saves never pair up at load.


use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};

use crate::corpus::Corpus;
use crate::index::VectorIndex;
use crate::store::ChunkStore;
use crate::{RagError, Result};

const INDEX_MAGIC: &[u8; 4] = b"CRVI";
const INDEX_VERSION: u32 = 2;
const INDEX_HEADER_LEN: usize = 4 + 4 + 8 + 4 + 8;
const TEXT_HEADER_PREFIX: &str = "corpus-chunks v2 ";

/// Locations of the two files making up a persisted corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    pub index: PathBuf,
    pub texts: PathBuf,
}

impl CorpusPaths {
    #[inline]
    pub fn new(index: impl Into<PathBuf>, texts: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            texts: texts.into(),
        }
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.index.is_file() && self.texts.is_file()
    }
}

/// Write both corpus files
///
/// Each file is written next to its destination and renamed into place once
/// both are complete, so a final name never holds a truncated file. The text
/// file is moved first and the vector file last. If the second move fails the
/// two final files carry different generations and [`load`] rejects them
/// instead of pairing vectors with the wrong text.
#[inline]
pub fn save(corpus: &Corpus, paths: &CorpusPaths) -> Result<()> {
    save_parts(corpus.index(), corpus.store(), paths)
}

/// Write an index and its chunk texts, refusing halves of different lengths
#[inline]
pub fn save_parts(index: &VectorIndex, store: &ChunkStore, paths: &CorpusPaths) -> Result<()> {
    if index.len() != store.len() {
        return Err(anyhow!(
            "Refusing to save {} vectors with {} chunks",
            index.len(),
            store.len()
        )
        .into());
    }

    let generation = pair_generation(index, store);
    let index_bytes = encode_index(index, generation)?;
    let text_bytes = encode_texts(store, generation);

    let index_tmp = temporary_path(&paths.index);
    let texts_tmp = temporary_path(&paths.texts);
    let moved = write_file(&index_tmp, &index_bytes)
        .and_then(|()| write_file(&texts_tmp, &text_bytes))
        .and_then(|()| move_into_place(&texts_tmp, &paths.texts))
        .and_then(|()| move_into_place(&index_tmp, &paths.index));
    if let Err(e) = moved {
        remove_temporary(&index_tmp);
        remove_temporary(&texts_tmp);
        return Err(e);
    }

    info!(
        "Saved corpus of {} chunks to {} and {}",
        store.len(),
        paths.index.display(),
        paths.texts.display()
    );
    Ok(())
}

/// Read both corpus files and return the aligned halves
#[inline]
pub fn load_parts(paths: &CorpusPaths) -> Result<(VectorIndex, ChunkStore)> {
    load(paths).map(Corpus::into_parts)
}

/// Read both corpus files and pair them
///
/// Any unreadable or malformed file, files written by different saves, or a
/// row count that differs between the two files is a
/// [`RagError::CorpusLoad`].
#[inline]
pub fn load(paths: &CorpusPaths) -> Result<Corpus> {
    let index_bytes = read_file(&paths.index)?;
    let (index, index_generation) =
        decode_index(&index_bytes).map_err(|e| load_error(&paths.index, &e))?;

    let text_bytes = read_file(&paths.texts)?;
    let (store, text_generation) =
        decode_texts(&text_bytes).map_err(|e| load_error(&paths.texts, &e))?;

    if index_generation != text_generation {
        return Err(load_error(
            &paths.texts,
            &format!(
                "written by a different save than {} (generation {:016x}, expected {:016x})",
                paths.index.display(),
                text_generation,
                index_generation
            ),
        ));
    }
    debug!("Decoded {} vectors and {} chunks", index.len(), store.len());

    let corpus = Corpus::from_parts(index, store)?;
    info!(
        "Loaded corpus of {} chunks (dimension {})",
        corpus.len(),
        corpus.dimension().unwrap_or(0)
    );
    Ok(corpus)
}

/// Hash identifying one saved pair of files
///
/// Derived from the contents alone, so saving an identical corpus twice
/// yields identical files.
#[inline]
pub fn pair_generation(index: &VectorIndex, store: &ChunkStore) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(index.len() as u64).to_le_bytes());
    hasher.update(&(index.dimension().unwrap_or(0) as u64).to_le_bytes());
    for row in index.rows() {
        for value in row {
            hasher.update(&value.to_le_bytes());
        }
    }
    for text in store.iter() {
        hasher.update(&(text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    let digest = hasher.finalize();
    u64::from_le_bytes(to_array(&digest.as_bytes()[..8]))
}

/// Encode the vector file, refusing dimensions the header cannot hold
#[inline]
pub fn encode_index(index: &VectorIndex, generation: u64) -> Result<Vec<u8>> {
    let dimension = index.dimension().unwrap_or(0);
    let header_dimension = u32::try_from(dimension)
        .map_err(|_| anyhow!("Refusing to save vectors of dimension {dimension}"))?;
    let mut bytes =
        Vec::with_capacity(INDEX_HEADER_LEN + index.len() * dimension * size_of::<f32>());

    bytes.extend_from_slice(INDEX_MAGIC);
    bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&header_dimension.to_le_bytes());
    bytes.extend_from_slice(&generation.to_le_bytes());
    for row in index.rows() {
        for value in row {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(bytes)
}

/// Decode a vector file into the index and its save generation
#[inline]
pub fn decode_index(bytes: &[u8]) -> std::result::Result<(VectorIndex, u64), String> {
    let (header, body) = bytes
        .split_at_checked(INDEX_HEADER_LEN)
        .ok_or_else(|| format!("file is {} bytes, shorter than the header", bytes.len()))?;

    let (magic, rest) = header.split_at(4);
    if magic != INDEX_MAGIC {
        return Err("not a corpus vector file (bad magic)".to_string());
    }
    let (version, rest) = rest.split_at(4);
    let version = u32::from_le_bytes(to_array(version));
    if version != INDEX_VERSION {
        return Err(format!("unsupported vector file version {version}"));
    }
    let (count, rest) = rest.split_at(8);
    let count = usize::try_from(u64::from_le_bytes(to_array(count)))
        .map_err(|_| "row count does not fit in memory".to_string())?;
    let (dimension, generation) = rest.split_at(4);
    let dimension = u32::from_le_bytes(to_array(dimension)) as usize;
    let generation = u64::from_le_bytes(to_array(generation));

    if count > 0 && dimension == 0 {
        return Err(format!("{count} rows declared with dimension 0"));
    }
    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(size_of::<f32>()))
        .ok_or_else(|| "declared size overflows".to_string())?;
    if body.len() != expected_len {
        return Err(format!(
            "expected {expected_len} bytes of vector data for {count}x{dimension}, found {}",
            body.len()
        ));
    }

    let mut index = if dimension == 0 {
        VectorIndex::new()
    } else {
        VectorIndex::with_dimension(dimension)
    };
    let values: Vec<f32> = body
        .chunks_exact(size_of::<f32>())
        .map(|chunk| f32::from_le_bytes(to_array(chunk)))
        .collect();
    for row in values.chunks_exact(dimension.max(1)) {
        index.add(row).map_err(|e| e.to_string())?;
    }
    Ok((index, generation))
}

#[inline]
pub fn encode_texts(store: &ChunkStore, generation: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(store.iter().map(|t| t.len() + 12).sum::<usize>() + 48);
    bytes.extend_from_slice(
        format!("{TEXT_HEADER_PREFIX}{} {generation:016x}\n", store.len()).as_bytes(),
    );
    for text in store.iter() {
        bytes.extend_from_slice(text.len().to_string().as_bytes());
        bytes.push(b'\n');
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');
    }
    bytes
}

/// Decode a text file into the chunk store and its save generation
#[inline]
pub fn decode_texts(bytes: &[u8]) -> std::result::Result<(ChunkStore, u64), String> {
    let mut reader = ByteReader::new(bytes);

    let header = reader.line().ok_or("missing header line")?;
    let (count, generation) = header
        .strip_prefix(TEXT_HEADER_PREFIX)
        .and_then(|rest| rest.split_once(' '))
        .ok_or_else(|| format!("unrecognized header {header:?}"))?;
    let count = count
        .parse::<usize>()
        .map_err(|e| format!("invalid chunk count in header: {e}"))?;
    let generation = u64::from_str_radix(generation, 16)
        .map_err(|e| format!("invalid generation in header: {e}"))?;

    let mut store = ChunkStore::new();
    for row in 0..count {
        let len = reader
            .line()
            .ok_or_else(|| format!("missing length for chunk {row}"))?
            .parse::<usize>()
            .map_err(|e| format!("invalid length for chunk {row}: {e}"))?;
        let text = reader
            .take(len)
            .ok_or_else(|| format!("chunk {row} is truncated"))?;
        let text = String::from_utf8(text.to_vec())
            .map_err(|e| format!("chunk {row} is not valid UTF-8: {e}"))?;
        if reader.take(1) != Some(&b"\n"[..]) {
            return Err(format!("chunk {row} is not newline terminated"));
        }
        store.append(text);
    }

    if !reader.is_at_end() {
        return Err(format!("unexpected data after {count} chunks"));
    }
    Ok((store, generation))
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn line(&mut self) -> Option<&'a str> {
        let rest = self.bytes.get(self.pos..)?;
        let end = rest.iter().position(|&b| b == b'\n')?;
        self.pos += end + 1;
        std::str::from_utf8(rest.get(..end)?).ok()
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let slice = self.bytes.get(self.pos..self.pos.checked_add(len)?)?;
        self.pos += len;
        Some(slice)
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(bytes);
    out
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create corpus directory: {}", parent.display()))?;
    }
    fs::write(path, bytes)
        .with_context(|| format!("Failed to write corpus file: {}", path.display()))?;
    Ok(())
}

fn move_into_place(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
        .with_context(|| format!("Failed to move corpus file into place: {}", to.display()))?;
    Ok(())
}

fn remove_temporary(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed leftover {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| load_error(path, &e))
}

fn load_error(path: &Path, error: &dyn std::fmt::Display) -> RagError {
    RagError::CorpusLoad(format!("{}: {}", path.display(), error))
}

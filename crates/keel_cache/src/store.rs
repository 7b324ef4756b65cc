//! Fingerprint-addressed on-disk artifact storage.
//!
//! Artifacts are stored as `<cache_dir>/artifacts/<fingerprint>.bin`. Each file
//! is a 4-byte little-endian header length, a bincode header (magic bytes,
//! format version, producing tool version, fingerprint, payload checksum), and
//! the payload: the bincode-encoded [`Artifact`], deflate-compressed.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use keel_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Magic bytes identifying a Keel cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KEEL";

/// Current artifact format version. Increment on breaking changes to
/// the header or payload format.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Subdirectory holding artifact files.
const ARTIFACT_SUBDIR: &str = "artifacts";

/// Artifact file extension.
const ARTIFACT_EXT: &str = "bin";

/// Header prepended to every cached artifact for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KEEL"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Keel version that produced this artifact.
    pub keel_version: String,

    /// Fingerprint the artifact was stored under.
    pub fingerprint: Fingerprint,

    /// Content hash of the compressed payload.
    pub checksum: ContentHash,
}

/// On-disk store for compiled artifacts.
pub struct ArtifactStore {
    dir: PathBuf,
    keel_version: String,
}

impl ArtifactStore {
    /// Creates a store rooted at the given cache directory.
    pub fn new(cache_dir: &Path, keel_version: &str) -> Self {
        Self {
            dir: cache_dir.join(ARTIFACT_SUBDIR),
            keel_version: keel_version.to_string(),
        }
    }

    /// Returns the file path for the artifact with the given fingerprint.
    pub fn artifact_path(&self, fp: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fp}.{ARTIFACT_EXT}"))
    }

    /// Writes an artifact, replacing any previous file for the fingerprint.
    ///
    /// The file is written to a temporary name and renamed into place so a
    /// concurrent reader never observes a partial file.
    pub fn write(&self, fp: &Fingerprint, artifact: &Artifact) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let encoded = bincode::serde::encode_to_vec(artifact, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        let payload = compress(&encoded).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            keel_version: self.keel_version.clone(),
            fingerprint: *fp,
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // Write: 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);

        let path = self.artifact_path(fp);
        let tmp = path.with_extension(format!("{ARTIFACT_EXT}.tmp"));
        std::fs::write(&tmp, &output).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Reads and validates the artifact stored under a fingerprint.
    ///
    /// Returns `Ok(None)` if no file exists. Any validation failure (bad
    /// header, format version, fingerprint, checksum, or payload) is an error
    /// the caller treats as a miss.
    pub fn read(&self, fp: &Fingerprint) -> Result<Option<Artifact>, CacheError> {
        let path = self.artifact_path(fp);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };

        let invalid = |reason: &str| CacheError::InvalidHeader {
            path: path.clone(),
            reason: reason.to_string(),
        };

        // Need at least 4 bytes for the header length
        let len_bytes: [u8; 4] = raw
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid("truncated header length"))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        let header_bytes = raw
            .get(4..4 + header_len)
            .ok_or_else(|| invalid("truncated header"))?;

        let (header, _): (ArtifactHeader, usize) =
            bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
                .map_err(|e| invalid(&e.to_string()))?;

        if header.magic != ARTIFACT_MAGIC {
            return Err(invalid("bad magic bytes"));
        }
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: ARTIFACT_FORMAT_VERSION,
                actual: header.format_version,
            });
        }
        if header.fingerprint != *fp {
            return Err(CacheError::FingerprintMismatch {
                path,
                expected: fp.to_string(),
                actual: header.fingerprint.to_string(),
            });
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        let decoded = decompress(payload).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let (artifact, _): (Artifact, usize) =
            bincode::serde::decode_from_slice(&decoded, bincode::config::standard()).map_err(
                |e| CacheError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        Ok(Some(artifact))
    }

    /// Deletes the artifact stored under a fingerprint, if any.
    pub fn remove(&self, fp: &Fingerprint) -> Result<(), CacheError> {
        let path = self.artifact_path(fp);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Removes artifact files whose fingerprint is not live, plus leftover
    /// temporary files. Returns the number of files removed.
    pub fn gc(&self, is_live: impl Fn(&Fingerprint) -> bool) -> Result<usize, CacheError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries = std::fs::read_dir(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            let live = path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXT)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(Fingerprint::from_hex)
                    .is_some_and(|fp| is_live(&fp));
            if !live {
                std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

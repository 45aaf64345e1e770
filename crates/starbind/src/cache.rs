//! Timestamp-keyed on-disk cache of decoded assets.
//!
//! Each asset lives in its own gzip-compressed JSON record,
//! `<cache dir>/<name>.json.gz`, stamped with the modification time of the
//! archive it came from. A record is current while that stamp is not older
//! than the archive's present modification time, so an unchanged archive is
//! never opened.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use starbind_p4k::ArchiveScanner;
use tempfile::NamedTempFile;

use crate::assets::{extract_assets, is_plain_name, AssetKind, AssetRequest, ExtractedAsset};
use crate::{Error, Result};

const PAK_REFERENCE: &str = "pak";
const RECORD_EXTENSION: &str = "json.gz";

/// One persisted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAsset {
    pub kind: AssetKind,
    pub name: String,
    pub source_path: String,
    pub source_timestamp: DateTime<Utc>,
    pub text: String,
}

impl CachedAsset {
    /// Whether this record is at least as new as the archive.
    pub fn is_current(&self, archive_modified: DateTime<Utc>) -> bool {
        self.source_timestamp >= archive_modified
    }
}

/// Cache of decoded assets in a directory.
///
/// Refreshes are serialized by an internal lock so two callers never write
/// the same record at once.
#[derive(Debug)]
pub struct AssetCache {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl AssetCache {
    /// Use `dir` for cache records. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(Error::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.{}", name, RECORD_EXTENSION)))
    }

    /// Read a record. Missing and unreadable records are both `None`.
    pub fn load(&self, name: &str) -> Option<CachedAsset> {
        let path = match self.record_path(name) {
            Ok(path) => path,
            Err(e) => {
                warn!("ignoring cache record: {}", e);
                return None;
            }
        };
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("ignoring cache record {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_reader(GzDecoder::new(BufReader::new(file))) {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!("ignoring corrupt cache record {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write a record atomically.
    ///
    /// The record is written to a temporary file in the cache directory and
    /// renamed over the old one, so readers see either the old or the new
    /// record in full.
    pub fn store(&self, asset: &CachedAsset) -> Result<()> {
        let path = self.record_path(&asset.name)?;
        fs::create_dir_all(&self.dir)?;
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        {
            let writer = BufWriter::new(temp.as_file_mut());
            let mut encoder = GzEncoder::new(writer, Compression::default());
            serde_json::to_writer(&mut encoder, asset)?;
            encoder.finish()?.flush()?;
        }
        temp.persist(path)?;
        debug!("stored cache record {}", asset.name);
        Ok(())
    }

    /// The archive path used by the last successful refresh.
    pub fn last_archive(&self) -> Option<PathBuf> {
        self.load(PAK_REFERENCE)
            .filter(|record| record.kind == AssetKind::PakReference)
            .map(|record| PathBuf::from(record.text))
    }

    /// Return the text of every request, refreshing from the archive only
    /// what is stale.
    ///
    /// If a refresh fails, a request with older cached text still gets that
    /// text (with a warning). Only a request with nothing cached fails the
    /// call.
    pub fn get_or_refresh(
        &self,
        archive: &Path,
        requests: &[AssetRequest],
    ) -> Result<BTreeMap<String, String>> {
        let _guard = self.lock.lock();

        let archive_modified = archive_timestamp(archive);
        let mut texts = BTreeMap::new();
        let mut stale = Vec::new();
        let mut fallback = BTreeMap::new();

        for request in requests {
            let cached = self.load(request.name());
            match (&archive_modified, cached) {
                (Ok(modified), Some(record)) if record.is_current(*modified) => {
                    debug!("{}: cache is current", request.name());
                    texts.insert(request.name().to_string(), record.text);
                }
                (_, cached) => {
                    if let Some(record) = cached {
                        fallback.insert(request.name().to_string(), record.text);
                    }
                    stale.push(request.clone());
                }
            }
        }

        if stale.is_empty() {
            return Ok(texts);
        }

        let refreshed = archive_modified.and_then(|modified| {
            info!(
                "refreshing {} cached assets from {}",
                stale.len(),
                archive.display()
            );
            self.refresh(archive, modified, &stale)
        });

        match refreshed {
            Ok(results) => {
                for (request, result) in stale.iter().zip(results) {
                    let text = match result {
                        Ok(text) => text,
                        Err(e) => last_known_good(&mut fallback, request, e)?,
                    };
                    texts.insert(request.name().to_string(), text);
                }
            }
            Err(e) => {
                if let Some(missing) = stale.iter().find(|r| !fallback.contains_key(r.name())) {
                    debug!("{}: nothing cached to fall back on", missing.name());
                    return Err(e);
                }
                for request in &stale {
                    if let Some(text) = fallback.remove(request.name()) {
                        warn!("{}: refresh failed, using cached text: {}", request.name(), e);
                        texts.insert(request.name().to_string(), text);
                    }
                }
            }
        }

        Ok(texts)
    }

    /// Like [`store`](Self::store), but a failed write only costs the next
    /// run a rescan.
    fn store_or_warn(&self, asset: &CachedAsset) {
        if let Err(e) = self.store(asset) {
            warn!(
                "{}: could not write cache record to {}: {}",
                asset.name,
                self.dir.display(),
                e
            );
        }
    }

    /// Extract `requests` from the archive and persist what succeeds.
    fn refresh(
        &self,
        archive: &Path,
        modified: DateTime<Utc>,
        requests: &[AssetRequest],
    ) -> Result<Vec<Result<String>>> {
        let mut scanner = ArchiveScanner::open(archive)?;
        let extracted = extract_assets(&mut scanner, requests)?;

        let results = requests
            .iter()
            .zip(extracted)
            .map(|(request, result)| {
                let ExtractedAsset {
                    name,
                    source_path,
                    text,
                } = result?;
                let record = CachedAsset {
                    kind: request.kind(),
                    name,
                    source_path,
                    source_timestamp: modified,
                    text,
                };
                self.store_or_warn(&record);
                Ok(record.text)
            })
            .collect();

        self.store_or_warn(&CachedAsset {
            kind: AssetKind::PakReference,
            name: PAK_REFERENCE.to_string(),
            source_path: archive.display().to_string(),
            source_timestamp: modified,
            text: archive.display().to_string(),
        });

        Ok(results)
    }
}

fn archive_timestamp(archive: &Path) -> Result<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(fs::metadata(archive)?.modified()?))
}

fn last_known_good(
    fallback: &mut BTreeMap<String, String>,
    request: &AssetRequest,
    error: Error,
) -> Result<String> {
    match fallback.remove(request.name()) {
        Some(text) => {
            warn!("{}: refresh failed, using cached text: {}", request.name(), error);
            Ok(text)
        }
        None => Err(error),
    }
}

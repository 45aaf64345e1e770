//! Asset requests and the archive-to-text pipeline.

use std::io::{Read, Seek};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use starbind_cryxml::CryXml;
use starbind_p4k::{ArchiveScanner, Target};

use crate::{Error, Result};

/// Canonical location of the default keybinding profile.
pub const DEFAULT_PROFILE_PATH: &str = r"Data\Libs\Config\defaultProfile.xml";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// What a cached record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    /// The archive path last used to refresh the cache.
    PakReference,
    /// The decoded default keybinding profile.
    DefaultProfile,
    /// A language's `global.ini` string table.
    LanguageFile,
}

/// A named asset to pull out of the archive.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    name: String,
    kind: AssetKind,
    target: Target,
}

impl AssetRequest {
    pub fn new(name: impl Into<String>, kind: AssetKind, target: Target) -> Self {
        Self {
            name: name.into(),
            kind,
            target,
        }
    }

    /// The default keybinding profile.
    ///
    /// The file may be present under more than one path; the canonical one
    /// wins.
    pub fn default_profile() -> Self {
        Self::new(
            "defaultProfile",
            AssetKind::DefaultProfile,
            Target::suffix("defaultProfile.xml").with_canonical(DEFAULT_PROFILE_PATH),
        )
    }

    /// The UI string table for `language` (e.g. `english`).
    ///
    /// The language becomes part of a cache file name, so a value with a
    /// path separator or a leading `.` is [`Error::InvalidName`].
    pub fn language(language: &str) -> Result<Self> {
        if !is_plain_name(language) {
            return Err(Error::InvalidName {
                name: language.to_string(),
            });
        }
        Ok(Self::new(
            format!("language.{}", language.to_ascii_lowercase()),
            AssetKind::LanguageFile,
            Target::exact(&format!(r"Data\Localization\{}\global.ini", language)),
        ))
    }

    /// Logical name, also the cache key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

/// Whether `name` stays a single file name when joined onto a directory.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.chars().any(|c| matches!(c, '/' | '\\' | ':' | '\0'))
}

/// Text decoded from one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAsset {
    /// Logical name of the request.
    pub name: String,
    /// Archive path of the entry it came from.
    pub source_path: String,
    /// Decoded text.
    pub text: String,
}

/// Turn raw entry bytes into text.
///
/// CryXmlB is rendered to XML; anything else must already be UTF-8 text and
/// is passed through with a leading byte order mark removed.
pub fn decode_text(name: &str, bytes: Vec<u8>) -> Result<String> {
    if CryXml::is_cryxml(&bytes) {
        return Ok(CryXml::parse(&bytes)?.to_xml_string()?);
    }

    let mut bytes = bytes;
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    String::from_utf8(bytes).map_err(|source| Error::InvalidText {
        name: name.to_string(),
        source,
    })
}

/// Extract every request in one pass over the archive.
///
/// A failed scan fails the whole call. After that each request succeeds or
/// fails on its own: a missing entry or a bad payload only affects that
/// request's slot.
pub fn extract_assets<R: Read + Seek>(
    scanner: &mut ArchiveScanner<R>,
    requests: &[AssetRequest],
) -> Result<Vec<Result<ExtractedAsset>>> {
    let targets: Vec<Target> = requests.iter().map(|r| r.target.clone()).collect();
    let found = scanner.find_all(&targets)?;

    Ok(requests
        .iter()
        .zip(found)
        .map(|(request, entry)| {
            let entry = entry.ok_or_else(|| Error::NotFound {
                name: request.name.clone(),
            })?;
            let bytes = scanner.read(&entry)?;
            let text = decode_text(&request.name, bytes).map_err(|e| {
                warn!("{}: cannot decode {}: {}", request.name, entry.name(), e);
                e
            })?;
            debug!("{}: {} chars from {}", request.name, text.len(), entry.name());
            Ok(ExtractedAsset {
                name: request.name.clone(),
                source_path: entry.name().to_string(),
                text,
            })
        })
        .collect())
}

//! Sequential archive scanning.
//!
//! The scanner walks local file headers from the start of the archive,
//! jumping over each payload, until it meets the central directory. It never
//! reads the central directory itself, so the cost of finding a handful of
//! entries is one header read per entry and no allocation per entry beyond
//! its name.

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace};

use crate::codec::decode_entry;
use crate::entry::ArchiveEntry;
use crate::header::read_entry_header;
use crate::Result;

/// Which part of an entry name a pattern is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// The whole name must match.
    Exact,
    /// The name must end with the pattern.
    Suffix,
    /// The name must contain the pattern.
    Contains,
}

/// How an entry name is compared against a target.
///
/// Matching is ASCII case-insensitive and treats `/` and `\` alike. The
/// pattern is normalized once, on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    kind: MatchKind,
    pattern: String,
}

impl Matcher {
    pub fn new(kind: MatchKind, pattern: &str) -> Self {
        Self {
            kind,
            pattern: normalize(pattern),
        }
    }

    /// Test an entry name.
    pub fn matches(&self, name: &str) -> bool {
        let name = normalize(name);
        let pattern = self.pattern.as_str();
        match self.kind {
            MatchKind::Exact => name == pattern,
            MatchKind::Suffix => name.ends_with(pattern),
            MatchKind::Contains => name.contains(pattern),
        }
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// The normalized pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// An entry to look for, with an optional canonical path that wins ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    matcher: Matcher,
    canonical: Option<String>,
}

impl Target {
    /// Match the whole entry name.
    pub fn exact(name: &str) -> Self {
        Self::new(Matcher::new(MatchKind::Exact, name))
    }

    /// Match entries whose name ends with `suffix`.
    pub fn suffix(suffix: &str) -> Self {
        Self::new(Matcher::new(MatchKind::Suffix, suffix))
    }

    /// Match entries whose name contains `fragment`.
    pub fn contains(fragment: &str) -> Self {
        Self::new(Matcher::new(MatchKind::Contains, fragment))
    }

    fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            canonical: None,
        }
    }

    /// Prefer the entry at `path` when several entries match.
    pub fn with_canonical(mut self, path: &str) -> Self {
        self.canonical = Some(normalize(path));
        self
    }

    /// The matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Test an entry name.
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    /// Whether `name` is the canonical path for this target.
    pub fn is_canonical(&self, name: &str) -> bool {
        self.canonical
            .as_deref()
            .is_some_and(|canonical| normalize(name) == canonical)
    }

    /// Order two matching candidates; the greater one is selected.
    ///
    /// Policy: the canonical path wins, then the larger uncompressed size,
    /// then the more recent modification stamp. Remaining ties fall back to
    /// the lexically smaller name and then the earlier offset, so the choice
    /// never depends on the order entries appear in the archive.
    pub fn selection_order(&self, a: &ArchiveEntry, b: &ArchiveEntry) -> Ordering {
        self.is_canonical(a.name())
            .cmp(&self.is_canonical(b.name()))
            .then_with(|| a.uncompressed_size().cmp(&b.uncompressed_size()))
            .then_with(|| a.last_modified().cmp(&b.last_modified()))
            .then_with(|| b.name().cmp(a.name()))
            .then_with(|| b.header_offset().cmp(&a.header_offset()))
    }

    /// Pick the best candidate from a set of matches.
    pub fn select(&self, candidates: Vec<ArchiveEntry>) -> Option<ArchiveEntry> {
        candidates
            .into_iter()
            .max_by(|a, b| self.selection_order(a, b))
    }
}

fn normalize(name: &str) -> String {
    name.replace('/', "\\").to_ascii_lowercase()
}

/// Walks the local file headers of an archive.
#[derive(Debug)]
pub struct ArchiveScanner<R> {
    reader: R,
    len: u64,
}

impl ArchiveScanner<BufReader<File>> {
    /// Open an archive file for scanning.
    ///
    /// The file is opened read-only and shares read, write and delete access
    /// so the game can keep it open (and patch it) at the same time.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
            options.share_mode(0x1 | 0x2 | 0x4);
        }
        let file = options.open(path.as_ref())?;
        Self::new(BufReader::with_capacity(64 * 1024, file))
    }
}

impl<R: Read + Seek> ArchiveScanner<R> {
    /// Wrap a seekable byte source.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, len })
    }

    /// Total length of the archive in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the archive is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over every entry from the start of the archive.
    ///
    /// Iteration ends at the central directory. A structural error is
    /// yielded once and ends the iteration.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            scanner: self,
            next_offset: 0,
            finished: false,
        }
    }

    /// Find the best entry for one target.
    pub fn find(&mut self, target: &Target) -> Result<Option<ArchiveEntry>> {
        let mut found = self.find_all(std::slice::from_ref(target))?;
        Ok(found.pop().flatten())
    }

    /// Find the best entry for each target in a single pass.
    ///
    /// The result has one slot per target, in the same order.
    pub fn find_all(&mut self, targets: &[Target]) -> Result<Vec<Option<ArchiveEntry>>> {
        let mut candidates: Vec<Vec<ArchiveEntry>> = vec![Vec::new(); targets.len()];
        let mut walked = 0usize;

        for entry in self.entries() {
            let entry = entry?;
            walked += 1;
            for (target, matches) in targets.iter().zip(candidates.iter_mut()) {
                if target.matches(entry.name()) {
                    trace!("candidate {} for {:?}", entry.name(), target.matcher());
                    matches.push(entry.clone());
                }
            }
        }

        debug!("walked {} entries", walked);

        Ok(targets
            .iter()
            .zip(candidates)
            .map(|(target, matches)| {
                let count = matches.len();
                let selected = target.select(matches);
                if let Some(entry) = &selected {
                    debug!(
                        "selected {} for {:?} out of {} candidates",
                        entry.name(),
                        target.matcher(),
                        count
                    );
                }
                selected
            })
            .collect())
    }

    /// Decode an entry's payload.
    pub fn read(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        decode_entry(&mut self.reader, entry)
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Iterator over the entries of an archive, in file order.
pub struct Entries<'a, R> {
    scanner: &'a mut ArchiveScanner<R>,
    next_offset: u64,
    finished: bool,
}

impl<R: Read + Seek> Entries<'_, R> {
    fn read_next(&mut self) -> Result<ArchiveEntry> {
        let scanner = &mut *self.scanner;
        scanner.reader.seek(SeekFrom::Start(self.next_offset))?;
        let entry = read_entry_header(&mut scanner.reader, scanner.len)?;
        self.next_offset = entry.next_record_offset();
        Ok(entry)
    }
}

impl<R: Read + Seek> Iterator for Entries<'_, R> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) if e.is_end_of_entries() => {
                trace!("{}", e);
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

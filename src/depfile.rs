//! Dependency ledgers ("dep-files").
//!
//! For one named dependency set of one builder, a ledger records the content
//! hash each member had when the builder last executed successfully.  The
//! on-disk format is one record per line:
//!
//! ```text
//! <64 lowercase hex digits> <identity>
//! ```
//!
//! The file is rewritten wholesale on every persist.  Record order carries no
//! meaning; we write them sorted so ledgers diff cleanly.

use crate::error::{io_err, BuildError, Result};
use crate::graph::{Context, NodeId};
use crate::hash::{hash_file, ContentHash, HEX_LEN};
use crate::path::Identity;
use crate::scanner::{ParseResult, Scanner};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub hash: ContentHash,
    pub identity: Identity,
}

fn read_record(scanner: &mut Scanner) -> ParseResult<Record> {
    // Errors in the hash point at the start of the record.
    let start = scanner.ofs;
    for _ in 0..HEX_LEN {
        if scanner.read() == '\0' {
            scanner.ofs = start;
            return scanner.parse_error("truncated hash");
        }
    }
    let hash = match ContentHash::from_hex(scanner.slice(start, scanner.ofs)) {
        Some(hash) => hash,
        None => {
            scanner.ofs = start;
            return scanner.parse_error("invalid hash");
        }
    };
    scanner.expect(' ')?;
    let path = scanner.read_line();
    if path.is_empty() {
        return scanner.parse_error("expected identity");
    }
    Ok(Record {
        hash,
        identity: Identity::new(path),
    })
}

/// Parses ledger text.  Blank lines are ignored.
pub fn parse(scanner: &mut Scanner) -> ParseResult<Vec<Record>> {
    let mut records = Vec::new();
    while !scanner.at_end() {
        if scanner.skip_newline() {
            continue;
        }
        records.push(read_record(scanner)?);
        scanner.skip_newline();
    }
    Ok(records)
}

/// Renders records in ledger format.
pub fn format(records: &[Record]) -> String {
    let mut out = String::with_capacity(records.len() * (HEX_LEN + 32));
    for record in records {
        out.push_str(&record.hash.to_string());
        out.push(' ');
        out.push_str(record.identity.as_str());
        out.push('\n');
    }
    out
}

/// One named dependency set of a builder and its ledger.
#[derive(Debug)]
pub struct DepFile {
    name: String,
    path: PathBuf,
    /// Nodes currently declared part of the set; what `persist` writes.
    live: BTreeMap<Identity, NodeId>,
    /// Hashes recorded by the last successful execution.
    loaded: BTreeMap<Identity, ContentHash>,
}

impl DepFile {
    pub fn new(name: &str, path: PathBuf) -> Self {
        DepFile {
            name: name.to_string(),
            path,
            live: BTreeMap::new(),
            loaded: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn register(&mut self, identity: Identity, node: NodeId) {
        self.live.insert(identity, node);
    }

    pub fn loaded(&self) -> &BTreeMap<Identity, ContentHash> {
        &self.loaded
    }

    /// Loads the ledger from disk, creating an empty one if absent.
    pub fn read(&mut self) -> Result<()> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Some(dir) = self.path.parent() {
                    std::fs::create_dir_all(dir).map_err(io_err(dir))?;
                }
                std::fs::write(&self.path, "").map_err(io_err(&self.path))?;
                String::new()
            }
            Err(err) => return Err(io_err(&self.path)(err)),
        };

        let mut scanner = Scanner::new(&text);
        let records = parse(&mut scanner).map_err(|err| BuildError::CorruptLedger {
            path: self.path.clone(),
            line: scanner.line_of(err.ofs),
            msg: err.msg,
        })?;
        self.loaded = records
            .into_iter()
            .map(|record| (record.identity, record.hash))
            .collect();
        Ok(())
    }

    /// Returns the first loaded member whose content no longer matches the
    /// recorded hash, or None if the set is up to date.
    ///
    /// A member that is no longer registered, or whose file has gone
    /// missing, counts as changed.
    pub fn stale_member(&self, ctx: &Context) -> Option<Identity> {
        let members: Vec<(&Identity, &ContentHash, Option<PathBuf>)> = self
            .loaded
            .iter()
            .map(|(identity, hash)| (identity, hash, ctx.lookup(identity).map(|n| ctx.location(n))))
            .collect();

        let stale = members
            .par_iter()
            .find_map_first(|(identity, recorded, location)| {
                let current = location.as_deref().map(hash_file);
                match current {
                    Some(Ok(ref hash)) if hash == *recorded => None,
                    _ => Some((*identity).clone()),
                }
            });
        if let Some(identity) = &stale {
            debug!(
                set = %self.name,
                "  execution needed because hash is outdated: {}",
                identity
            );
        }
        stale
    }

    pub fn is_up_to_date(&self, ctx: &Context) -> bool {
        self.stale_member(ctx).is_none()
    }

    /// Overwrites the ledger with the current hashes of the live members.
    pub fn persist(&self, ctx: &Context) -> Result<()> {
        let members: Vec<(Identity, PathBuf)> = self
            .live
            .iter()
            .map(|(identity, &node)| (identity.clone(), ctx.location(node)))
            .collect();
        let records = members
            .into_par_iter()
            .map(|(identity, location)| {
                let hash = hash_file(&location).map_err(io_err(&location))?;
                Ok(Record { hash, identity })
            })
            .collect::<Result<Vec<Record>>>()?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        std::fs::write(&self.path, format(&records)).map_err(io_err(&self.path))
    }
}

/// Lists the ledger files present in a builder's cache directory, sorted,
/// creating the directory if needed.
pub fn list_ledgers(cache_dir: &Path) -> Result<Vec<String>> {
    std::fs::create_dir_all(cache_dir).map_err(io_err(cache_dir))?;
    let mut names = Vec::new();
    for entry in std::fs::read_dir(cache_dir).map_err(io_err(cache_dir))? {
        let entry = entry.map_err(io_err(cache_dir))?;
        if !entry.file_type().map_err(io_err(cache_dir))?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

//! Artifact identities: canonical, immutable path values.
//!
//! An identity is a "/"-joined sequence of components plus an absolute flag.
//! Canonicalization is purely lexical and does not access the disk; it
//! simplifies things like "foo/./bar" => "foo/bar" so that two spellings of
//! the same path map to the same registry entry.

use std::fmt;
use std::path::{Path, PathBuf};

/// Returns true if `c` separates path components on this platform.
fn is_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

/// Returns the length of a leading "C:" style drive prefix, if any.
fn drive_prefix(path: &str) -> usize {
    if !cfg!(windows) {
        return 0;
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        2
    } else {
        0
    }
}

/// Lexically canonicalize a path string, removing redundant components.
pub fn canon_path(path: &str) -> String {
    let drive = drive_prefix(path);
    let (prefix, rest) = path.split_at(drive);
    let absolute = drive > 0 || rest.starts_with(is_separator);

    let mut components: Vec<&str> = Vec::new();
    for component in rest.split(is_separator) {
        match component {
            "" | "." => {}
            ".." => match components.last() {
                Some(&last) if last != ".." => {
                    components.pop();
                }
                // ".." at the root of an absolute path stays at the root.
                _ if absolute => {}
                _ => components.push(".."),
            },
            _ => components.push(component),
        }
    }

    let mut out = String::with_capacity(path.len());
    out.push_str(prefix);
    if absolute {
        out.push('/');
    }
    out.push_str(&components.join("/"));
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// The canonical identity of an artifact.
///
/// Equality, hashing and ordering all operate on the canonical string, so two
/// identities are equal exactly when their normalized component sequences
/// are.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(path: &str) -> Self {
        Identity(canon_path(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_absolute(&self) -> bool {
        drive_prefix(&self.0) > 0 || self.0.starts_with('/')
    }

    /// True for the "." identity, i.e. the empty relative path.
    pub fn is_current(&self) -> bool {
        self.0 == "."
    }

    /// The components of the path, without the root or drive prefix.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        let rest = &self.0[drive_prefix(&self.0)..];
        let rest = if self.is_current() { "" } else { rest };
        rest.split('/').filter(|c| !c.is_empty())
    }

    /// The last component, or the whole identity if it has none.
    pub fn file_name(&self) -> Identity {
        match self.components().last() {
            Some(name) => Identity(name.to_string()),
            None => self.clone(),
        }
    }

    /// Everything but the last component.
    pub fn parent(&self) -> Identity {
        match self.0.rfind('/') {
            Some(0) => Identity("/".to_string()),
            Some(idx) => Identity(self.0[..idx].to_string()),
            None => Identity(".".to_string()),
        }
    }

    /// The text after the last '.' of the last component, or "" if there is
    /// no extension.
    pub fn extension(&self) -> &str {
        let name = self.components().last().unwrap_or("");
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx + 1..],
            _ => "",
        }
    }

    /// Returns a copy with the extension replaced; an empty `ext` removes it.
    pub fn with_extension(&self, ext: &str) -> Identity {
        let (dir, name) = match self.0.rfind('/') {
            Some(idx) => (&self.0[..idx + 1], &self.0[idx + 1..]),
            None => ("", self.0.as_str()),
        };
        let stem = match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        };
        let mut out = format!("{}{}", dir, stem);
        if !ext.is_empty() {
            out.push('.');
            out.push_str(ext);
        }
        Identity::new(&out)
    }

    /// Appends `rhs` to this identity.  An absolute `rhs` replaces it.
    pub fn join(&self, rhs: &Identity) -> Identity {
        if rhs.is_absolute() || self.is_current() {
            return rhs.clone();
        }
        if rhs.is_current() {
            return self.clone();
        }
        Identity::new(&format!("{}/{}", self.0, rhs.0))
    }

    /// Removes `prefix` from the front of this identity, component-wise.
    pub fn strip_prefix(&self, prefix: &Identity) -> Option<Identity> {
        if prefix.is_current() && !self.is_absolute() {
            return Some(self.clone());
        }
        if self.is_absolute() != prefix.is_absolute() {
            return None;
        }
        let mut mine = self.components();
        for theirs in prefix.components() {
            if mine.next() != Some(theirs) {
                return None;
            }
        }
        let rest: Vec<&str> = mine.collect();
        Some(Identity::new(&rest.join("/")))
    }

    /// Interprets this identity relative to `root`.  Absolute identities are
    /// returned as is.
    pub fn under(&self, root: &Path) -> PathBuf {
        if self.is_absolute() || root == Path::new(".") || root.as_os_str().is_empty() {
            PathBuf::from(&self.0)
        } else if self.is_current() {
            root.to_path_buf()
        } else {
            root.join(&self.0)
        }
    }
}

impl From<&str> for Identity {
    fn from(path: &str) -> Self {
        Identity::new(path)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:?})", self.0)
    }
}

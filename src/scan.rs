//! Include scanning: discovers the headers a C-like source pulls in with
//! `#include "..."` and records them as dynamic dependencies.
//!
//! Only quoted includes are considered, resolved relative to the including
//! file.  Includes that resolve to nothing known are assumed to come from a
//! system include path and are not tracked.

use crate::error::BuildError;
use crate::graph::Context;
use crate::path::Identity;
use crate::rule::Declare;
use crate::scanner::Scanner;
use anyhow::anyhow;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tracing::debug;

/// Conventional name of the dynamic set holding scanned headers.
pub const INCLUDES: &str = "includes";

/// Returns the quoted include paths in `text`, in order of appearance.
pub fn parse_includes(text: &str) -> Vec<&str> {
    let mut includes = Vec::new();
    let mut scanner = Scanner::new(text);
    while !scanner.at_end() {
        let line = scanner.read_line();
        scanner.skip_newline();

        let mut line = Scanner::new(line);
        line.skip_spaces();
        if !line.skip('#') {
            continue;
        }
        line.skip_spaces();
        let rest = line.read_line();
        let rest = match rest.strip_prefix("include") {
            Some(rest) => rest.trim_start(),
            None => continue,
        };
        if let Some(quoted) = rest.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                includes.push(&quoted[..end]);
            }
        }
    }
    includes
}

/// Scans the builder's static sources, and transitively the headers they
/// include, declaring every header found as a member of `set`.
pub fn declare_includes(declare: &mut Declare, set: &str) -> anyhow::Result<()> {
    let mut queue: VecDeque<_> = declare.sources().into();
    let mut seen = FxHashSet::default();
    while let Some((identity, location)) = queue.pop_front() {
        let text = match std::fs::read_to_string(&location) {
            Ok(text) => text,
            // Not produced yet; it is scanned once built.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(anyhow!("scan {}: {}", location.display(), err)),
        };
        for include in parse_includes(&text) {
            let header = identity.parent().join(&Identity::new(include));
            if !seen.insert(header.clone()) {
                continue;
            }
            let ctx = declare.context();
            let produced = ctx
                .lookup(&header)
                .map_or(false, |node| ctx.node(node).builder.is_some());
            if !produced && !header.under(&ctx.config().srctree).exists() {
                debug!("{}: include {:?} not found, ignoring", identity, include);
                continue;
            }
            let node = declare.add_identity(set, &header)?;
            let location = declare.context().location(node);
            queue.push_back((header, location));
        }
    }
    Ok(())
}

/// Installs the handler that re-materializes scanned headers named in a
/// reloaded ledger of `set`.
pub fn register(ctx: &mut Context, set: &str) {
    ctx.register_handler(set, |ctx, _builder, identity| {
        match ctx.resolve_identity(identity) {
            Ok(node) => Ok(Some(node)),
            // A header that has disappeared still needs a node; building it
            // then reports it missing.
            Err(BuildError::UnknownArtifactType { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    });
}

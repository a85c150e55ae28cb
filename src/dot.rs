//! Graphviz export of the build graph.
//!
//! Nodes and builders are named by their sequence numbers; nodes are labeled
//! with their location, builders with their description.  Paths matching any
//! of the filter patterns are left out, along with the edges touching them.

use crate::graph::Context;
use regex::Regex;
use std::io::Write;

/// Quotes `text` as a dot string literal.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

pub fn write(ctx: &Context, filters: &[Regex], out: &mut impl Write) -> std::io::Result<()> {
    let take = |path: &str| !filters.iter().any(|filter| filter.is_match(path));

    writeln!(out, "digraph")?;
    writeln!(out, "{{")?;
    for (id, node) in ctx.nodes() {
        if take(node.identity.as_str()) {
            let location = ctx.location(id);
            let label = quote(&location.to_string_lossy());
            writeln!(out, "  node_{} [label={}]", id.index(), label)?;
        }
    }
    writeln!(out)?;
    for id in ctx.builder_ids() {
        let builder = ctx.builder(id);
        writeln!(
            out,
            "  builder_{} [label={}, shape=rect]",
            id.index(),
            quote(builder.description())
        )?;
        for (identity, src) in builder.sources().chain(builder.dynamic_sources()) {
            if take(identity.as_str()) {
                writeln!(out, "  node_{} -> builder_{}", src.index(), id.index())?;
            }
        }
        for &dst in builder.outputs() {
            if take(ctx.node(dst).identity.as_str()) {
                writeln!(out, "  builder_{} -> node_{}", id.index(), dst.index())?;
            }
        }
    }
    writeln!(out, "}}")?;
    Ok(())
}

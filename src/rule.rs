//! Rules: what a builder actually does.
//!
//! A builder holds a `Rule` rather than being subclassed.  The build driver
//! asks the rule for fresh dynamic dependencies right before each execution
//! and then executes it.

use crate::error::Result;
use crate::graph::{BuilderId, Context, NodeId};
use crate::path::Identity;
use crate::scan;
use crate::task::{self, TaskResult};
use std::path::PathBuf;

pub trait Rule {
    /// Short human-readable name, used in progress and error messages.
    fn describe(&self) -> String;

    /// The command line to show in verbose mode, if the rule has one.
    fn command(&self, _step: &Step) -> Option<String> {
        None
    }

    /// Declares the dynamic sources of this execution.  The builder's
    /// previous dynamic sources have already been discarded.
    fn dependencies(&mut self, _declare: &mut Declare) -> anyhow::Result<()> {
        Ok(())
    }

    /// Produces the builder's outputs.
    fn execute(&mut self, step: &Step) -> anyhow::Result<TaskResult>;
}

/// Handed to `Rule::dependencies`, to record dynamic sources.
pub struct Declare<'a> {
    ctx: &'a mut Context,
    builder: BuilderId,
}

impl<'a> Declare<'a> {
    pub(crate) fn new(ctx: &'a mut Context, builder: BuilderId) -> Self {
        Declare { ctx, builder }
    }

    pub fn builder(&self) -> BuilderId {
        self.builder
    }

    pub fn context(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    /// Static sources as (identity, location) pairs, in identity order.
    pub fn sources(&self) -> Vec<(Identity, PathBuf)> {
        self.ctx
            .builder(self.builder)
            .sources()
            .map(|(identity, node)| (identity.clone(), self.ctx.location(node)))
            .collect()
    }

    /// Records `node` as a member of the dynamic set `set`.
    pub fn add(&mut self, set: &str, node: NodeId) -> Result<()> {
        self.ctx.add_dynamic_source(self.builder, set, node)
    }

    /// Records the node for `identity`, creating a plain node if unknown.
    pub fn add_identity(&mut self, set: &str, identity: &Identity) -> Result<NodeId> {
        let node = self.ctx.node_id(identity);
        self.add(set, node)?;
        Ok(node)
    }
}

/// Handed to `Rule::execute`: a read-only view of the builder being run.
pub struct Step<'a> {
    ctx: &'a Context,
    builder: BuilderId,
}

impl<'a> Step<'a> {
    pub(crate) fn new(ctx: &'a Context, builder: BuilderId) -> Self {
        Step { ctx, builder }
    }

    pub fn builder(&self) -> BuilderId {
        self.builder
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    /// Locations of the static sources, in declaration order.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.locations(self.ctx.builder(self.builder).inputs())
    }

    /// Locations of the declared outputs, in declaration order.
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.locations(self.ctx.builder(self.builder).outputs())
    }

    /// Locations of the dynamic sources, in identity order.
    pub fn dynamic_sources(&self) -> Vec<PathBuf> {
        self.ctx
            .builder(self.builder)
            .dynamic_sources()
            .map(|(_, node)| self.ctx.location(node))
            .collect()
    }

    fn locations(&self, nodes: &[NodeId]) -> Vec<PathBuf> {
        nodes.iter().map(|&node| self.ctx.location(node)).collect()
    }
}

/// Runs a command line through the shell.
///
/// `$in` and `$out` in the command expand to the space-separated locations
/// of the inputs and outputs; `$$` is a literal `$`.
pub struct ShellCommand {
    command: String,
    description: Option<String>,
    /// Dynamic set that receives headers found by scanning the sources.
    scan: Option<String>,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        ShellCommand {
            command: command.into(),
            description: None,
            scan: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Scan sources for `#include "..."` lines, recording the headers in the
    /// dynamic set `set`.
    pub fn with_scan(mut self, set: impl Into<String>) -> Self {
        self.scan = Some(set.into());
        self
    }

    fn expand(&self, step: &Step) -> String {
        let join = |paths: Vec<PathBuf>| {
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        expand_vars(&self.command, |var| match var {
            "in" => Some(join(step.inputs())),
            "out" => Some(join(step.outputs())),
            _ => None,
        })
    }
}

/// Expands `$name` and `${name}` references using `lookup`; unknown names
/// expand to nothing.
pub fn expand_vars(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 1..];
        if let Some(after) = rest.strip_prefix('$') {
            out.push('$');
            rest = after;
            continue;
        }
        let (name, after) = if let Some(braced) = rest.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => (braced, ""),
            }
        } else {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            (&rest[..end], &rest[end..])
        };
        if let Some(value) = lookup(name) {
            out.push_str(&value);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

impl Rule for ShellCommand {
    fn describe(&self) -> String {
        match &self.description {
            Some(desc) => desc.clone(),
            None => self.command.clone(),
        }
    }

    fn command(&self, step: &Step) -> Option<String> {
        Some(self.expand(step))
    }

    fn dependencies(&mut self, declare: &mut Declare) -> anyhow::Result<()> {
        match &self.scan {
            Some(set) => scan::declare_includes(declare, set),
            None => Ok(()),
        }
    }

    fn execute(&mut self, step: &Step) -> anyhow::Result<TaskResult> {
        // Locations are relative to the working directory, so run there.
        task::run_command(&self.expand(step), None)
    }
}

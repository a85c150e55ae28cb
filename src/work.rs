//! Build runner: decides which builders need to execute and executes them.
//!
//! Traversal is depth first.  A builder first brings all of its sources up to
//! date, then compares the content of every recorded dependency against its
//! ledgers, and executes only if something differs, a dependency is new, or
//! an output is missing.

use crate::depfile;
use crate::error::{io_err, BuildError, Result};
use crate::graph::{BuildState, BuilderId, Context, NodeId, PRIMARY_SET};
use crate::path::Identity;
use crate::progress::Progress;
use crate::rule::{Declare, Rule, Step};
use crate::task::{TaskResult, Termination};
use anyhow::anyhow;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

pub struct Work<'a> {
    ctx: &'a mut Context,
    progress: &'a mut dyn Progress,
    /// Number of builders executed so far.
    executed: usize,
}

impl<'a> Work<'a> {
    pub fn new(ctx: &'a mut Context, progress: &'a mut dyn Progress) -> Self {
        Work {
            ctx,
            progress,
            executed: 0,
        }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Builds the node named by `path`.
    pub fn want(&mut self, path: &str) -> Result<()> {
        let id = self.ctx.resolve(path)?;
        self.build_node(id)
    }

    /// Brings a node up to date: runs its builder, or for a plain input
    /// checks that the file exists.
    pub fn build_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.ctx.node(id);
        debug!("building {}", node.identity);
        match node.builder {
            Some(builder) => self.run_builder(builder),
            None => {
                let location = self.ctx.location(id);
                if location.exists() {
                    Ok(())
                } else {
                    Err(BuildError::MissingInput {
                        identity: node.identity.clone(),
                        location,
                    })
                }
            }
        }
    }

    /// Runs a builder at most once per build.
    pub fn run_builder(&mut self, id: BuilderId) -> Result<()> {
        let builder = self.ctx.builder(id);
        match builder.state() {
            BuildState::Idle => {}
            BuildState::Done => {
                debug!("  {}: already built in this run", builder.description());
                return Ok(());
            }
            BuildState::Running => {
                return Err(BuildError::DependencyCycle {
                    builder: builder.description().to_string(),
                })
            }
            BuildState::Failed => {
                return Err(BuildError::AlreadyFailed {
                    builder: builder.description().to_string(),
                })
            }
        }

        self.ctx.builder_mut(id).state = BuildState::Running;
        let result = self.run_builder_inner(id);
        self.ctx.builder_mut(id).state = match result {
            Ok(()) => BuildState::Done,
            Err(_) => BuildState::Failed,
        };
        result
    }

    fn run_builder_inner(&mut self, id: BuilderId) -> Result<()> {
        // The list of static dependencies is now fixed.
        let builder = self.ctx.builder_mut(id);
        let sources: Vec<(Identity, NodeId)> = builder
            .sources
            .iter()
            .map(|(identity, &node)| (identity.clone(), node))
            .collect();
        for (identity, node) in &sources {
            builder.primary.register(identity.clone(), *node);
        }

        self.reload_dynamic(id)?;

        for &(_, node) in &sources {
            self.build_node(node)?;
        }
        let dynamic: Vec<NodeId> = self.ctx.builder(id).dynamic.values().copied().collect();
        for node in dynamic {
            self.build_node(node)?;
        }

        if !self.needs_execute(id)? {
            debug!("  {}: everything is up to date", self.ctx.builder(id).description());
            return Ok(());
        }

        let mut rule = match self.ctx.builder_mut(id).rule.take() {
            Some(rule) => rule,
            None => {
                return Err(BuildError::DependencyCycle {
                    builder: self.ctx.builder(id).description().to_string(),
                })
            }
        };
        let result = self.execute(id, rule.as_mut());
        self.ctx.builder_mut(id).rule = Some(rule);
        result
    }

    /// Reloads the dynamic dependency sets recorded by the last execution.
    fn reload_dynamic(&mut self, id: BuilderId) -> Result<()> {
        let cache_dir = self.ctx.builder(id).cache_dir().to_path_buf();
        for name in depfile::list_ledgers(&cache_dir)? {
            if name == PRIMARY_SET {
                continue;
            }
            let builder = self.ctx.builder_mut(id);
            let depfile = builder.dependency_set_mut(&name);
            depfile.read()?;
            let members: Vec<Identity> = depfile.loaded().keys().cloned().collect();

            let handler = match self.ctx.handler(&name) {
                Some(handler) => handler,
                None => {
                    return Err(BuildError::UnknownDependencySet {
                        builder: self.ctx.builder(id).description().to_string(),
                        set: name,
                    })
                }
            };

            for identity in members {
                let builder = self.ctx.builder(id);
                if builder.sources.contains_key(&identity) || builder.dynamic.contains_key(&identity)
                {
                    continue;
                }
                let node = match self.ctx.lookup(&identity) {
                    Some(node) => node,
                    None => match handler(self.ctx, id, &identity) {
                        Ok(Some(node)) => node,
                        Ok(None) => self.ctx.node_id(&identity),
                        Err(cause) => {
                            return Err(BuildError::StaleDependencyReadError {
                                set: name,
                                identity,
                                cause,
                            })
                        }
                    },
                };
                self.ctx.add_dynamic_source(id, &name, node)?;
            }
        }
        Ok(())
    }

    /// Decides whether a builder whose sources are up to date must execute.
    fn needs_execute(&mut self, id: BuilderId) -> Result<bool> {
        self.ctx.builder_mut(id).primary.read()?;

        let ctx = &*self.ctx;
        let builder = ctx.builder(id);

        for &out in builder.outputs() {
            if !ctx.location(out).exists() {
                debug!(
                    "  execution needed because of missing target: {}",
                    ctx.location(out).display()
                );
                return Ok(true);
            }
        }

        for identity in builder.sources.keys() {
            if !builder.primary.loaded().contains_key(identity) {
                debug!("  execution needed because a new dependency appeared: {}", identity);
                return Ok(true);
            }
        }

        if !builder.primary.is_up_to_date(ctx) {
            return Ok(true);
        }
        for depfile in builder.dependency_sets() {
            if !depfile.is_up_to_date(ctx) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn execute(&mut self, id: BuilderId, rule: &mut dyn Rule) -> Result<()> {
        let description = self.ctx.builder(id).description().to_string();
        let first_output = self.ctx.node(self.ctx.builder(id).outputs()[0]).identity.clone();
        let failed = |cause: anyhow::Error| BuildError::ExecutionFailed {
            builder: description.clone(),
            output: first_output.clone(),
            cause,
        };

        // Regenerate dynamic dependencies.  A produced dependency may only
        // become readable once built, and its content may name further
        // dependencies, so the rule is asked again until it declares no
        // produced node that wasn't already built.
        let mut built = FxHashSet::default();
        loop {
            self.ctx.builder_mut(id).clear_dynamic();
            rule.dependencies(&mut Declare::new(self.ctx, id))
                .map_err(&failed)?;
            let dynamic: Vec<NodeId> = self.ctx.builder(id).dynamic.values().copied().collect();
            let mut produced = false;
            for node in dynamic {
                if !built.insert(node) {
                    continue;
                }
                self.build_node(node)?;
                produced |= self.ctx.node(node).builder.is_some();
            }
            if !produced {
                break;
            }
        }

        let step = Step::new(self.ctx, id);
        for out in step.outputs() {
            if let Some(dir) = out.parent() {
                std::fs::create_dir_all(dir).map_err(io_err(dir))?;
            }
        }
        let command = rule.command(&step);
        self.progress.task_started(&description, command.as_deref());
        let result = match rule.execute(&step) {
            Ok(result) => result,
            Err(err) => {
                self.progress
                    .task_finished(&description, &TaskResult::failure(format!("{:#}\n", err)));
                return Err(failed(err));
            }
        };
        self.progress.task_finished(&description, &result);
        match result.termination {
            Termination::Success => {}
            Termination::Interrupted => return Err(failed(anyhow!("interrupted"))),
            Termination::Failure => return Err(failed(anyhow!("command failed"))),
        }

        let ctx = &*self.ctx;
        let builder = ctx.builder(id);
        for &out in builder.outputs() {
            if !ctx.location(out).exists() {
                return Err(BuildError::OutputNotProduced {
                    builder: description,
                    output: ctx.node(out).identity.clone(),
                });
            }
        }

        builder.primary.persist(ctx)?;
        for depfile in builder.dependency_sets() {
            depfile.persist(ctx)?;
        }
        // Forget sets this execution no longer declared, so they are not
        // reloaded next time.
        for name in depfile::list_ledgers(builder.cache_dir())? {
            if name != PRIMARY_SET && builder.dependency_set(&name).is_none() {
                warn!("{}: dropping obsolete dependency set {:?}", description, name);
                let path = builder.cache_dir().join(&name);
                std::fs::remove_file(&path).map_err(io_err(&path))?;
            }
        }

        info!("executed {}", description);
        self.executed += 1;
        Ok(())
    }
}

/// Deletes the produced file `node` and, recursively, the produced files it
/// is built from, along with the ledgers of their builders.  Source files are
/// never touched.  Returns the number of produced files deleted.
pub fn clean(ctx: &Context, node: NodeId, progress: &mut dyn Progress) -> Result<usize> {
    let mut visited = FxHashSet::default();
    clean_node(ctx, node, progress, &mut visited)
}

fn clean_node(
    ctx: &Context,
    node: NodeId,
    progress: &mut dyn Progress,
    visited: &mut FxHashSet<NodeId>,
) -> Result<usize> {
    if !visited.insert(node) {
        return Ok(0);
    }
    let builder = match ctx.node(node).builder {
        Some(builder) => builder,
        None => return Ok(0),
    };
    let mut removed = 0;
    for (_, src) in ctx.builder(builder).sources() {
        removed += clean_node(ctx, src, progress, visited)?;
    }
    let path = ctx.location(node);
    if path.exists() {
        progress.log(&format!("Deleting {}", path.display()));
        std::fs::remove_file(&path).map_err(io_err(&path))?;
        removed += 1;
    }
    // Forget the recorded hashes too, so the next build starts over even if a
    // recorded dynamic source has since disappeared.
    let cache_dir = ctx.builder(builder).cache_dir();
    if cache_dir.exists() {
        std::fs::remove_dir_all(cache_dir).map_err(io_err(cache_dir))?;
    }
    Ok(removed)
}

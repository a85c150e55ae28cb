//! Graph loading: runs drakefile parsing and constructs the build context
//! from it.

use crate::error::BuildError;
use crate::graph::{Config, Context, NodeId, PRIMARY_SET};
use crate::parse::{self, Statement};
use crate::path::Identity;
use crate::rule::{expand_vars, ShellCommand};
use crate::scan;
use anyhow::{anyhow, bail};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of a manifest, both at the top level and in included
/// directories.
pub const MANIFEST: &str = "drakefile";

/// Internal state used while loading.
struct Loader {
    ctx: Context,
    default: Vec<NodeId>,
    scan_sets: FxHashSet<String>,
    /// Canonical paths of the manifests being read, outermost first.
    reading: Vec<PathBuf>,
}

impl Loader {
    /// Paths in a manifest are relative to the directory it was included
    /// from.
    fn path(&mut self, prefix: &Identity, path: &str) -> NodeId {
        self.ctx.node_id(&prefix.join(&Identity::new(path)))
    }

    fn add_build(
        &mut self,
        filename: &Path,
        prefix: &Identity,
        b: parse::Build,
    ) -> anyhow::Result<()> {
        let line = b.line;
        let located = |msg: String| anyhow!("{}:{}: {}", filename.display(), line, msg);

        let mut command = None;
        let mut description = None;
        let mut scan = None;
        for &(key, value) in &b.vars {
            match key {
                "command" => command = Some(value),
                "description" => description = Some(value),
                "scan" => scan = Some(value),
                _ => return Err(located(format!("unknown variable {:?}", key))),
            }
        }
        let command = match command {
            Some(command) => command,
            None => return Err(located("build has no command".to_string())),
        };

        let outs: Vec<Identity> = b.outs.iter().map(|p| prefix.join(&Identity::new(p))).collect();
        let ins: Vec<Identity> = b.ins.iter().map(|p| prefix.join(&Identity::new(p))).collect();

        let mut rule = ShellCommand::new(command);
        if let Some(description) = description {
            let join = |ids: &[Identity]| {
                ids.iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            rule = rule.with_description(expand_vars(description, |var| match var {
                "in" => Some(join(&ins)),
                "out" => Some(join(&outs)),
                _ => None,
            }));
        }
        if let Some(set) = scan {
            if set == PRIMARY_SET {
                let err = BuildError::ReservedSetName {
                    set: set.to_string(),
                };
                return Err(located(err.to_string()));
            }
            self.scan_sets.insert(set.to_string());
            rule = rule.with_scan(set);
        }

        // A source naming the output of a later build gets the same node, which
        // that build attaches to once it is loaded.
        let outs = outs.iter().map(|id| self.ctx.node_id(id)).collect();
        let ins = ins.iter().map(|id| self.ctx.node_id(id)).collect();
        self.ctx
            .add_builder(ins, outs, Box::new(rule))
            .map_err(|err| located(err.to_string()))?;
        Ok(())
    }

    fn read_file(&mut self, filename: &Path, prefix: &Identity) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(filename)
            .map_err(|err| anyhow!("read {}: {}", filename.display(), err))?;
        let canonical = std::fs::canonicalize(filename)
            .map_err(|err| anyhow!("read {}: {}", filename.display(), err))?;
        if self.reading.contains(&canonical) {
            bail!("{}: include cycle", filename.display());
        }
        self.reading.push(canonical);

        let mut parser = parse::Parser::new(&text);
        loop {
            let stmt = match parser.read() {
                Ok(Some(stmt)) => stmt,
                Ok(None) => break,
                Err(err) => bail!(parser.format_parse_error(filename, &err)),
            };
            match stmt {
                Statement::Build(b) => self.add_build(filename, prefix, b)?,
                Statement::Default(paths) => {
                    for path in paths {
                        let id = self.path(prefix, path);
                        self.default.push(id);
                    }
                }
                Statement::Include(dir) => {
                    let sub = filename
                        .parent()
                        .unwrap_or(Path::new(""))
                        .join(dir)
                        .join(MANIFEST);
                    debug!("including {}", sub.display());
                    self.read_file(&sub, &prefix.join(&Identity::new(dir)))?;
                }
            }
        }

        self.reading.pop();
        Ok(())
    }
}

pub struct State {
    pub ctx: Context,
    pub default: Vec<NodeId>,
}

/// Load a drakefile and return the constructed build context.
pub fn read(filename: &Path, config: Config) -> anyhow::Result<State> {
    let mut loader = Loader {
        ctx: Context::new(config),
        default: Vec::new(),
        scan_sets: FxHashSet::default(),
        reading: Vec::new(),
    };
    loader.read_file(filename, &Identity::new("."))?;

    for set in &loader.scan_sets {
        scan::register(&mut loader.ctx, set);
    }
    debug!(
        "loaded {}: {} builders",
        filename.display(),
        loader.ctx.builder_ids().count()
    );
    Ok(State {
        ctx: loader.ctx,
        default: loader.default,
    })
}

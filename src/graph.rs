//! The build graph, a graph between nodes (files) and builders (rules).
//!
//! A `Context` owns every node and builder of one build.  Nodes are unique
//! per identity: asking twice for the same path yields the same `NodeId`.

use crate::depfile::DepFile;
use crate::error::{BuildError, Result};
use crate::path::Identity;
use crate::rule::Rule;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Name of the ledger holding a builder's static sources.
pub const PRIMARY_SET: &str = "drake";

/// Where a build reads its sources and writes its products.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root that identities of source-only nodes are resolved under.
    pub srctree: PathBuf,
    /// Root that identities of produced nodes are resolved under.
    pub build_root: PathBuf,
    /// Name of the per-directory cache holding ledgers.
    pub cache_subdir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            srctree: PathBuf::from("."),
            build_root: PathBuf::from("."),
            cache_subdir: ".drake".to_string(),
        }
    }
}

/// Index of a node; also its creation sequence number.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);
impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BuilderId(usize);
impl BuilderId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A single build artifact.
#[derive(Debug)]
pub struct Node {
    pub identity: Identity,
    /// The builder producing this node; None for inputs that must already
    /// exist on disk.
    pub builder: Option<BuilderId>,
}

/// Progress of a builder within one build invocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    /// Currently determining staleness or executing; seeing this state again
    /// while descending into sources means a cycle.
    Running,
    Done,
    Failed,
}

pub struct Builder {
    /// Static sources, fixed at construction.
    pub(crate) sources: BTreeMap<Identity, NodeId>,
    /// Static sources in declaration order, for rules that care (e.g. `$in`).
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) outputs: Vec<NodeId>,
    /// Sources discovered while determining or executing dependencies.
    pub(crate) dynamic: BTreeMap<Identity, NodeId>,
    /// Dynamic dependency sets by name.
    pub(crate) depfiles: BTreeMap<String, DepFile>,
    pub(crate) primary: DepFile,
    pub(crate) state: BuildState,
    pub(crate) rule: Option<Box<dyn Rule>>,
    cache_dir: PathBuf,
    description: String,
}

impl Builder {
    pub fn sources(&self) -> impl Iterator<Item = (&Identity, NodeId)> {
        self.sources.iter().map(|(id, &node)| (id, node))
    }
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }
    pub fn dynamic_sources(&self) -> impl Iterator<Item = (&Identity, NodeId)> {
        self.dynamic.iter().map(|(id, &node)| (id, node))
    }
    pub fn state(&self) -> BuildState {
        self.state
    }
    pub fn primary(&self) -> &DepFile {
        &self.primary
    }
    pub fn dependency_set(&self, name: &str) -> Option<&DepFile> {
        self.depfiles.get(name)
    }
    pub fn dependency_sets(&self) -> impl Iterator<Item = &DepFile> {
        self.depfiles.values()
    }
    /// Directory holding this builder's ledgers.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the named dependency set, creating it on first use.
    pub(crate) fn dependency_set_mut(&mut self, name: &str) -> &mut DepFile {
        let cache_dir = &self.cache_dir;
        self.depfiles
            .entry(name.to_string())
            .or_insert_with(|| DepFile::new(name, cache_dir.join(name)))
    }

    pub(crate) fn add_dynamic_source(&mut self, set: &str, identity: Identity, node: NodeId) {
        self.dependency_set_mut(set).register(identity.clone(), node);
        self.dynamic.insert(identity, node);
    }

    pub(crate) fn clear_dynamic(&mut self) {
        self.dynamic.clear();
        self.depfiles.clear();
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("description", &self.description)
            .field("sources", &self.sources)
            .field("outputs", &self.outputs)
            .field("dynamic", &self.dynamic)
            .field("state", &self.state)
            .finish()
    }
}

/// Constructs a node for an identity of a known file type.
pub type NodeFactory = Rc<dyn Fn(&mut Context, &Identity) -> Result<NodeId>>;

/// Materializes a node for a member of a reloaded dynamic dependency set that
/// is not yet known.  Returning None asks for a plain placeholder node.
pub type DepsHandler =
    Rc<dyn Fn(&mut Context, BuilderId, &Identity) -> anyhow::Result<Option<NodeId>>>;

pub struct Context {
    config: Config,
    nodes: Vec<Node>,
    builders: Vec<Builder>,
    by_identity: FxHashMap<Identity, NodeId>,
    factories: FxHashMap<String, NodeFactory>,
    handlers: FxHashMap<String, DepsHandler>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Context {
            config,
            nodes: Vec::new(),
            builders: Vec::new(),
            by_identity: FxHashMap::default(),
            factories: FxHashMap::default(),
            handlers: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn builder(&self, id: BuilderId) -> &Builder {
        &self.builders[id.0]
    }

    pub(crate) fn builder_mut(&mut self, id: BuilderId) -> &mut Builder {
        &mut self.builders[id.0]
    }

    pub fn builder_ids(&self) -> impl Iterator<Item = BuilderId> {
        (0..self.builders.len()).map(BuilderId)
    }

    pub fn lookup(&self, identity: &Identity) -> Option<NodeId> {
        self.by_identity.get(identity).copied()
    }

    /// Returns the node for an identity, creating a plain node if needed.
    pub fn node_id(&mut self, identity: &Identity) -> NodeId {
        if let Some(id) = self.lookup(identity) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            identity: identity.clone(),
            builder: None,
        });
        self.by_identity.insert(identity.clone(), id);
        id
    }

    /// Registers a producer for every not-yet-known identity with extension
    /// `ext`.
    pub fn register_extension(
        &mut self,
        ext: &str,
        factory: impl Fn(&mut Context, &Identity) -> Result<NodeId> + 'static,
    ) {
        self.factories.insert(ext.to_string(), Rc::new(factory));
    }

    /// Resolves a path string to its node.  A relative path spelled through
    /// the source tree names the same node as the path within it.
    pub fn resolve(&mut self, path: &str) -> Result<NodeId> {
        let identity = Identity::new(path);
        if self.lookup(&identity).is_some() {
            return self.resolve_identity(&identity);
        }
        let identity = self.strip_srctree(&identity);
        self.resolve_identity(&identity)
    }

    /// Removes the source tree from the front of a relative identity.
    pub fn strip_srctree(&self, identity: &Identity) -> Identity {
        let srctree = Identity::new(&self.config.srctree.to_string_lossy());
        if identity.is_absolute() || srctree.is_current() {
            return identity.clone();
        }
        identity
            .strip_prefix(&srctree)
            .unwrap_or_else(|| identity.clone())
    }

    /// Returns the known node for `identity`, or constructs one through the
    /// producer registered for its file type, or, failing that, a plain node
    /// for a file present in the source tree.
    pub fn resolve_identity(&mut self, identity: &Identity) -> Result<NodeId> {
        if let Some(id) = self.lookup(identity) {
            return Ok(id);
        }
        if let Some(factory) = self.factories.get(identity.extension()).cloned() {
            return factory(self, identity);
        }
        if identity.under(&self.config.srctree).exists() {
            return Ok(self.node_id(identity));
        }
        Err(BuildError::UnknownArtifactType {
            identity: identity.clone(),
        })
    }

    /// Associates a handler with a dynamic dependency set name.
    pub fn register_handler(
        &mut self,
        set: &str,
        handler: impl Fn(&mut Context, BuilderId, &Identity) -> anyhow::Result<Option<NodeId>>
            + 'static,
    ) {
        self.handlers.insert(set.to_string(), Rc::new(handler));
    }

    pub fn handler(&self, set: &str) -> Option<DepsHandler> {
        self.handlers.get(set).cloned()
    }

    /// Resolved on-disk location of a node.
    pub fn location(&self, id: NodeId) -> PathBuf {
        let node = self.node(id);
        let root = match node.builder {
            None => &self.config.srctree,
            Some(_) => &self.config.build_root,
        };
        node.identity.under(root)
    }

    /// Adds a builder producing `outputs` from `sources`.
    ///
    /// Fails without modifying the graph if any output already has a
    /// builder.
    pub fn add_builder(
        &mut self,
        sources: Vec<NodeId>,
        outputs: Vec<NodeId>,
        rule: Box<dyn Rule>,
    ) -> Result<BuilderId> {
        if outputs.is_empty() {
            return Err(BuildError::EmptyOutputs);
        }
        for (i, &out) in outputs.iter().enumerate() {
            let existing = match self.node(out).builder {
                Some(b) => Some(self.builder(b).description.clone()),
                None if outputs[..i].contains(&out) => Some(rule.describe()),
                None => None,
            };
            if let Some(existing) = existing {
                return Err(BuildError::BuilderConflict {
                    output: self.node(out).identity.clone(),
                    existing,
                });
            }
        }

        let id = BuilderId(self.builders.len());
        for &out in &outputs {
            self.attach(out, id);
        }

        // The cache directory hangs off the first output, which now resolves
        // under the build root.
        let first = self.location(outputs[0]);
        let name = first.file_name().map(PathBuf::from).unwrap_or_default();
        let cache_dir = first
            .parent()
            .unwrap_or(Path::new(""))
            .join(&self.config.cache_subdir)
            .join(name);

        let mut by_identity = BTreeMap::new();
        let mut inputs = Vec::new();
        for src in sources {
            if by_identity
                .insert(self.node(src).identity.clone(), src)
                .is_none()
            {
                inputs.push(src);
            }
        }

        let description = rule.describe();
        self.builders.push(Builder {
            sources: by_identity,
            inputs,
            outputs,
            dynamic: BTreeMap::new(),
            depfiles: BTreeMap::new(),
            primary: DepFile::new(PRIMARY_SET, cache_dir.join(PRIMARY_SET)),
            state: BuildState::Idle,
            rule: Some(rule),
            cache_dir,
            description,
        });
        Ok(id)
    }

    fn attach(&mut self, node: NodeId, builder: BuilderId) {
        // Registry keys are identities, not locations, so the entry stays
        // valid while the node moves from the source tree to the build root.
        self.nodes[node.0].builder = Some(builder);
    }

    /// Records `node` as a member of dynamic set `set` of `builder`.
    ///
    /// The primary set's ledger shares the cache directory with the dynamic
    /// ones, so its name can't be used for a dynamic set.
    pub(crate) fn add_dynamic_source(
        &mut self,
        builder: BuilderId,
        set: &str,
        node: NodeId,
    ) -> Result<()> {
        if set == PRIMARY_SET {
            return Err(BuildError::ReservedSetName {
                set: set.to_string(),
            });
        }
        let identity = self.node(node).identity.clone();
        self.builder_mut(builder)
            .add_dynamic_source(set, identity, node);
        Ok(())
    }

    /// Static and dynamic sources of `builder`, recursively through the
    /// builders producing them, each listed once.
    pub fn all_sources(&self, builder: BuilderId) -> Vec<NodeId> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut out = Vec::new();
        let mut stack = vec![builder];
        let mut visited = rustc_hash::FxHashSet::default();
        while let Some(b) = stack.pop() {
            if !visited.insert(b) {
                continue;
            }
            let b = self.builder(b);
            for (_, src) in b.sources().chain(b.dynamic_sources()) {
                if seen.insert(src) {
                    out.push(src);
                    if let Some(inner) = self.node(src).builder {
                        stack.push(inner);
                    }
                }
            }
        }
        out
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("nodes", &self.nodes)
            .field("builders", &self.builders)
            .finish()
    }
}

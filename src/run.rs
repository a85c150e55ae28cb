use anyhow::{anyhow, bail};
use argh::FromArgs;
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing_subscriber::EnvFilter;

use crate::graph::{Config, NodeId};
use crate::{dot, load, progress::ConsoleProgress, work};

/// drake, an incremental build engine driven by content hashes
#[derive(FromArgs)]
struct Opts {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<String>,

    /// input build file [default=drakefile]
    #[argh(option, short = 'f', default = "String::from(load::MANIFEST)")]
    file: String,

    /// directory holding source files [default=.]
    #[argh(option, short = 's')]
    srctree: Option<String>,

    /// debugging tools (-d list to list)
    #[argh(option, short = 'd')]
    debug: Option<String>,

    /// subcommands (-t list to list)
    #[argh(option, short = 't')]
    tool: Option<String>,

    /// print executed command lines
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// targets to build, or path patterns to leave out with -t graph
    #[argh(positional)]
    targets: Vec<String>,
}

/// Installs the tracing subscriber.  DRAKE_LOG takes an EnvFilter directive;
/// without it, explaining rebuild decisions turns on debug output.
fn init_logging(explain: bool) {
    let default = if explain { "drake=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("DRAKE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // Fails only if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Runs the command line; returns the process exit code.
pub fn run() -> anyhow::Result<i32> {
    let opts: Opts = argh::from_env();

    let mut explain = std::env::var_os("DRAKE_DEBUG").is_some();
    if let Some(debug) = &opts.debug {
        match debug.as_str() {
            "list" => {
                println!("debug tools:");
                println!("  explain  print why each builder runs");
                return Ok(1);
            }
            "explain" => explain = true,
            _ => bail!("unknown -d {:?}, use -d list to list", debug),
        }
    }
    if opts.tool.as_deref() == Some("list") {
        println!("subcommands:");
        println!("  clean    remove produced files of the targets");
        println!("  graph    print the build graph in dot format");
        println!("  sources  list all sources of the targets");
        return Ok(1);
    }
    init_logging(explain);

    if let Some(dir) = &opts.chdir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }

    let mut config = Config::default();
    if let Some(srctree) = &opts.srctree {
        config.srctree = PathBuf::from(srctree);
    }
    let load::State { mut ctx, default } = load::read(Path::new(&opts.file), config)?;

    if opts.tool.as_deref() == Some("graph") {
        let filters = opts
            .targets
            .iter()
            .map(|filter| {
                Regex::new(filter).map_err(|err| anyhow!("bad filter {:?}: {}", filter, err))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        dot::write(&ctx, &filters, &mut std::io::stdout().lock())?;
        return Ok(0);
    }

    let mut targets: Vec<NodeId> = Vec::new();
    for name in &opts.targets {
        let id = ctx
            .resolve(name)
            .map_err(|err| anyhow!("unknown path requested: {:?}: {}", name, err))?;
        targets.push(id);
    }
    if targets.is_empty() {
        targets = default;
    }
    if targets.is_empty() {
        bail!("no path specified and no default");
    }

    let mut progress = ConsoleProgress::new(opts.verbose);

    if let Some(tool) = &opts.tool {
        match tool.as_str() {
            "clean" => {
                let mut removed = 0;
                for target in targets {
                    removed += work::clean(&ctx, target, &mut progress)?;
                }
                println!("drake: removed {} files", removed);
            }
            "sources" => {
                for target in targets {
                    if let Some(builder) = ctx.node(target).builder {
                        for src in ctx.all_sources(builder) {
                            println!("{}", ctx.node(src).identity);
                        }
                    }
                }
            }
            _ => bail!("unknown -t {:?}, use -t list to list", tool),
        }
        return Ok(0);
    }

    let mut work = work::Work::new(&mut ctx, &mut progress);
    for target in targets {
        work.build_node(target)?;
    }
    match work.executed() {
        // Special case: don't print numbers when no work done.
        0 => println!("drake: no work to do"),
        1 => println!("drake: ran 1 task, now up to date"),
        n => println!("drake: ran {} tasks, now up to date", n),
    }
    Ok(0)
}

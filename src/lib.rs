pub mod depfile;
pub mod dot;
pub mod error;
pub mod graph;
pub mod hash;
pub mod load;
pub mod parse;
pub mod path;
pub mod progress;
pub mod rule;
pub mod run;
pub mod scan;
pub mod scanner;
pub mod task;
pub mod work;

pub use error::{BuildError, Result};
pub use graph::{BuilderId, Config, Context, NodeId};
pub use path::Identity;
pub use rule::{Declare, Rule, ShellCommand, Step};

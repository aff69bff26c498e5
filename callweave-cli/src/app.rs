use std::path::PathBuf;

use clap::Parser;

use callweave::weave::{config::WeaveConfig, naming::DEFAULT_FIELD_PREFIX};

/// callweave - weave per-method invocation counters into a stack-VM module
#[derive(Debug, Parser)]
#[command(name = "callweave", version, about, long_about = None)]
pub struct Cli {
    /// Path to the module to instrument.
    #[arg(value_name = "FILE")]
    pub module: PathBuf,

    /// Counter-field name prefix (also the idempotence marker).
    #[arg(long, value_name = "STR", default_value = DEFAULT_FIELD_PREFIX)]
    pub prefix: String,

    /// Namespaces to instrument, prefix match (comma separated, repeatable).
    /// Empty means everything not excluded.
    #[arg(long, value_name = "NS1,NS2", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Namespaces to skip, appended to the built-in exclusions; wins over
    /// --include (comma separated, repeatable).
    #[arg(long, value_name = "NS1,NS2", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Write the instrumented module here instead of overwriting in place.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Disable backup creation.
    #[arg(long)]
    pub no_backup: bool,

    /// Also instrument compiler-generated types and members.
    #[arg(long)]
    pub instrument_compiler_generated: bool,

    /// Additional directory for resolving module references (repeatable).
    #[arg(long = "search-dir", value_name = "DIR")]
    pub search_dirs: Vec<PathBuf>,

    /// Directory for backup files and their path records (default: the
    /// module's directory).
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Lower the parsed command line into the weaver's configuration record.
    pub fn into_config(self) -> WeaveConfig {
        let mut config = WeaveConfig::new(self.module);
        config.output_path = self.output;
        config.field_prefix = self.prefix;
        config.includes = self.include;
        config.excludes.extend(self.exclude);
        config.backup = !self.no_backup;
        config.backup_dir = self.backup_dir;
        config.instrument_compiler_generated = self.instrument_compiler_generated;
        config.search_dirs = self.search_dirs;
        config
    }
}

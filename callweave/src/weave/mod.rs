//! The weaver: orchestration of one complete instrumentation run.
//!
//! # Architecture
//!
//! A run is strictly sequential and deterministic: load → idempotence guard (target
//! module plus every resolvable dependency) → backup → caller-side discovery →
//! call-site scan → body instrumentation → call-site splicing → save → symbol
//! reconciliation. All run-scoped state lives in an explicit [`WeaveSession`] record
//! that is passed to each component and discarded after the save; there are no
//! process-wide singletons.
//!
//! Per-item failures (one method, one call site) are logged warnings; only
//! file-level I/O and unrecoverable metadata errors abort the run.
//!
//! # Key Components
//!
//! - [`Weaver`] - one-shot orchestrator consuming a [`config::WeaveConfig`]
//! - [`filter::Filter`] - type/method eligibility
//! - [`counters::CounterStore`] - helper type and counter field allocation
//! - [`body`] - entry instrumentation for methods with a body
//! - [`callsite`] - two-pass caller-side instrumentation for bodyless methods
//! - [`guard`] - idempotence marker detection and backups
//!
//! The emitted increment sequence (`ldsfld; ldc.i4 1; add; stsfld`) is not atomic.
//! Concurrent invocations of the same method can lose updates; the counters are a
//! usage-frequency probe, not a precise measure.

pub mod body;
pub mod callsite;
pub mod config;
pub mod counters;
pub mod filter;
pub mod guard;
pub mod naming;

use std::path::PathBuf;

use crate::{
    bytecode::{
        instruction::{Immediate, Instruction, Operand},
        opcodes,
    },
    loader::Loader,
    metadata::{symbols, token::Token},
    weave::{
        callsite::InstrumentationContext, config::WeaveConfig, counters::CounterStore,
        filter::Filter, guard::BackupManager,
    },
    Result,
};

/// One instrumented method: its helper type, counter field, and the method whose
/// entry increments the counter.
#[derive(Debug, Clone, Copy)]
pub struct CounterSite {
    /// Helper type holding the counter
    pub helper: Token,
    /// The counter field
    pub field: Token,
    /// The instrumented method
    pub method: Token,
}

/// Run-scoped state shared by the weave components, discarded after the save.
#[derive(Debug)]
pub struct WeaveSession {
    /// Helper/counter allocation with its dedup index
    pub counters: CounterStore,
    /// Caller-side discovery entries and call sites
    pub context: InstrumentationContext,
    /// Entry-instrumented methods in processing order
    pub counter_sites: Vec<CounterSite>,
    /// Methods and call sites skipped due to per-item failures
    pub skipped: usize,
}

impl WeaveSession {
    /// Creates the session for one run.
    #[must_use]
    pub fn new(field_prefix: &str) -> Self {
        WeaveSession {
            counters: CounterStore::new(field_prefix),
            context: InstrumentationContext::new(),
            counter_sites: Vec::new(),
            skipped: 0,
        }
    }
}

/// The four-instruction counter increment: `ldsfld f; ldc.i4 1; add; stsfld f`.
///
/// Both field operands reference the same field definition; the save-time encoder
/// normalizes the constant load to its macro form.
pub(crate) fn counter_prelude(field: Token) -> [Instruction; 4] {
    [
        Instruction::new(opcodes::LDSFLD, Operand::Token(field)),
        Instruction::new(opcodes::LDC_I4, Operand::Immediate(Immediate::Int32(1))),
        Instruction::new(opcodes::ADD, Operand::None),
        Instruction::new(opcodes::STSFLD, Operand::Token(field)),
    ]
}

/// What a weave run did.
#[derive(Debug)]
pub enum WeaveOutcome {
    /// The module was instrumented and saved
    Woven(WeaveSummary),
    /// A prior run's markers were found; nothing was modified
    AlreadyInstrumented,
}

/// Counts and paths reported after a successful weave.
#[derive(Debug)]
pub struct WeaveSummary {
    /// Methods that received an entry prelude
    pub methods_instrumented: usize,
    /// Call sites that received a caller-side prelude
    pub call_sites_spliced: usize,
    /// Bodyless methods counted at their call sites
    pub call_targets: usize,
    /// Helper types handed out (created or reused)
    pub helper_types: usize,
    /// Per-item failures that were skipped
    pub skipped: usize,
    /// Where the module was written
    pub module_path: PathBuf,
    /// Where the symbol file was written, when symbols were loaded
    pub symbol_path: Option<PathBuf>,
}

/// One-shot orchestrator for a complete weave run.
pub struct Weaver {
    config: WeaveConfig,
}

impl Weaver {
    /// Creates a weaver for the given configuration.
    #[must_use]
    pub fn new(config: WeaveConfig) -> Self {
        Weaver { config }
    }

    /// Runs the weave end to end.
    ///
    /// # Errors
    /// Returns [`crate::Error::InputNotFound`] for a missing input module, parse
    /// errors for a damaged one, and I/O errors from the backup and save steps.
    /// Everything below that granularity is a logged warning.
    pub fn run(&self) -> Result<WeaveOutcome> {
        let config = &self.config;
        let loader = Loader::new(config.search_dirs.clone());
        let mut loaded = loader.load(&config.module_path)?;

        if guard::is_instrumented(&loaded.module, &config.field_prefix) {
            log::info!(
                "Module '{}' is already instrumented, nothing to do",
                loaded.module.name
            );
            return Ok(WeaveOutcome::AlreadyInstrumented);
        }

        for (name, resolved) in loader.resolve_dependencies(&loaded) {
            match resolved {
                Ok(dependency) => {
                    if guard::is_instrumented(&dependency, &config.field_prefix) {
                        log::info!(
                            "Dependency '{name}' is already instrumented, nothing to do"
                        );
                        return Ok(WeaveOutcome::AlreadyInstrumented);
                    }
                }
                Err(error) => {
                    log::warn!("Skipping dependency '{name}': {error}");
                }
            }
        }

        if config.backup {
            let backup_dir = config.backup_dir.clone().unwrap_or_else(|| {
                config
                    .module_path
                    .parent()
                    .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf)
            });
            let manager = BackupManager::new(backup_dir);
            manager.back_up(&config.module_path)?;
            if let Some((symbol_path, _)) = symbols::probe(&config.module_path) {
                manager.back_up(&symbol_path)?;
            }
        }

        let filter = Filter::from_config(config);
        let mut session = WeaveSession::new(&config.field_prefix);

        callsite::discover(&mut loaded.module, &filter, &mut session)?;
        callsite::scan(&loaded.module, &mut session)?;
        body::instrument_module(&mut loaded.module, &filter, &mut session)?;
        let call_sites_spliced = callsite::splice(&mut loaded.module, &session);

        let saved = loader.save(&mut loaded, config.output_path.as_deref())?;

        let summary = WeaveSummary {
            methods_instrumented: session.counter_sites.len(),
            call_sites_spliced,
            call_targets: session.context.entries.len(),
            helper_types: session.counters.helper_count(),
            skipped: session.skipped,
            module_path: saved.module_path,
            symbol_path: saved.symbol_path,
        };

        log::info!(
            "Instrumented {} methods and {} call sites ({} helper types) in {}",
            summary.methods_instrumented,
            summary.call_sites_spliced,
            summary.helper_types,
            summary.module_path.display()
        );

        Ok(WeaveOutcome::Woven(summary))
    }
}

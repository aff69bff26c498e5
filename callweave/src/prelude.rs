//! Convenient re-exports of the most commonly used types.
//!
//! # Examples
//!
//! ```rust,no_run
//! use callweave::prelude::*;
//!
//! let outcome = Weaver::new(WeaveConfig::new("demo.sbm")).run()?;
//! # let _ = outcome;
//! # Ok::<(), callweave::Error>(())
//! ```

pub use crate::{
    bytecode::instruction::{FlowType, Immediate, Instruction, Operand},
    loader::{LoadedModule, Loader, SaveReport},
    metadata::{
        builders::{FieldBuilder, TypeDefBuilder},
        field::{FieldAttributes, FieldDef},
        method::{ExceptionHandler, ExceptionHandlerKind, MethodAttributes, MethodBody, MethodDef},
        module::Module,
        refs::{MemberRef, MemberRefSig, ModuleRef, TypeRef},
        signatures::{MethodSig, TypeSig},
        symbols::{SymbolConvention, SymbolFile},
        token::{TableId, Token},
        types::{TypeAttributes, TypeDef},
    },
    report::{CounterReport, CounterSample},
    weave::{
        config::WeaveConfig, filter::Filter, guard::BackupManager, WeaveOutcome, WeaveSummary,
        Weaver,
    },
    Error, Result,
};

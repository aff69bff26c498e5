// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # callweave
//!
//! A static bytecode rewriter for stack-VM modules: it instruments compiled modules so
//! that every method invocation increments a per-method 32-bit counter at runtime, and
//! it does so offline, by rewriting the module file rather than hooking the runtime.
//!
//! # Architecture
//!
//! The library is organized into layers that mirror the life of a weave run:
//!
//! - **File Layer**: endian-aware binary reading and writing primitives
//! - **Metadata Layer**: the token-addressed metadata graph (types, methods, fields,
//!   reference tables) plus the module and symbol-file serializers
//! - **Bytecode Layer**: instruction decoding, splicing, and re-encoding with
//!   short/long branch normalization
//! - **Weave Layer**: eligibility filtering, counter-store allocation, body and
//!   caller-side instrumentation, idempotence guarding, and backups
//! - **Report Layer**: the collector-facing naming contract and grouped count reports
//!
//! ## Key Components
//!
//! - [`crate::loader::Loader`] - Load and save modules together with their symbol files
//! - [`crate::metadata::module::Module`] - The mutable in-memory metadata graph
//! - [`crate::weave::Weaver`] - One-shot orchestrator for a complete weave run
//! - [`crate::weave::WeaveConfig`] - Configuration record consumed by the weaver
//! - [`crate::report`] - Grouped invocation-count reports read back from counters
//! - [`crate::prelude`] - Convenient re-exports of commonly used types
//! - [`crate::Error`] and [`crate::Result`] - Comprehensive error handling
//!
//! # Usage Examples
//!
//! ## Weaving a module in place
//!
//! ```rust,no_run
//! use callweave::prelude::*;
//!
//! let config = WeaveConfig::new("demo.sbm");
//! match Weaver::new(config).run()? {
//!     WeaveOutcome::Woven(summary) => {
//!         println!("instrumented {} methods", summary.methods_instrumented);
//!     }
//!     WeaveOutcome::AlreadyInstrumented => {
//!         println!("already instrumented, nothing to do");
//!     }
//! }
//! # Ok::<(), callweave::Error>(())
//! ```
//!
//! ## Inspecting a module
//!
//! ```rust,no_run
//! use callweave::loader::Loader;
//!
//! let loaded = Loader::new(Vec::new()).load("demo.sbm".as_ref())?;
//! println!("module {} with {} top-level types",
//!     loaded.module.name,
//!     loaded.module.top_level_types().len());
//! # Ok::<(), callweave::Error>(())
//! ```
//!
//! # Counter contract
//!
//! For every instrumented type the weaver synthesizes a non-generic, sealed-abstract
//! *helper type* named `<sanitized-name>_InvokeCounters` in the original type's
//! namespace, carrying one public static `u4` field `_invokeCount_<sanitized-method>`
//! per instrumented method. Methods with a body are counted at method entry; abstract,
//! interface, and extern methods are counted at each call site instead. The emitted
//! increment sequence is not atomic: concurrent invocations may lose updates, which is
//! acceptable for a usage-frequency probe.

#[macro_use]
mod error;

pub mod bytecode;
pub mod file;
pub mod loader;
pub mod metadata;
pub mod prelude;
pub mod report;
pub mod weave;

pub use error::Error;

/// Convenience alias for `Result<T, callweave::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

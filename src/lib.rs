//! # lctrace - Liquid Chromatography Trace Ingestion
//!
//! `lctrace` turns the text exports of analytical HPLC and preparative FPLC
//! instruments into one canonical long-form table per run, normalizes the
//! traces, and persists them as versioned JSON documents.
//!
//! ## Supported Exports
//!
//! | Instrument | Extension | Recognised by |
//! |------------|-----------|---------------|
//! | Waters Empower | `.arw` | extension |
//! | Shimadzu LabSolutions (legacy) | `.asc` | no `[Header]` section marker |
//! | Shimadzu LabSolutions | `.txt`, `.asc` | `[Header]` on the first line |
//! | Agilent ChemStation | `.csv` | numeric first cell |
//! | Cytiva AKTA UNICORN | `.csv` | `Chrom.1` first cell |
//!
//! Exports rarely carry everything needed: flow rates, channel names and
//! column volumes are filled in by the [`metadata`] resolver from caller
//! values, per-run overrides, a persisted settings file, or a prompt.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lctrace::metadata::{ExplicitMetadata, NonInteractive, UserSettings};
//! use lctrace::pipeline::{Pipeline, PipelineOptions};
//! use lctrace::store::{upload, DirectoryStore};
//!
//! let options = PipelineOptions {
//!     explicit: ExplicitMetadata {
//!         flow_rate: Some(0.5),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! let mut settings = UserSettings::load_default()?;
//! let mut source = NonInteractive;
//! let outcome = Pipeline::new(options, &mut settings, &mut source).run(&["exports/"])?;
//! println!("{}", outcome.experiment);
//!
//! outcome.experiment.save_csvs("out/")?;
//!
//! let mut store = DirectoryStore::open("experiments/")?;
//! upload(&mut store, &outcome.experiment, false, &mut source)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`trace`]: canonical rows, normalization, fraction assignment
//! - [`decoders`]: per-instrument decoders and dispatch
//! - [`metadata`]: settings file, session overrides, prompts, resolver
//! - [`experiment`]: the per-run aggregate and its CSV exports
//! - [`codec`]: versioned JSON documents
//! - [`store`]: document stores, upload with merge, migration
//! - [`pipeline`]: one end-to-end processing run

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod decoders;
pub mod experiment;
pub mod metadata;
pub mod pipeline;
pub mod store;
pub mod trace;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::{CodecError, ExperimentDocument, CURRENT_VERSION};
    pub use crate::decoders::{DecodeError, DecodedFile, Decoder};
    pub use crate::experiment::{Experiment, ExperimentError};
    pub use crate::metadata::{
        ExplicitMetadata, MetadataError, MetadataSource, NonInteractive, ScriptedSource,
        TerminalSource, UserSettings,
    };
    pub use crate::pipeline::{Pipeline, PipelineError, PipelineOptions, RunOutcome};
    pub use crate::store::{DirectoryStore, DocumentStore, MemoryStore, StoreError};
    pub use crate::trace::{
        FplcRow, NormWindow, Normalization, Normalizer, TraceRow, TraceTable,
    };
}

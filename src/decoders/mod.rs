//! # Instrument Export Decoders
//!
//! One decoder per instrument family. Each turns a single export into the
//! canonical long-form table of [`crate::trace`].
//!
//! | Decoder | Extension | Signature | Table |
//! |---------|-----------|-----------|-------|
//! | Waters | `.arw` | extension | HPLC |
//! | Shimadzu legacy | `.asc` | first line is not `[Header]` | HPLC |
//! | Shimadzu modern | `.txt`, `.asc` | first line is `[Header]` | HPLC |
//! | Agilent | `.csv` | first cell parses as a float | HPLC |
//! | AKTA | `.csv` | first cell is `Chrom.1` | FPLC |
//!
//! Every decoder works in two steps: read the export's header block (run
//! identity, sample, channel layout, method), then resolve whatever metadata
//! the file lacks through a [`MetadataResolver`] and build rows.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use lctrace::decoders::Decoder;
//! use lctrace::metadata::{ExplicitMetadata, MetadataResolver, NonInteractive, ResolutionOverride, UserSettings};
//! use lctrace::trace::Normalizer;
//!
//! let path = Path::new("SEC_08.arw");
//! let explicit = ExplicitMetadata { flow_rate: Some(0.5), ..Default::default() };
//! let mut settings = UserSettings::in_memory();
//! let mut session = ResolutionOverride::default();
//! let mut source = NonInteractive;
//!
//! if Decoder::Waters.claims(path) {
//!     let mut resolver = MetadataResolver::new(
//!         Decoder::Waters, &explicit, &mut settings, &mut session, &mut source,
//!     );
//!     let decoded = Decoder::Waters.decode(path, &mut resolver, &Normalizer::default())?;
//!     println!("{} rows", decoded.table.len());
//! }
//! # Ok::<(), lctrace::decoders::DecodeError>(())
//! ```

mod akta;
mod agilent;
mod dispatch;
mod error;
mod shimadzu_legacy;
mod shimadzu_modern;
pub mod text;
mod waters;


use std::fmt;
use std::path::Path;

use crate::metadata::MetadataResolver;
use crate::trace::{Normalizer, TraceTable};

pub use dispatch::{classify, dispatch, Claim};
pub use error::DecodeError;

/// Supported instrument export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
    /// Waters Empower `.arw` export
    Waters,
    /// Shimadzu LabSolutions ASCII export without section markers
    ShimadzuLegacy,
    /// Shimadzu LabSolutions multi-table export (`[Header]`, `[Configuration]`, ...)
    ShimadzuModern,
    /// Agilent ChemStation UTF-16 time/signal export
    Agilent,
    /// Cytiva AKTA UNICORN UTF-16 export
    Akta,
}

/// Result of decoding one export.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    /// Decoder that produced the table
    pub decoder: Decoder,
    /// Long-form rows, already normalized per (Sample, Channel)
    pub table: TraceTable,
    /// Run identity the export carries, used as the default experiment id
    pub run_identity: Option<String>,
}

impl Decoder {
    /// Every decoder, in dispatch order.
    pub const ALL: [Decoder; 5] = [
        Decoder::Waters,
        Decoder::ShimadzuLegacy,
        Decoder::ShimadzuModern,
        Decoder::Agilent,
        Decoder::Akta,
    ];

    /// Whether this decoder recognises `path`.
    ///
    /// Never fails: unreadable files are simply not claimed.
    pub fn claims(&self, path: &Path) -> bool {
        match self {
            Decoder::Waters => waters::claims(path),
            Decoder::ShimadzuLegacy => shimadzu_legacy::claims(path),
            Decoder::ShimadzuModern => shimadzu_modern::claims(path),
            Decoder::Agilent => agilent::claims(path),
            Decoder::Akta => akta::claims(path),
        }
    }

    /// Decode `path` into canonical rows.
    pub fn decode(
        &self,
        path: &Path,
        resolver: &mut MetadataResolver<'_>,
        normalizer: &Normalizer,
    ) -> Result<DecodedFile, DecodeError> {
        let (table, run_identity) = match self {
            Decoder::Waters => waters::decode(path, resolver, normalizer)?,
            Decoder::ShimadzuLegacy => shimadzu_legacy::decode(path, resolver, normalizer)?,
            Decoder::ShimadzuModern => shimadzu_modern::decode(path, resolver, normalizer)?,
            Decoder::Agilent => agilent::decode(path, resolver, normalizer)?,
            Decoder::Akta => akta::decode(path, resolver, normalizer)?,
        };
        if table.is_empty() {
            return Err(DecodeError::Empty(path.display().to_string()));
        }
        table
            .validate()
            .map_err(|violation| DecodeError::malformed(path, violation))?;
        Ok(DecodedFile {
            decoder: *self,
            table,
            run_identity,
        })
    }

    /// Whether this decoder produces FPLC tables.
    pub fn is_fplc(&self) -> bool {
        matches!(self, Decoder::Akta)
    }
}

impl fmt::Display for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decoder::Waters => "Waters",
            Decoder::ShimadzuLegacy => "Shimadzu (legacy)",
            Decoder::ShimadzuModern => "Shimadzu",
            Decoder::Agilent => "Agilent",
            Decoder::Akta => "AKTA",
        };
        f.write_str(name)
    }
}

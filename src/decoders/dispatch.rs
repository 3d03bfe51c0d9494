//! Decide which decoder owns a file.

use std::path::{Path, PathBuf};

use log::{debug, error, warn};

use super::Decoder;

/// Outcome of asking every decoder about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// No decoder recognised the file
    Unclaimed,
    /// Exactly one decoder recognised the file
    Claimed(Decoder),
    /// Several decoders recognised the file
    Ambiguous(Vec<Decoder>),
}

/// Ask every decoder whether it claims `path`.
pub fn classify(path: &Path) -> Claim {
    let claims: Vec<Decoder> = Decoder::ALL
        .iter()
        .copied()
        .filter(|d| d.claims(path))
        .collect();
    match claims.as_slice() {
        [] => Claim::Unclaimed,
        [decoder] => Claim::Claimed(*decoder),
        _ => Claim::Ambiguous(claims),
    }
}

/// Pair each file with its decoder, in input order.
///
/// Unclaimed files are skipped with a warning and ambiguous ones with an
/// error. Neither stops the run.
pub fn dispatch<P: AsRef<Path>>(paths: &[P]) -> Vec<(PathBuf, Decoder)> {
    let mut claimed = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        match classify(path) {
            Claim::Claimed(decoder) => {
                debug!("{} claims {}", decoder, path.display());
                claimed.push((path.to_path_buf(), decoder));
            }
            Claim::Unclaimed => {
                warn!("No decoder recognises {}; skipping", path.display());
            }
            Claim::Ambiguous(decoders) => {
                let names: Vec<String> = decoders.iter().map(|d| d.to_string()).collect();
                error!(
                    "{} is claimed by several decoders ({}); skipping",
                    path.display(),
                    names.join(", ")
                );
            }
        }
    }
    claimed
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use lctrace::codec::ExperimentDocument;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    // Stored documents come from other tools; malformed ones must be errors
    if let Ok(document) = ExperimentDocument::from_json(json) {
        if let Ok(experiment) = document.decode() {
            // Whatever decodes must encode again
            let _ = ExperimentDocument::encode(&experiment);
        }
    }
});

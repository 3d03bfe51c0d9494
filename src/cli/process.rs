use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

use lctrace::metadata::{ExplicitMetadata, MetadataSource, NonInteractive, TerminalSource, UserSettings};
use lctrace::pipeline::{Pipeline, PipelineOptions, RunOutcome};
use lctrace::store::{upload, DirectoryStore, UploadOutcome};
use lctrace::trace::{NormWindow, Normalizer};

use super::{store_path, Config, ProcessArgs};

/// Decode exports into one experiment, write its CSVs and optionally store it
pub fn run(args: ProcessArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let options = options(&args, &config)?;

    let mut settings = UserSettings::load_default().context("Failed to load user settings")?;
    let mut terminal;
    let mut non_interactive = NonInteractive;
    let source: &mut dyn MetadataSource = if args.no_input {
        &mut non_interactive
    } else {
        terminal = TerminalSource::stdio();
        &mut terminal
    };

    let outcome = Pipeline::new(options, &mut settings, &mut *source)
        .run(&args.files)
        .context("Processing failed")?;
    print_summary(&outcome);

    let experiment = &outcome.experiment;
    let out_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(experiment.id()));
    experiment
        .save_csvs(&out_dir)
        .with_context(|| format!("Failed to write CSVs to {}", out_dir.display()))?;
    println!("CSVs written to {}", out_dir.display());

    if args.database {
        let path = store_path(args.store.as_deref(), &config)?;
        let mut store = DirectoryStore::open(&path)
            .with_context(|| format!("Failed to open document store {}", path.display()))?;
        let reduced = experiment.preview(args.reduce)?;
        let result = upload(&mut store, &reduced, args.overwrite, source)?;
        match result {
            UploadOutcome::Created => println!("Saved {} to {}", experiment.id(), path.display()),
            UploadOutcome::Replaced => println!("Replaced {} in {}", experiment.id(), path.display()),
            UploadOutcome::Merged => println!("Merged {} into {}", experiment.id(), path.display()),
            UploadOutcome::Unchanged => println!("Kept stored copy of {}", experiment.id()),
        }
    }

    Ok(())
}

/// Merge flags over the config file.
fn options(args: &ProcessArgs, config: &Config) -> Result<PipelineOptions> {
    let processing = &config.processing;

    let mut channel_mapping: BTreeMap<String, String> = processing.channel_mapping.clone();
    if args.channel_mapping.len() % 2 != 0 {
        bail!("--channel-mapping takes pairs of names, got {}", args.channel_mapping.len());
    }
    for pair in args.channel_mapping.chunks(2) {
        channel_mapping.insert(pair[0].clone(), pair[1].clone());
    }

    let window = match (&args.normalize, processing.normalize) {
        (Some(bounds), _) => Some(NormWindow::new(bounds[0], bounds[1])),
        (None, Some([lo, hi])) => Some(NormWindow::new(lo, hi)),
        (None, None) => None,
    };
    let strict = args.strict_normalize || processing.strict.unwrap_or(false);

    Ok(PipelineOptions {
        explicit: ExplicitMetadata {
            flow_rate: args.hplc_flow_rate.or(processing.flow_rate),
            column_volume: args.fplc_cv.or(processing.column_volume),
            channel_name: args.channel.clone().or_else(|| processing.agilent_channel.clone()),
            preferred_detector: args
                .preferred_detector
                .clone()
                .or_else(|| processing.preferred_detector.clone()),
            channel_mapping,
        },
        normalizer: Normalizer::new(window, strict),
        scale_hplc: args.scale_hplc.or(processing.scale_hplc),
        experiment_id: args.id.clone(),
    })
}

fn print_summary(outcome: &RunOutcome) {
    #[cfg(feature = "colorized_output")]
    {
        use console::style;

        println!("{}", style(&outcome.experiment).bold().cyan());
        for (path, decoder) in &outcome.decoded {
            println!("  {} {} ({})", style("✓").green(), path.display(), decoder);
        }
        for skipped in &outcome.skipped {
            println!(
                "  {} {}: {}",
                style("✗").red(),
                skipped.path.display(),
                style(&skipped.reason).yellow()
            );
        }
        if outcome.cancelled {
            println!("{}", style("Cancelled before all files were processed").yellow().bold());
        }
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", outcome.experiment);
        for (path, decoder) in &outcome.decoded {
            println!("  [OK] {} ({})", path.display(), decoder);
        }
        for skipped in &outcome.skipped {
            println!("  [SKIP] {}: {}", skipped.path.display(), skipped.reason);
        }
        if outcome.cancelled {
            println!("Cancelled before all files were processed");
        }
    }
}

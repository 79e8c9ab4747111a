mod aggregate;
mod args;
mod correlate;
mod error;
mod overlay;
mod peaks;
mod pipeline;
mod plot;
mod profile;
mod reference;
mod report;
mod slicer;
mod utils;

use std::path::Path;

use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::{validate_cpu, Args, Command};
use pipeline::PipelineOptions;
use reference::ReferenceVector;
use utils::{available_cores, DynError};

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn load_reference(path: &Path) -> Result<ReferenceVector, DynError> {
    let reference = ReferenceVector::load(path)?;
    info!(
        "Loaded {} reference values from {} (mean {})",
        reference.len(),
        path.display(),
        reference.mean()
    );
    Ok(reference)
}

fn print_banner(args: &Args, options: &PipelineOptions) {
    println!("Starting strip correlation ({}) with the following arguments:", args.command.name());
    println!("--------------------------------------------------");
    match &args.command {
        Command::Slice {
            image,
            height,
            output_dir,
        } => {
            println!("  image:      {}", image.display());
            println!("  height:     {} rows", height);
            println!("  output:     {}", output_dir.display());
        }
        Command::Process {
            input_dir,
            output_dir,
            reference,
            ..
        }
        | Command::Run {
            input_dir,
            output_dir,
            reference,
            ..
        } => {
            println!("  input:      {}", input_dir.display());
            println!("  output:     {}", output_dir.display());
            println!("  reference:  {}", reference.display());
            match options.num_files {
                Some(n) => println!("  num-files:  {}", n),
                None => println!("  num-files:  all"),
            }
        }
        Command::Summarize { output_dir } => {
            println!("  output:     {}", output_dir.display());
        }
        Command::Overlay {
            input_dir,
            output_dir,
            reference,
        } => {
            println!("  input:      {}", input_dir.display());
            println!("  output:     {}", output_dir.display());
            println!("  reference:  {}", reference.display());
        }
    }
    println!("  padding:    {:?}", options.padding);
    println!("  extension:  {}", options.extension);
    println!("  plots:      {}", if options.plots { "on" } else { "off" });
    println!("  cpu:        {}", args.cpu);
    println!("--------------------------------------------------");
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = Args::parse();
    init_logging(args.debug);

    validate_cpu(args.cpu, available_cores())?;
    let options = args.pipeline_options()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.cpu)
        .build_global()
        .map_err(|_| "Failed to initialise rayon thread pool")?;

    print_banner(&args, &options);

    match &args.command {
        Command::Slice {
            image,
            height,
            output_dir,
        } => {
            let written = slicer::slice_image(image, *height, output_dir)?;
            println!("[info] Wrote {} strip(s) to {}", written.len(), output_dir.display());
        }
        Command::Process {
            input_dir,
            output_dir,
            reference,
            ..
        } => {
            let reference = load_reference(reference)?;
            let records = pipeline::process_folder(input_dir, output_dir, &reference, &options)?;
            println!("[info] Processed {} strip(s) into {}", records.len(), output_dir.display());
        }
        Command::Summarize { output_dir } => {
            let aggregate = pipeline::summarize_folder(output_dir, &options)?;
            println!(
                "[info] Aggregated {} strip(s); table at {}",
                aggregate.rows.len(),
                output_dir.join(report::AGGREGATE_CSV_FILE).display()
            );
        }
        Command::Overlay {
            input_dir,
            output_dir,
            reference,
        } => {
            let reference = load_reference(reference)?;
            let shift = reference.global_shift();
            info!("Calculated shift value: {}", shift.0);
            let written = pipeline::overlay_folder(input_dir, output_dir, shift, &options)?;
            println!("[info] Wrote {} overlay image(s)", written.len());
        }
        Command::Run {
            input_dir,
            output_dir,
            reference,
            ..
        } => {
            let reference = load_reference(reference)?;
            let summary = pipeline::run(input_dir, output_dir, &reference, &options)?;
            let complete = summary
                .aggregate
                .rows
                .iter()
                .filter(|row| row.peaks.is_some())
                .count();
            println!(
                "[info] Run complete: {} strip(s), {} with two peaks, {} overlay image(s)",
                summary.records.len(),
                complete,
                summary.overlays.len()
            );
            match &summary.aggregate.dispersion {
                Ok(stats) => println!(
                    "[info] Std dev P1 index {:.3}, P1 value {:.3}, P2 index {:.3}, P2 value {:.3}",
                    stats.peak1_index, stats.peak1_value, stats.peak2_index, stats.peak2_value
                ),
                Err(diagnostic) => eprintln!("[warn] {diagnostic}"),
            }
        }
    }
    Ok(())
}

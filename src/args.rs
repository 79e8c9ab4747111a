use crate::correlate::PaddingPolicy;
use crate::pipeline::PipelineOptions;
use crate::utils::DynError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CPU: usize = 1;
pub const DEFAULT_EXTENSION: &str = "bmp";
pub const DEFAULT_PADDING: &str = "zero";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Strip-wise reference cross-correlation and peak detection for grayscale images",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  strip_xcorr slice scan.bmp 20 slices\n  strip_xcorr run slices out reference.json --cpu 4\n  strip_xcorr process slices out reference.json --num-files 10 --padding profile-mean\n  strip_xcorr summarize out\n  strip_xcorr overlay slices out reference.json\n"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of parallel worker threads
    #[arg(long, global = true, default_value_t = DEFAULT_CPU)]
    pub cpu: usize,

    /// Enable debug-level logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Value used for profile samples past the right edge of a strip
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_PADDING,
        value_parser = clap::builder::PossibleValuesParser::new(["zero", "profile-mean"])
    )]
    pub padding: String,

    /// File extension of strip images
    #[arg(long = "ext", global = true, default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Skip PNG plots
    #[arg(long, global = true)]
    pub no_plots: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Cut an image into full-width strips of fixed height
    Slice {
        image: PathBuf,
        height: u32,
        output_dir: PathBuf,
    },
    /// Profile, correlate and detect peaks for every strip image
    Process {
        input_dir: PathBuf,
        output_dir: PathBuf,
        reference: PathBuf,
        /// Process at most this many strips
        #[arg(long)]
        num_files: Option<usize>,
    },
    /// Re-detect peaks from saved correlation results and aggregate them
    Summarize { output_dir: PathBuf },
    /// Draw saved peaks onto the strip images
    Overlay {
        input_dir: PathBuf,
        output_dir: PathBuf,
        reference: PathBuf,
    },
    /// Process, aggregate and overlay in one pass
    Run {
        input_dir: PathBuf,
        output_dir: PathBuf,
        reference: PathBuf,
        #[arg(long)]
        num_files: Option<usize>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Slice { .. } => "slice",
            Command::Process { .. } => "process",
            Command::Summarize { .. } => "summarize",
            Command::Overlay { .. } => "overlay",
            Command::Run { .. } => "run",
        }
    }
}

pub fn parse_padding(text: &str) -> Result<PaddingPolicy, DynError> {
    match text.to_ascii_lowercase().as_str() {
        "zero" => Ok(PaddingPolicy::Zero),
        "profile-mean" | "profile_mean" | "mean" => Ok(PaddingPolicy::ProfileMean),
        other => Err(format!("Unknown padding policy '{other}' (expected zero or profile-mean)").into()),
    }
}

pub fn validate_cpu(cpu: usize, available_cores: usize) -> Result<(), DynError> {
    if cpu == 0 {
        return Err("--cpu must be at least 1".into());
    }
    if cpu > available_cores {
        return Err(format!(
            "--cpu value ({}) exceeds the number of available cores ({})",
            cpu, available_cores
        )
        .into());
    }
    Ok(())
}

impl Args {
    pub fn pipeline_options(&self) -> Result<PipelineOptions, DynError> {
        let extension = self.extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            return Err("--ext must not be empty".into());
        }
        let num_files = match &self.command {
            Command::Process { num_files, .. } | Command::Run { num_files, .. } => *num_files,
            _ => None,
        };
        if num_files == Some(0) {
            return Err("--num-files must be at least 1".into());
        }
        Ok(PipelineOptions {
            padding: parse_padding(&self.padding)?,
            extension,
            num_files,
            plots: !self.no_plots,
        })
    }
}

use anyhow::{Context, Result, bail};
use attend_qr::preprocess::Preprocessor;
use attend_qr::static_scan::StaticImageScanner;
use attend_qr::strategy::{DecodeStrategy, SoftwareDecoder};
use attend_qr::utils::grayscale::luma_stats;
use attend_qr::validator::{Validation, validate};
use attend_qr::{ScanError, ScannerConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scantool", version, about = "Attendance QR scanning tools")]
struct Cli {
    /// JSON configuration file; `ATTEND_QR_*` variables still apply on top
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate raw payloads and print the extracted token
    Validate {
        /// Payloads to check
        #[arg(required = true)]
        payloads: Vec<String>,
    },
    /// Decode an attendance code from an image file
    Scan {
        #[arg(long)]
        image: PathBuf,
    },
    /// List the preprocessing candidates for an image, optionally saving them
    Candidates {
        #[arg(long)]
        image: PathBuf,
        /// Directory to write one PNG per candidate
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Validate { payloads } => validate_cmd(&payloads, &config),
        Command::Scan { image } => scan_cmd(&image, &config).await,
        Command::Candidates { image, out } => candidates_cmd(&image, out.as_deref(), &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScannerConfig> {
    let Some(path) = path else {
        return Ok(ScannerConfig::from_env());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = ScannerConfig::from_json(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config.with_env_overrides())
}

fn validate_cmd(payloads: &[String], config: &ScannerConfig) -> Result<()> {
    let mut invalid = 0usize;
    for payload in payloads {
        let validation = validate(payload);
        match &validation {
            Validation::Valid { code, rule, .. } => {
                let link = validation
                    .deep_link(config.deep_link_base.as_deref())
                    .map(|l| format!("  {l}"))
                    .unwrap_or_default();
                println!("{code}  ({rule:?}){link}");
            }
            Validation::Invalid => {
                invalid += 1;
                println!("invalid  {payload:?}");
            }
        }
    }
    if invalid > 0 {
        bail!("{invalid} of {} payload(s) invalid", payloads.len());
    }
    Ok(())
}

async fn scan_cmd(image: &Path, config: &ScannerConfig) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let strategies: Vec<Arc<dyn DecodeStrategy>> = vec![Arc::new(SoftwareDecoder::new())];
    let scanner = StaticImageScanner::new(
        Preprocessor::new(config.upscale_floor),
        strategies,
        config.deep_link_base.clone(),
    );

    let start = Instant::now();
    let outcome = scanner.scan_bytes(&bytes).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(result) => {
            println!("code: {}", result.code);
            if let Some(link) = &result.deep_link {
                println!("link: {link}");
            }
            println!("decoded in {:.1} ms", elapsed.as_secs_f64() * 1000.0);
            Ok(())
        }
        Err(err @ (ScanError::NoCodeFound | ScanError::InvalidPayload { .. })) => {
            eprintln!("{}", err.user_message());
            Err(err).context(format!("scanning {}", image.display()))
        }
        Err(err) => Err(err).context(format!("scanning {}", image.display())),
    }
}

fn candidates_cmd(image: &Path, out: Option<&Path>, config: &ScannerConfig) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let decoded = Preprocessor::decode_bytes(&bytes)?;
    let preprocessor = Preprocessor::new(config.upscale_floor);

    let start = Instant::now();
    let candidates = preprocessor.prepare(&decoded);
    println!(
        "Image: {} ({}x{}), {} candidates in {:.1} ms",
        image.display(),
        decoded.width(),
        decoded.height(),
        candidates.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    if let Some(dir) = out {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    for (i, candidate) in candidates.iter().enumerate() {
        let stats = luma_stats(&candidate.frame.luma());
        println!(
            "  {i}: {:?} {}x{} luma {}-{} mean {}",
            candidate.kind,
            candidate.frame.width(),
            candidate.frame.height(),
            stats.min,
            stats.max,
            stats.mean
        );
        if let Some(dir) = out {
            let path = dir.join(format!("candidate_{i}.png"));
            candidate
                .frame
                .image()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }
    Ok(())
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use pixelfy::{pixelate_bytes, PixelateConfig};
use serde_json::json;

/// Pixelate images by averaging colors over square blocks.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path (single input only; default: <input>_pixelfied.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output directory for all results
    #[arg(short = 'd', long, conflicts_with = "output")]
    out_dir: Option<PathBuf>,

    /// JSON file with `blockSize`, `smartMode`, `maxColors` and `seed`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Size of pixel blocks [default: 5]
    #[arg(short, long)]
    block_size: Option<usize>,

    /// Use smart color reduction to minimize distinct colors
    #[arg(short, long)]
    smart: bool,

    /// Maximum number of colors for smart mode [default: 32]
    #[arg(short = 'c', long)]
    max_colors: Option<usize>,

    /// Seed for color clustering (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the palette of every result as JSON
    #[arg(long)]
    colors: bool,
}

impl Args {
    fn pixelate_config(&self) -> Result<PixelateConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => PixelateConfig::default(),
        };

        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if self.smart {
            config.smart_mode = true;
        }
        if let Some(max_colors) = self.max_colors {
            config.max_colors = max_colors;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let name = format!("{stem}_pixelfied.png");
        match &self.out_dir {
            Some(dir) => dir.join(name),
            None => input.with_file_name(name),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.output.is_some() && args.inputs.len() > 1 {
        bail!("--output can only be used with a single input");
    }
    let config = args.pixelate_config()?;
    log::debug!("using {config:?}");

    for input in &args.inputs {
        if !input.exists() {
            bail!("input file '{}' does not exist", input.display());
        }
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let result = pixelate_bytes(&bytes, &config)
            .with_context(|| format!("pixelating {}", input.display()))?;

        let out_path = args.output_path(input);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, &result.png)
            .with_context(|| format!("writing {}", out_path.display()))?;
        println!("Saved → {}", out_path.display());

        if args.colors {
            let colors: Vec<_> = result
                .palette
                .iter()
                .map(|c| json!({ "r": c.red, "g": c.green, "b": c.blue }))
                .collect();
            println!("{}", json!({ "file": out_path.display().to_string(), "colors": colors }));
        }
    }

    Ok(())
}

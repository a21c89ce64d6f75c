//! Render a single waveform plot to a PNG file.
//!
//! Useful for checking a data center or the renderer without running the
//! server.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use seisplot::{init_tracing, log_operation_end, log_operation_start, Config, Plotter};

#[derive(Parser, Debug)]
#[command(name = "sample_plot")]
#[command(about = "Generate a sample waveform plot")]
struct Args {
    #[arg(long, default_value = "IU")]
    net: String,

    #[arg(long, default_value = "ANMO")]
    sta: String,

    #[arg(long, default_value = "00")]
    loc: String,

    #[arg(long, default_value = "LHZ")]
    cha: String,

    #[arg(long, default_value = "2004-12-26T01:00:00")]
    start: String,

    #[arg(long, default_value = "2004-12-26T07:00:00")]
    end: String,

    /// Data center; the configured default when omitted
    #[arg(long)]
    dc: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Draw axes and labels
    #[arg(long)]
    frame: bool,

    /// Phase arrival as PHASE=TIME, may be repeated
    #[arg(long = "arrival")]
    arrivals: Vec<String>,

    /// Output file; defaults to a file in the system temp directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn query(&self) -> Result<HashMap<String, String>> {
        let mut query: HashMap<String, String> = [
            ("net", &self.net),
            ("sta", &self.sta),
            ("loc", &self.loc),
            ("cha", &self.cha),
            ("start", &self.start),
            ("end", &self.end),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();

        if let Some(dc) = &self.dc {
            query.insert("dc".to_string(), dc.clone());
        }
        if let Some(width) = self.width {
            query.insert("width".to_string(), width.to_string());
        }
        if let Some(height) = self.height {
            query.insert("height".to_string(), height.to_string());
        }
        query.insert("frame".to_string(), self.frame.to_string());

        for arrival in &self.arrivals {
            let (phase, time) = arrival
                .split_once('=')
                .with_context(|| format!("Arrival must be PHASE=TIME, got '{}'", arrival))?;
            query.insert(format!("{}_arrival", phase), time.to_string());
        }
        Ok(query)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    config.validate()?;
    let plotter = Plotter::from_config(&config)?;

    let query = args.query()?;
    println!("Generating sample plot");
    let start = Instant::now();
    let id = format!("{}.{}.{}.{}", args.net, args.sta, args.loc, args.cha);
    log_operation_start("sample_plot", Some(&id));
    let result = plotter.plot_from_query(&query).await;
    log_operation_end("sample_plot", start, result.is_ok());
    let png = result.context("Plot failed")?;

    let path = match args.output {
        Some(path) => path,
        None => std::env::temp_dir().join(format!("seisplot-{}.png", Uuid::new_v4())),
    };
    std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Plotted to {}", path.display());
    Ok(())
}

//! Loads a model and catalog outside the server and prints what they predict.
//!
//! ```text
//! model-probe inspect --seed 7
//! model-probe image leaf.jpeg
//! ```

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use leafdoc_core::{
    ClassCatalog, Classifier, ImageTensor, InferenceService, InputSize, PixelScale, Preprocessor,
    PredictionResult, ResizeFilter, TractClassifier, prediction::top_k_indices,
};
use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SUSPICIOUS_CLASS: &str = "Background_without_leaves";
const SHOW_TOP: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "model-probe", about = "Debug a Leafdoc model and class catalog")]
struct Cli {
    /// ONNX model file
    #[arg(long, env = "MODEL_PATH", default_value = "models/plant_model.onnx")]
    model: PathBuf,
    /// Class catalog JSON
    #[arg(long, env = "CATALOG_PATH", default_value = "plant_disease.json")]
    catalog: PathBuf,
    #[arg(long, default_value_t = 160)]
    width: u32,
    #[arg(long, default_value_t = 160)]
    height: u32,
    /// nearest, bilinear, bicubic, gaussian or lanczos3
    #[arg(long, default_value = "nearest")]
    filter: ResizeFilter,
    /// raw (0..=255) or unit (0..=1)
    #[arg(long, default_value = "raw")]
    scale: PixelScale,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load model and catalog, then predict on a random tensor
    Inspect {
        /// Seed for the dummy input; random when omitted
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Predict on an image file, directly and through the base64 request path
    Image { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let preprocessor = Preprocessor::new(
        InputSize {
            width: cli.width,
            height: cli.height,
        },
        cli.filter,
        cli.scale,
    );

    println!("Model debug probe");
    println!("{}", "=".repeat(50));

    match &cli.command {
        Command::Inspect { seed } => inspect(&cli, preprocessor, *seed)?,
        Command::Image { path } => image_round_trip(&cli, preprocessor, path)?,
    }

    println!("{}", "=".repeat(50));
    println!("Probe completed");
    Ok(())
}

fn load_model(cli: &Cli, preprocessor: &Preprocessor) -> anyhow::Result<TractClassifier> {
    println!("Loading model from {}...", cli.model.display());
    let model = TractClassifier::load(&cli.model, preprocessor.input_size())?;
    let info = model.info();
    println!("Model loaded");
    println!("  input shape:  {:?}", info.input_shape);
    println!("  output shape: {:?}", info.output_shape);
    Ok(model)
}

fn load_catalog(cli: &Cli) -> anyhow::Result<ClassCatalog> {
    println!("\nLoading classes from {}...", cli.catalog.display());
    let catalog = ClassCatalog::from_path(&cli.catalog)?;
    let names: Vec<&str> = catalog.names().collect();
    println!("Loaded {} classes", names.len());
    println!("  first: {:?}", &names[..names.len().min(SHOW_TOP)]);
    println!("  last:  {:?}", &names[names.len().saturating_sub(SHOW_TOP)..]);

    if let Some(idx) = catalog.index_of(SUSPICIOUS_CLASS) {
        println!("WARNING: '{SUSPICIOUS_CLASS}' found at index {idx}");
    }
    Ok(catalog)
}

fn inspect(cli: &Cli, preprocessor: Preprocessor, seed: Option<u64>) -> anyhow::Result<()> {
    let model = Arc::new(load_model(cli, &preprocessor)?);
    let catalog = load_catalog(cli)?;
    let service = InferenceService::new(model.clone(), catalog, preprocessor)?;

    println!("\nPredicting on dummy data...");
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let [n, h, w, c] = preprocessor.input_size().tensor_shape();
    let dummy = Array4::<f32>::from_shape_fn((n, h, w, c), |_| rng.random::<f32>());
    let tensor = ImageTensor::new(dummy);

    let scores = model.predict(&tensor)?;
    let result = service.interpret(&scores)?;
    print_result(&result);
    print_top(&service, &scores);
    Ok(())
}

fn image_round_trip(
    cli: &Cli,
    preprocessor: Preprocessor,
    path: &Path,
) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("image not found: {}", path.display());
    }

    let model = Arc::new(load_model(cli, &preprocessor)?);
    let catalog = load_catalog(cli)?;
    let service = InferenceService::new(model.clone(), catalog, preprocessor)?;

    let image = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let tensor = preprocessor.tensor_from_image(&image);
    let values = tensor.array();
    let (min, max) = values
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    println!("\nImage tensor shape: {:?}", tensor.shape());
    println!("Image value range: {min:.3} to {max:.3}");

    let scores = model.predict(&tensor)?;
    let direct = service.interpret(&scores)?;
    println!("\nDirect prediction:");
    print_result(&direct);
    print_top(&service, &scores);

    let bytes = std::fs::read(path)?;
    let encoded = STANDARD.encode(&bytes);
    println!("\nBase64 length: {}", encoded.len());
    let decoded = service.predict_base64(&encoded)?;
    println!("\nDecoded prediction:");
    print_result(&decoded);

    if decoded.index == direct.index {
        println!("SUCCESS: base64 round trip preserves the prediction");
    } else {
        println!("WARNING: base64 round trip changes the prediction");
        println!("  direct:  {} ({:.4})", direct.label, direct.confidence);
        println!("  decoded: {} ({:.4})", decoded.label, decoded.confidence);
    }
    Ok(())
}

fn print_result(result: &PredictionResult) {
    println!("  class index: {}", result.index);
    println!("  disease:     {}", result.label);
    println!("  confidence:  {:.4}", result.confidence);
    println!("  severity:    {}", result.severity);
}

fn print_top(service: &InferenceService, scores: &[f32]) {
    println!("\nTop {SHOW_TOP} predictions:");
    for (rank, idx) in top_k_indices(scores, SHOW_TOP).into_iter().enumerate() {
        let name = service
            .catalog()
            .get(idx)
            .map(|r| r.name.as_str())
            .unwrap_or("<unknown>");
        println!("  {}. {}: {:.4}", rank + 1, name, scores[idx]);
    }
}

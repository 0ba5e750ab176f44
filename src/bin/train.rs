use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use iris_service::training::{train_and_save_model, TrainConfig};

#[derive(Parser)]
#[command(name = "iris-train")]
#[command(about = "Train the Iris random forest and write its artifacts")]
struct Args {
    /// Directory to write the model artifacts to
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Artifact base name, without extension
    #[arg(long, default_value = "iris_model")]
    model_name: String,

    /// Share of rows held out for evaluation
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Seed for the split and the forest
    #[arg(long, default_value = "42")]
    random_state: u64,

    /// Number of trees
    #[arg(long, default_value = "100")]
    n_estimators: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "32")]
    max_depth: usize,

    /// CSV file of `f1,f2,f3,f4,class` rows; the embedded Iris data when absent
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Split without preserving class shares
    #[arg(long)]
    no_stratify: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = TrainConfig {
        model_dir: args.model_dir,
        model_name: args.model_name,
        test_size: args.test_size,
        random_state: args.random_state,
        n_estimators: args.n_estimators,
        max_depth: args.max_depth,
        dataset: args.dataset,
        stratify: !args.no_stratify,
    };

    println!("Training Random Forest classifier...");
    let summary = train_and_save_model(&config)?;

    println!("\nClassification Report:");
    println!("{}", summary.metadata.metrics);
    println!("Classification rate train: {:.3?}%", summary.train_accuracy * 100.0);

    println!("\nFeature Importances:");
    for (feature, importance) in summary.ranked_importances() {
        println!("{}: {:.4}", feature, importance);
    }

    println!("Model saved as {}", summary.paths.model.display());
    println!("Metadata saved as {}", summary.paths.metadata.display());

    Ok(())
}

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dropout_early_warning::dataset::{LabeledDataset, Table};
use dropout_early_warning::predictor::{self, ScoredTable, DEFAULT_MODEL_PATH, TOP_RISK_ROWS};
use dropout_early_warning::report;
use dropout_early_warning::trainer::{self, TrainConfig};

#[derive(Parser)]
#[command(name = "dropout-early-warning")]
#[command(about = "Student dropout early warning: train a risk model and score uploads", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the pipeline on a labeled CSV and save the artifact
    Train {
        #[arg(long, default_value = "xAPI-Edu-Data.csv")]
        csv: PathBuf,
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        out: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 0.2)]
        test_size: f64,
        #[arg(long, default_value_t = 1000)]
        max_iter: usize,
        /// Inverse regularization strength
        #[arg(long, default_value_t = 1.0)]
        c: f64,
    },
    /// Score an uploaded CSV and write the risk predictions
    Predict {
        #[arg(long, env = "DROPOUT_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "student_risk_predictions.csv")]
        out: PathBuf,
        /// Also write the full table with the risk columns appended
        #[arg(long)]
        full_out: Option<PathBuf>,
        #[arg(long, default_value_t = TOP_RISK_ROWS)]
        top: usize,
    },
    /// Show the risk details of one student by row index
    Inspect {
        #[arg(long, env = "DROPOUT_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        index: usize,
    },
    /// Generate a markdown risk report for an uploaded CSV
    Report {
        #[arg(long, env = "DROPOUT_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = TOP_RISK_ROWS)]
        top: usize,
    },
}

fn init_logging(debug: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("dropout_early_warning=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

fn score_upload(model: &Path, csv: &Path) -> anyhow::Result<ScoredTable> {
    let pipeline = predictor::load_model(model)?;
    let table = Table::from_path(csv)
        .with_context(|| format!("failed to read upload {}", csv.display()))?;
    println!(
        "Columns in uploaded file: {:?}",
        table.headers().iter().collect::<Vec<_>>()
    );

    let scored = predictor::predict(pipeline, &table)?;
    println!("Risk scores calculated for {} students.", scored.len());
    Ok(scored)
}

fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Train {
            csv,
            out,
            seed,
            test_size,
            max_iter,
            c,
        } => {
            let table = Table::from_path(&csv)
                .with_context(|| format!("failed to load {}", csv.display()))?;
            println!(
                "CSV loaded ({} rows, {} columns)",
                table.len(),
                table.headers().len()
            );

            let dataset = LabeledDataset::from_table(&table)
                .with_context(|| format!("{} is not a usable training set", csv.display()))?;
            let config = TrainConfig {
                seed,
                test_fraction: test_size,
                max_iter,
                c,
                ..TrainConfig::default()
            };
            let outcome = trainer::train(&dataset, &config).context("training failed")?;
            println!(
                "Model trained on {} rows ({} held out for evaluation).",
                outcome.train_rows, outcome.test_rows
            );

            println!("Classification Report:\n");
            println!("{}", outcome.evaluation.report);
            match outcome.evaluation.roc_auc {
                Some(auc) => println!("ROC-AUC: {auc:.4}"),
                None => println!("ROC-AUC: undefined (held-out set has a single class)"),
            }

            outcome
                .pipeline
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Model saved as {}.", out.display());
        }
        Commands::Predict {
            model,
            csv,
            out,
            full_out,
            top,
        } => {
            let scored = score_upload(&model, &csv)?;

            println!("Top {top} high-risk students:");
            for row in scored.top(top) {
                println!(
                    "- {}: score {:.3} ({}, predicted dropout {})",
                    report::row_name(&scored, &row),
                    row.assessment.risk_score,
                    row.assessment.risk_label,
                    row.assessment.predicted_dropout
                );
            }

            write_output(&out, scored.export_csv()?)?;
            println!("Predictions written to {}.", out.display());

            if let Some(path) = full_out {
                let file = File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                scored.write_augmented(BufWriter::new(file))?;
                println!("Full table written to {}.", path.display());
            }
        }
        Commands::Inspect { model, csv, index } => {
            let scored = score_upload(&model, &csv)?;
            let row = scored.row(index).with_context(|| {
                format!(
                    "row index {index} is out of range ({} students)",
                    scored.len()
                )
            })?;

            println!("Student: {}", report::row_name(&scored, &row));
            println!("Risk Score: {:.3}", row.assessment.risk_score);
            println!("Risk Level: {}", row.assessment.risk_label);
            println!("Predicted Dropout: {}", row.assessment.predicted_dropout);
            println!();
            let mut explanation = String::new();
            report::write_explanation(&mut explanation);
            print!("{explanation}");
        }
        Commands::Report {
            model,
            csv,
            out,
            top,
        } => {
            let scored = score_upload(&model, &csv)?;
            let source = csv.display().to_string();
            let report = report::build_report(Some(&source), &scored, top);
            write_output(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

use std::path::PathBuf;

use raga_trainer::config::TrainerConfig;
use raga_trainer::{logging, pipeline};

fn main() {
    let mut config_path: Option<PathBuf> = None;
    let mut data_dir: Option<PathBuf> = None;
    let mut epochs: Option<usize> = None;
    let mut skip_corrupt = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(value) = args.next() {
                    config_path = Some(PathBuf::from(value));
                }
            }
            "--data-dir" => {
                if let Some(value) = args.next() {
                    data_dir = Some(PathBuf::from(value));
                }
            }
            "--epochs" => {
                if let Some(value) = args.next() {
                    match value.parse() {
                        Ok(parsed) => epochs = Some(parsed),
                        Err(_) => {
                            eprintln!("Invalid --epochs value: {value}");
                            std::process::exit(1);
                        }
                    }
                }
            }
            "--skip-corrupt" => {
                skip_corrupt = true;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {arg}");
                print_help();
                std::process::exit(1);
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => match TrainerConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load config: {err}");
                std::process::exit(1);
            }
        },
        None => TrainerConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.dataset_root = dir;
    }
    if let Some(epochs) = epochs {
        config.fit.epochs = epochs;
    }
    if skip_corrupt {
        config.skip_corrupt = true;
    }
    let config = config.normalized();

    if let Err(err) = logging::init(&config.log_dir) {
        eprintln!("Logging setup failed: {err}");
    }

    match pipeline::run(&config) {
        Ok(report) => {
            println!(
                "Trained {} classes on {} examples over {} epochs (best val accuracy {:.3})",
                report.classes, report.examples, report.epochs_run, report.best_val_accuracy
            );
            println!("Artifact: {}", report.export.artifact_path.display());
        }
        Err(err) => {
            eprintln!("Training pipeline failed: {err}");
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "Usage: raga-trainer [--config <path>] [--data-dir <path>] [--epochs <n>] [--skip-corrupt]"
    );
}

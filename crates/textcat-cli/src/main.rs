use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use textcat_cli::classify::predict::input::PredictConfig;
use textcat_cli::classify::predict::predictor;
use textcat_cli::classify::train::input::TrainConfig;
use textcat_cli::classify::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("TEXTCAT_LOG", "error,textcat=info"))
        .init();

    let model_arg = Arg::new("model_path")
        .short('m')
        .long("model")
        .help("Path to a model file written by `textcat train`")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath);

    let data_arg = Arg::new("data")
        .short('d')
        .long("data")
        .help("Path to the input data file (*.tsv or *.csv) with a 'text' column")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath);

    let matches = Command::new("textcat")
        .version(clap::crate_version!())
        .about("textcat CLI - Train and apply statistical text classifiers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a text classifier from labeled data")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file. Prints a template when omitted.")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("train_data")
                        .short('d')
                        .long("train_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to training data. Overrides the training data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("validation_data")
                        .short('v')
                        .long("validation_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to validation data. Overrides the validation data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "File path that the trained model will be written to. \
                             Overrides the output file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("classifier")
                        .short('c')
                        .long("classifier")
                        .help(
                            "Classifier to train. \
                             Overrides the classifier type specified in the configuration file.",
                        )
                        .value_parser(["logreg", "dtree", "rforest", "svm"]),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed for shuffling the training data")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict labels for new texts using a trained model")
                .arg(model_arg.clone())
                .arg(data_arg.clone())
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .help("Path to the output file for predictions (*.tsv or *.csv). Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Evaluate a trained model on labeled data")
                .arg(model_arg)
                .arg(data_arg)
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .help("Path to write per-example results (*.tsv or *.csv)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        Some(("evaluate", sub_m)) => handle_evaluate(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        eprintln!("[textcat::Train] No config file provided; printing a template.");
        println!("{}", serde_json::to_string_pretty(&TrainConfig::default())?);
        return Ok(());
    };
    log::info!("[textcat::Train] Training from config: {:?}", config_path);

    let config = TrainConfig::from_arguments(config_path, matches)?;

    match trainer::run_training(&config) {
        Ok(summary) => {
            log::info!(
                "[textcat::Train] Trained on {} examples across {} classes",
                summary.n_examples,
                summary.n_classes
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let config = PredictConfig::from_arguments(matches)?;
    log::info!("[textcat::Predict] Using model: {:?}", config.model_path);

    match predictor::run_prediction(&config) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Prediction failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_evaluate(matches: &ArgMatches) -> Result<()> {
    let config = PredictConfig::from_arguments(matches)?;
    log::info!("[textcat::Evaluate] Using model: {:?}", config.model_path);

    match predictor::run_evaluation(&config) {
        Ok(evaluation) => {
            let accuracy = evaluation.accuracy().unwrap_or(0.0);
            println!(
                "accuracy\t{:.4}\t{}/{}",
                accuracy,
                evaluation.correct_results().count(),
                evaluation.len()
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Evaluation failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

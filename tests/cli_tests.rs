use kpcn_rust::cli::build_app;
use kpcn_rust::commands;
use kpcn_rust::config_file::DenoiserConfigFile;
use tempfile::TempDir;

#[test]
fn test_train_options_parse() {
    let matches = build_app()
        .get_matches_from_safe(vec![
            "kpcn", "train", "--patch_size", "40", "--filters", "8", "--rate", "1e-3", "--epochs", "5",
            "--batch_size", "4", "--loss", "L2", "--shuffle", "--accuracy", "--seed", "3", "--samples", "6",
            "--noise", "0.05", "--evaluate", "--quiet", "--log_format", "json",
        ])
        .unwrap();

    let train = matches.subcommand_matches("train").unwrap();
    assert_eq!(train.value_of("PATCH_SIZE"), Some("40"));
    assert_eq!(train.value_of("FILTERS"), Some("8"));
    assert_eq!(train.value_of("LEARNING_RATE"), Some("1e-3"));
    assert_eq!(train.value_of("EPOCHS"), Some("5"));
    assert_eq!(train.value_of("TRAINING_LOSS"), Some("L2"));
    assert_eq!(train.value_of("LOG_FORMAT"), Some("json"));
    assert!(train.is_present("SHUFFLE"));
    assert!(train.is_present("ACCURACY"));
    assert!(train.is_present("EVALUATE"));
    assert!(train.is_present("QUIET"));
}

#[test]
fn test_unknown_loss_rejected() {
    let result = build_app().get_matches_from_safe(vec!["kpcn", "train", "--loss", "L3"]);
    assert!(result.is_err());
}

#[test]
fn test_subcommand_required() {
    assert!(build_app().get_matches_from_safe(vec!["kpcn"]).is_err());
}

#[test]
fn test_summary_command_runs() {
    let matches = build_app()
        .get_matches_from_safe(vec!["kpcn", "summary", "--patch_size", "40", "--filters", "4"])
        .unwrap();
    let summary = matches.subcommand_matches("summary").unwrap();
    assert!(commands::summary(summary).is_ok());

    let matches = build_app()
        .get_matches_from_safe(vec!["kpcn", "summary", "--patch_size", "36"])
        .unwrap();
    let summary = matches.subcommand_matches("summary").unwrap();
    assert!(commands::summary(summary).is_err());
}

#[test]
fn test_train_command_runs_small_model() {
    let matches = build_app()
        .get_matches_from_safe(vec![
            "kpcn", "train", "--patch_size", "38", "--filters", "2", "--epochs", "1", "--batch_size", "2",
            "--samples", "2", "--seed", "1", "--quiet",
        ])
        .unwrap();
    let train = matches.subcommand_matches("train").unwrap();
    assert!(commands::train(train).is_ok());
}

#[test]
fn test_train_command_rejects_bad_numbers() {
    let matches = build_app()
        .get_matches_from_safe(vec!["kpcn", "train", "--rate", "fast", "--quiet"])
        .unwrap();
    let train = matches.subcommand_matches("train").unwrap();
    assert!(commands::train(train).is_err());
}

#[test]
fn test_generate_config_command() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("generated.json");
    let path_str = path.to_str().unwrap();

    let matches = build_app()
        .get_matches_from_safe(vec!["kpcn", "generate-config", path_str, "--format", "json"])
        .unwrap();
    let generate = matches.subcommand_matches("generate-config").unwrap();
    assert!(commands::generate_config(generate).is_ok());
    assert_eq!(DenoiserConfigFile::from_file(&path).unwrap(), DenoiserConfigFile::generate_default());

    // A second run without --force must not clobber the file.
    assert!(commands::generate_config(generate).is_err());
}

#[test]
fn test_train_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.toml");
    let mut file = DenoiserConfigFile::generate_default();
    file.model.patch_size = 38;
    file.model.hidden_filters = 2;
    file.training.epochs = Some(1);
    file.data.samples = 2;
    file.data.test_samples = 1;
    file.training.evaluate = true;
    file.to_toml_file(&path).unwrap();

    let matches = build_app()
        .get_matches_from_safe(vec!["kpcn", "train", "--config", path.to_str().unwrap(), "--quiet"])
        .unwrap();
    let train = matches.subcommand_matches("train").unwrap();
    assert!(commands::train(train).is_ok());
}

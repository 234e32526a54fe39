use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

pub fn build_cli() -> ArgMatches<'static> {
	build_app().get_matches()
}

pub fn build_app() -> App<'static, 'static> {
	App::new("kpcn")
		.version(env!("CARGO_PKG_VERSION"))
		.about("A convolutional network trained to denoise Monte Carlo renderings")
		.settings(&[AppSettings::SubcommandRequiredElseHelp, AppSettings::VersionlessSubcommands])
		.subcommand(build_train_subcommand())
		.subcommand(build_summary_subcommand())
		.subcommand(build_generate_config_subcommand())
}

fn build_train_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("train")
		.about("Train the denoiser on synthetic noisy/reference patch pairs")
		.arg(build_config_arg())
		.args(&model_args())
		.arg(build_learning_rate_arg())
		.arg(
			Arg::with_name("EPOCHS")
				.short("e")
				.long("epochs")
				.value_name("N")
				.help("Number of epochs for this run, overriding num_epochs")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("NUM_EPOCHS")
				.long("num_epochs")
				.value_name("N")
				.help("Declared number of epochs. Default: 200")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("BATCH_SIZE")
				.short("b")
				.long("batch_size")
				.value_name("N")
				.help("Patch pairs per optimiser step. Default: 32")
				.empty_values(false),
		)
		.arg(build_training_loss_arg())
		.arg(
			Arg::with_name("SHUFFLE")
				.long("shuffle")
				.help("Reshuffle the training samples every epoch")
				.takes_value(false),
		)
		.arg(
			Arg::with_name("ACCURACY")
				.long("accuracy")
				.help("Also report the accuracy metric")
				.takes_value(false),
		)
		.arg(build_seed_arg())
		.arg(
			Arg::with_name("SAMPLES")
				.short("n")
				.long("samples")
				.value_name("N")
				.help("Number of synthetic training patch pairs. Default: 64")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("NOISE")
				.long("noise")
				.value_name("LEVEL")
				.help("Half-width of the uniform noise added to the references. Default: 0.1")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("EVALUATE")
				.long("evaluate")
				.help("Evaluate loss and metrics on the test split after fitting")
				.takes_value(false),
		)
		.arg(
			Arg::with_name("QUIET")
				.short("q")
				.long("quiet")
				.help("Hide the per-epoch progress bar")
				.takes_value(false),
		)
		.arg(
			Arg::with_name("LOG_FORMAT")
				.long("log_format")
				.value_name("FORMAT")
				.help("Use structured tracing output in the given format instead of plain logs")
				.possible_values(&["pretty", "compact", "json"])
				.empty_values(false),
		)
}

fn build_summary_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("summary")
		.about("Print the layers, output shapes and parameter counts of the network")
		.arg(build_config_arg())
		.args(&model_args())
}

fn build_generate_config_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("generate-config")
		.about("Write a default configuration file")
		.arg(
			Arg::with_name("OUTPUT_FILE")
				.help("Where to write the configuration. Default: denoiser_config.toml")
				.index(1),
		)
		.arg(
			Arg::with_name("FORMAT")
				.short("f")
				.long("format")
				.value_name("FORMAT")
				.help("File format. Default: toml")
				.possible_values(&["toml", "json"])
				.empty_values(false),
		)
		.arg(
			Arg::with_name("EXAMPLE")
				.short("e")
				.long("example")
				.help("Write a commented example instead (TOML only)")
				.takes_value(false),
		)
		.arg(
			Arg::with_name("FORCE")
				.long("force")
				.help("Overwrite an existing file")
				.takes_value(false),
		)
}

fn model_args() -> Vec<Arg<'static, 'static>> {
	vec![
		Arg::with_name("PATCH_SIZE")
			.short("p")
			.long("patch_size")
			.value_name("N")
			.help("Square input patch extent, greater than 36. Default: 64")
			.empty_values(false),
		Arg::with_name("INPUT_CHANNELS")
			.long("input_channels")
			.value_name("N")
			.help("Channels of the noisy input. Default: 3")
			.empty_values(false),
		Arg::with_name("OUTPUT_CHANNELS")
			.long("output_channels")
			.value_name("N")
			.help("Channels of the denoised output. Default: 3")
			.empty_values(false),
		Arg::with_name("FILTERS")
			.short("w")
			.long("filters")
			.value_name("N")
			.help("Filters in each hidden convolution. Default: 100")
			.empty_values(false),
	]
}

fn build_config_arg() -> Arg<'static, 'static> {
	Arg::with_name("CONFIG_FILE")
		.short("c")
		.long("config")
		.value_name("FILE")
		.help("Load settings from a TOML or JSON file; other flags override it")
		.empty_values(false)
}

fn build_learning_rate_arg() -> Arg<'static, 'static> {
	Arg::with_name("LEARNING_RATE")
		.short("R")
		.long("rate")
		.help("The learning rate used by the Adam optimiser. Default: 1e-5")
		.empty_values(false)
}

fn build_training_loss_arg() -> Arg<'static, 'static> {
	Arg::with_name("TRAINING_LOSS")
		.help("Selects whether the network minimises the L1 or L2 loss. Default: L1")
		.short("l")
		.long("loss")
		.value_name("LOSS")
		.possible_values(&["L1", "L2"])
		.empty_values(false)
}

fn build_seed_arg() -> Arg<'static, 'static> {
	Arg::with_name("SEED")
		.short("s")
		.long("seed")
		.value_name("SEED")
		.help("Seed for weight initialisation, shuffling and synthetic data")
		.empty_values(false)
}

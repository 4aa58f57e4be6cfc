use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use nabaztag_client::config::{self, Config};

/// Client relay for the Nabaztag animatronic rabbit
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[clap(
        short,
        long,
        value_parser,
        default_value = "/etc/nabaztag/nabaztagconfig.yaml"
    )]
    config: PathBuf,
}

fn init_logging(config: &Config) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(path) = &config.logs.client {
        match std::fs::File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Failed to open log file {}: {}, logging to stderr", path, e),
        }
    }

    builder.init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", args.config.display(), e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    nabaztag_client::run(config).await;
}

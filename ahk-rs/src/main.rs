use std::process::ExitCode;

use ahk::config::Config;
use ahk::embedder::Embedder;
use ahk::{host, logger};

fn main() -> ExitCode {
    let config = Config::default();
    logger::init_with_level(config.log_level);

    let mut embedder = Embedder::with_config(&config);

    if let Err(e) = host::register(&mut embedder, std::io::stdout()) {
        eprintln!("ahk: {e}");
        return ExitCode::FAILURE;
    }

    // Shutdown happens inside run_once on every path.
    match embedder.run_once(host::DEFAULT_SCRIPT) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ahk: {e}");
            ExitCode::FAILURE
        }
    }
}

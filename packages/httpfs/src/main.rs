use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use httpfs::Args;

fn main() -> ExitCode {
    let args = match Args::parse_from_argv(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    // Logs go to stderr; stdout belongs to the backend.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match httpfs::run(&args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            error!("{}", err);
            ExitCode::from(1)
        }
    }
}

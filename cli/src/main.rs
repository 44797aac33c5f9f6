use packcli::{Cli, CliContext};
use tracing_subscriber::EnvFilter;

/// Log filter for diagnostics, e.g. `PACKCLI_LOG=packcli=debug`.
const LOG_VAR: &str = "PACKCLI_LOG";

fn main() {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: unable to start runtime: {err}");
            std::process::exit(2);
        }
    };
    let code = runtime.block_on(run(std::env::args().skip(1).collect()));
    std::process::exit(code);
}

async fn run(args: Vec<String>) -> i32 {
    let ctx = match CliContext::from_env() {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {err}");
            return err.exit_code();
        }
    };
    let logger = ctx.logger.clone();
    let mut cli = Cli::new(ctx);
    match cli.run(args).await {
        Ok(code) => code,
        Err(err) => {
            err.report(&logger);
            err.exit_code()
        }
    }
}

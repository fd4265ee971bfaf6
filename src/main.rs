use std::sync::Arc;

use sessionkit::adapters::{FileStorage, ReqwestHttpClient};
use sessionkit::bus::ChangeBus;
use sessionkit::cli::{needs_context, parse_args, run_cli_command, run_offline, CliContext};
use sessionkit::config::ClientConfig;
use sessionkit::logging::init_logging;

use color_eyre::Result;

fn main() -> Result<()> {
    let command = parse_args(std::env::args());

    // Version, help and usage errors need no runtime
    if !needs_context(&command) {
        return run_offline(command);
    }

    color_eyre::install()?;
    init_logging("warn");

    let config = ClientConfig::from_env();
    let storage = FileStorage::new()?;
    tracing::debug!(base_url = %config.base_url, root = %storage.root().display(), "Starting");

    let ctx = CliContext::new(
        &config,
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(storage),
        ChangeBus::global(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_cli_command(command, &ctx))
}

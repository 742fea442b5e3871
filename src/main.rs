use std::io::IsTerminal as _;

use log::debug;

mod ble;
mod cli;
mod config;
mod dispatch;
mod packet;
mod preset;
mod scanner;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let (command, config_path, address) = match cli::parse(std::env::args_os()) {
        cli::Invocation::Run {
            command,
            config,
            address,
        } => (command, config, address),
        cli::Invocation::Usage { complaint } => {
            if let Some(complaint) = complaint {
                println!("{complaint}");
            }
            println!("{}", cli::usage());
            return Ok(());
        }
        cli::Invocation::Clap(err) => err.exit(),
    };

    let config = config::AppConfig::load(config_path.as_deref())?;
    let address = address.unwrap_or_else(|| config.address());
    debug!("Target device: {address}, config: {config:?}");

    let transport = ble::BleTransport::new(&config);
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();

    let mut dispatcher =
        dispatch::Dispatcher::new(&transport, &config, address, stdin.lock(), std::io::stdout())
            .interactive(interactive);
    dispatcher.run(command).await
}

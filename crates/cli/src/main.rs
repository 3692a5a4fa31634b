use std::process::ExitCode;

use client::Cmd;
use client::Dialer;
use client::RespValue;
use log::debug;

use crate::config::CliConfig;
use crate::config::Parser;

mod config;
mod render;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
	let args = config::Cli::parse();

	let settings = match config::setup(&args) {
		Ok(settings) => settings,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::FAILURE;
		}
	};
	if let Err(e) = telemetry::init(&settings.log_level) {
		eprintln!("{}", e);
		return ExitCode::FAILURE;
	}

	match execute(&settings, &args.command).await {
		Ok(reply) => {
			println!("{}", render::render(&reply));
			ExitCode::SUCCESS
		}
		Err(e) => {
			match e.downcast_ref::<client::Error>() {
				Some(client::Error::Server(msg)) => println!("(error) {}", msg),
				_ => eprintln!("Error: {}", e),
			}
			ExitCode::FAILURE
		}
	}
}

/// Dial, run `command` and close the connection.
async fn execute(settings: &CliConfig, command: &[String]) -> Result<RespValue, BoxError> {
	let (name, args) = command.split_first().ok_or("no command given")?;
	let cmd = Cmd::new(name.as_str()).args(args);

	let conn = Dialer::from_config(settings.dial.clone())
		.dial(&settings.network, &settings.addr)
		.await?;
	debug!("Sending {} to {}", cmd, conn.peer());

	let reply = conn.do_cmd::<RespValue>(&cmd).await;
	conn.close()?;
	Ok(reply?)
}

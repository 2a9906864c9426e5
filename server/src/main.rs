use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = grimoire_server::start_server().await {
        eprintln!("fatal: {err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

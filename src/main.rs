use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    interface_content::run().await
}

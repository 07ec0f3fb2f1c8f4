use std::process::ExitCode;

use scout_app::Launch;
use scout_common::RecordKind;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    Launch::default().run("job-alerts", &[RecordKind::Job]).await
}

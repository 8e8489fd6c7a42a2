use std::io::Read;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    backoffice_observability::init();

    let source = std::env::args().nth(1);
    let raw = match source.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read script from stdin")?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {path}"))?,
    };

    let script: backoffice_cli::Script =
        serde_json::from_str(&raw).context("script is not a valid edit script")?;
    tracing::info!(actions = script.actions.len(), "replaying edit script");

    let report = backoffice_cli::replay(script);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to render report")?
    );

    if !report.valid {
        tracing::info!(errors = report.validation.len(), "draft is not ready for submission");
    }
    Ok(())
}

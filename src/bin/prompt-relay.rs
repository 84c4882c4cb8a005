use std::path::{Path, PathBuf};

use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use prompt_relay::{Env, OpenAICompatible, RelayConfig, read_prompts, run_batch, write_results};

const USAGE: &str = "usage: prompt-relay <prompts.csv> [--limit N] [--model ID] [--base-url URL] [--out DIR] [--dotenv PATH] [--referer URL] [--title NAME] [--json-logs]";

const DEFAULT_LIMIT: usize = 10;

fn init_tracing(json_logs: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let input = args.next().ok_or(USAGE)?;

    let mut limit = DEFAULT_LIMIT;
    let mut model: Option<String> = None;
    let mut base_url: Option<String> = None;
    let mut out_dir = PathBuf::from(".");
    let mut dotenv_path: Option<PathBuf> = None;
    let mut referer: Option<String> = None;
    let mut title: Option<String> = None;
    let mut json_logs = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--limit" => {
                limit = args
                    .next()
                    .ok_or("missing value for --limit")?
                    .parse::<usize>()
                    .map_err(|err| format!("invalid --limit: {err}"))?;
            }
            "--model" => {
                model = Some(args.next().ok_or("missing value for --model")?);
            }
            "--base-url" => {
                base_url = Some(args.next().ok_or("missing value for --base-url")?);
            }
            "--out" => {
                out_dir = args.next().ok_or("missing value for --out")?.into();
            }
            "--dotenv" => {
                dotenv_path = Some(args.next().ok_or("missing value for --dotenv")?.into());
            }
            "--referer" => {
                referer = Some(args.next().ok_or("missing value for --referer")?);
            }
            "--title" => {
                title = Some(args.next().ok_or("missing value for --title")?);
            }
            "--json-logs" => json_logs = true,
            other => return Err(format!("unknown argument: {other}\n{USAGE}").into()),
        }
    }

    init_tracing(json_logs);

    // An explicit --dotenv path must exist; the implicit ./.env is optional.
    let env = match dotenv_path {
        Some(path) => Env::parse_dotenv(&tokio::fs::read_to_string(&path).await.map_err(
            |err| format!("failed to read dotenv file {}: {err}", path.display()),
        )?),
        None => match tokio::fs::read_to_string(".env").await {
            Ok(contents) => Env::parse_dotenv(&contents),
            Err(_) => Env::default(),
        },
    };

    let mut config = RelayConfig::from_env(&env)?.with_attribution(referer, title);
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(base_url) = base_url {
        config = config.with_base_url(base_url);
    }

    let records = read_prompts(Path::new(&input))?;
    tracing::info!(count = records.len(), "loaded prompts");

    let client = OpenAICompatible::from_config(&config);
    let outcomes = run_batch(&client, &records, limit, config.max_tokens).await;

    let written = write_results(&out_dir, &outcomes)?;
    tracing::info!(
        rows = outcomes.len(),
        path = %written.display(),
        "run complete"
    );
    println!("Done.");

    Ok(())
}

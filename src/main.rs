use anyhow::{anyhow, Context, Result};
use clap::Parser;
use racefetch::configuration::Settings;
use racefetch::{headers_from_pairs, send_head, RaceFetcher};

#[derive(Parser)]
#[command(name = "racefetch", version, about = "Fetch a URL through a proxy and directly, keep the first answer")]
struct Cli {
    /// URL to fetch
    url: String,

    /// Proxy for the proxied attempt (overrides config.toml)
    #[arg(long)]
    proxy: Option<String>,

    /// Extra request header, e.g. 'Accept: text/plain'
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Only probe the status code
    #[arg(long)]
    head: bool,

    /// Settings file (default: ./config.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("racefetch", log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    if let Err(e) = run(Cli::parse()).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::from_path(path)?,
        None => Settings::new().unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Settings::default()
        }),
    };
    let config = settings.fetch_config();
    let proxy = cli
        .proxy
        .clone()
        .or_else(|| settings.proxy().map(str::to_string))
        .unwrap_or_default();

    if cli.head {
        let proxy = (!proxy.is_empty()).then_some(proxy.as_str());
        let status = send_head(&cli.url, proxy, &config).await?;
        println!("{}", status);
        return Ok(());
    }

    let pairs = cli
        .headers
        .iter()
        .map(|h| {
            h.split_once(':')
                .ok_or_else(|| anyhow!("header {:?} is not 'Name: value'", h))
        })
        .collect::<Result<Vec<_>>>()?;
    let headers = headers_from_pairs(pairs)?;

    let fetcher = RaceFetcher::new(config);
    let result = fetcher
        .fetch_racing(&cli.url, &headers, &proxy)
        .await
        .with_context(|| format!("fetching {}", cli.url))?;

    eprintln!("{}", result);
    println!("{}", result.body);
    Ok(())
}

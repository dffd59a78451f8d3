mod download_plan;
mod downloader;
mod error;
mod link_gatherer;
mod listing;
mod mirror;
mod site_tracer;
mod target;

use std::path::PathBuf;
use std::process::ExitCode;

use downloader::Downloader;
use link_gatherer::Page;
use mirror::Mirror;
use site_tracer::SiteTracer;

use clap::Parser;

/// Download the contents of a web server directory listing.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// The listing URL to download from
    url: String,
    /// Where to put the downloaded files
    #[arg(long, default_value = ".")]
    destination: PathBuf,
    /// Output more log messages
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("index_mirror={}", log_level))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let client = reqwest::Client::new();
    let mirror = Mirror::new(
        &args.url,
        args.destination,
        SiteTracer {
            link_getter: Page::new(client.clone()),
            worker_pool_size: 8,
        },
        Downloader {
            fetcher: client,
            worker_pool_size: 4,
        },
    );

    match mirror {
        Ok(mirror) => match mirror.run().await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["index_mirror", "http://example.com/pub/"]).unwrap();
        assert_eq!(cli.url, "http://example.com/pub/");
        assert_eq!(cli.destination, PathBuf::from("."));
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_accepts_destination_and_verbose() {
        let cli = Cli::try_parse_from([
            "index_mirror",
            "--destination",
            "/tmp/mirror",
            "--verbose",
            "http://example.com/pub/",
        ])
        .unwrap();
        assert_eq!(cli.destination, PathBuf::from("/tmp/mirror"));
        assert!(cli.verbose);
    }

    #[test]
    fn cli_requires_url() {
        assert!(Cli::try_parse_from(["index_mirror"]).is_err());
    }
}

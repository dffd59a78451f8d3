use std::path::PathBuf;

use reqwest::Url;

use crate::download_plan::filter_existing;
use crate::downloader::{DownloadSummary, Downloader, FileFetcher};
use crate::error::MirrorError;
use crate::link_gatherer::LinkGatherer;
use crate::site_tracer::SiteTracer;
use crate::target::Target;

/// One mirroring run: list everything below `root`, work out what is missing
/// from `destination` and download it.
pub struct Mirror<L: LinkGatherer + 'static, F: FileFetcher + 'static> {
    pub root: String,
    pub destination: PathBuf,
    pub tracer: SiteTracer<L>,
    pub downloader: Downloader<F>,
}

impl<L: LinkGatherer + 'static, F: FileFetcher + 'static> Mirror<L, F> {
    pub fn new(
        root: &str,
        destination: PathBuf,
        tracer: SiteTracer<L>,
        downloader: Downloader<F>,
    ) -> Result<Self, MirrorError> {
        Ok(Mirror {
            root: normalize_root(root)?,
            destination,
            tracer,
            downloader,
        })
    }

    #[tracing::instrument(skip(self), fields(root = %self.root))]
    pub async fn run(&self) -> Result<DownloadSummary, MirrorError> {
        let listing = self.tracer.trace(&self.root).await?;
        tracing::info!(
            "Finished getting directory listing. {} files found",
            listing.files.len()
        );

        let targets = listing
            .files
            .iter()
            .map(|url| Target::new(&listing.root, url))
            .collect::<Result<Vec<_>, _>>()?;
        let found = targets.len();

        let plan = filter_existing(&self.destination, targets)?;
        if plan.len() < found {
            tracing::info!("{} files already present", found - plan.len());
        }

        Ok(self.downloader.download_all(&self.destination, plan).await?)
    }
}

/// Parses the root URL into its canonical form, which is what every
/// discovered link is compared against.
pub fn normalize_root(url: &str) -> Result<String, MirrorError> {
    let parsed = Url::parse(url).map_err(|err| MirrorError::InvalidRoot {
        url: url.to_string(),
        message: err.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.into()),
        scheme => Err(MirrorError::InvalidRoot {
            url: url.to_string(),
            message: format!("unsupported scheme {}", scheme),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::download_plan::PlanError;
    use crate::downloader::DownloadError;
    use crate::error::FetchError;
    use crate::link_gatherer::Page;
    use crate::site_tracer::TraceError;

    const ROOT_INDEX: &str = r#"
<html>
  <head><title>Index of /d</title></head>
  <body>
    <h1>Index of /d</h1>
    <a href="?C=N;O=D">Name</a>
    <a href="/">Parent Directory</a>
    <a href="sub/">sub/</a>
    <a href="file.txt">file.txt</a>
  </body>
</html>"#;

    const SUB_INDEX: &str = r#"
<html>
  <body>
    <a href="../">Parent Directory</a>
    <a href="a.TXT">a.TXT</a>
  </body>
</html>"#;

    async fn mount(server: &MockServer, at: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn listing_server() -> MockServer {
        let server = MockServer::start().await;
        mount(&server, "/d/", ResponseTemplate::new(200).set_body_string(ROOT_INDEX)).await;
        mount(&server, "/d/sub/", ResponseTemplate::new(200).set_body_string(SUB_INDEX)).await;
        mount(
            &server,
            "/d/file.txt",
            ResponseTemplate::new(200).set_body_bytes(b"top level contents".to_vec()),
        )
        .await;
        mount(
            &server,
            "/d/sub/a.TXT",
            ResponseTemplate::new(200).set_body_bytes(b"nested contents\n".to_vec()),
        )
        .await;
        server
    }

    fn mirror(root: &str, destination: &TempDir) -> Mirror<Page, reqwest::Client> {
        let client = reqwest::Client::new();
        Mirror::new(
            root,
            destination.path().to_path_buf(),
            SiteTracer {
                link_getter: Page::new(client.clone()),
                worker_pool_size: 2,
            },
            Downloader {
                fetcher: client,
                worker_pool_size: 2,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn mirrors_nested_listing() {
        let server = listing_server().await;
        let dest = TempDir::new().unwrap();

        let summary = mirror(&format!("{}/d/", server.uri()), &dest)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(
            fs::read(dest.path().join("file.txt")).unwrap(),
            b"top level contents"
        );
        assert_eq!(
            fs::read(dest.path().join("sub/a.txt")).unwrap(),
            b"nested contents\n"
        );
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let server = listing_server().await;
        let dest = TempDir::new().unwrap();
        let root = format!("{}/d/", server.uri());

        let first = mirror(&root, &dest).run().await.unwrap();
        let second = mirror(&root, &dest).run().await.unwrap();

        assert_eq!(first.files, 2);
        assert_eq!(second, DownloadSummary::default());
    }

    #[tokio::test]
    async fn follows_redirect_to_listing() {
        let server = listing_server().await;
        mount(
            &server,
            "/d",
            ResponseTemplate::new(301).insert_header("Location", format!("{}/d/", server.uri()).as_str()),
        )
        .await;
        let dest = TempDir::new().unwrap();

        let summary = mirror(&format!("{}/d", server.uri()), &dest)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert!(dest.path().join("file.txt").is_file());
        assert!(dest.path().join("sub/a.txt").is_file());
    }

    #[tokio::test]
    async fn directory_collision_stops_before_downloading() {
        let server = listing_server().await;
        let dest = TempDir::new().unwrap();
        fs::create_dir(dest.path().join("file.txt")).unwrap();

        let result = mirror(&format!("{}/d/", server.uri()), &dest).run().await;

        match result {
            Err(MirrorError::Plan(PlanError::NotAFile(path))) => {
                assert_eq!(path, dest.path().join("file.txt"))
            }
            other => assert!(false, "expected collision, got {:?}", other),
        }
        assert!(!dest.path().join("sub").exists());
    }

    #[tokio::test]
    async fn failing_listing_page_aborts_the_run() {
        let server = MockServer::start().await;
        mount(&server, "/d/", ResponseTemplate::new(200).set_body_string(ROOT_INDEX)).await;
        mount(&server, "/d/sub/", ResponseTemplate::new(500)).await;
        mount(
            &server,
            "/d/file.txt",
            ResponseTemplate::new(200).set_body_bytes(b"unused".to_vec()),
        )
        .await;
        let dest = TempDir::new().unwrap();

        let result = mirror(&format!("{}/d/", server.uri()), &dest).run().await;

        match result {
            Err(MirrorError::Trace(TraceError::Listing { url, source })) => {
                assert_eq!(url, format!("{}/d/sub/", server.uri()));
                assert_eq!(source, FetchError::Status(500));
            }
            other => assert!(false, "expected listing failure, got {:?}", other),
        }
        assert!(!dest.path().join("file.txt").exists());
    }

    #[tokio::test]
    async fn failing_file_download_aborts_the_run() {
        let server = MockServer::start().await;
        mount(&server, "/d/", ResponseTemplate::new(200).set_body_string(ROOT_INDEX)).await;
        mount(&server, "/d/sub/", ResponseTemplate::new(200).set_body_string(SUB_INDEX)).await;
        mount(&server, "/d/file.txt", ResponseTemplate::new(500)).await;
        mount(
            &server,
            "/d/sub/a.TXT",
            ResponseTemplate::new(200).set_body_bytes(b"nested contents\n".to_vec()),
        )
        .await;
        let dest = TempDir::new().unwrap();

        let result = mirror(&format!("{}/d/", server.uri()), &dest).run().await;

        match result {
            Err(MirrorError::Download(DownloadError::Fetch { url, source })) => {
                assert_eq!(url, format!("{}/d/file.txt", server.uri()));
                assert_eq!(source, FetchError::Status(500));
            }
            other => assert!(false, "expected download failure, got {:?}", other),
        }
        assert!(!dest.path().join("file.txt").exists());
        let leftovers = fs::read_dir(dest.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect::<Vec<_>>();
        assert!(leftovers.is_empty(), "temporary files left: {:?}", leftovers);
    }

    #[test]
    fn normalize_root_rejects_bad_urls() {
        assert!(matches!(
            normalize_root("not a url"),
            Err(MirrorError::InvalidRoot { .. })
        ));
        assert!(matches!(
            normalize_root("ftp://example.com/pub/"),
            Err(MirrorError::InvalidRoot { .. })
        ));
        assert_eq!(
            normalize_root("HTTP://Example.COM").unwrap(),
            "http://example.com/"
        );
    }
}

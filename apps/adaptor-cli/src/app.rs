//! Wiring of configuration, feed client and push service

use adaptor_core::{AdaptorConfig, PushItem};
use adaptor_feed::{FeedArchiver, FeedClient, FeedClientConfig, FeedFileMaker, FeedSettings};
use adaptor_push::{
    DocIdSender, ExponentialBackoff, Journal, PushRun, PushScheduler, PushService,
};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::cli::{Args, Command};
use crate::listing::{FileListing, ListingReader};

pub struct App {
    args: Args,
    config: AdaptorConfig,
}

impl App {
    pub fn build(args: Args) -> Result<Self> {
        args.validate().context("Invalid command line arguments")?;

        let config = match &args.config {
            Some(path) => AdaptorConfig::load_from_file(&path.to_string_lossy()),
            None => AdaptorConfig::load(),
        }
        .context("Failed to load configuration")?;

        Ok(Self { args, config })
    }

    pub fn config(&self) -> &AdaptorConfig {
        &self.config
    }

    fn feed_maker(&self) -> Result<FeedFileMaker> {
        let codec = self.config.doc_id_codec().context("Invalid document base URL")?;
        let settings = FeedSettings::from_config(&self.config.feed)?;
        Ok(FeedFileMaker::new(codec, self.config.feed.name.clone(), settings)?)
    }

    fn push_service(&self) -> Result<Arc<PushService>> {
        let client = FeedClient::new(FeedClientConfig::from_config(&self.config))?;
        let mut sender = DocIdSender::new(Arc::new(client), self.feed_maker()?, Arc::new(Journal::new()))
            .with_max_feed_size(self.config.feed.max_urls)
            .with_retry_policy(Arc::new(ExponentialBackoff::for_feeds(&self.config.retry)));
        if let Some(dir) = &self.config.feed.archive_dir {
            sender = sender.with_archiver(Arc::new(FeedArchiver::new(dir)));
        }

        let repository = FileListing::new(&self.args.listing)
            .with_modified(self.args.modified.clone())
            .with_chunk_size(self.config.feed.max_urls);
        let service = PushService::new(Arc::new(repository), sender)
            .with_listing_policy(Arc::new(ExponentialBackoff::for_listing(&self.config.retry)));
        Ok(Arc::new(service))
    }

    pub async fn run(self) -> Result<()> {
        info!(
            feed_url = %self.config.gsa.feed_url(),
            datasource = %self.config.feed.name,
            "Adaptor configured"
        );

        match &self.args.command {
            Command::Render { out } => self.render(out.as_deref()).await,
            Command::PushFull | Command::PushIncremental => {
                let service = self.push_service()?;
                watch_ctrl_c(&service);
                let cancel = service.shutdown_token().child_token();
                let result = if matches!(self.args.command, Command::PushFull) {
                    service.run_full_push(cancel).await
                } else {
                    service.run_incremental_push(cancel).await
                };
                self.print_stats(&service)?;
                match result? {
                    PushRun::Completed(report) => info!(
                        batches = report.batches_sent,
                        items = report.items_sent,
                        "Push complete"
                    ),
                    PushRun::AlreadyRunning => info!("Push already running"),
                }
                Ok(())
            }
            Command::Run => {
                let service = self.push_service()?;
                watch_ctrl_c(&service);
                PushScheduler::from_config(service.clone(), &self.config.schedule)
                    .run(service.shutdown_token())
                    .await;
                self.print_stats(&service)
            }
        }
    }

    async fn render(&self, out: Option<&Path>) -> Result<()> {
        let maker = self.feed_maker()?;
        let mut reader = ListingReader::open(&self.args.listing).await?;

        if let Some(dir) = out {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let mut index = 0;
        loop {
            let doc_ids = reader.next_chunk(self.config.feed.max_urls).await?;
            if doc_ids.is_empty() {
                break;
            }
            index += 1;
            let items: Vec<PushItem> = doc_ids.into_iter().map(PushItem::from).collect();
            let feed = maker.make_feed(&items)?;
            match out {
                Some(dir) => {
                    let path = dir.join(format!("{}-{:04}.xml", feed.datasource, index));
                    tokio::fs::write(&path, feed.xml.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), items = feed.item_count, "Rendered feed");
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(feed.xml.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
            }
        }
        Ok(())
    }

    fn print_stats(&self, service: &PushService) -> Result<()> {
        if self.args.stats {
            let snapshot = service.journal().snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Ok(())
    }
}

fn watch_ctrl_c(service: &PushService) {
    let shutdown = service.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping pushes");
            shutdown.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_config(dir: &Path, port: u16) -> std::path::PathBuf {
        let path = dir.join("adaptor.toml");
        let content = format!(
            "[gsa]\nhostname = \"127.0.0.1\"\nfeed_port = {}\n\n\
             [feed]\nname = \"files\"\nmax_urls = 2\n\n\
             [retry]\nfeed_max_attempts = 1\nlisting_max_attempts = 1\n",
            port
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_push_full_posts_feeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xmlfeed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), server.address().port());
        let listing = dir.path().join("ids.txt");
        std::fs::write(&listing, "1001\n1002\n1003\n").unwrap();

        let args = Args::try_parse_from([
            "adaptor",
            "--config",
            config.to_str().unwrap(),
            "--listing",
            listing.to_str().unwrap(),
            "push-full",
        ])
        .unwrap();
        let app = App::build(args).unwrap();
        assert_eq!(app.config().feed.max_urls, 2);
        app.run().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let first = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(first.contains("<datasource>files</datasource>"));
        assert!(first.contains("http://localhost:5678/doc/1001"));
    }

    #[tokio::test]
    async fn test_push_full_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Error - Unauthorized Request"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), server.address().port());
        let listing = dir.path().join("ids.txt");
        std::fs::write(&listing, "1001\n").unwrap();

        let args = Args::try_parse_from([
            "adaptor",
            "--config",
            config.to_str().unwrap(),
            "--listing",
            listing.to_str().unwrap(),
            "push-full",
        ])
        .unwrap();
        let err = App::build(args).unwrap().run().await.unwrap_err();
        assert!(err.to_string().contains("aborted"), "{}", err);
    }

    #[tokio::test]
    async fn test_render_writes_feed_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), 19900);
        let listing = dir.path().join("ids.txt");
        std::fs::write(&listing, "a\nb\nc\n").unwrap();
        let out = dir.path().join("feeds");

        let args = Args::try_parse_from([
            "adaptor",
            "--config",
            config.to_str().unwrap(),
            "--listing",
            listing.to_str().unwrap(),
            "render",
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap();
        App::build(args).unwrap().run().await.unwrap();

        let first = std::fs::read_to_string(out.join("files-0001.xml")).unwrap();
        let second = std::fs::read_to_string(out.join("files-0002.xml")).unwrap();
        assert!(first.contains("/doc/a\"") && first.contains("/doc/b\""));
        assert!(second.contains("/doc/c\""));
    }
}

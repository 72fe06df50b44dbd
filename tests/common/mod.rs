#![allow(dead_code)]

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use epg_merge::config::{Config, StorageConfig, UpstreamConfig};
use epg_merge::database::Database;
use epg_merge::errors::{SourceError, SourceResult};
use epg_merge::job_scheduling::JobController;
use epg_merge::settings::keys;
use epg_merge::utils::SourceFetcher;

pub const BASE_URL: &str = "http://upstream.test";

/// In-memory upstream that counts every request it receives
#[derive(Default)]
pub struct CountingFetcher {
    files: Mutex<HashMap<String, Vec<u8>>>,
    delay: Mutex<Duration>,
    pub heads: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` for `name` from the 3 day iptv folder
    pub fn serve(&self, name: &str, body: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(format!("{BASE_URL}/3dayiptv/{name}"), body);
    }

    /// Make every download take at least `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.head_count() + self.download_count()
    }

    fn body(&self, url: &str) -> SourceResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Http {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl SourceFetcher for CountingFetcher {
    async fn content_length(&self, url: &str) -> SourceResult<Option<u64>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.body(url)?.len() as u64))
    }

    async fn download_to(&self, url: &str, dest: &Path) -> SourceResult<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let body = self.body(url)?;
        std::fs::write(dest, &body).map_err(|e| SourceError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(body.len() as u64)
    }
}

/// Local HTTP endpoint that answers every POST with 204 and keeps the JSON bodies
pub struct WebhookSink {
    pub url: String,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl WebhookSink {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));

        let bodies = received.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                if let Some(body) = read_request_body(&stream) {
                    if let Ok(value) = serde_json::from_slice(&body) {
                        bodies.lock().unwrap().push(value);
                    }
                }
                let mut stream = stream;
                let _ = stream.write_all(
                    b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });

        Self { url, received }
    }

    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().unwrap().clone()
    }

    /// Wait up to two seconds for `count` deliveries
    pub async fn wait_for(&self, count: usize) -> Vec<serde_json::Value> {
        for _ in 0..100 {
            if self.received.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.received()
    }
}

fn read_request_body(stream: &TcpStream) -> Option<Vec<u8>> {
    let mut reader = BufReader::new(stream);
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok()?;
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(body)
}

pub fn gz(xml: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Minimal XMLTV document. Programmes are `(channel, start, title)`.
pub fn feed(channels: &[&str], programmes: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tv>\n");
    for id in channels {
        xml.push_str(&format!(
            "  <channel id=\"{id}\"><display-name>{id}</display-name></channel>\n"
        ));
    }
    for (channel, start, title) in programmes {
        xml.push_str(&format!(
            "  <programme channel=\"{channel}\" start=\"{start}\"><title>{title}</title></programme>\n"
        ));
    }
    xml.push_str("</tv>\n");
    xml
}

pub fn test_config(root: &Path) -> Config {
    let mut config = Config {
        storage: StorageConfig::rooted_at(root),
        upstream: UpstreamConfig {
            base_url: BASE_URL.to_string(),
            ..UpstreamConfig::default()
        },
        ..Config::default()
    };
    config.jobs.memory_sample_interval = Duration::from_millis(20);
    config.jobs.max_sleep_chunk = Duration::from_millis(100);
    config
}

/// A controller wired to a temp directory, in-memory SQLite and a fake upstream
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub database: Database,
    pub fetcher: Arc<CountingFetcher>,
    pub controller: Arc<JobController>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        config.storage.ensure_directories().unwrap();

        let database = Database::in_memory().await.unwrap();
        let fetcher = CountingFetcher::new();
        let controller = Arc::new(JobController::new(
            &config,
            &database,
            fetcher.clone(),
            reqwest::Client::new(),
        ));

        Self {
            dir,
            config,
            database,
            fetcher,
            controller,
        }
    }

    /// Default channel list plus the settings for a 3 day iptv merge of `sources`
    pub async fn configure(&self, sources: &[&str], channels: &[&str]) {
        let channel_file = serde_json::json!({ "channels": channels });
        std::fs::write(
            self.config.storage.config_dir.join("channels.json"),
            channel_file.to_string(),
        )
        .unwrap();

        self.set(keys::SELECTED_SOURCES, &serde_json::to_string(sources).unwrap())
            .await;
        self.set(keys::MERGE_TIMEFRAME, "3").await;
        self.set(keys::SELECTED_FEED_TYPE, "iptv").await;
    }

    pub async fn set(&self, key: &str, value: &str) {
        self.controller.settings().set(key, value).await.unwrap();
    }
}

//! Client for a ComfyUI-style node-graph execution engine.
//!
//! Jobs are submitted over HTTP; completion is reported over a websocket
//! keyed by a client id generated per [`ExecutionClient`].

pub mod events;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::GenerationError;
use crate::image::EncodedImage;
use crate::workflow::ExecutableJob;

pub use events::{CompletionRouter, CompletionWaiter, EngineEvent, JobOutcome, OutputImage};

/// Response to a queued job.
#[derive(Debug, Clone, Deserialize)]
pub struct QueuedPrompt {
    pub prompt_id: String,
    #[serde(default)]
    pub number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    name: Option<String>,
}

pub struct ExecutionClient {
    http: reqwest::Client,
    /// Always ends with `/` so relative joins keep any path prefix.
    base_url: Url,
    client_id: String,
    router: CompletionRouter,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionClient {
    pub fn new(base_url: &str) -> Result<Self, GenerationError> {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, GenerationError> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            GenerationError::InvalidConfig(format!("invalid engine URL '{}': {}", base_url, e))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            client_id: uuid::Uuid::new_v4().to_string(),
            router: CompletionRouter::new(),
            reader: Mutex::new(None),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn router(&self) -> &CompletionRouter {
        &self.router
    }

    fn endpoint(&self, path: &str) -> Result<Url, GenerationError> {
        self.base_url.join(path).map_err(|e| {
            GenerationError::InvalidConfig(format!("cannot build engine URL for '{}': {}", path, e))
        })
    }

    /// `ws://` (or `wss://` for https) `.../ws?clientId=<id>`
    pub fn ws_url(&self) -> Result<Url, GenerationError> {
        let mut url = self.endpoint("ws")?;
        let scheme = if self.base_url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|_| {
            GenerationError::InvalidConfig(format!("cannot derive websocket URL from {}", self.base_url))
        })?;
        url.query_pairs_mut().append_pair("clientId", &self.client_id);
        Ok(url)
    }

    pub async fn is_connected(&self) -> bool {
        self.reader
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Open the event socket. A no-op while a connection is live; resolves
    /// only once the handshake has completed.
    pub async fn connect(&self) -> Result<(), GenerationError> {
        let mut reader = self.reader.lock().await;
        if reader.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let url = self.ws_url()?;
        let (mut stream, _) = connect_async(url.as_str()).await?;
        log::info!("Connected to execution engine at {}", url);
        self.router.reopen();

        let router = self.router.clone();
        *reader = Some(tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => router.dispatch_text(&text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("Execution engine socket error: {}", e);
                        break;
                    }
                }
            }
            router.fail_all("execution engine connection closed");
        }));
        Ok(())
    }

    /// Upload a source image; returns the name the engine stored it under.
    pub async fn upload_image(&self, image: &EncodedImage) -> Result<String, GenerationError> {
        let bytes = image.decode()?;
        let filename = format!(
            "upload_{}.{}",
            chrono::Utc::now().timestamp_millis(),
            image.extension()
        );
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(&image.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .http
            .post(self.endpoint("upload/image")?)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let uploaded: UploadResponse = response.json().await?;
        let name = uploaded.name.unwrap_or(filename);
        log::debug!("Uploaded source image as {}", name);
        Ok(name)
    }

    /// Submit a job, connecting first if needed.
    pub async fn queue_prompt(&self, job: &ExecutableJob) -> Result<QueuedPrompt, GenerationError> {
        self.connect().await?;

        let payload = json!({
            "prompt": job,
            "client_id": self.client_id,
        });
        let response = self
            .http
            .post(self.endpoint("prompt")?)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let queued: QueuedPrompt = response.json().await?;
        log::info!("Queued job {}", queued.prompt_id);
        Ok(queued)
    }

    /// Wait for `job_id` to finish and return the URL of its first image.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        timeout: Option<Duration>,
    ) -> Result<Url, GenerationError> {
        let outcome = self.router.register(job_id).wait(timeout).await?;
        let images = match outcome {
            JobOutcome::Images(images) => images,
            JobOutcome::Finished => self.history_images(job_id).await?,
            JobOutcome::Failed(message) => return Err(GenerationError::ExecutionError(message)),
        };
        let first = images
            .first()
            .ok_or_else(|| GenerationError::NoImageData(format!("job {}", job_id)))?;
        self.view_url(first)
    }

    /// Output images recorded in the engine's history for `job_id`.
    pub async fn history_images(&self, job_id: &str) -> Result<Vec<OutputImage>, GenerationError> {
        let response = self
            .http
            .get(self.endpoint(&format!("history/{}", job_id))?)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let history: Value = response.json().await?;
        Ok(images_from_history(&history, job_id))
    }

    /// `/view?filename=..&subfolder=..&type=..`
    pub fn view_url(&self, image: &OutputImage) -> Result<Url, GenerationError> {
        let mut url = self.endpoint("view")?;
        url.query_pairs_mut()
            .append_pair("filename", &image.filename)
            .append_pair("subfolder", &image.subfolder)
            .append_pair("type", &image.folder_type);
        Ok(url)
    }

    pub async fn download_image_as_base64(&self, url: &Url) -> Result<EncodedImage, GenerationError> {
        let response = self.http.get(url.clone()).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await?;
        Ok(EncodedImage::from_bytes(mime, &bytes))
    }

    /// Queue, wait, download.
    pub async fn run_job(
        &self,
        job: &ExecutableJob,
        timeout: Option<Duration>,
    ) -> Result<EncodedImage, GenerationError> {
        let queued = self.queue_prompt(job).await?;
        let url = self.wait_for_completion(&queued.prompt_id, timeout).await?;
        self.download_image_as_base64(&url).await
    }
}

impl Drop for ExecutionClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

fn images_from_history(history: &Value, job_id: &str) -> Vec<OutputImage> {
    let Some(outputs) = history
        .get(job_id)
        .and_then(|entry| entry.get("outputs"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    outputs
        .values()
        .filter_map(|output| output.get("images").cloned())
        .filter_map(|images| serde_json::from_value::<Vec<OutputImage>>(images).ok())
        .flatten()
        .collect()
}

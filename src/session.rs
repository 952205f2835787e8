//! Client-side state controller: upload, submit, download, reset.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use url::Url;

use crate::error::SessionError;
use crate::utils::{data_uri_payload, decode_data_uri, detect_mime, download_name, to_data_uri};
use crate::wire::{GenerateParams, RemovalResult};

pub const UPLOAD_FIRST: &str = "Please upload an image first.";
pub const DESCRIBE_TARGET: &str = "Please describe what you want to remove.";
pub const READ_FAILED: &str = "Failed to read the selected file.";
pub const NO_IMAGE: &str = "The AI could not process the image. Please try another one.";
pub const PROXY_FAILED: &str = "An error occurred while processing the image.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppState {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

/// The uploaded image, kept as a data URI until replaced or reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub mime_type: String,
    pub data_uri: String,
}

/// Transport from the session to the proxy endpoint.
#[async_trait]
pub trait ProxyClient: Send + Sync {
    async fn generate(&self, params: &GenerateParams) -> Result<RemovalResult, SessionError>;
}

pub struct HttpProxyClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpProxyClient {
    pub fn new(proxy_base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: proxy_base.join("api/generate")?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ProxyClient for HttpProxyClient {
    async fn generate(&self, params: &GenerateParams) -> Result<RemovalResult, SessionError> {
        let transport = |err: reqwest::Error| SessionError::Transport(err.to_string());

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(params)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<RemovalResult>()
                .await
                .ok()
                .and_then(|body| body.text)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| PROXY_FAILED.to_string());
            warn!("Proxy answered {}: {}", status, message);
            return Err(SessionError::Transport(message));
        }

        response.json().await.map_err(transport)
    }
}

pub struct Session<P> {
    proxy: P,
    state: AppState,
    file: Option<FileInfo>,
    processed_image: Option<String>,
    prompt: String,
    error: Option<String>,
}

impl<P: ProxyClient> Session<P> {
    pub fn new(proxy: P) -> Self {
        Self {
            proxy,
            state: AppState::Idle,
            file: None,
            processed_image: None,
            prompt: String::new(),
            error: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    /// Result as a data URI, present only in [`AppState::Success`].
    pub fn processed_image(&self) -> Option<&str> {
        self.processed_image.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }

    pub async fn upload(&mut self, path: &Path) -> Result<&FileInfo, SessionError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to read {}: {}", path.display(), err);
                return Err(self.fail(SessionError::FileRead(READ_FAILED.to_string())));
            }
        };

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = detect_mime(path, &bytes);
        Ok(self.load(name, mime_type, &bytes))
    }

    /// Replaces the current image and clears any previous prompt, result or error.
    pub fn load(
        &mut self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> &FileInfo {
        let mime_type = mime_type.into();
        let data_uri = to_data_uri(&mime_type, bytes);
        self.processed_image = None;
        self.prompt.clear();
        self.error = None;
        self.state = AppState::Idle;
        self.file.insert(FileInfo {
            name: name.into(),
            mime_type,
            data_uri,
        })
    }

    /// Ignored while a request is in flight.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        if self.state == AppState::Processing {
            return;
        }
        self.prompt = prompt.into();
    }

    /// Sends the loaded image and prompt to the proxy. Returns the result data URI.
    pub async fn submit(&mut self) -> Result<&str, SessionError> {
        let (name, mime_type, payload) = match self.file.as_ref() {
            Some(file) => (
                file.name.clone(),
                file.mime_type.clone(),
                data_uri_payload(&file.data_uri).unwrap_or_default().to_string(),
            ),
            None => return Err(self.fail(SessionError::Validation(UPLOAD_FIRST.to_string()))),
        };
        if self.prompt.trim().is_empty() {
            return Err(self.fail(SessionError::Validation(DESCRIBE_TARGET.to_string())));
        }

        let params = GenerateParams::new(payload, mime_type.clone(), self.prompt.clone());

        self.state = AppState::Processing;
        self.error = None;
        self.processed_image = None;
        info!("Submitting {} for removal", name);

        match self.proxy.generate(&params).await {
            Ok(RemovalResult {
                image: Some(image), ..
            }) if !image.is_empty() => {
                self.state = AppState::Success;
                self.error = None;
                Ok(self
                    .processed_image
                    .insert(format!("data:{};base64,{}", mime_type, image))
                    .as_str())
            }
            Ok(RemovalResult { text, .. }) => {
                let message = text
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| NO_IMAGE.to_string());
                Err(self.fail(SessionError::NoImage(message)))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Writes the result into `dir` under the derived name. No-op without a result.
    pub async fn download(&self, dir: &Path) -> std::io::Result<Option<PathBuf>> {
        let (Some(image), Some(file)) = (self.processed_image.as_deref(), self.file.as_ref())
        else {
            debug!("Nothing to download");
            return Ok(None);
        };

        let bytes = decode_data_uri(image)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let target = dir.join(download_name(&file.name));
        tokio::fs::write(&target, bytes).await?;
        info!("Saved {}", target.display());
        Ok(Some(target))
    }

    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.file = None;
        self.processed_image = None;
        self.prompt.clear();
        self.error = None;
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        warn!("{}", err);
        self.error = Some(err.to_string());
        self.state = AppState::Error;
        err
    }
}

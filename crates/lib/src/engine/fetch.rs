//! HTTP access for engine downloads.
//!
//! Automatic redirects are disabled on the client; [`HttpFetcher::get`]
//! follows exactly one redirect hop by hand and rejects a second one.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::ProvisionError;
use crate::consts::APP_NAME;

/// One entry of the engine metadata listing.
///
/// Listings in the wild carry the link under different keys, sometimes
/// several at once and sometimes as `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DownloadEntry {
  pub name: Option<String>,
  pub download_url: Option<String>,
  pub browser_download_url: Option<String>,
  pub html_url: Option<String>,
}

impl DownloadEntry {
  /// The first link present, preferring direct download links.
  pub fn url(&self) -> Option<&str> {
    self
      .download_url
      .as_deref()
      .or(self.browser_download_url.as_deref())
      .or(self.html_url.as_deref())
  }
}

/// Blocking HTTP client used to locate and download engine scripts.
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, ProvisionError> {
    let client = Client::builder()
      .redirect(Policy::none())
      .timeout(timeout)
      .user_agent(format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(ProvisionError::Client)?;
    Ok(Self { client })
  }

  /// GET `url`, following at most one redirect.
  ///
  /// The first response is dropped (closing its connection) before the
  /// redirect target is requested.
  pub fn get(&self, url: &str) -> Result<Response, ProvisionError> {
    let response = self.send(url)?;
    if !is_followed_redirect(response.status()) {
      return ensure_success(url, response);
    }

    let target = redirect_target(url, &response)?;
    drop(response);
    debug!(from = %url, to = %target, "following redirect");

    let response = self.send(target.as_str())?;
    if is_followed_redirect(response.status()) {
      return Err(ProvisionError::TooManyRedirects { url: target.to_string() });
    }
    ensure_success(target.as_str(), response)
  }

  /// Look up the download URL for `engine` in a metadata listing.
  pub fn lookup(&self, metadata_url: &str, engine: &str) -> Result<String, ProvisionError> {
    debug!(url = %metadata_url, engine, "looking up engine metadata");
    let response = self.get(metadata_url)?;
    let entries: Vec<DownloadEntry> = response.json().map_err(|source| ProvisionError::Metadata {
      url: metadata_url.to_string(),
      source,
    })?;

    entries
      .into_iter()
      .filter(|entry| entry.name.as_deref() == Some(engine))
      .find_map(|entry| entry.url().map(str::to_string))
      .ok_or_else(|| ProvisionError::NotListed {
        engine: engine.to_string(),
        url: metadata_url.to_string(),
      })
  }

  /// Stream the body at `url` into `dest`.
  ///
  /// The body lands in a temporary file beside `dest` and is renamed into
  /// place once complete, so `dest` is never observed half-written.
  /// Returns the number of bytes written.
  pub fn download_to(&self, url: &str, dest: &Path) -> Result<u64, ProvisionError> {
    info!(url = %url, "fetching engine script");
    let mut response = self.get(url)?;

    let dir = dest.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| ProvisionError::Io {
      path: dir.to_path_buf(),
      source,
    })?;

    let size = response.copy_to(&mut tmp).map_err(|source| ProvisionError::Request {
      url: url.to_string(),
      source,
    })?;
    if size == 0 {
      return Err(ProvisionError::EmptyDownload { url: url.to_string() });
    }

    tmp.flush().map_err(|source| ProvisionError::Io {
      path: tmp.path().to_path_buf(),
      source,
    })?;
    tmp.persist(dest).map_err(|e| ProvisionError::Io {
      path: dest.to_path_buf(),
      source: e.error,
    })?;

    info!(path = %dest.display(), size, "engine script cached");
    Ok(size)
  }

  fn send(&self, url: &str) -> Result<Response, ProvisionError> {
    self.client.get(url).send().map_err(|source| ProvisionError::Request {
      url: url.to_string(),
      source,
    })
  }
}

fn is_followed_redirect(status: StatusCode) -> bool {
  matches!(
    status,
    StatusCode::MOVED_PERMANENTLY
      | StatusCode::FOUND
      | StatusCode::SEE_OTHER
      | StatusCode::TEMPORARY_REDIRECT
      | StatusCode::PERMANENT_REDIRECT
  )
}

fn ensure_success(url: &str, response: Response) -> Result<Response, ProvisionError> {
  if response.status().is_success() {
    Ok(response)
  } else {
    Err(ProvisionError::Status {
      url: url.to_string(),
      status: response.status().as_u16(),
    })
  }
}

/// Resolve the `Location` header of a redirect against the request URL.
fn redirect_target(url: &str, response: &Response) -> Result<Url, ProvisionError> {
  let invalid = |message: String| ProvisionError::InvalidRedirect {
    url: url.to_string(),
    message,
  };

  let location = response
    .headers()
    .get(LOCATION)
    .ok_or_else(|| invalid("missing Location header".to_string()))?
    .to_str()
    .map_err(|e| invalid(e.to_string()))?;

  let base = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
  base.join(location).map_err(|e| invalid(e.to_string()))
}

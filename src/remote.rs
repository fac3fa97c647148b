//! Reference tables published at a URL.
//!
//! The table is small enough to hold in memory, so the body is fetched with
//! curl straight into a buffer and gunzipped when it carries the gzip magic.

use std::io::Read;

use anyhow::{Context, Result, bail};
use curl::easy::Easy;
use flate2::read::MultiGzDecoder;
use url::Url;

use crate::reference::{ReferenceError, ReferenceTable};

/// Downloads larger than this are aborted.
pub const MAX_REFERENCE_BYTES: usize = 256 * 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A fetched reference document, decoded to text.
#[derive(Debug, Clone)]
pub struct RemoteReference {
    url: Url,
    body: String,
}

impl RemoteReference {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_table(self) -> Result<ReferenceTable, ReferenceError> {
        ReferenceTable::from_json_str(&self.body)
    }
}

/// Parse `raw` as a URL when it looks like one (`scheme://...`).
pub fn parse_url(raw: &str) -> Option<Url> {
    if !raw.contains("://") {
        return None;
    }
    Url::parse(raw).ok()
}

pub fn fetch_reference(url: &Url) -> Result<RemoteReference> {
    tracing::info!(source = %url, "fetching reference table");
    let bytes = download(url, MAX_REFERENCE_BYTES)
        .with_context(|| format!("failed to download {url}"))?;
    let compressed = bytes.len();
    let body = decode(bytes).with_context(|| format!("failed to decode {url}"))?;
    tracing::debug!(compressed, decoded = body.len(), "reference download complete");
    Ok(RemoteReference {
        url: url.clone(),
        body,
    })
}

fn download(url: &Url, limit: usize) -> Result<Vec<u8>> {
    let mut easy = Easy::new();
    easy.url(url.as_str())?;
    easy.follow_location(true)?;
    easy.fail_on_error(true)?;

    let mut buffer = Vec::new();
    let mut too_large = false;
    let outcome = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if buffer.len() + data.len() > limit {
                too_large = true;
                // Short write makes curl abort the transfer.
                return Ok(0);
            }
            buffer.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if too_large {
        bail!("reference exceeds {limit} bytes");
    }
    outcome?;
    Ok(buffer)
}

fn decode(bytes: Vec<u8>) -> Result<String> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return String::from_utf8(bytes).context("reference is not valid UTF-8");
    }
    let mut text = String::new();
    MultiGzDecoder::new(bytes.as_slice())
        .read_to_string(&mut text)
        .context("failed to gunzip reference")?;
    Ok(text)
}

//! Job specifications for the client
// (c) 2024 Ross Younger

use std::{path::PathBuf, str::FromStr};

use anyhow::Context as _;

use super::Parameters;

/// A file destination specified by the user, in the form `HOST:NAME`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSpec {
    /// Hostname or IP address. If not present, this is only a filename.
    pub host: Option<String>,
    /// Filename
    pub filename: String,
}

impl FromStr for FileSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, filename) = if let Some(rest) = s.strip_prefix('[') {
            // Assume raw IPv6 address [1:2:3::4]:File
            match rest.split_once("]:") {
                Some((host, filename)) => (Some(host), filename),
                None => (None, s),
            }
        } else {
            // Host:File or raw IPv4 address 1.2.3.4:File; or just a filename
            match s.split_once(':') {
                Some((host, filename)) => (Some(host), filename),
                None => (None, s),
            }
        };
        Ok(Self {
            host: host.map(str::to_owned),
            filename: filename.to_owned(),
        })
    }
}

impl std::fmt::Display for FileSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.host {
            Some(host) if host.contains(':') => write!(f, "[{host}]:{}", self.filename),
            Some(host) => write!(f, "{host}:{}", self.filename),
            None => write!(f, "{}", self.filename),
        }
    }
}

/// Details of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    /// Local file to send
    pub source: PathBuf,
    /// Server to send it to
    pub host: String,
    /// Name to store it under on the server
    pub remote_name: String,
}

impl TryFrom<&Parameters> for UploadJob {
    type Error = anyhow::Error;

    fn try_from(params: &Parameters) -> anyhow::Result<Self> {
        let (Some(source), Some(destination)) = (&params.source, &params.destination) else {
            anyhow::bail!("both a source file and a destination (HOST:NAME) are required");
        };
        let Some(host) = &destination.host else {
            anyhow::bail!("destination {destination} must be of the form HOST:NAME");
        };
        // Like scp, an empty destination name means "same name as the source".
        let remote_name = if destination.filename.is_empty() {
            source
                .file_name()
                .with_context(|| format!("cannot determine a file name from {}", source.display()))?
                .to_string_lossy()
                .into_owned()
        } else {
            destination.filename.clone()
        };
        Ok(Self {
            source: source.clone(),
            host: host.clone(),
            remote_name,
        })
    }
}

//! Remote fetch and the local checkpoint cache.

use log::{debug, info, warn};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::error::{LoadError, Result};
use crate::utils::{ProgressTracker, fnv1a64, sanitize_component};

/// Downloads a remote file to a local path.
pub trait Fetcher {
    /// Writes the body of `url` to `destination`, returning the number of bytes written.
    fn fetch(&self, url: &str, destination: &Path) -> io::Result<u64>;
}

/// Plain blocking HTTPS GET.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl HttpFetcher {
    const CHUNK_SIZE: usize = 1 << 16;
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> io::Result<u64> {
        let response = ureq::get(url).call().map_err(|err| io::Error::other(err.to_string()))?;

        let total = response.header("Content-Length").and_then(|value| value.parse::<usize>().ok());
        let progress = total.map(|total| ProgressTracker::new(total, "Downloading"));

        let mut reader = response.into_reader();
        let mut writer = BufWriter::new(File::create(destination)?);
        let mut buffer = vec![0u8; Self::CHUNK_SIZE];
        let mut written = 0usize;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            writer.write_all(&buffer[..read])?;
            written += read;

            if let Some(progress) = progress.as_ref() {
                progress.set_current(written, Some(url));
            }
        }

        writer.flush()?;
        Ok(written as u64)
    }
}

/// Directory of downloaded files keyed by model name and URL.
#[derive(Debug)]
pub struct WeightCache<F: Fetcher> {
    root: PathBuf,
    fetcher: F,
    offline: bool,
}

impl<F: Fetcher> WeightCache<F> {
    pub fn new(root: PathBuf, fetcher: F, offline: bool) -> Self {
        Self { root, fetcher, offline }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Location of the cached copy of `url` for `model_name`.
    ///
    /// The file name carries a hash of the full URL, so a changed URL never
    /// reuses a stale download.
    pub fn cached_path(&self, model_name: &str, url: &str) -> PathBuf {
        let file_name = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .unwrap_or("download");

        self.root
            .join(sanitize_component(model_name))
            .join(format!("{:016x}-{}", fnv1a64(url), sanitize_component(file_name)))
    }

    /// Returns the cached file, downloading it first on a cache miss.
    pub fn get_or_fetch(&self, model_name: &str, url: &str) -> Result<PathBuf> {
        let path = self.cached_path(model_name, url);
        if path.is_file() {
            debug!("Cache hit for {model_name}: {}", path.display());
            return Ok(path);
        }

        if self.offline {
            return Err(LoadError::Download {
                url: url.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "offline mode and no cached copy"),
            });
        }

        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|source| LoadError::Cache { path: parent.to_path_buf(), source })?;

        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        info!("⬇️  Fetching {url}");
        let bytes = match self.fetcher.fetch(url, &partial) {
            Ok(bytes) => bytes,
            Err(source) => {
                if let Err(err) = fs::remove_file(&partial) {
                    if err.kind() != io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {}: {err}", partial.display());
                    }
                }
                return Err(LoadError::Download { url: url.to_string(), source });
            }
        };

        fs::rename(&partial, &path).map_err(|source| LoadError::Cache { path: path.clone(), source })?;
        info!("💾 Cached {bytes} bytes at {}", path.display());

        Ok(path)
    }
}

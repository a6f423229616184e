use anyhow::{Context, Result};
use std::fs::File;
use std::path::PathBuf;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

use super::{TargetBase, TargetProvider};
use crate::config::{ConnectionString, TargetConfig};
use crate::error::ProviderError;
use crate::managers::run_log::Logger;

const DEFAULT_PORT: u16 = 21;

/// Where to connect and which directory holds the buckets
#[derive(Debug, Clone, PartialEq, Eq)]
struct FtpLocation {
    host: String,
    port: u16,
    base_dir: String,
}

impl FtpLocation {
    /// `host` may carry a scheme, port and path (`ftp://nas:2121/backups`);
    /// `path` is appended below it
    fn parse(host: &str, path: Option<&str>) -> Self {
        let without_scheme = host
            .trim()
            .strip_prefix("ftp://")
            .unwrap_or_else(|| host.trim());

        let (authority, host_path) = match without_scheme.split_once('/') {
            Some((authority, rest)) => (authority, rest),
            None => (without_scheme, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((h, p)) => match p.parse() {
                Ok(port) => (h, port),
                Err(_) => (authority, DEFAULT_PORT),
            },
            None => (authority, DEFAULT_PORT),
        };

        let segments: Vec<&str> = host_path
            .split('/')
            .chain(path.unwrap_or_default().split('/'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: host.to_string(),
            port,
            base_dir: format!("/{}", segments.join("/")),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> String {
        if self.base_dir == "/" {
            format!("/{}", bucket)
        } else {
            format!("{}/{}", self.base_dir, bucket)
        }
    }
}

/// FTP server; buckets are directories below the configured path
pub struct FtpTarget {
    base: TargetBase,
    location: FtpLocation,
    user: Option<String>,
    password: Option<String>,
    stream: Option<FtpStream>,
}

impl FtpTarget {
    pub fn new(config: &TargetConfig, logger: &Logger) -> Result<Self, ProviderError> {
        let base = TargetBase::new(config, logger)?;
        let connection = ConnectionString::parse(&config.target);

        let host = connection.get("host").ok_or_else(|| ProviderError::MissingSetting {
            name: config.name.clone(),
            key: "host".to_string(),
        })?;

        Ok(Self {
            base,
            location: FtpLocation::parse(host, connection.get("path")),
            user: connection.get("user").map(str::to_string),
            password: connection.get("password").map(str::to_string),
            stream: None,
        })
    }

    fn connect(&mut self) -> Result<&mut FtpStream> {
        if self.stream.is_none() {
            let address = (self.location.host.as_str(), self.location.port);
            let mut stream = FtpStream::connect(address)
                .with_context(|| format!("Could not connect to {}:{}", address.0, address.1))?;

            let user = self.user.as_deref().unwrap_or("anonymous");
            let password = self.password.as_deref().unwrap_or("");
            stream
                .login(user, password)
                .with_context(|| format!("Login as {} failed", user))?;
            stream.transfer_type(FileType::Binary)?;

            self.stream = Some(stream);
        }

        self.stream
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("FTP connection unavailable"))
    }

    /// Create every directory along `dir`. Servers answer 550 for one that
    /// already exists; any other refusal is logged and the upload still tried.
    fn ensure_dir(&mut self, dir: &str) -> Result<()> {
        let base = self.base.clone();
        let stream = self.connect()?;
        let mut current = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            if let Err(e) = stream.mkdir(&current) {
                if !is_file_unavailable(&e) {
                    base.verbose(format!("Could not create {}: {}", current, e));
                }
            }
        }
        Ok(())
    }
}

fn is_file_unavailable(error: &FtpError) -> bool {
    matches!(error, FtpError::UnexpectedResponse(r) if r.status == Status::FileUnavailable)
}

fn last_component(entry: &str) -> &str {
    entry.trim_end_matches('/').rsplit('/').next().unwrap_or(entry)
}

impl TargetProvider for FtpTarget {
    fn save(&mut self, bucket: &str, files: &[PathBuf]) -> Vec<PathBuf> {
        let dir = self.location.bucket_dir(bucket);
        if let Err(e) = self.ensure_dir(&dir) {
            self.base.error(format!("Could not open {}: {:#}", dir, e));
            return Vec::new();
        }

        let base = self.base.clone();
        base.save_each(bucket, files, |file, name| {
            let mut input = File::open(file)?;
            let stream = self.connect()?;
            stream.put_file(format!("{}/{}", dir, name), &mut input)?;
            Ok(())
        })
    }

    fn delete_bucket(&mut self, bucket: &str) -> Result<()> {
        let dir = self.location.bucket_dir(bucket);
        let base = self.base.clone();
        let stream = self.connect()?;

        let entries = match stream.nlst(Some(dir.as_str())) {
            Ok(entries) => entries,
            Err(e) => {
                base.verbose(format!("Nothing to delete at {}: {}", dir, e));
                return Ok(());
            }
        };

        // Buckets only ever hold files written by save
        for entry in &entries {
            let name = last_component(entry);
            if name.is_empty() || name == "." || name == ".." {
                continue;
            }
            if let Err(e) = stream.rm(format!("{}/{}", dir, name)) {
                base.error(format!("Could not delete {}/{}: {}", dir, name, e));
            }
        }

        match stream.rmdir(&dir) {
            Ok(()) => base.info(format!("Deleted {}", bucket)),
            Err(e) => base.error(format!("Could not delete directory {}: {}", dir, e)),
        }

        Ok(())
    }

    fn list_buckets(&mut self) -> Result<Vec<String>> {
        let base_dir = self.location.base_dir.clone();
        let stream = self.connect()?;

        let entries = match stream.nlst(Some(base_dir.as_str())) {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut buckets: Vec<String> = entries
            .iter()
            .map(|e| last_component(e).to_string())
            .filter(|n| !n.is_empty() && n != "." && n != "..")
            .collect();
        buckets.sort();
        buckets.dedup();

        Ok(buckets)
    }

    fn dispose(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.quit() {
                self.base.verbose(format!("FTP quit failed: {}", e));
            }
        }
    }
}

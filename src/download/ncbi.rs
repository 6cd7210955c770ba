use crate::config::FetchConfig;
use crate::download::rate_limit::{FetchPermit, RateLimiter};
use crate::error::{ImportError, ImportResult};
use crate::processing::chunker::RawFormat;
use crate::processing::normalizer::decode_line;
use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use std::io::{BufRead, BufReader, Read, Split};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fetches sequence text for accession ids from an E-utilities style endpoint.
///
/// Only one fetch runs at a time across every clone sharing the same
/// [`RateLimiter`], and consecutive fetches are spaced by its minimum interval.
pub struct NcbiFetcher {
    client: Client,
    base_url: Url,
    db: String,
    retmode: String,
    rettype: String,
    max_redirects: usize,
    limiter: Arc<RateLimiter>,
}

impl NcbiFetcher {
    /// Fetcher with its own limiter built from `config`
    pub fn from_config(config: &FetchConfig) -> ImportResult<Self> {
        Self::new(config, RateLimiter::new(config.min_interval()))
    }

    pub fn new(config: &FetchConfig, limiter: Arc<RateLimiter>) -> ImportResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ImportError::Configuration(format!("Invalid fetch base url '{}': {}", config.base_url, e))
        })?;

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(60))
            // Redirects are followed by hand so each hop is logged and bounded
            .redirect(reqwest::redirect::Policy::none());

        if let Some(ca_path) = &config.tls.ca_certificate {
            let pem = std::fs::read(ca_path).map_err(|e| {
                ImportError::Configuration(format!(
                    "Cannot read CA certificate {}: {}",
                    ca_path.display(),
                    e
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                ImportError::Configuration(format!("Invalid CA certificate {}: {}", ca_path.display(), e))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        if config.tls.accept_invalid_certs {
            tracing::warn!(
                "TLS certificate and hostname verification disabled for {}",
                base_url
            );
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let client = builder
            .build()
            .map_err(|e| ImportError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            db: config.db.clone(),
            retmode: config.retmode.clone(),
            rettype: config.rettype.clone(),
            max_redirects: config.max_redirects,
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Layout of the returned text, derived from `rettype`
    pub fn raw_format(&self) -> RawFormat {
        if self.rettype.eq_ignore_ascii_case("fasta") {
            RawFormat::Fasta
        } else {
            RawFormat::Plain
        }
    }

    /// `{base}?db=..&id=..&retmode=..&rettype=..`
    pub fn request_url(&self, accession: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("db", &self.db)
            .append_pair("id", accession)
            .append_pair("retmode", &self.retmode)
            .append_pair("rettype", &self.rettype);
        url
    }

    /// Start fetching `accession` and return its lines as they arrive.
    ///
    /// Blocks until no other fetch is in flight and the minimum interval has
    /// passed. The returned [`FetchedLines`] keeps the token until it is
    /// closed or dropped.
    pub fn fetch(&self, accession: &str) -> ImportResult<FetchedLines> {
        let permit = self.limiter.acquire();
        let url = self.request_url(accession);
        // On error the permit drops here: token released, timestamp unchanged
        let response = self.get_resource(url)?;
        Ok(FetchedLines::new(Box::new(response), permit, accession))
    }

    fn get_resource(&self, mut url: Url) -> ImportResult<Response> {
        for _ in 0..=self.max_redirects {
            tracing::info!("Start get resource from {}.", url);
            let response = self.client.get(url.clone()).send().map_err(|e| {
                tracing::error!("Get resource failed: {}.", e);
                ImportError::from(e)
            })?;
            let status = response.status();

            if status.is_success() {
                tracing::info!("Connection open, start download");
                return Ok(response);
            }

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| ImportError::Transport {
                        status: Some(status.as_u16()),
                        message: format!("Redirect from {} without Location header", url),
                    })?;
                let next = url.join(location).map_err(|e| ImportError::Transport {
                    status: Some(status.as_u16()),
                    message: format!("Invalid redirect target '{}': {}", location, e),
                })?;
                tracing::warn!("Resource moved to {}.", next);
                url = next;
                continue;
            }

            tracing::error!(
                "Get resource failed: {} ({}).",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            );
            return Err(ImportError::Transport {
                status: Some(status.as_u16()),
                message: format!("Get resource from url {} failed", url),
            });
        }

        Err(ImportError::transport(format!(
            "Too many redirects (more than {})",
            self.max_redirects
        )))
    }
}

/// Lines of a fetch response, read lazily from the open connection.
///
/// Closing, explicitly or by drop, runs once and in this order: close the
/// connection, record the fetch as successful, release the token.
pub struct FetchedLines {
    lines: Option<Split<BufReader<Box<dyn Read + Send>>>>,
    permit: Option<FetchPermit>,
    accession: String,
}

impl FetchedLines {
    pub(crate) fn new(body: Box<dyn Read + Send>, permit: FetchPermit, accession: &str) -> Self {
        Self {
            lines: Some(BufReader::new(body).split(b'\n')),
            permit: Some(permit),
            accession: accession.to_string(),
        }
    }

    pub fn accession(&self) -> &str {
        &self.accession
    }

    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(lines) = self.lines.take() {
            let closed = panic::catch_unwind(AssertUnwindSafe(move || drop(lines)));
            if closed.is_err() {
                tracing::warn!("can't close connection for accession {}", self.accession);
            }
        }
        if let Some(permit) = self.permit.take() {
            permit.complete();
        }
    }
}

impl Iterator for FetchedLines {
    type Item = ImportResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        Some(lines.next()?.map(decode_line).map_err(|e| {
            ImportError::transport(format!(
                "Reading response for {} failed: {}",
                self.accession, e
            ))
        }))
    }
}

impl Drop for FetchedLines {
    fn drop(&mut self) {
        self.close_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::rate_limit::ManualClock;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn limiter() -> Arc<RateLimiter> {
        RateLimiter::with_clock(Duration::from_millis(100), Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_request_url_format() {
        let config = FetchConfig {
            base_url: "https://example.org/efetch.fcgi".to_string(),
            ..FetchConfig::default()
        };
        let fetcher = NcbiFetcher::new(&config, limiter()).unwrap();
        assert_eq!(
            fetcher.request_url("NC_001416.1").as_str(),
            "https://example.org/efetch.fcgi?db=nuccore&id=NC_001416.1&retmode=text&rettype=fasta"
        );
        // Ids are encoded, not spliced
        assert!(fetcher.request_url("a&b").as_str().contains("id=a%26b"));
    }

    #[test]
    fn test_drop_after_partial_read_stamps_and_releases() {
        let limiter = limiter();
        let permit = limiter.acquire();
        let body: Box<dyn Read + Send> = Box::new(Cursor::new(b">x\nACGT\nGGCC\n".to_vec()));
        let mut lines = FetchedLines::new(body, permit, "X1");

        assert_eq!(lines.next().unwrap().unwrap(), ">x");
        assert!(limiter.last_success().is_none());
        drop(lines);

        assert!(limiter.last_success().is_some());
        // Token is free again
        drop(limiter.acquire());
    }

    #[test]
    fn test_close_after_exhaustion() {
        let limiter = limiter();
        let permit = limiter.acquire();
        let body: Box<dyn Read + Send> = Box::new(Cursor::new(b"ACGT".to_vec()));
        let mut lines = FetchedLines::new(body, permit, "X2");
        assert_eq!(lines.by_ref().collect::<ImportResult<Vec<_>>>().unwrap(), vec!["ACGT"]);
        lines.close();
        assert!(limiter.last_success().is_some());
    }

    /// Body whose connection teardown fails
    struct PanicOnClose(Cursor<Vec<u8>>);

    impl Read for PanicOnClose {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Drop for PanicOnClose {
        fn drop(&mut self) {
            panic!("connection reset while closing");
        }
    }

    #[test]
    fn test_failed_close_still_stamps_and_releases() {
        let limiter = limiter();
        let permit = limiter.acquire();
        let body: Box<dyn Read + Send> = Box::new(PanicOnClose(Cursor::new(b"ACGT\n".to_vec())));
        let mut lines = FetchedLines::new(body, permit, "X3");

        assert_eq!(lines.next().unwrap().unwrap(), "ACGT");
        lines.close();

        assert!(limiter.last_success().is_some());
        limiter.acquire().complete();
    }

    #[test]
    fn test_invalid_utf8_in_response_is_not_an_error() {
        let limiter = limiter();
        let permit = limiter.acquire();
        let body: Box<dyn Read + Send> =
            Box::new(Cursor::new(b">x caf\xe9\r\nAC\xffGT\n".to_vec()));
        let lines: Vec<String> = FetchedLines::new(body, permit, "X4")
            .collect::<ImportResult<_>>()
            .unwrap();

        assert_eq!(lines, vec![">x caf\u{FFFD}", "AC\u{FFFD}GT"]);
        assert!(limiter.last_success().is_some());
    }

    #[test]
    fn test_connection_failure_releases_token_without_stamp() {
        let config = FetchConfig {
            // Reserved port, nothing listens there
            base_url: "http://127.0.0.1:9/efetch".to_string(),
            timeout_secs: 5,
            ..FetchConfig::default()
        };
        let limiter = limiter();
        let fetcher = NcbiFetcher::new(&config, limiter.clone()).unwrap();

        let err = fetcher.fetch("NC_1").err().unwrap();
        assert!(matches!(err, ImportError::Transport { .. }));
        assert!(limiter.last_success().is_none());
        drop(limiter.acquire());
    }
}

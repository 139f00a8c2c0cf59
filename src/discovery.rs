//! # Streaming fact discovery.
//!
//! [`StreamFactExtractor`] scans a live line stream for a URL pattern and fires a
//! one-shot callback with the host of the match.
//!
//! ```text
//! line 1  "starting tunnel"                           → no match, keep scanning
//! line 2  "... https://a.trycloudflare.com ...
//!          ... https://b.trycloudflare.com ..."       → last match wins: b
//!                                                       settled = true
//!                                                       on_fact("b.trycloudflare.com")
//! line 3+ anything                                    → ignored
//! ```
//!
//! ## Rules
//! - Within a line, **all** matches are collected and the **last** one is kept.
//! - The first line with at least one match settles the extractor.
//! - `settled` is set before the callback runs and checked before each line.
//! - One extractor per process instance: a restarted process gets a fresh one.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::process::LineSink;

/// Quick-tunnel URL printed by the tunnel client once its public endpoint is assigned.
pub static TUNNEL_HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://[a-z0-9-]+\.trycloudflare\.com").expect("tunnel host pattern is valid")
});

/// Returns the last match of `pattern` in `line`.
pub fn last_match<'a>(pattern: &Regex, line: &'a str) -> Option<&'a str> {
    let matches: Vec<&'a str> = pattern.find_iter(line).map(|m| m.as_str()).collect();
    matches.last().copied()
}

/// Result of feeding one line to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The extractor had already settled; the line was not scanned.
    Ignored,
    /// No match on this line.
    NoMatch,
    /// This line settled discovery with the given host.
    Settled(String),
}

/// One-shot "last match on the first matching line" scanner.
pub struct StreamFactExtractor<F> {
    pattern: Regex,
    settled: bool,
    on_fact: F,
}

impl<F> StreamFactExtractor<F>
where
    F: FnMut(String),
{
    /// Extractor for [`TUNNEL_HOST_PATTERN`].
    pub fn new(on_fact: F) -> Self {
        Self::with_pattern(TUNNEL_HOST_PATTERN.clone(), on_fact)
    }

    /// Extractor for a custom URL pattern.
    pub fn with_pattern(pattern: Regex, on_fact: F) -> Self {
        Self {
            pattern,
            settled: false,
            on_fact,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Scans one line.
    pub fn observe(&mut self, line: &str) -> Observation {
        if self.settled {
            return Observation::Ignored;
        }
        let Some(host) = last_match(&self.pattern, line).and_then(host_of) else {
            return Observation::NoMatch;
        };
        self.settled = true;
        (self.on_fact)(host.clone());
        Observation::Settled(host)
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

impl<F> LineSink for StreamFactExtractor<F>
where
    F: FnMut(String) + Send,
{
    fn on_line(&mut self, line: &str) {
        self.observe(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting() -> (
        std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        impl FnMut(String) + Send,
    ) {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |host| sink.lock().unwrap().push(host))
    }

    #[test]
    fn test_no_match_never_fires() {
        let (seen, cb) = collecting();
        let mut ex = StreamFactExtractor::new(cb);
        for line in [
            "INF Starting tunnel",
            "http://foo.trycloudflare.com (plain http)",
            "https://Upper.trycloudflare.com",
            "https://foo.example.com",
        ] {
            assert_eq!(ex.observe(line), Observation::NoMatch);
        }
        assert!(!ex.is_settled());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_last_match_on_first_matching_line_wins() {
        let (seen, cb) = collecting();
        let mut ex = StreamFactExtractor::new(cb);

        assert_eq!(ex.observe("INF Requesting new quick Tunnel"), Observation::NoMatch);
        assert_eq!(ex.observe("INF +----------------------+"), Observation::NoMatch);
        assert_eq!(
            ex.observe("decoy https://first-one.trycloudflare.com then https://second-2.trycloudflare.com |"),
            Observation::Settled("second-2.trycloudflare.com".into())
        );
        assert_eq!(
            ex.observe("https://later.trycloudflare.com"),
            Observation::Ignored
        );

        assert_eq!(*seen.lock().unwrap(), vec!["second-2.trycloudflare.com".to_string()]);
    }

    #[test]
    fn test_end_to_end_single_line() {
        let (seen, cb) = collecting();
        let mut ex = StreamFactExtractor::new(cb);
        ex.on_line("visit https://foo-bar.trycloudflare.com now");
        assert!(ex.is_settled());
        assert_eq!(*seen.lock().unwrap(), vec!["foo-bar.trycloudflare.com".to_string()]);
    }

    #[test]
    fn test_last_match_helper() {
        let re = &*TUNNEL_HOST_PATTERN;
        assert_eq!(last_match(re, "none here"), None);
        assert_eq!(
            last_match(re, "https://a.trycloudflare.com https://b.trycloudflare.com"),
            Some("https://b.trycloudflare.com")
        );
    }
}

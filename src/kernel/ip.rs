//! `ip route` backed source and sink.

use std::net::IpAddr;
use std::process::Command;

use tracing::debug;

use crate::core::{
    DEFAULT_EXCLUDED_PREFIXES, KernelError, KernelRouteSink, LocalRouteSource, NeighborId, Prefix,
    SourceError,
};

fn run(args: &[&str]) -> Result<std::process::Output, (String, std::io::Error)> {
    let command = format!("ip {}", args.join(" "));
    debug!(%command, "running");
    Command::new("ip").args(args).output().map_err(|e| (command, e))
}

/// Programs routes with `ip route replace` and `ip route del`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpRouteSink;

impl IpRouteSink {
    fn exec(&self, args: &[&str]) -> Result<(), KernelError> {
        let output = run(args).map_err(|(command, source)| KernelError::Spawn { command, source })?;
        if output.status.success() {
            return Ok(());
        }
        Err(KernelError::CommandFailed {
            command: format!("ip {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl KernelRouteSink for IpRouteSink {
    fn install(
        &self,
        prefix: &Prefix,
        via: IpAddr,
        _neighbor: &NeighborId,
    ) -> Result<(), KernelError> {
        let prefix = prefix.to_string();
        let via = via.to_string();
        self.exec(&["route", "replace", &prefix, "via", &via])
    }

    fn remove(&self, prefix: &Prefix) -> Result<(), KernelError> {
        let prefix = prefix.to_string();
        match self.exec(&["route", "del", &prefix]) {
            // already gone
            Err(KernelError::CommandFailed { stderr, .. }) if stderr.contains("No such process") => {
                Ok(())
            }
            other => other,
        }
    }
}

/// Lists directly reachable prefixes from `ip route show`.
#[derive(Debug, Clone)]
pub struct IpRouteSource {
    excluded: Vec<String>,
}

impl Default for IpRouteSource {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_PREFIXES.iter().map(|s| s.to_string()))
    }
}

impl IpRouteSource {
    /// Create a source skipping prefixes whose text starts with any of `excluded`.
    pub fn new(excluded: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded: excluded.into_iter().collect(),
        }
    }
}

impl LocalRouteSource for IpRouteSource {
    fn enumerate(&self) -> Result<Vec<Prefix>, SourceError> {
        let output = Command::new("ip").args(["route", "show"]).output()?;
        if !output.status.success() {
            return Err(SourceError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(parse_route_listing(&listing, &self.excluded))
    }
}

/// Extract prefixes from `ip route show` output.
///
/// Keeps the first token of each line when it contains `/` and parses as an
/// IPv4 prefix. `default` routes, host routes and excluded prefixes are
/// skipped.
pub fn parse_route_listing(listing: &str, excluded: &[String]) -> Vec<Prefix> {
    let mut prefixes: Vec<Prefix> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|token| token.contains('/'))
        .filter(|token| !excluded.iter().any(|ex| token.starts_with(ex.as_str())))
        .filter_map(|token| token.parse().ok())
        .collect();
    prefixes.sort();
    prefixes.dedup();
    prefixes
}

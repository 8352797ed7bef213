use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).context("config variable expansion failed")?;

        let config: Self = toml::from_str(&expanded).context("failed to parse config")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_failover()?;
        self.validate_selection()?;
        Ok(())
    }

    fn validate_failover(&self) -> anyhow::Result<()> {
        let failover = &self.failover;

        if failover.failures_before_blacklist == 0 {
            anyhow::bail!("failover.failures_before_blacklist must be at least 1");
        }

        if failover.blacklist_duration.is_zero() {
            anyhow::bail!("failover.blacklist_duration must be greater than 0");
        }

        if failover.provider_timeout.is_zero() {
            anyhow::bail!("failover.provider_timeout must be greater than 0");
        }

        if failover.request_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("failover.request_timeout must be greater than 0");
        }

        if failover.max_providers_to_try == Some(0) {
            anyhow::bail!("failover.max_providers_to_try must be at least 1");
        }

        Ok(())
    }

    fn validate_selection(&self) -> anyhow::Result<()> {
        let selection = &self.selection;

        let mut seen = HashSet::new();
        for provider in &selection.preferred {
            if !seen.insert(provider) {
                anyhow::bail!("selection.preferred lists '{provider}' more than once");
            }
        }

        if let Some(conflict) = selection.preferred.iter().find(|p| selection.excluded.contains(p)) {
            anyhow::bail!("provider '{conflict}' cannot be both preferred and excluded");
        }

        Ok(())
    }
}

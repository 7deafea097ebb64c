//! Process-wide settings read from the environment.

use std::env;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

use lookout_openai_model::{DnsResolver, OpenAIConfig, OpenAIConfigBuilder};

/// Settings of the assistant, loaded once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// API key of the model provider (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// Base URL of the model provider (`OPENAI_BASE_URL`).
    pub openai_base_url: Option<String>,
    /// Model name (`OPENAI_MODEL`).
    pub openai_model: Option<String>,
    /// API key of the search provider (`TAVILY_API_KEY`).
    pub tavily_api_key: String,
    /// Results returned by one search (`LOOKOUT_MAX_RESULTS`).
    pub max_results: u32,
    /// How the model provider host is resolved (`LOOKOUT_DNS_RESOLVER`).
    pub dns_resolver: DnsResolver,
    /// Thread of the default session (`LOOKOUT_THREAD_ID`).
    pub thread_id: String,
    /// Directory of saved conversations (`LOOKOUT_STATE_DIR`). When unset,
    /// conversations only live as long as the process.
    pub state_dir: Option<PathBuf>,
    /// Model requests allowed in one turn (`LOOKOUT_MAX_ITERATIONS`).
    pub max_iterations: usize,
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings from `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        Ok(Self {
            openai_api_key: vars.required("OPENAI_API_KEY")?,
            openai_base_url: vars.optional("OPENAI_BASE_URL"),
            openai_model: vars.optional("OPENAI_MODEL"),
            tavily_api_key: vars.required("TAVILY_API_KEY")?,
            max_results: vars.parsed("LOOKOUT_MAX_RESULTS", 2)?,
            dns_resolver: vars.dns_resolver("LOOKOUT_DNS_RESOLVER")?,
            thread_id: vars
                .optional("LOOKOUT_THREAD_ID")
                .unwrap_or_else(|| "1".to_owned()),
            state_dir: vars.optional("LOOKOUT_STATE_DIR").map(PathBuf::from),
            max_iterations: vars.parsed("LOOKOUT_MAX_ITERATIONS", 10)?,
        })
    }

    /// Returns the configuration of the model provider.
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder =
            OpenAIConfigBuilder::with_api_key(self.openai_api_key.clone())
                .with_dns_resolver(self.dns_resolver);
        if let Some(base_url) = &self.openai_base_url {
            builder = builder.with_base_url(base_url.clone());
        }
        if let Some(model) = &self.openai_model {
            builder = builder.with_model(model.clone());
        }
        builder.build()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("tavily_api_key", &"<redacted>")
            .field("max_results", &self.max_results)
            .field("dns_resolver", &self.dns_resolver)
            .field("thread_id", &self.thread_id)
            .field("state_dir", &self.state_dir)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, SettingsError> {
        self.optional(name).ok_or(SettingsError {
            variable: name,
            kind: SettingsErrorKind::Missing,
        })
    }

    fn parsed<T: FromStr>(
        &self,
        name: &'static str,
        default: T,
    ) -> Result<T, SettingsError> {
        let Some(value) = self.optional(name) else {
            return Ok(default);
        };
        value
            .trim()
            .parse()
            .map_err(|_| SettingsError::invalid(name, value))
    }

    fn dns_resolver(
        &self,
        name: &'static str,
    ) -> Result<DnsResolver, SettingsError> {
        let Some(value) = self.optional(name) else {
            return Ok(DnsResolver::Native);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(DnsResolver::Native),
            "ipv4" => Ok(DnsResolver::Ipv4Only),
            _ => Err(SettingsError::invalid(name, value)),
        }
    }
}

/// The kind of settings error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SettingsErrorKind {
    /// A required variable is not set.
    Missing,
    /// A variable is set to a value that cannot be used.
    Invalid(String),
}

/// Describes a variable that prevents the settings from loading.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SettingsError {
    variable: &'static str,
    kind: SettingsErrorKind,
}

impl SettingsError {
    fn invalid(variable: &'static str, value: String) -> Self {
        Self {
            variable,
            kind: SettingsErrorKind::Invalid(value),
        }
    }

    /// Returns the name of the offending variable.
    #[inline]
    pub fn variable(&self) -> &str {
        self.variable
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> &SettingsErrorKind {
        &self.kind
    }
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SettingsErrorKind::Missing => {
                write!(f, "{} environment variable is not set", self.variable)
            }
            SettingsErrorKind::Invalid(value) => {
                write!(f, "{} has an invalid value: {value:?}", self.variable)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    const KEYS: [(&str, &str); 2] =
        [("OPENAI_API_KEY", "sk-xxx"), ("TAVILY_API_KEY", "tvly-xxx")];

    #[test]
    fn test_defaults() {
        let settings = load(&KEYS).unwrap();
        assert_eq!(settings.max_results, 2);
        assert_eq!(settings.dns_resolver, DnsResolver::Native);
        assert_eq!(settings.thread_id, "1");
        assert_eq!(settings.state_dir, None);
        assert_eq!(settings.max_iterations, 10);
        assert_eq!(settings.openai_config().model(), "gpt-4o-mini");
    }

    #[test]
    fn test_overrides() {
        let mut vars = KEYS.to_vec();
        vars.extend([
            ("OPENAI_MODEL", "gpt-4.1"),
            ("LOOKOUT_MAX_RESULTS", "5"),
            ("LOOKOUT_DNS_RESOLVER", "IPv4"),
            ("LOOKOUT_THREAD_ID", "travel"),
            ("LOOKOUT_STATE_DIR", "/tmp/lookout"),
            ("LOOKOUT_MAX_ITERATIONS", "4"),
        ]);
        let settings = load(&vars).unwrap();
        assert_eq!(settings.max_results, 5);
        assert_eq!(settings.dns_resolver, DnsResolver::Ipv4Only);
        assert_eq!(settings.thread_id, "travel");
        assert_eq!(settings.state_dir, Some(PathBuf::from("/tmp/lookout")));
        assert_eq!(settings.max_iterations, 4);
        assert_eq!(settings.openai_config().model(), "gpt-4.1");
    }

    #[test]
    fn test_missing_keys() {
        let err = load(&[("OPENAI_API_KEY", "sk-xxx")]).unwrap_err();
        assert_eq!(err.variable(), "TAVILY_API_KEY");
        assert_eq!(err.kind(), &SettingsErrorKind::Missing);

        let err =
            load(&[("OPENAI_API_KEY", ""), ("TAVILY_API_KEY", "tvly-xxx")])
                .unwrap_err();
        assert_eq!(err.variable(), "OPENAI_API_KEY");
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("LOOKOUT_MAX_RESULTS", "two"),
            ("LOOKOUT_DNS_RESOLVER", "grpc"),
            ("LOOKOUT_MAX_ITERATIONS", "-1"),
        ] {
            let mut vars = KEYS.to_vec();
            vars.push((name, value));
            let err = load(&vars).unwrap_err();
            assert_eq!(err.variable(), name);
            assert_eq!(
                err.kind(),
                &SettingsErrorKind::Invalid(value.to_owned())
            );
        }
    }

    #[test]
    fn test_keys_are_redacted() {
        let settings = load(&KEYS).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-xxx"));
        assert!(!debug.contains("tvly-xxx"));
    }
}

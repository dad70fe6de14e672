use crate::error::{ErrorKind, Result};
use crate::{APPLICATION, Config, RetentionPolicy};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const ENV_PREFIX: &str = "ZIMSHELF_";
const ENV_SEPARATOR: &str = "__";

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zim_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Configuration files looked for when none is given explicitly.
pub fn default_config_files() -> Vec<PathBuf> {
    directories::ProjectDirs::from("", "", APPLICATION)
        .map(|dirs| {
            ["toml", "yaml", "yml", "json"]
                .into_iter()
                .map(|extension| dirs.config_dir().join(format!("{APPLICATION}.{extension}")))
                .collect()
        })
        .unwrap_or_default()
}

fn file_provider(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => figment.merge(Toml::file_exact(path)),
    }
}

impl Config {
    /// Resolves every layer and validates the result. An explicit `file`
    /// must exist; the default locations are optional.
    #[instrument(skip(overrides))]
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => figment = file_provider(figment, path),
            None => {
                for path in default_config_files().iter().filter(|path| path.is_file()) {
                    tracing::debug!(path = %path.display(), "Using configuration file");
                    figment = file_provider(figment, path);
                }
            },
        }
        let figment = figment
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
            .merge(Serialized::defaults(overrides));
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(exn::Exn::from(ErrorKind::Invalid(reason.to_string())));
        if self.retention.exposed < 1 {
            return invalid("retention.exposed must be at least 1");
        }
        if self.retention.keep < self.retention.exposed {
            return invalid("retention.keep must not be lower than retention.exposed");
        }
        if self.retention.policy == RetentionPolicy::Quarantine && self.retention.quarantine.is_none() {
            return invalid("retention.quarantine is required by the quarantine policy");
        }
        if self.readiness.batched && self.readiness.batch_size < 1 {
            return invalid("readiness.batch_size must be at least 1");
        }
        if self.max_concurrency < 1 {
            return invalid("max_concurrency must be at least 1");
        }
        if self.extension.is_empty() {
            return invalid("extension must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LegacyOption;
    use figment::Jail;
    use rstest::rstest;
    use std::ops::Deref;

    fn load(jail: &Jail, file: Option<&str>, overrides: &Overrides) -> Result<Config> {
        let file = file.map(|name| jail.directory().join(name));
        Config::load(file.as_deref(), overrides)
    }

    #[test]
    fn test_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "zimshelf.toml",
                r#"
                    zim_root = "/srv/zim"
                    max_concurrency = 4

                    [retention]
                    keep = 3

                    [[redirects.legacy_options]]
                    current = "maxi"
                    deprecated = "all"
                "#,
            )?;
            jail.set_env("ZIMSHELF_MAX_CONCURRENCY", "8");
            jail.set_env("ZIMSHELF_RETENTION__EXPOSED", "2");
            let overrides = Overrides { zim_root: Some(PathBuf::from("/mnt/zim")), ..Default::default() };
            let config = load(jail, Some("zimshelf.toml"), &overrides).unwrap();
            assert_eq!(config.zim_root, PathBuf::from("/mnt/zim"));
            assert_eq!(config.max_concurrency, 8);
            assert_eq!(config.retention.keep, 3);
            assert_eq!(config.retention.exposed, 2);
            assert_eq!(
                config.redirects.legacy_options,
                [LegacyOption { current: "maxi".to_string(), deprecated: "all".to_string() }]
            );
            assert_eq!(config.extension, "zim");
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("zimshelf.yaml", "retention:\n  policy: quarantine\n  quarantine: /srv/quarantine\n")?;
            let config = load(jail, Some("zimshelf.yaml"), &Overrides::default()).unwrap();
            assert_eq!(config.retention.policy, RetentionPolicy::Quarantine);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        Jail::expect_with(|jail| {
            let err = load(jail, Some("missing.toml"), &Overrides::default()).unwrap_err();
            assert!(matches!(err.deref(), ErrorKind::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_per_path_readiness_ignores_batch_size() {
        Jail::expect_with(|jail| {
            jail.set_env("ZIMSHELF_READINESS__BATCHED", "false");
            jail.set_env("ZIMSHELF_READINESS__BATCH_SIZE", "0");
            let config = load(jail, None, &Overrides::default()).unwrap();
            assert!(!config.readiness.batched);
            Ok(())
        });
    }

    #[test]
    fn test_wrong_type() {
        Jail::expect_with(|jail| {
            jail.set_env("ZIMSHELF_MAX_CONCURRENCY", "many");
            let err = load(jail, None, &Overrides::default()).unwrap_err();
            assert!(matches!(err.deref(), ErrorKind::Load));
            Ok(())
        });
    }

    #[rstest]
    #[case::no_exposure(|c: &mut Config| c.retention.exposed = 0)]
    #[case::keep_below_exposed(|c: &mut Config| { c.retention.keep = 1; c.retention.exposed = 2; })]
    #[case::quarantine_without_dir(|c: &mut Config| c.retention.policy = RetentionPolicy::Quarantine)]
    #[case::no_batch(|c: &mut Config| c.readiness.batch_size = 0)]
    #[case::no_concurrency(|c: &mut Config| c.max_concurrency = 0)]
    fn test_validate_rejects(#[case] mutate: fn(&mut Config)) {
        let mut config = Config::default();
        mutate(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }
}

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, bail},
    secrecy::Secret,
    tracing::debug,
};

use crate::{
    env_subst::substitute_env,
    schema::ClawboardConfig,
    validate::{ConfigError, parse_auth_mode},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "clawboard.toml",
    "clawboard.yaml",
    "clawboard.yml",
    "clawboard.json",
];

pub const ENV_GATEWAY_URL: &str = "CLAWBOARD_GATEWAY_URL";
pub const ENV_AUTH_MODE: &str = "CLAWBOARD_AUTH_MODE";
pub const ENV_GATEWAY_TOKEN: &str = "CLAWBOARD_GATEWAY_TOKEN";
pub const ENV_SESSION_KEY: &str = "CLAWBOARD_SESSION_KEY";

/// Load, overlay the environment, and validate.
///
/// `explicit` must exist when given. Otherwise the standard locations are
/// searched and a missing file simply means "environment only".
pub fn load(explicit: Option<&Path>) -> anyhow::Result<ClawboardConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => discover()?,
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    debug!(
        url = %config.base_url(),
        mode = %config.auth.mode,
        session_key = %config.gateway.session_key,
        "config loaded"
    );
    Ok(config)
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ClawboardConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path).with_context(|| format!("failed to parse {}", path.display()))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./clawboard.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/clawboard/clawboard.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ClawboardConfig::default()` if no config file is found.
pub fn discover() -> anyhow::Result<ClawboardConfig> {
    let mut dirs = vec![PathBuf::from(".")];
    dirs.extend(config_dir());
    match find_config_file(&dirs) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using environment only");
            Ok(ClawboardConfig::default())
        },
    }
}

/// First existing config file across `dirs`, in order.
pub fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns `~/.config/clawboard/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("clawboard"))
}

/// Overlay `CLAWBOARD_*` variables on top of the file config.
pub fn apply_env_overrides(
    config: &mut ClawboardConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = lookup(ENV_GATEWAY_URL) {
        config.gateway.url = Some(url);
    }
    if let Some(mode) = lookup(ENV_AUTH_MODE) {
        config.auth.mode = parse_auth_mode(&mode)?;
    }
    if let Some(token) = lookup(ENV_GATEWAY_TOKEN) {
        config.auth.token = Some(Secret::new(token));
    }
    if let Some(key) = lookup(ENV_SESSION_KEY) {
        config.gateway.session_key = key;
    }
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ClawboardConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::AuthMode, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clawboard.toml");
        std::fs::write(
            &path,
            r#"
            [gateway]
            url = "http://127.0.0.1:18789"
            session_key = "ops"

            [auth]
            token = "tok"
            "#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.base_url(), "http://127.0.0.1:18789");
        assert_eq!(cfg.gateway.session_key, "ops");
        assert_eq!(cfg.auth.token.unwrap().expose_secret(), "tok");
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("clawboard.yaml");
        std::fs::write(&yaml, "auth:\n  mode: password\n").unwrap();
        assert_eq!(load_config(&yaml).unwrap().auth.mode, AuthMode::Password);

        let json = dir.path().join("clawboard.json");
        std::fs::write(&json, r#"{"dashboard": {"poll_secs": 3}}"#).unwrap();
        assert_eq!(load_config(&json).unwrap().dashboard.poll_secs, 3);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clawboard.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported config format"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn find_config_file_respects_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("clawboard.toml"), "").unwrap();
        std::fs::write(first.path().join("clawboard.json"), "{}").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            find_config_file(&dirs),
            Some(first.path().join("clawboard.json"))
        );
        assert_eq!(find_config_file(&[]), None);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut cfg = ClawboardConfig::default();
        cfg.gateway.url = Some("http://file.example".into());

        apply_env_overrides(&mut cfg, |name| match name {
            ENV_GATEWAY_URL => Some("http://env.example".into()),
            ENV_AUTH_MODE => Some("password".into()),
            ENV_SESSION_KEY => Some("agent:ops:main".into()),
            ENV_GATEWAY_TOKEN => Some("   ".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.base_url(), "http://env.example");
        assert_eq!(cfg.auth.mode, AuthMode::Password);
        assert_eq!(cfg.gateway.session_key, "agent:ops:main");
        assert!(cfg.auth.token.is_none(), "blank values are ignored");
    }

    #[test]
    fn bad_env_auth_mode_fails() {
        let mut cfg = ClawboardConfig::default();
        let err = apply_env_overrides(&mut cfg, |name| {
            (name == ENV_AUTH_MODE).then(|| "magic".to_string())
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::UnknownAuthMode("magic".into()));
    }
}

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the relay.
///
/// Everything has a default; the process runs with no environment at all,
/// which matches the original single-instance deployment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Port the HTTP listener binds on.
    pub port: u16,

    /// Persisted session credential blob (opaque, owned by the protocol client).
    pub session_file: PathBuf,
    /// Where the login QR challenge image is written for the operator to scan.
    pub qrcode_file: PathBuf,
    /// Directory for protocol-error diagnostic dumps, created on demand.
    pub dump_dir: PathBuf,
    /// Persisted device identity so resumed sessions look like the same device.
    pub device_file: PathBuf,

    /// Fixed interval between QR status polls.
    pub poll_interval: Duration,

    /// Password login branch. Disabled by default; the upstream service
    /// currently rejects it, but the flow is kept wired up.
    pub password_login: bool,
    pub uin: Option<i64>,
    pub password: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let port = env_u64("PUSHQQ_PORT").map(|p| p as u16).unwrap_or(3206);

        let session_file = env_path("PUSHQQ_SESSION_FILE").unwrap_or_else(|| "sig.bin".into());
        let qrcode_file = env_path("PUSHQQ_QRCODE_FILE").unwrap_or_else(|| "qrcode.png".into());
        let dump_dir = env_path("PUSHQQ_DUMP_DIR").unwrap_or_else(|| "dump".into());
        let device_file = env_path("PUSHQQ_DEVICE_FILE").unwrap_or_else(|| "device.json".into());

        let poll_interval =
            Duration::from_millis(env_u64("PUSHQQ_POLL_INTERVAL_MS").unwrap_or(3000));

        let password_login = env_bool("PUSHQQ_PASSWORD_LOGIN").unwrap_or(false);
        let uin = env_str("PUSHQQ_UIN").and_then(|s| s.trim().parse::<i64>().ok());
        let password = env_str("PUSHQQ_PASSWORD").and_then(non_empty);

        if password_login && (uin.is_none() || password.is_none()) {
            return Err(Error::Config(
                "PUSHQQ_PASSWORD_LOGIN requires PUSHQQ_UIN and PUSHQQ_PASSWORD".to_string(),
            ));
        }

        Ok(Self {
            port,
            session_file,
            qrcode_file,
            dump_dir,
            device_file,
            poll_interval,
            password_login,
            uin,
            password,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

//! Fns to read variables from the environment more conveniently and help other functions figure
//! out what environment they're running in.

use std::env;

use lazy_static::lazy_static;
use tracing::{debug, warn};

/// Get an environment variable, encoding found or missing as Option, and panic otherwise.
pub fn get_env_var(key: &str) -> Option<String> {
    let var = match env::var(key) {
        Err(env::VarError::NotPresent) => None,
        Err(err) => panic!("{err}"),
        Ok(var) => Some(var),
    };

    if let Some(ref existing_var) = var {
        debug!("env var {key}: {existing_var}");
    } else {
        debug!("env var {key} requested but not found")
    };

    var
}

/// Some things are different between environments, most notably how we log.
/// This enum is the main way to create these branches in our logic.
#[derive(Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Prod,
    Stag,
}

pub fn get_env() -> Env {
    let env_str = get_env_var("ENV");
    match env_str {
        None => {
            warn!("no ENV in env, assuming Dev");
            Env::Dev
        }
        Some(str) => match str.as_ref() {
            "dev" => Env::Dev,
            "development" => Env::Dev,
            "stag" => Env::Stag,
            "staging" => Env::Stag,
            "prod" => Env::Prod,
            "production" => Env::Prod,
            _ => {
                panic!("ENV present: {str}, but not one of dev, stag, prod, panicking!")
            }
        },
    }
}

pub fn get_env_bool(key: &str) -> bool {
    let flag = get_env_var(key).map_or(false, |var| var.to_lowercase() == "true");
    debug!("env flag {key}: {flag}");
    flag
}

#[derive(Debug)]
pub struct EnvConfig {
    pub env: Env,
    pub pretty_print: bool,
}

fn get_env_config() -> EnvConfig {
    EnvConfig {
        env: get_env(),
        pretty_print: get_env_bool("PRETTY_PRINT"),
    }
}

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

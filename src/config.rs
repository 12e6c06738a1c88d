use std::env;
use std::time::Duration;

use crate::error::{invalid_config_error, Error};

pub const DEFAULT_STATE_PATH: &str = "vectura.json";
pub const DEFAULT_TICK_SECS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Daemon,
    Simulate,
}

// Runtime knobs, read from the environment once at startup. main loads
// dotenv before asking for these.
#[derive(Clone, Debug)]
pub struct Config {
    pub state_path: String,
    pub tick_interval: Duration,
    pub mode: Mode,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let state_path = match env::var("VECTURA_STATE_PATH") {
            Ok(path) => path,
            Err(env::VarError::NotPresent) => DEFAULT_STATE_PATH.to_string(),
            Err(err) => return Err(err.into()),
        };

        let tick_interval = match env::var("VECTURA_TICK_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    invalid_config_error("VECTURA_TICK_SECS must be a number of seconds")
                })?;

                if secs == 0 {
                    return Err(invalid_config_error("VECTURA_TICK_SECS must be at least 1"));
                }

                Duration::from_secs(secs)
            }
            Err(env::VarError::NotPresent) => Duration::from_secs(DEFAULT_TICK_SECS),
            Err(err) => return Err(err.into()),
        };

        let mode = match env::var("VECTURA_MODE") {
            Ok(raw) => match raw.as_str() {
                "daemon" => Mode::Daemon,
                "simulate" => Mode::Simulate,
                _ => return Err(invalid_config_error("VECTURA_MODE must be daemon or simulate")),
            },
            Err(env::VarError::NotPresent) => Mode::Daemon,
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            state_path,
            tick_interval,
            mode,
        })
    }
}

// One test covers every variable; parallel tests racing over set_var would
// step on each other.
#[test]
fn from_env_reads_overrides_and_falls_back_to_defaults() {
    env::remove_var("VECTURA_STATE_PATH");
    env::remove_var("VECTURA_TICK_SECS");
    env::remove_var("VECTURA_MODE");

    let config = Config::from_env().unwrap();
    assert_eq!(config.state_path, DEFAULT_STATE_PATH);
    assert_eq!(config.tick_interval, Duration::from_secs(DEFAULT_TICK_SECS));
    assert_eq!(config.mode, Mode::Daemon);

    env::set_var("VECTURA_STATE_PATH", "/tmp/elsewhere.json");
    env::set_var("VECTURA_TICK_SECS", "3");
    env::set_var("VECTURA_MODE", "simulate");

    let config = Config::from_env().unwrap();
    assert_eq!(config.state_path, "/tmp/elsewhere.json");
    assert_eq!(config.tick_interval, Duration::from_secs(3));
    assert_eq!(config.mode, Mode::Simulate);

    env::set_var("VECTURA_TICK_SECS", "soon");
    assert_eq!(Config::from_env().unwrap_err().code, 4);

    env::set_var("VECTURA_TICK_SECS", "0");
    assert_eq!(Config::from_env().unwrap_err().code, 4);

    env::set_var("VECTURA_TICK_SECS", "3");
    env::set_var("VECTURA_MODE", "orbit");
    assert_eq!(Config::from_env().unwrap_err().code, 4);

    env::remove_var("VECTURA_STATE_PATH");
    env::remove_var("VECTURA_TICK_SECS");
    env::remove_var("VECTURA_MODE");
}

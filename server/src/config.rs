use dotenvy::dotenv;
use std::{env, net::IpAddr, str::FromStr};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigin {
    Any,
    Exact(String),
}

impl AllowedOrigin {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "*" => AllowedOrigin::Any,
            origin => AllowedOrigin::Exact(origin.trim_end_matches('/').to_string()),
        }
    }

    /// Clients that send no `Origin` (native apps, tools) are allowed.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (AllowedOrigin::Any, _) | (_, None) => true,
            (AllowedOrigin::Exact(allowed), Some(origin)) => {
                allowed.eq_ignore_ascii_case(origin.trim_end_matches('/'))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub client_origin: AllowedOrigin,
    pub socket_buffer: usize,
    pub room_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 4000,
            client_origin: AllowedOrigin::Exact("http://localhost:5173".into()),
            socket_buffer: 64,
            room_queue: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: parse(&lookup, "HOST")?.unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            client_origin: lookup("CLIENT_ORIGIN")
                .map(|value| AllowedOrigin::parse(&value))
                .unwrap_or(defaults.client_origin),
            socket_buffer: parse(&lookup, "SOCKET_BUFFER")?.unwrap_or(defaults.socket_buffer),
            room_queue: parse(&lookup, "ROOM_QUEUE")?.unwrap_or(defaults.room_queue),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

//! Command line parsing and adapter selection.

use crate::{parse_args, run_simulated, weather_port, Args};
use ambient_mirror_lib::config::{self, Config};
use ambient_mirror_lib::weather::CannedWeather;
use ambient_mirror_lib::Location;
use std::io::{self, BufReader, Read};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Input that blocks until something is sent, like a terminal nobody
/// types into. Reports end of input once the sender is dropped.
struct OpenInput(mpsc::Receiver<Vec<u8>>);

impl Read for OpenInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.recv() {
            Ok(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }
}

fn args(list: &[&str]) -> anyhow::Result<Args> {
    parse_args(list.iter().map(|s| s.to_string()))
}

#[test]
fn defaults_without_arguments() {
    let parsed = args(&[]).unwrap();
    assert_eq!(
        parsed,
        Args {
            simulate: false,
            config_path: config::DEFAULT_PATH.to_string(),
            write_config: None,
        }
    );
}

#[test]
fn simulate_has_an_alias() {
    assert!(args(&["--simulate"]).unwrap().simulate);
    assert!(args(&["--stdout"]).unwrap().simulate);
}

#[test]
fn config_and_write_config_take_paths() {
    let parsed = args(&["--config", "/etc/mirror.toml", "--write-config", "out.toml"]).unwrap();
    assert_eq!(parsed.config_path, "/etc/mirror.toml");
    assert_eq!(parsed.write_config.as_deref(), Some("out.toml"));
    assert!(!parsed.simulate);
}

#[test]
fn missing_path_is_an_error() {
    let err = args(&["--config"]).unwrap_err();
    assert!(err.to_string().contains("--config"));
    assert!(args(&["--write-config"]).is_err());
}

#[test]
fn unknown_argument_is_rejected() {
    let err = args(&["--verbose"]).unwrap_err();
    assert!(err.to_string().contains("--verbose"));
}

#[tokio::test]
async fn no_api_key_means_canned_weather() {
    let config = Config::default();
    assert!(config.weather.api_key.is_empty());

    let port = weather_port(&config).unwrap();
    let location = Location {
        latitude: 40.0,
        longitude: -105.0,
    };
    let current = port
        .fetch_current(location, config.weather.units)
        .await
        .unwrap();
    assert_eq!(current.city, "Boulder");
}

#[test]
fn api_key_builds_the_http_client() {
    let mut config = Config::default();
    config.weather.api_key = "secret".to_string();
    assert!(weather_port(&config).is_ok());
}

#[test]
fn simulated_run_stops_while_input_is_still_open() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let (input, rx) = mpsc::channel::<Vec<u8>>();
    input.send(b"light 5000\n".to_vec()).unwrap();

    let shutdown = async { tokio::time::sleep(Duration::from_millis(500)).await };
    let output = run_simulated(
        &rt,
        Arc::new(CannedWeather::default()),
        &Config::default(),
        BufReader::new(OpenInput(rx)),
        Vec::new(),
        shutdown,
    )
    .unwrap();
    // Dropping the runtime must not wait on the input thread.
    drop(rt);

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.first(), Some(&"[clear Background]"));
    assert_eq!(lines.last(), Some(&"[clear Background]"));
    assert!(text.contains("72.4F Clear"));
    drop(input);
}

//! # Ambient Mirror Application Entry Point
//!
//! Wires the sensor, display and weather adapters into the poll scheduler
//! and runs it until Ctrl-C. It supports both hardware mode (APDS-9960 over
//! I²C, Linux framebuffer) and a development mode where stdin drives a
//! simulated sensor and draw operations are printed to stdout.

// Test modules
#[cfg(test)]
mod tests;

use ambient_mirror_lib::config::{self, Config};
use ambient_mirror_lib::display::{DisplayPort, TerminalDisplay};
use ambient_mirror_lib::openweather::OpenWeatherClient;
use ambient_mirror_lib::scheduler::{DeviceContext, PollScheduler};
use ambient_mirror_lib::sensor::{SensorPort, SimulatedSensor};
use ambient_mirror_lib::weather::{CannedWeather, WeatherPort};
use anyhow::{bail, Context};
use std::env;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// Command line options.
#[derive(Debug, PartialEq, Eq)]
struct Args {
    /// Development mode: stdin-driven sensor, terminal display
    simulate: bool,
    config_path: String,
    /// Write the effective configuration here and exit
    write_config: Option<String>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Args> {
    let mut parsed = Args {
        simulate: false,
        config_path: config::DEFAULT_PATH.to_string(),
        write_config: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--simulate" | "--stdout" => parsed.simulate = true,
            "--config" => {
                parsed.config_path = args.next().context("--config needs a path")?;
            }
            "--write-config" => {
                parsed.write_config = Some(args.next().context("--write-config needs a path")?);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(parsed)
}

/// Pick the weather adapter: the real service when a key is configured,
/// canned data otherwise.
fn weather_port(config: &Config) -> anyhow::Result<Arc<dyn WeatherPort>> {
    let weather = &config.weather;
    if weather.api_key.is_empty() {
        log::warn!("No weather API key configured, showing canned weather");
        return Ok(Arc::new(CannedWeather::default()));
    }
    let client = OpenWeatherClient::new(
        weather.base_url.clone(),
        weather.api_key.clone(),
        Duration::from_secs(weather.timeout_secs),
    )
    .context("building weather client")?;
    Ok(Arc::new(client))
}

/// Resolves on Ctrl-C. If the signal cannot be watched it never resolves.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Ctrl-C received, shutting down"),
        Err(e) => {
            log::error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}

/// Run the scheduler until `shutdown` resolves, then blank the panel and
/// hand the devices back.
fn run_mirror<S, D, F>(
    rt: &tokio::runtime::Runtime,
    ctx: DeviceContext<S, D>,
    weather: Arc<dyn WeatherPort>,
    config: &Config,
    shutdown: F,
) -> DeviceContext<S, D>
where
    S: SensorPort,
    D: DisplayPort,
    F: Future<Output = ()>,
{
    let mut scheduler = PollScheduler::new(ctx, weather, config);
    rt.block_on(scheduler.run(shutdown));
    scheduler.shutdown();
    scheduler.into_context()
}

/// Development mode: sensor commands come from `input`, draw operations
/// are printed to `output`. Returns `output` once `shutdown` resolves,
/// whether or not `input` is still open.
fn run_simulated<R, O, F>(
    rt: &tokio::runtime::Runtime,
    weather: Arc<dyn WeatherPort>,
    config: &Config,
    input: R,
    output: O,
    shutdown: F,
) -> anyhow::Result<O>
where
    R: BufRead + Send + 'static,
    O: Write + Send,
    F: Future<Output = ()>,
{
    let (sensor, handle) = SimulatedSensor::new(0);
    handle
        .spawn_feed(input)
        .context("starting sensor input thread")?;

    let ctx = DeviceContext {
        sensor,
        display: TerminalDisplay::new(output),
    };
    let ctx = run_mirror(rt, ctx, weather, config, shutdown);
    Ok(ctx.display.into_inner())
}

fn run_simulated_stdio(
    rt: &tokio::runtime::Runtime,
    weather: Arc<dyn WeatherPort>,
    config: &Config,
) -> anyhow::Result<()> {
    eprintln!("Simulation mode: type `light <n>`, `left` or `right` and press enter");
    eprintln!(
        "  wake at >= {}, sleep at <= {}",
        config.sensor.high_threshold, config.sensor.low_threshold
    );
    run_simulated(
        rt,
        weather,
        config,
        io::BufReader::new(io::stdin()),
        io::stdout(),
        ctrl_c(),
    )?;
    Ok(())
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
fn run_hardware(
    rt: &tokio::runtime::Runtime,
    weather: Arc<dyn WeatherPort>,
    config: &Config,
) -> anyhow::Result<()> {
    use ambient_mirror_lib::apds9960::Apds9960;
    use ambient_mirror_lib::display::{rgb565, FramebufferDevice, GraphicsDisplay};
    use linux_embedded_hal::I2cdev;

    let sensor_cfg = &config.sensor;
    let i2c = I2cdev::new(&sensor_cfg.i2c_bus)
        .with_context(|| format!("opening I2C bus {}", sensor_cfg.i2c_bus))?;
    let sensor = Apds9960::new(i2c, sensor_cfg.i2c_address).context("initializing APDS-9960")?;
    log::info!(
        "APDS-9960 ready on {} at {:#04x}",
        sensor_cfg.i2c_bus,
        sensor_cfg.i2c_address
    );

    let display_cfg = &config.display;
    let fb = FramebufferDevice::open(&display_cfg.framebuffer, display_cfg.width, display_cfg.height)
        .with_context(|| format!("opening framebuffer {}", display_cfg.framebuffer))?;
    let display = GraphicsDisplay::new(
        fb,
        rgb565(display_cfg.foreground),
        rgb565(display_cfg.background),
    );

    run_mirror(rt, DeviceContext { sensor, display }, weather, config, ctrl_c());
    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(env::args().skip(1))?;
    let config = Config::load_from_path(&args.config_path);

    if let Some(path) = &args.write_config {
        config
            .save_to_path(path)
            .with_context(|| format!("writing {path}"))?;
        return Ok(());
    }

    let weather = weather_port(&config)?;

    // Create Tokio runtime for the poll loop and weather fetches
    let rt = tokio::runtime::Runtime::new()?;

    if args.simulate {
        return run_simulated_stdio(&rt, weather, &config);
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        // Without sensors the device cannot do anything useful: any error
        // here ends the process with a nonzero status.
        if let Err(e) = run_hardware(&rt, weather, &config) {
            log::error!("Hardware startup failed: {e:#}");
            return Err(e);
        }
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        log::warn!("Hardware support not enabled. Rebuild with --features hardware on Linux.");
        log::warn!("Running the simulated sensor and terminal display instead");
        run_simulated_stdio(&rt, weather, &config)?;
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use nws_forecast::cache::{Cache, CacheKey};
use nws_forecast::config::{load_config, Config};
use nws_forecast::nws::{Client, Location};
use nws_forecast::schema::Kind;
use nws_forecast::{render, update, web};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(about = "Fetch, cache and show National Weather Service forecasts")]
struct Args {
    /// TOML configuration file; built-in defaults are used without one
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Overrides `data_dir` from the configuration
    #[clap(long)]
    data_dir: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and cache all forecasts
    UpdateAll {
        /// Only update this location
        #[clap(short, long)]
        location: Option<String>,
    },
    /// Display the latest hourly forecast
    ShowHourly {
        #[clap(short, long, default_value = "home")]
        location: String,
    },
    /// Display the latest 12h forecast
    ShowDaily {
        #[clap(short, long, default_value = "home")]
        location: String,
        /// Show the full text view of each period
        #[clap(long)]
        detailed: bool,
    },
    /// Display raw gridpoint layers
    ShowRaw {
        #[clap(short, long, default_value = "home")]
        location: String,
        /// List the values of one layer, e.g. temperature
        #[clap(long)]
        layer: Option<String>,
    },
    /// Describe the area a cached forecast covers
    Area {
        #[clap(short, long, default_value = "home")]
        location: String,
        #[clap(short, long, default_value_t = Kind::TwelveHour)]
        kind: Kind,
    },
    /// Find the forecast grid square for a coordinate
    Locate {
        /// Decimal `lat,lng` or DMS such as 35°29′19″N 082°59′17″W
        location: Location,
    },
    /// Serve cached forecasts over HTTP
    Serve {
        #[clap(long)]
        bind: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let cache = Cache::new(args.data_dir.clone().unwrap_or_else(|| config.data_dir.clone()));

    match args.command {
        Command::UpdateAll { location } => {
            let client = Client::new(&config.api)?;
            println!("Fetching latest forecast data...");
            let reports = match location {
                Some(name) => {
                    let point = known(&config, &name)?;
                    vec![update::update_location(&client, &cache, &name, point)]
                }
                None => update::update_all(&client, &cache, &config.locations),
            };
            for report in &reports {
                for (kind, e) in &report.failures {
                    println!("{}: {} not updated: {}", report.location, kind, e);
                }
            }
            if reports.iter().all(|r| r.is_complete()) {
                println!("All forecasts updated.");
            }
        }
        Command::ShowHourly { location } => {
            known(&config, &location)?;
            match cache.load(&CacheKey::new(location, Kind::Hourly))? {
                Some(envelope) => print_lines(render::summary(&envelope)),
                None => println!("No cached hourly data found for the selected location."),
            }
        }
        Command::ShowDaily { location, detailed } => {
            known(&config, &location)?;
            match cache.load(&CacheKey::new(location, Kind::TwelveHour))? {
                Some(envelope) if detailed => {
                    for period in envelope.forecast().map(|f| f.periods.as_slice()).unwrap_or(&[]) {
                        println!("{}", render::detailed(period));
                    }
                }
                Some(envelope) => print_lines(render::summary(&envelope)),
                None => println!("No cached daily data found for the selected location."),
            }
        }
        Command::ShowRaw { location, layer } => {
            known(&config, &location)?;
            let envelope = match cache.load(&CacheKey::new(location, Kind::Gridpoint))? {
                Some(envelope) => envelope,
                None => {
                    println!("No cached raw data found for the selected location.");
                    return Ok(());
                }
            };
            let Some(gridpoint) = envelope.gridpoint() else {
                return Ok(());
            };
            match layer {
                Some(name) => match gridpoint.layers.get(&name) {
                    Some(layer) => print_lines(render::layer_lines(layer)),
                    None => println!("Layer {} is not present in the cached data.", name),
                },
                None => print_lines(render::gridpoint_overview(gridpoint)),
            }
        }
        Command::Area { location, kind } => {
            known(&config, &location)?;
            match cache.load(&CacheKey::new(location, kind))? {
                Some(envelope) => match render::area(envelope.geometry()) {
                    Some(text) => println!("{}", text),
                    None => println!("The cached {} data has no area.", kind),
                },
                None => println!("No cached {} data found for the selected location.", kind),
            }
        }
        Command::Locate { location } => {
            let client = Client::new(&config.api)?;
            let resolved = client.get_grid(&location)?;
            println!("{}", location);
            if let Some(place) = resolved.place {
                println!("near {}", place);
            }
            println!(
                "office = {:?}\nx = {}\ny = {}",
                resolved.point.office, resolved.point.x, resolved.point.y
            );
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.web.bind.clone());
            let state = web::AppState::new(&config, cache);
            tokio::runtime::Runtime::new()?.block_on(web::serve(state, &bind))?;
        }
    }

    Ok(())
}

fn known<'a>(config: &'a Config, name: &str) -> Result<&'a nws_forecast::nws::GridPoint, String> {
    config.location(name).ok_or_else(|| {
        format!(
            "unknown location {}, expected one of: {}",
            name,
            config.location_names().join(", ")
        )
    })
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use time::macros::format_description;
use time::Date;
use tracing_subscriber::EnvFilter;

use finlog::config::{CliArgs, Command, Config};
use finlog::export;
use finlog::file_storage::FileKv;
use finlog::forecast::TrendForecaster;
use finlog::report::ReportBuilder;
use finlog::scheduler::{Clock, Scheduler, SystemClock};
use finlog::store::{RecordStore, SearchFilter};
use finlog::sync::{CancellationToken, SimulatedTransport, SyncQueue};
use finlog::tasks;
use finlog_core::{RecordDraft, RecordKind};

fn main() {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = run(cli, &config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: CliArgs, config: &Config) -> Result<(), Box<dyn Error>> {
    let kv = Arc::new(FileKv::new(&config.store.data_dir)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(RecordStore::new(kv, clock.clone(), config.store_config()));

    match cli.command {
        Command::Add {
            date,
            kind,
            amount,
            category,
            description,
        } => {
            let kind: RecordKind = kind.parse()?;
            let draft = RecordDraft::new(parse_date(&date)?, kind, amount, category)
                .with_description(description);
            let record = store.save(draft)?;
            println!(
                "Saved {} {} on {} ({})",
                record.kind, record.amount, record.date, record.id
            );
        }
        Command::List {
            text,
            kind,
            category,
        } => {
            let filter = SearchFilter {
                text,
                kind: kind.map(|k| k.parse()).transpose()?,
                category,
                ..Default::default()
            };
            for r in store.search(&filter)? {
                println!(
                    "{}  {:<8} {:>12}  {}  {}",
                    r.date, r.kind, r.amount, r.category, r.description
                );
            }
        }
        Command::Months { year } => {
            println!("{}", store.year_series(year)?);
        }
        Command::Report { year } => {
            let records = store.get_all()?;
            let report = ReportBuilder::new(config.report_config()).generate(&records, year);
            println!("{}", report);
        }
        Command::Forecast {
            year,
            method,
            periods,
        } => {
            let series = store.year_series(year)?;
            let net = &series.net_by_month()[..series.observed_len()];
            let forecaster = TrendForecaster::new(config.forecast_config());
            let periods = periods.unwrap_or(config.forecast.periods);

            let forecasts = match method.as_str() {
                "linear" => forecaster.linear_forecast(net, periods)?,
                "exponential" => forecaster.exponential_forecast(net, periods)?,
                "seasonal" => {
                    let observations: Vec<(u8, f64)> =
                        net.iter().enumerate().map(|(m, v)| (m as u8, *v)).collect();
                    forecaster.seasonal_forecast(&observations, periods)
                }
                other => return Err(format!("unknown forecast method: {}", other).into()),
            };

            if forecasts.is_empty() {
                println!("Not enough data for a {} forecast", method);
            }
            for fc in &forecasts {
                println!(
                    "+{}: {} (confidence {:.0}%, range {}..{})",
                    fc.period,
                    fc.projected,
                    fc.confidence * 100.0,
                    fc.lower,
                    fc.upper
                );
            }
        }
        Command::Export { year, monthly } => {
            if monthly {
                let year = year.ok_or("--year is required with --monthly")?;
                print!("{}", export::monthly_summary_csv(&store.year_series(year)?));
            } else {
                let mut records = store.get_all()?;
                if let Some(y) = year {
                    records.retain(|r| r.date.year() == y);
                }
                print!("{}", export::records_csv(&records));
            }
        }
        Command::Watch => {
            let queue = Arc::new(SyncQueue::new(
                Arc::new(SimulatedTransport::new(config.sync.failure_rate)),
                config.sync_config(),
            ));
            let mut scheduler = Scheduler::new(clock);
            tasks::register_maintenance(&mut scheduler, store, queue, CancellationToken::new());

            println!("Running maintenance loop; press Ctrl-C to stop.");
            loop {
                scheduler.run_due();
                std::thread::sleep(std::time::Duration::from_secs(30));
            }
        }
    }

    Ok(())
}

fn parse_date(raw: &str) -> Result<Date, Box<dyn Error>> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(Into::into)
}

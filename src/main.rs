use std::sync::Arc;

use timetable_grid::audit::CsvAuditLog;
use timetable_grid::catalog::Catalog;
use timetable_grid::config::Config;
use timetable_grid::display::{print_grid, write_grid_to_file};
use timetable_grid::generator::{AutoGenerator, HttpGenerator, UnconfiguredGenerator};
use timetable_grid::schedule::GridKey;
use timetable_grid::store::CsvStore;
use timetable_grid::{web, ScheduleService};

fn print_usage() {
    println!("Usage:");
    println!("  timetable-grid web [port]                       Start the web server");
    println!("  timetable-grid print <term> <class_level>       Print a class timetable");
    println!("  timetable-grid export <term> <class_level> <file>  Export a class timetable as CSV");
}

fn build_service(config: &Config) -> Result<ScheduleService, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(CsvStore::open(&config.data_dir)?);
    let catalog = Arc::new(Catalog::load_csv(&config.data_dir)?);

    let generator: Arc<dyn AutoGenerator> = match &config.generator_url {
        Some(url) => Arc::new(HttpGenerator::new(url.clone(), config.generator_timeout)?),
        None => {
            log::warn!("GENERATOR_URL not set, auto-generation is disabled");
            Arc::new(UnconfiguredGenerator)
        }
    };
    let audit = Arc::new(CsvAuditLog::new(config.data_dir.join("audit.csv")));

    Ok(ScheduleService::new(store, catalog.clone(), catalog, generator, audit)
        .with_batch_delay(config.batch_delay))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("web") => {
            if let Some(port) = args.get(2).and_then(|p| p.parse::<u16>().ok()) {
                config.port = port;
            }
            let service = Arc::new(build_service(&config)?);
            println!("Starting web server on port {}...", config.port);
            println!("Access the site at http://localhost:{}", config.port);
            web::start_server(&config, service).await?;
        }
        Some("print") if args.len() >= 4 => {
            let service = build_service(&config)?;
            let grid = service
                .view(&args[2], &GridKey::ClassLevel(args[3].clone()))
                .await?;
            print_grid(&grid);
        }
        Some("export") if args.len() >= 5 => {
            let service = build_service(&config)?;
            let grid = service
                .view(&args[2], &GridKey::ClassLevel(args[3].clone()))
                .await?;
            write_grid_to_file(&grid, &args[4])?;
            println!("Timetable for {} saved to {}", args[3], args[4]);
        }
        _ => print_usage(),
    }

    Ok(())
}

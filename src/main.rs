use std::sync::Arc;

use storage_availability::availability::PlanType;
use storage_availability::display::{print_daily, print_diagnosis, print_monthly};
use storage_availability::parser::load_snapshot_dir;
use storage_availability::web::{self, AppState};
use storage_availability::{AvailabilityService, EngineConfig, InMemoryCache, InMemoryStore, ServerConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage:
  storage-availability month <DIY|FULL_SERVICE> <YEAR> <MONTH> [UNITS]
  storage-availability date <DIY|FULL_SERVICE> <YYYY-MM-DD> [UNITS]
  storage-availability explain <YYYY-MM-DD> <HH:MM>
  storage-availability web [PORT]";

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, String> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("missing {}\n{}", name, USAGE))
}

fn units_arg(args: &[String], index: usize) -> Result<u32, String> {
    match args.get(index) {
        Some(raw) => raw.parse().map_err(|e| format!("invalid UNITS '{}': {}", raw, e)),
        None => Ok(1),
    }
}

fn build_service(store: Arc<InMemoryStore>) -> Result<AvailabilityService, Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    Ok(AvailabilityService::new(store, Arc::new(InMemoryCache::new()), config)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(mode) = args.get(1).map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };

    if mode == "web" {
        let server = ServerConfig::from_env(args.get(2).map(String::as_str))?;
        let store = Arc::new(load_snapshot_dir(&server.data_dir)?.into_store());
        let service = build_service(store.clone())?;

        println!("Starting web server on port {}...", server.port);
        println!("Access the API at http://localhost:{}/api/availability", server.port);

        web::start_server(
            server.port,
            AppState {
                service: Arc::new(service),
                store,
                admin_password: server.admin_password,
            },
        )
        .await?;
        return Ok(());
    }

    let store = Arc::new(load_snapshot_dir(ServerConfig::data_dir_from_env())?.into_store());
    let service = build_service(store)?;

    match mode {
        "month" => {
            let plan_type: PlanType = arg(&args, 2, "PLAN")?.parse()?;
            let year = arg(&args, 3, "YEAR")?.parse::<i32>()?;
            let month = arg(&args, 4, "MONTH")?.parse::<u32>()?;
            let units = units_arg(&args, 5)?;
            let response = service.get_monthly_availability(plan_type, year, month, units).await?;
            print_monthly(&response.data, &response.metadata);
        }
        "date" => {
            let plan_type: PlanType = arg(&args, 2, "PLAN")?.parse()?;
            let date = arg(&args, 3, "DATE")?;
            let units = units_arg(&args, 4)?;
            let response = service.get_daily_time_slots(plan_type, date, units).await?;
            print_daily(&response.data, &response.metadata);
        }
        "explain" => {
            let date = arg(&args, 2, "DATE")?;
            let time = arg(&args, 3, "TIME")?;
            let diagnosis = service.explain_slot(date, time).await?;
            print_diagnosis(&diagnosis);
        }
        other => {
            return Err(format!("unknown mode '{}'\n{}", other, USAGE).into());
        }
    }

    Ok(())
}

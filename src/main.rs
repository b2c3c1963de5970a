mod cost;
mod data;
mod driver;
mod error;
mod feasibility;
mod goal;
mod problem;
mod server;
mod solver;
mod state;

use log::error;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr =
        std::env::var("ASSIGNMENT_SOLVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    if let Err(e) = server::run_server(&addr).await {
        error!("Server on {} stopped: {}", addr, e);
        std::process::exit(1);
    }
}

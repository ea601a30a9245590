use envconfig::Envconfig;
use kvr_router::{Config, init_tracing, start_server};

fn main() {
    let worker_threads = std::cmp::max(1, num_cpus::get());
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("cannot build runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(start());
}

async fn start() {
    let conf = match Config::init_from_env() {
        Ok(conf) => conf,
        Err(e) => {
            init_tracing(false);
            tracing::error!("Failed to load config from env: {:?}", e);
            std::process::exit(1);
        }
    };
    init_tracing(conf.json_logs());
    if let Err(e) = start_server(conf).await {
        tracing::error!("Error starting server: {:?}", e);
        std::process::exit(1);
    }
}

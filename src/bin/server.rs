use std::{net::SocketAddr, process::exit};

use clap::Parser;
use log::{error, info, LevelFilter};

use logkv::{
    get_kvstore_data_dir,
    thread_pool::{RayonThreadPool, ThreadPool},
    Bitcask, KvsServer, Result,
};

/// Args for kvs-server
#[derive(Parser)]
#[clap(author, version, about)]
#[clap(propagate_version = true)]
struct ServerArgs {
    /// Server listening address, default is 127.0.0.1:4000
    #[clap(long, value_parser)]
    addr: Option<SocketAddr>,
}

const DEFAULT_ADDR: &str = "127.0.0.1:4000";

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let cli = ServerArgs::parse();
    let addr = cli.addr.unwrap_or(DEFAULT_ADDR.parse().unwrap());

    info!("kvs-server {}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {:?}", addr);

    if let Err(e) = run(addr) {
        error!("{}", e);
        exit(1);
    }
}

fn run(addr: SocketAddr) -> Result<()> {
    let engine = Bitcask::open(get_kvstore_data_dir())?;
    let pool = RayonThreadPool::new(num_cpus::get())?;
    let server = KvsServer::new(engine, pool);
    server.run(addr)
}

//! `snapnet` binary: logging setup, then the clap front end in `SnapNet::cli`.
//!
//!   RUST_LOG=debug snapnet run --processes 5 --topology ring-skip \
//!       --run-secs 10 --verbose --out snaps.jsonl --dot ./snapshots
//!   snapnet audit --file snaps.jsonl

use env_logger::{Builder, Env};
use log::error;

fn main() {
    // info по умолчанию: жизненный цикл раундов; --verbose + debug — каждое сообщение
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match SnapNet::cli::run() {
        Ok(()) => {}
        Err(e) => {
            // несогласованный срез в `audit` тоже сюда: код выхода 1
            error!("snapnet: {:?}", e);
            std::process::exit(1);
        }
    }
}

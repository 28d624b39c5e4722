mod app;
mod collab;
mod config;
mod error;
mod fleet;
mod infer;
mod journal;
mod lists;
mod paths;
mod policy;
mod process;
mod report;
mod scan;
mod snapshot;
mod types;

fn main() {
    std::process::exit(app::run());
}

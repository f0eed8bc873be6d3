//! stetho CLI binary.
//!
//! All logic is in the library; main only invokes cli::run() and maps
//! the returned code to the process exit.

#[tokio::main]
async fn main() {
    let code = stetho::cli::run().await;
    std::process::exit(code);
}

#[tokio::main]
async fn main() {
    if let Err(e) = block_fee_analyser::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

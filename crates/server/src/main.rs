#[tokio::main]
async fn main() {
    multidav::init_tracing();

    if let Err(e) = multidav::run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

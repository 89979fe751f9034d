#[tokio::main]
async fn main() -> std::io::Result<()> {
    conquest_server::run_with_config().await
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    realtime_server::run_with_config().await
}

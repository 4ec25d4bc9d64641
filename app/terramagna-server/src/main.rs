#[tokio::main]
async fn main() -> anyhow::Result<()> {
    terramagna_server_lib::run().await
}

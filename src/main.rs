#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quote_sync_lib::run().await
}

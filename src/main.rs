#[tokio::main]
async fn main() -> eyre::Result<()> {
    subresource_gateway::gateway::run().await
}

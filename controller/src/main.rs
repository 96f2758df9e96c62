#[tokio::main]
async fn main() -> anyhow::Result<()> {
    thermostat_station::host::run().await
}

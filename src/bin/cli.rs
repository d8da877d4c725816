use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fraudwatch::cli::run().await
}

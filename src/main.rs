use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    devtools_dom::cli::app::run().await
}

use anyhow::{Context, Result};
use tokio::sync::OnceCell;
use tracing::info;

use devtools_session::DevToolsSession;

use crate::config::AppConfig;
use crate::page::Page;

/// State shared by every subcommand. The browser connection is opened on
/// first use so commands that fail argument validation never launch one.
pub struct CliContext {
    config: AppConfig,
    start_url: Option<String>,
    page: OnceCell<Page>,
}

impl CliContext {
    pub fn new(config: AppConfig, start_url: Option<String>) -> Self {
        Self {
            config,
            start_url,
            page: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn page(&self) -> Result<&Page> {
        self.page
            .get_or_try_init(|| async {
                let session = DevToolsSession::connect(self.config.session.clone())
                    .await
                    .context("Failed to connect to the browser")?;
                let session_id = session.attach_first_page().await?;
                info!(session_id = %session_id, "attached to page");

                let page = Page::new(session);
                page.enable().await?;
                if let Some(url) = &self.start_url {
                    page.goto(url, self.config.navigation_timeout()).await?;
                }
                Ok::<_, anyhow::Error>(page)
            })
            .await
    }

    pub async fn shutdown(&self) {
        if let Some(page) = self.page.get() {
            page.session().shutdown().await;
        }
    }
}

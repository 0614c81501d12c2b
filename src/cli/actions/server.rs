use crate::api;
use crate::cli::actions::Action;
use anyhow::Result;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            base_url,
        } => {
            // Fail early on a malformed DSN instead of at pool creation.
            Url::parse(&dsn)?;

            let config = api::handlers::auth::AppConfig::new(base_url);

            api::new(port, dsn, config, api::email::EmailWorkerConfig::new()).await?;
        }
    }

    Ok(())
}

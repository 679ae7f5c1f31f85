// `droppy list|add|del`: user database maintenance.

use anyhow::{Context, Result};
use droppy_common::users::{UserDb, UserSummary};
use tracing::info;

use crate::cli::RuntimeConfig;
use crate::{help, output};

pub async fn list(config: &RuntimeConfig) -> Result<()> {
    let users = with_db(config, |db| Ok(db.users())).await?;
    print!("{}", help::render_users(&users));
    Ok(())
}

pub async fn add(config: &RuntimeConfig, user: String, password: String, privileged: bool) -> Result<()> {
    let users = with_db(config, move |db| {
        let created = db.add_or_update(&user, &password, privileged)?;
        db.save()?;
        info!(user = %user, privileged, created, "user saved");
        Ok(db.users())
    })
    .await?;
    print!("{}", help::render_users(&users));
    Ok(())
}

pub async fn del(config: &RuntimeConfig, user: String) -> Result<()> {
    let name = user.clone();
    let (deleted, users) = with_db(config, move |db| {
        let deleted = db.delete(&user);
        if deleted {
            db.save()?;
            info!(user = %user, "user deleted");
        }
        Ok((deleted, db.users()))
    })
    .await?;

    if !deleted {
        output::print_warning(config.color, &format!("user `{name}` does not exist"));
    }
    print!("{}", help::render_users(&users));
    Ok(())
}

/// Load the database off the async runtime and run `f` against it.
async fn with_db<T, F>(config: &RuntimeConfig, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut UserDb) -> Result<T> + Send + 'static,
{
    let path = config.paths.db_file();
    tokio::task::spawn_blocking(move || {
        let mut db = UserDb::load(&path)
            .with_context(|| format!("failed to load user database `{}`", path.display()))?;
        f(&mut db)
    })
    .await
    .context("user database task failed")?
}

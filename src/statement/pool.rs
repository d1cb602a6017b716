//! Persistent link pool (`mysql_pconnect` / `pg_pconnect` semantics).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::link::Link;
use crate::engine::{ConnectionConfig, DatabaseType};
use crate::error::Result;

/// A link shared between callers of the pool
pub type SharedLink = Arc<Mutex<Link>>;

/// Identity of a pooled link
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub engine: DatabaseType,
    pub url: String,
    pub user: Option<String>,
}

impl LinkKey {
    pub fn new(engine: DatabaseType, url: impl Into<String>, user: Option<&str>) -> Self {
        Self { engine, url: url.into(), user: user.map(str::to_string) }
    }

    #[must_use]
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.engine, config.url(), config.user.as_deref())
    }
}

/// A pooled link with its reusability flag, read without locking the link
#[derive(Debug)]
struct PooledLink {
    link: SharedLink,
    reusable: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
pub struct LinkPool {
    links: Mutex<HashMap<LinkKey, PooledLink>>,
}

impl LinkPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pooled link for `key`, connecting when needed.
    ///
    /// With `new_link` a fresh link is always connected and never pooled.
    /// A pooled link that is no longer reusable is replaced.
    pub fn acquire<F>(&self, key: &LinkKey, new_link: bool, connect: F) -> Result<SharedLink>
    where
        F: FnOnce() -> Result<Link>,
    {
        if new_link {
            debug!(engine = %key.engine, url = %key.url, "opening unpooled link");
            return Ok(Arc::new(Mutex::new(connect()?)));
        }

        if let Some(link) = self.reusable(key) {
            return Ok(link);
        }

        debug!(engine = %key.engine, url = %key.url, "opening pooled link");
        let link = connect()?;
        let reusable = link.reusable_flag();
        let link = Arc::new(Mutex::new(link));
        self.links.lock().insert(key.clone(), PooledLink { link: Arc::clone(&link), reusable });
        Ok(link)
    }

    fn reusable(&self, key: &LinkKey) -> Option<SharedLink> {
        let links = self.links.lock();
        let pooled = links.get(key)?;
        if pooled.reusable.load(Ordering::Acquire) {
            Some(Arc::clone(&pooled.link))
        } else {
            debug!(url = %key.url, "pooled link is not reusable, replacing");
            None
        }
    }

    /// Remove a link from the pool; current holders keep their handle
    pub fn release(&self, key: &LinkKey) -> Option<SharedLink> {
        self.links.lock().remove(key).map(|pooled| pooled.link)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }
}

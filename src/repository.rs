use tracing::warn;

use crate::error::RoutePlannerError;
use crate::route::Route;

type Result<T> = std::result::Result<T, RoutePlannerError>;

/// Storage key used by the browser app.
pub const ROUTES_KEY: &str = "mountainRoutes";

/// Where saved routes live. The application owns the read-modify-write
/// cycle: load, compute a new route list, save it back whole.
pub trait RoutesRepository {
    fn load(&self) -> Result<Vec<Route>>;
    fn save(&mut self, routes: &[Route]) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

pub fn routes_to_json(routes: &[Route]) -> Result<String> {
    Ok(serde_json::to_string(routes)?)
}

/// Parse a saved route list. A malformed entry is skipped with a warning
/// instead of failing the whole list; a document that is not a JSON array is
/// an error.
pub fn routes_from_json(json: &str) -> Result<Vec<Route>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut routes = Vec::with_capacity(entries.len());

    for (i, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Route>(entry) {
            Ok(mut route) => {
                route.refresh_metadata();
                routes.push(route);
            }
            Err(e) => warn!(index = i, error = %e, "skipping unreadable saved route"),
        }
    }

    Ok(routes)
}

/// In-process repository holding the serialized form, for native hosts and
/// tests.
#[derive(Debug, Default)]
pub struct MemoryRoutesRepository {
    stored: Option<String>,
}

impl MemoryRoutesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> Option<&str> {
        self.stored.as_deref()
    }
}

impl RoutesRepository for MemoryRoutesRepository {
    fn load(&self) -> Result<Vec<Route>> {
        match &self.stored {
            Some(json) => routes_from_json(json),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, routes: &[Route]) -> Result<()> {
        self.stored = Some(routes_to_json(routes)?);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.stored = None;
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageRoutesRepository;

#[cfg(target_arch = "wasm32")]
mod local_storage {
    use wasm_bindgen::JsValue;
    use web_sys::Storage;

    use super::{ROUTES_KEY, Result, RoutesRepository, routes_from_json, routes_to_json};
    use crate::error::RoutePlannerError;
    use crate::route::Route;

    fn storage_error(e: JsValue) -> RoutePlannerError {
        RoutePlannerError::Storage(e.as_string().unwrap_or_else(|| format!("{e:?}")))
    }

    /// Browser `localStorage` under a single key.
    #[derive(Debug, Clone)]
    pub struct LocalStorageRoutesRepository {
        key: String,
    }

    impl Default for LocalStorageRoutesRepository {
        fn default() -> Self {
            Self::with_key(ROUTES_KEY)
        }
    }

    impl LocalStorageRoutesRepository {
        pub fn with_key(key: impl Into<String>) -> Self {
            Self { key: key.into() }
        }

        fn storage(&self) -> Result<Storage> {
            web_sys::window()
                .ok_or_else(|| RoutePlannerError::Storage("no window".to_string()))?
                .local_storage()
                .map_err(storage_error)?
                .ok_or_else(|| RoutePlannerError::Storage("localStorage unavailable".to_string()))
        }
    }

    impl RoutesRepository for LocalStorageRoutesRepository {
        fn load(&self) -> Result<Vec<Route>> {
            match self.storage()?.get_item(&self.key).map_err(storage_error)? {
                Some(json) => routes_from_json(&json),
                None => Ok(Vec::new()),
            }
        }

        fn save(&mut self, routes: &[Route]) -> Result<()> {
            let json = routes_to_json(routes)?;
            self.storage()?
                .set_item(&self.key, &json)
                .map_err(storage_error)
        }

        fn clear(&mut self) -> Result<()> {
            self.storage()?.remove_item(&self.key).map_err(storage_error)
        }
    }
}

use std::path::Path;

use figment::{
    providers::{Env, Format as _, Json, Serialized, Yaml},
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};
use hookshot_error::ErrorContext as _;
use serde::Serialize;

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .with_error_context(|| format!("Failed to read configuration file '{}'", path.display()))
        .map_err(|e| Error::from(format!("{:#}", e)))
}

/// A configuration source whose data has already been read and parsed.
///
/// Sources are resolved eagerly so that the loader only ever holds plain data, which keeps it `Send + Sync` no matter
/// where the data came from.
pub struct ResolvedProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl ResolvedProvider {
    pub fn from_yaml<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let contents = read_file(path.as_ref())?;
        let data = Yaml::string(&contents).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from("YAML file", path.as_ref()),
        })
    }

    pub fn from_json<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let contents = read_file(path.as_ref())?;
        let data = Json::string(&contents).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from("JSON file", path.as_ref()),
        })
    }

    pub fn from_environment(prefix: &str) -> Result<Self, Error> {
        let env = Env::prefixed(prefix);
        let data = env.data()?;

        Ok(Self {
            data,
            metadata: Metadata::named(format!("environment variables (prefix `{}`)", prefix)),
        })
    }

    pub fn from_values<T>(values: &T) -> Result<Self, Error>
    where
        T: Serialize,
    {
        let data = Serialized::defaults(values).data()?;

        Ok(Self {
            data,
            metadata: Metadata::named("in-memory values"),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.values().all(|dict| dict.is_empty())
    }
}

impl Provider for ResolvedProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}

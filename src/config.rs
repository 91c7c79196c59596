use anyhow::Context;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Settings read from the environment. Each command pulls only what it needs,
/// so a missing `SUPABASE_URL` does not block `score`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub bind: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_connections = match non_empty("PULSE_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PULSE_DB_MAX_CONNECTIONS must be a number, got '{raw}'"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            supabase_url: non_empty("SUPABASE_URL"),
            supabase_key: non_empty("SUPABASE_ANON_KEY"),
            bind: non_empty("PULSE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            max_connections,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the Supabase Postgres connection string")
    }

    pub fn functions(&self) -> anyhow::Result<(&str, &str)> {
        let url = self
            .supabase_url
            .as_deref()
            .context("SUPABASE_URL must be set to call edge functions")?;
        let key = self
            .supabase_key
            .as_deref()
            .context("SUPABASE_ANON_KEY must be set to call edge functions")?;
        Ok((url, key))
    }
}

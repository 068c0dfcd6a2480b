//! Runtime environment injection
//!
//! Captures the deploy-specific build variables once and renders them into a
//! small script that binds a frozen object to a well-known global before any
//! chunk runs. The script is served by a fixed name so a deploy can swap it
//! without touching the content-hashed bundle.

use std::fmt;

/// The variables forwarded to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvKey {
    DeployEnv,
    AppVersion,
    AppSecret,
    GaId,
}

impl EnvKey {
    /// Every key, in emission order
    pub const ALL: [EnvKey; 4] = [
        EnvKey::DeployEnv,
        EnvKey::AppVersion,
        EnvKey::AppSecret,
        EnvKey::GaId,
    ];

    /// Build environment variable (and runtime property) name
    pub fn var_name(&self) -> &'static str {
        match self {
            EnvKey::DeployEnv => "DEPLOY_ENV",
            EnvKey::AppVersion => "APP_VERSION",
            EnvKey::AppSecret => "APP_SECRET",
            EnvKey::GaId => "GA_ID",
        }
    }
}

impl fmt::Display for EnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.var_name())
    }
}

/// Frozen values of every [`EnvKey`]; `None` means "not configured"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    values: [Option<String>; 4],
}

impl EnvSnapshot {
    /// Capture from the process environment
    pub fn capture() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Capture through an arbitrary lookup
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        Self {
            values: EnvKey::ALL.map(|key| lookup(key.var_name())),
        }
    }

    /// Capture from `(name, value)` pairs; unknown names are ignored
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
        Self::from_lookup(|name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
    }

    pub fn get(&self, key: EnvKey) -> Option<&str> {
        self.values[key as usize].as_deref()
    }

    /// `(key, value)` pairs in emission order
    pub fn iter(&self) -> impl Iterator<Item = (EnvKey, Option<&str>)> {
        EnvKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }

    /// Render the environment asset binding the snapshot to `window.<global>`
    pub fn render_script(&self, global: &str) -> String {
        let mut script = format!("window{} = Object.freeze({{\n", property_access(global));

        for (key, value) in self.iter() {
            let literal = match value {
                Some(value) => json_string(value),
                None => "undefined".to_string(),
            };
            script.push_str(&format!("  {}: {},\n", json_string(key.var_name()), literal));
        }

        script.push_str("});\n");
        script
    }
}

/// `.name` for identifiers, `["name"]` otherwise
fn property_access(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if is_identifier {
        format!(".{}", name)
    } else {
        format!("[{}]", json_string(name))
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

//! Store configuration.

/// Configuration for a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix of generated identifiers.
    pub id_prefix: String,
    /// Whether master-locale titles must be unique across categories.
    pub global_titles: bool,
    /// Locale every item is created in.
    pub master_locale: String,
}

impl StoreConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            id_prefix: "blt".to_string(),
            global_titles: false,
            master_locale: "en-us".to_string(),
        }
    }

    /// Sets the identifier prefix.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Makes titles unique across categories.
    pub fn with_global_titles(mut self, global: bool) -> Self {
        self.global_titles = global;
        self
    }

    /// Sets the master locale.
    pub fn with_master_locale(mut self, locale: impl Into<String>) -> Self {
        self.master_locale = locale.into();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.id_prefix, "blt");
        assert_eq!(config.master_locale, "en-us");
        assert!(!config.global_titles);
    }

    #[test]
    fn config_builder() {
        let config = StoreConfig::new()
            .with_id_prefix("ent")
            .with_global_titles(true)
            .with_master_locale("fr-fr");

        assert_eq!(config.id_prefix, "ent");
        assert!(config.global_titles);
        assert_eq!(config.master_locale, "fr-fr");
    }
}

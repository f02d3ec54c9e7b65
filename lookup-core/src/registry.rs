//! Lookup registry.
//!
//! Maps lookup keys to their [`LookupDefinition`]. Seeded once at startup
//! and read-only afterwards, so it is shared behind an `Arc` without locks.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::entities::{LookupDefinition, DEFAULT_CACHE_TTL};
use crate::error::{ConfigError, LookupResult, ValidationError};
use crate::identifier::{validate_lookup_key, MAX_LOOKUP_KEY_LEN};

/// Read-only mapping from lookup key to definition. Keys are
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct LookupRegistry {
    /// Keyed by the ASCII-lowercased lookup key.
    definitions: HashMap<String, LookupDefinition>,
}

/// Accumulates definitions before the registry is frozen.
#[derive(Debug, Default)]
pub struct LookupRegistryBuilder {
    definitions: HashMap<String, LookupDefinition>,
}

impl LookupRegistryBuilder {
    /// Add a definition, rejecting keys that no request could name and
    /// keys already registered in any casing.
    pub fn register(mut self, definition: LookupDefinition) -> Result<Self, ConfigError> {
        if definition.key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "key".to_string(),
            });
        }
        validate_lookup_key(&definition.key, MAX_LOOKUP_KEY_LEN).map_err(invalid_key)?;
        let normalized = definition.key.to_ascii_lowercase();
        if self.definitions.contains_key(&normalized) {
            return Err(ConfigError::DuplicateLookupKey {
                key: definition.key,
            });
        }
        self.definitions.insert(normalized, definition);
        Ok(self)
    }

    pub fn build(self) -> LookupRegistry {
        LookupRegistry {
            definitions: self.definitions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    lookups: Vec<LookupDefinition>,
}

impl LookupRegistry {
    pub fn builder() -> LookupRegistryBuilder {
        LookupRegistryBuilder::default()
    }

    /// Registry seeded with the standard reference-data lookups.
    pub fn with_defaults() -> LookupResult<Self> {
        let hour = DEFAULT_CACHE_TTL;
        let registry = Self::builder()
            // Static data: cached whole, filtered in memory.
            .register(
                LookupDefinition::cached("Countries", "Ref_Country", "IsoCode", "CountryName")?
                    .with_order_by("CountryName")?
                    .with_cache_ttl(hour),
            )?
            .register(
                LookupDefinition::cached("States", "Ref_State", "Id", "StateName")?
                    .with_filter_column("CountryId")?
                    .with_order_by("StateName")?
                    .with_cache_ttl(hour),
            )?
            // Live data: searched and paged in the database.
            .register(
                LookupDefinition::live("MedicalProviders", "MedicalProviders", "Id", "DisplayName")?
                    .with_order_by("DisplayName")?
                    .with_cache_ttl(hour),
            )?
            .register(
                LookupDefinition::live("Users", "AppUsers", "UserId", "FullName")?
                    .with_order_by("FullName")?
                    .with_cache_ttl(hour),
            )?
            .build();
        Ok(registry)
    }

    /// Load definitions from a YAML document of the form
    /// `lookups: [{key, table, id_column, label_column, strategy, ...}]`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let document: RegistryDocument =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::InvalidValue {
                field: "lookups".to_string(),
                value: "<yaml>".to_string(),
                reason: e.to_string(),
            })?;

        let mut builder = Self::builder();
        for definition in document.lookups {
            if definition.cache_ttl == Duration::ZERO {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.cache_ttl_secs", definition.key),
                    value: "0".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            builder = builder.register(definition)?;
        }
        Ok(builder.build())
    }

    /// Check every registered key against a request key-length limit
    /// tighter than [`MAX_LOOKUP_KEY_LEN`].
    pub fn check_keys(&self, max_len: usize) -> Result<(), ConfigError> {
        for key in self.keys() {
            validate_lookup_key(key, max_len).map_err(invalid_key)?;
        }
        Ok(())
    }

    /// Resolve a key, ignoring ASCII case.
    pub fn resolve(&self, key: &str) -> Option<&LookupDefinition> {
        self.definitions.get(&key.to_ascii_lowercase())
    }

    /// Registered keys in their registered casing, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.definitions.values().map(|d| d.key.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn invalid_key(err: ValidationError) -> ConfigError {
    match err {
        ValidationError::InvalidLookupKey { key, reason } => ConfigError::InvalidValue {
            field: "key".to_string(),
            value: key,
            reason,
        },
        other => ConfigError::InvalidValue {
            field: "key".to_string(),
            value: String::new(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LookupStrategy;

    #[test]
    fn test_defaults_registered() {
        let registry = LookupRegistry::with_defaults().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.keys(),
            vec!["Countries", "MedicalProviders", "States", "Users"]
        );
        let states = registry.resolve("States").unwrap();
        assert_eq!(states.strategy, LookupStrategy::Cached);
        assert_eq!(states.filter_column.as_ref().unwrap().as_str(), "CountryId");
        assert_eq!(
            registry.resolve("Users").unwrap().strategy,
            LookupStrategy::LiveSearch
        );
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = LookupRegistry::with_defaults().unwrap();
        let a = registry.resolve("countries").unwrap();
        let b = registry.resolve("COUNTRIES").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key, "Countries");
        assert!(registry.resolve("UnknownX").is_none());
    }

    #[test]
    fn test_duplicate_keys_rejected_in_any_case() {
        let def = LookupDefinition::cached("Countries", "Ref_Country", "IsoCode", "CountryName")
            .unwrap();
        let mut dup = def.clone();
        dup.key = "countries".to_string();
        let err = LookupRegistry::builder()
            .register(def)
            .unwrap()
            .register(dup)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateLookupKey { .. }));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
lookups:
  - key: Countries
    table: Ref_Country
    id_column: IsoCode
    label_column: CountryName
    order_by: CountryName
    strategy: Cached
  - key: Users
    table: AppUsers
    id_column: UserId
    label_column: FullName
    strategy: LiveSearch
    cache_ttl_secs: 60
"#;
        let registry = LookupRegistry::from_yaml_str(yaml).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("countries").unwrap().cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(
            registry.resolve("users").unwrap().cache_ttl,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_register_rejects_unrequestable_keys() {
        let hyphenated =
            LookupDefinition::cached("Medical-Providers", "MedicalProviders", "Id", "DisplayName")
                .unwrap();
        let err = LookupRegistry::builder().register(hyphenated).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref value, .. } if value == "Medical-Providers"
        ));

        let long_key = "K".repeat(MAX_LOOKUP_KEY_LEN + 1);
        let too_long = LookupDefinition::cached(&long_key, "Ref_Country", "IsoCode", "CountryName")
            .unwrap();
        let err = LookupRegistry::builder().register(too_long).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let longest = "K".repeat(MAX_LOOKUP_KEY_LEN);
        let fits = LookupDefinition::cached(&longest, "Ref_Country", "IsoCode", "CountryName")
            .unwrap();
        assert!(LookupRegistry::builder().register(fits).is_ok());
    }

    #[test]
    fn test_from_yaml_rejects_unrequestable_keys() {
        let hyphenated = r#"
lookups:
  - key: Medical-Providers
    table: MedicalProviders
    id_column: Id
    label_column: DisplayName
    strategy: LiveSearch
"#;
        assert!(matches!(
            LookupRegistry::from_yaml_str(hyphenated),
            Err(ConfigError::InvalidValue { .. })
        ));

        let too_long = format!(
            "lookups:\n  - key: {}\n    table: Ref_Country\n    id_column: IsoCode\n    label_column: CountryName\n    strategy: Cached\n",
            "K".repeat(MAX_LOOKUP_KEY_LEN + 1)
        );
        assert!(matches!(
            LookupRegistry::from_yaml_str(&too_long),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_check_keys_against_tighter_limit() {
        let registry = LookupRegistry::with_defaults().unwrap();
        assert!(registry.check_keys(MAX_LOOKUP_KEY_LEN).is_ok());
        // "MedicalProviders" is 16 characters.
        assert!(registry.check_keys(10).is_err());
    }

    #[test]
    fn test_from_yaml_rejects_unsafe_identifiers() {
        let yaml = r#"
lookups:
  - key: Evil
    table: "Users; DROP TABLE Users"
    id_column: Id
    label_column: Name
    strategy: Cached
"#;
        assert!(LookupRegistry::from_yaml_str(yaml).is_err());
    }
}

//! Runtime webhook settings.
//!
//! [`Settings`] is the validated form of the `[webhooks]` config section: hook
//! markers are turned into [`HookSetting`] values and every extension name
//! is resolved against an [`ExtensionRegistry`]. A settings value is
//! immutable; reloading builds a new one and swaps it in a [`ConfigStore`].

mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use hookline_sdk::config::{DENY, RawHook, RawSettings, USE_DEFAULT};
use hookline_sdk::objects::EventKind;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cipher::{CipherError, TokenCipher};
use crate::extensions::{
    ClientParamsBuilder, ErrorHandler, ExtensionRegistry, FilterExtension, HookHandler,
    Serializer, TaskScheduler,
};
use crate::record::ModelRegistry;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {kind} '{name}'")]
    UnknownExtension { kind: &'static str, name: String },

    #[error("invalid hook value '{value}' for '{type_ref}', expected \"default\" or \"deny\"")]
    InvalidHookMarker { type_ref: String, value: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Hook configuration for one event kind.
#[derive(Clone)]
pub enum HookValue {
    Denied,
    UseDefault,
    Custom(Arc<dyn HookHandler>),
}

/// Hook configuration for one model type.
#[derive(Clone)]
pub enum HookSetting {
    Denied,
    UseDefault,
    /// Kinds missing from the map never fire.
    PerKind(HashMap<EventKind, HookValue>),
}

/// What should happen for an event of a given model type and kind.
#[derive(Clone)]
pub enum Hook {
    NotConfigured,
    Denied,
    UseDefault,
    Custom(Arc<dyn HookHandler>),
}

impl Hook {
    pub fn fires(&self) -> bool {
        matches!(self, Hook::UseDefault | Hook::Custom(_))
    }
}

pub struct Settings {
    pub hooks: HashMap<String, HookSetting>,
    /// Applies to every outbound call independently.
    pub timeout: Duration,
    pub cipher_key: Option<String>,
    pub hide_token: bool,
    pub max_response_length: usize,
    pub max_in_flight: usize,
    pub queue_capacity: usize,
    pub models: ModelRegistry,
    pub serializer: Arc<dyn Serializer>,
    pub client_params: Arc<dyn ClientParamsBuilder>,
    pub filter: Arc<dyn FilterExtension>,
    pub error_handler: Arc<dyn ErrorHandler>,
    pub task_scheduler: Arc<dyn TaskScheduler>,
}

impl Settings {
    pub fn resolve(raw: &RawSettings, registry: &ExtensionRegistry) -> Result<Self, ConfigError> {
        if raw.timeout == 0 {
            return Err(invalid("timeout", "must be at least one second"));
        }
        if raw.max_in_flight == 0 {
            return Err(invalid("max_in_flight", "must be positive"));
        }
        if raw.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be positive"));
        }
        if raw.max_response_length < 3 {
            return Err(invalid("max_response_length", "must be at least 3"));
        }

        let mut hooks = HashMap::with_capacity(raw.hooks.len());
        for (type_ref, hook) in &raw.hooks {
            hooks.insert(type_ref.clone(), resolve_hook(type_ref, hook, registry)?);
        }

        let mut models: ModelRegistry = raw.models.iter().cloned().collect();
        for type_ref in raw.hooks.keys() {
            models.register(type_ref.clone());
        }

        Ok(Self {
            hooks,
            timeout: Duration::from_secs(raw.timeout),
            cipher_key: raw.cipher_key.clone(),
            hide_token: raw.hide_token,
            max_response_length: raw.max_response_length,
            max_in_flight: raw.max_in_flight,
            queue_capacity: raw.queue_capacity,
            models,
            serializer: registry.serializer(&raw.serializer)?,
            client_params: registry.client_params(&raw.client_params)?,
            filter: registry.filter(&raw.filter)?,
            error_handler: registry.error_handler(&raw.error_handler)?,
            task_scheduler: registry.scheduler(&raw.task_handler)?,
        })
    }

    /// The hook to run for an event of `kind` on a `type_ref` record.
    pub fn hook_for(&self, type_ref: &str, kind: EventKind) -> Hook {
        match self.hooks.get(type_ref) {
            None => Hook::NotConfigured,
            Some(HookSetting::Denied) => Hook::Denied,
            Some(HookSetting::UseDefault) => Hook::UseDefault,
            Some(HookSetting::PerKind(kinds)) => match kinds.get(&kind) {
                None => Hook::NotConfigured,
                Some(HookValue::Denied) => Hook::Denied,
                Some(HookValue::UseDefault) => Hook::UseDefault,
                Some(HookValue::Custom(handler)) => Hook::Custom(Arc::clone(handler)),
            },
        }
    }

    /// Whether registrations may target `type_ref` at all.
    pub fn allows_registrations(&self, type_ref: &str) -> bool {
        matches!(
            self.hooks.get(type_ref),
            Some(HookSetting::UseDefault | HookSetting::PerKind(_))
        )
    }

    pub fn cipher(&self) -> Result<TokenCipher, CipherError> {
        TokenCipher::from_config(self.cipher_key.as_deref())
    }
}

fn resolve_hook(
    type_ref: &str,
    hook: &RawHook,
    registry: &ExtensionRegistry,
) -> Result<HookSetting, ConfigError> {
    match hook {
        RawHook::Marker(marker) if marker == USE_DEFAULT => Ok(HookSetting::UseDefault),
        RawHook::Marker(marker) if marker == DENY => Ok(HookSetting::Denied),
        RawHook::Marker(other) => Err(ConfigError::InvalidHookMarker {
            type_ref: type_ref.to_string(),
            value: other.clone(),
        }),
        RawHook::PerKind(kinds) => {
            let mut resolved = HashMap::with_capacity(kinds.len());
            for (kind, value) in kinds {
                let value = match value.as_str() {
                    USE_DEFAULT => HookValue::UseDefault,
                    DENY => HookValue::Denied,
                    name => HookValue::Custom(registry.hook(name)?),
                };
                resolved.insert(*kind, value);
            }
            Ok(HookSetting::PerKind(resolved))
        }
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HookContext;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct Audit;

    #[async_trait]
    impl HookHandler for Audit {
        async fn handle(&self, _ctx: HookContext) {}
    }

    fn raw() -> RawSettings {
        let mut user = BTreeMap::new();
        user.insert(EventKind::Create, USE_DEFAULT.to_string());
        user.insert(EventKind::Update, "audit".to_string());
        user.insert(EventKind::Delete, DENY.to_string());

        let mut raw = RawSettings {
            task_handler: "sync".to_string(),
            ..RawSettings::default()
        };
        raw.hooks.insert(
            "shop.models.Order".to_string(),
            RawHook::Marker(USE_DEFAULT.to_string()),
        );
        raw.hooks.insert(
            "shop.models.Secret".to_string(),
            RawHook::Marker(DENY.to_string()),
        );
        raw.hooks
            .insert("auth.models.User".to_string(), RawHook::PerKind(user));
        raw
    }

    fn registry() -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::with_defaults();
        registry.register_hook("audit", Arc::new(Audit));
        registry
    }

    #[test]
    fn test_hook_lookup() {
        let settings = Settings::resolve(&raw(), &registry()).unwrap();

        assert!(matches!(
            settings.hook_for("shop.models.Product", EventKind::Create),
            Hook::NotConfigured
        ));
        assert!(matches!(
            settings.hook_for("shop.models.Secret", EventKind::Create),
            Hook::Denied
        ));
        assert!(matches!(
            settings.hook_for("shop.models.Order", EventKind::M2mClear),
            Hook::UseDefault
        ));
        assert!(matches!(
            settings.hook_for("auth.models.User", EventKind::Create),
            Hook::UseDefault
        ));
        assert!(matches!(
            settings.hook_for("auth.models.User", EventKind::Update),
            Hook::Custom(_)
        ));
        assert!(matches!(
            settings.hook_for("auth.models.User", EventKind::Delete),
            Hook::Denied
        ));
        assert!(!settings.hook_for("auth.models.User", EventKind::M2mAdd).fires());
    }

    #[test]
    fn test_models_include_hook_keys() {
        let mut raw = raw();
        raw.models.push("shop.models.Product".to_string());
        let settings = Settings::resolve(&raw, &registry()).unwrap();
        assert!(settings.models.contains("shop.models.Product"));
        assert!(settings.models.contains("auth.models.User"));
        assert!(settings.allows_registrations("auth.models.User"));
        assert!(!settings.allows_registrations("shop.models.Secret"));
        assert!(!settings.allows_registrations("shop.models.Product"));
    }

    #[test]
    fn test_resolution_errors() {
        let mut unknown_hook = raw();
        unknown_hook.hooks.insert(
            "shop.models.Cart".to_string(),
            RawHook::Marker("sometimes".to_string()),
        );
        assert!(matches!(
            Settings::resolve(&unknown_hook, &registry()),
            Err(ConfigError::InvalidHookMarker { .. })
        ));

        assert!(matches!(
            Settings::resolve(&raw(), &ExtensionRegistry::with_defaults()),
            Err(ConfigError::UnknownExtension { kind: "hook handler", .. })
        ));

        let background = RawSettings::default();
        assert!(matches!(
            Settings::resolve(&background, &registry()),
            Err(ConfigError::UnknownExtension { kind: "task handler", .. })
        ));

        let zero_timeout = RawSettings {
            timeout: 0,
            ..raw()
        };
        assert!(matches!(
            Settings::resolve(&zero_timeout, &registry()),
            Err(ConfigError::InvalidValue { key: "timeout", .. })
        ));
    }

    #[test]
    fn test_cipher_is_decoded_on_demand() {
        let settings = Settings::resolve(&raw(), &registry()).unwrap();
        assert_eq!(settings.cipher().unwrap_err(), CipherError::NotConfigured);

        let with_key = RawSettings {
            cipher_key: Some("l0vavU2k5az8A+OD2jd3oA==".to_string()),
            ..raw()
        };
        let settings = Settings::resolve(&with_key, &registry()).unwrap();
        assert!(settings.cipher().is_ok());
    }
}

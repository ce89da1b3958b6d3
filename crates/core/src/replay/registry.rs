use std::collections::HashMap;

use crate::replay::config::RawConfig;
use crate::replay::replay_source::{ReplayError, ReplaySource};

pub type Constructor = fn(&RawConfig) -> Result<ReplaySource, ReplayError>;

/// Explicit model registry for host integration layers.
///
/// Registration is a call the host makes at startup, not a load-time side
/// effect of linking this crate. Nothing here runs before `main`.
#[derive(Default)]
pub struct ModelRegistry {
    constructors: HashMap<String, Constructor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers a camera model by name. Re-registering a name replaces
    /// the previous constructor.
    pub fn register(&mut self, model: impl Into<String>, constructor: Constructor) {
        let model = model.into();
        log::debug!("registering camera model {model}");
        self.constructors.insert(model, constructor);
    }

    /// Constructs a registered model, or `None` for an unknown name.
    pub fn construct(
        &self,
        model: &str,
        config: &RawConfig,
    ) -> Option<Result<ReplaySource, ReplayError>> {
        self.constructors.get(model).map(|ctor| ctor(config))
    }

    pub fn is_registered(&self, model: &str) -> bool {
        self.constructors.contains_key(model)
    }
}

/// The model name the replay camera is conventionally registered under.
pub const VIDEO_REPLAY_MODEL: &str = "video-replay";

/// Registers the replay camera on `registry` the way a host integration
/// layer is expected to at startup.
pub fn register_video_replay(registry: &mut ModelRegistry) {
    registry.register(VIDEO_REPLAY_MODEL, ReplaySource::new);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_explicit() {
        let mut registry = ModelRegistry::new();
        assert!(!registry.is_registered(VIDEO_REPLAY_MODEL));
        register_video_replay(&mut registry);
        assert!(registry.is_registered(VIDEO_REPLAY_MODEL));
    }

    #[test]
    fn test_unknown_model_returns_none() {
        let registry = ModelRegistry::new();
        assert!(registry
            .construct("no-such-model", &RawConfig::default())
            .is_none());
    }

    #[test]
    fn test_constructing_with_invalid_config_surfaces_error() {
        let mut registry = ModelRegistry::new();
        register_video_replay(&mut registry);
        let result = registry
            .construct(VIDEO_REPLAY_MODEL, &RawConfig::default())
            .unwrap();
        assert!(result.is_err());
    }
}

//! Named, loaded models shared by the request handlers.
//!
//! The registry is filled once at startup and never changes afterwards.
//! Each model has its own mutex so calls into one model are serialized
//! while different models run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ApiError, Result};

use super::backend::{AudioCodec, Discriminator, TextToAudio};

/// Shared handle to a generator.
pub type SharedGenerator = Arc<Mutex<Box<dyn TextToAudio>>>;
/// Shared handle to a codec.
pub type SharedCodec = Arc<Mutex<Box<dyn AudioCodec>>>;
/// Shared handle to a discriminator.
pub type SharedDiscriminator = Arc<Mutex<Box<dyn Discriminator>>>;

/// Loaded models keyed by name.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    generators: Vec<(String, SharedGenerator)>,
    codecs: Vec<(String, SharedCodec)>,
    discriminators: HashMap<String, SharedDiscriminator>,
    discriminator_order: Vec<String>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a generator. A later entry with the same name replaces it.
    pub fn with_generator(mut self, name: &str, model: Box<dyn TextToAudio>) -> Self {
        self.generators.retain(|(n, _)| n != name);
        self.generators
            .push((name.to_string(), Arc::new(Mutex::new(model))));
        self
    }

    /// Adds a codec. A later entry with the same name replaces it.
    pub fn with_codec(mut self, name: &str, model: Box<dyn AudioCodec>) -> Self {
        self.codecs.retain(|(n, _)| n != name);
        self.codecs.push((name.to_string(), Arc::new(Mutex::new(model))));
        self
    }

    /// Adds a discriminator. A later entry with the same name replaces it.
    pub fn with_discriminator(mut self, name: &str, model: Box<dyn Discriminator>) -> Self {
        if !self.discriminators.contains_key(name) {
            self.discriminator_order.push(name.to_string());
        }
        self.discriminators
            .insert(name.to_string(), Arc::new(Mutex::new(model)));
        self
    }

    /// Looks up a generator by name.
    pub fn generator(&self, name: &str) -> Result<SharedGenerator> {
        self.generators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| Arc::clone(m))
            .ok_or_else(|| ApiError::unknown_model(name, "generator"))
    }

    /// Looks up a codec by name.
    pub fn codec(&self, name: &str) -> Result<SharedCodec> {
        self.codecs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| Arc::clone(m))
            .ok_or_else(|| ApiError::unknown_model(name, "codec"))
    }

    /// Looks up a discriminator by name.
    pub fn discriminator(&self, name: &str) -> Result<SharedDiscriminator> {
        self.discriminators
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| ApiError::unknown_model(name, "discriminator"))
    }

    /// Generator then codec names, in registration order.
    pub fn model_names(&self) -> Vec<String> {
        self.generators
            .iter()
            .map(|(n, _)| n.clone())
            .chain(self.codecs.iter().map(|(n, _)| n.clone()))
            .collect()
    }

    /// Discriminator names, in registration order.
    pub fn discriminator_names(&self) -> Vec<String> {
        self.discriminator_order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::fake::{FakeCodec, FakeDiscriminator, FakeGenerator};

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_generator("musicgen", Box::new(FakeGenerator::new(32000)))
            .with_generator("audiogen", Box::new(FakeGenerator::new(16000)))
            .with_codec("encodec", Box::new(FakeCodec::new(24000, true)))
            .with_discriminator("mpd", Box::new(FakeDiscriminator::constant(0.0)))
            .with_discriminator("msd", Box::new(FakeDiscriminator::constant(0.0)))
    }

    #[test]
    fn names_keep_registration_order() {
        let registry = registry();
        assert_eq!(registry.model_names(), vec!["musicgen", "audiogen", "encodec"]);
        assert_eq!(registry.discriminator_names(), vec!["mpd", "msd"]);
    }

    #[test]
    fn lookups_are_kind_specific() {
        let registry = registry();
        assert!(registry.generator("musicgen").is_ok());
        assert!(registry.codec("encodec").is_ok());
        assert_eq!(
            registry.codec("musicgen").err().map(|e| e.code),
            Some(ErrorCode::UnknownModel)
        );
        assert_eq!(
            registry.generator("encodec").err().map(|e| e.code),
            Some(ErrorCode::UnknownModel)
        );
        assert!(registry.discriminator("msstftd").is_err());
    }

    #[test]
    fn re_registering_replaces() {
        let registry = registry().with_codec("encodec", Box::new(FakeCodec::new(16000, false)));
        assert_eq!(registry.model_names(), vec!["musicgen", "audiogen", "encodec"]);
        let codec = registry.codec("encodec").unwrap();
        assert_eq!(codec.blocking_lock().sample_rate(), 16000);
    }
}

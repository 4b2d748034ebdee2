use serde::*;
use std::time::*;

/// Determines what happens when an input layout names an attribute that
/// the program does not have.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributePolicy {
    /// Creating the layout fails with an error.
    #[default]
    Strict,
    /// The attribute is kept without a location and skipped when the layout is used.
    Permissive
}

/// Runtime settings for a bridge and the render loop that drives it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// The import namespace under which bridge functions are offered.
    pub import_module: String,
    /// The surface width passed to the module's `init` export.
    pub surface_width: u32,
    /// The surface height passed to the module's `init` export.
    pub surface_height: u32,
    /// How unresolved attribute names are treated.
    pub attribute_policy: AttributePolicy,
    /// The time between display refreshes.
    pub frame_interval: Duration,
    /// Stops the render loop after this many frames, if set.
    pub max_frames: Option<u64>
}

impl BridgeConfig {
    /// Sets the import namespace.
    pub fn with_import_module(mut self, import_module: impl Into<String>) -> Self {
        self.import_module = import_module.into();
        self
    }

    /// Sets the surface size passed to `init`.
    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.surface_width = width;
        self.surface_height = height;
        self
    }

    /// Sets the unresolved attribute policy.
    pub fn with_attribute_policy(mut self, attribute_policy: AttributePolicy) -> Self {
        self.attribute_policy = attribute_policy;
        self
    }

    /// Sets the time between frames.
    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Limits the number of rendered frames.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            import_module: "env".to_string(),
            surface_width: 800,
            surface_height: 600,
            attribute_policy: AttributePolicy::Strict,
            frame_interval: Duration::from_micros(16_667),
            max_frames: None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = BridgeConfig::default()
            .with_surface_size(320, 240)
            .with_attribute_policy(AttributePolicy::Permissive)
            .with_max_frames(Some(3));

        assert_eq!(config.import_module, "env");
        assert_eq!((config.surface_width, config.surface_height), (320, 240));
        assert_eq!(config.attribute_policy, AttributePolicy::Permissive);
        assert_eq!(config.max_frames, Some(3));
    }
}

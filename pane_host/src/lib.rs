//! Runs sandboxed WASM modules against an object-based graphics API. The
//! module only ever sees integer handles; the host keeps the objects.

use std::sync::*;
use thiserror::*;
use wasm_runtime_layer::*;

pub use crate::bridge::*;
pub use crate::config::*;
pub use crate::driver::*;
pub use crate::graphics::*;
pub use crate::headless::*;
pub use crate::imports::*;
pub use crate::instance::*;
pub use crate::logging::*;
pub use crate::marshal::*;
pub use pane_marshal::*;

/// Services module calls by resolving handles to host objects.
mod bridge;
/// Runtime settings.
mod config;
/// Paces frames and drives a module's render loop.
mod driver;
/// The host graphics abstraction.
mod graphics;
/// An in-memory graphics implementation.
mod headless;
/// The catalog of functions offered to modules.
mod imports;
/// Running module instances.
mod instance;
/// Logger setup.
mod logging;
/// Decodes raw call arguments.
mod marshal;

/// Describes the environment in which modules are run.
pub trait Host: 'static + Sized {
    /// The WASM engine that executes modules.
    type Engine: wasm_runtime_layer::backend::WasmEngine;
    /// The graphics API that modules draw with.
    type Graphics: GraphicsApi;

    /// Creates the engine.
    fn create_engine() -> Self::Engine;
}

/// Loads modules and creates instances of them.
pub struct PaneHost<H: Host> {
    engine: Engine<H::Engine>,
    config: BridgeConfig
}

impl<H: Host> PaneHost<H> {
    /// Creates a new host with the given settings.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            engine: Engine::new(H::create_engine()),
            config
        }
    }

    /// The settings of this host.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Compiles a module and checks that it only imports functions the
    /// bridge provides.
    pub fn load(&self, package: impl std::io::Read) -> Result<PaneModule, PaneError> {
        let module = Module::new(&self.engine, package).map_err(PaneError::from_invalid_module)?;
        let imports = check_imports(&self.engine, &module, &self.config.import_module)?;

        log::debug!("Loaded module importing {} bridge functions", imports.len());
        Ok(PaneModule(Arc::new(PaneModuleInner {
            module,
            imports
        })))
    }

    /// Instantiates a module with a fresh bridge around the given graphics API.
    pub fn instantiate(&self, module: &PaneModule, graphics: H::Graphics) -> Result<PaneInstance<H>, PaneError> {
        PaneInstance::new(&self.engine, module, BridgeContext::new(graphics, &self.config), &self.config)
    }
}

impl<H: Host> std::fmt::Debug for PaneHost<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneHost").field("config", &self.config).finish()
    }
}

/// A compiled module whose imports have been validated.
#[derive(Clone, Debug)]
pub struct PaneModule(Arc<PaneModuleInner>);

impl PaneModule {
    /// The bridge functions the module imports.
    pub fn imports(&self) -> &[BridgeImport] {
        &self.0.imports
    }

    /// The compiled module.
    pub(crate) fn module(&self) -> &Module {
        &self.0.module
    }
}

/// Describes an error that occurred while loading or running a module.
#[derive(Debug, Error)]
pub enum PaneError {
    /// The module could not be compiled or does not fit the bridge.
    #[error("The module was invalid: {0}")]
    InvalidModule(String),
    /// The module lacks a required export.
    #[error("The module is missing export '{0}'")]
    MissingExport(String),
    /// A bridge call made by the module failed.
    #[error("{0}")]
    Bridge(#[from] BridgeError),
    /// The module trapped.
    #[error("{0}")]
    Trap(String)
}

impl PaneError {
    /// Creates an invalid module error from the given message.
    pub fn from_invalid_module(x: impl std::fmt::Display) -> Self {
        Self::InvalidModule(x.to_string())
    }

    /// Creates a trap error from the given message.
    pub fn from_trap(x: impl std::fmt::Display) -> Self {
        Self::Trap(x.to_string())
    }

    /// Whether the module asked to stop by reporting an error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bridge(x) if x.is_fatal())
    }
}

/// Holds the contents of a loaded module.
#[derive(Debug)]
struct PaneModuleInner {
    /// The compiled module.
    pub module: Module,
    /// The bridge functions it imports.
    pub imports: Vec<BridgeImport>
}

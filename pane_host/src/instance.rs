use crate::*;
use wasm_runtime_layer::*;

/// The data a store holds for a running module.
pub struct HostState<G: GraphicsApi> {
    bridge: BridgeContext<G>,
    memory: Option<Memory>,
    /// The error behind the most recent trap raised by a bridge function.
    fault: Option<BridgeError>
}

impl<G: GraphicsApi> HostState<G> {
    /// Creates state around the given bridge.
    pub fn new(bridge: BridgeContext<G>) -> Self {
        Self {
            bridge,
            memory: None,
            fault: None
        }
    }

    /// The bridge.
    pub fn bridge(&self) -> &BridgeContext<G> {
        &self.bridge
    }

    /// Mutably gets the bridge.
    pub fn bridge_mut(&mut self) -> &mut BridgeContext<G> {
        &mut self.bridge
    }

    /// The module's exported memory.
    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }

    /// Remembers the error that is about to be raised as a trap. Only the
    /// first fault of a call is kept.
    pub fn record_fault(&mut self, error: BridgeError) {
        if let Some(previous) = &self.fault {
            log::debug!("Discarding fault '{error}'; '{previous}' is pending");
        }
        else {
            self.fault = Some(error);
        }
    }

    /// Takes the pending fault, if any.
    pub fn take_fault(&mut self) -> Option<BridgeError> {
        self.fault.take()
    }
}

/// A module instance connected to its own bridge.
pub struct PaneInstance<H: Host> {
    store: Store<HostState<H::Graphics>, H::Engine>,
    init: Func,
    render: Func
}

impl<H: Host> PaneInstance<H> {
    /// Instantiates the module and looks up its required exports.
    pub(crate) fn new(engine: &Engine<H::Engine>, module: &PaneModule, bridge: BridgeContext<H::Graphics>, config: &BridgeConfig) -> Result<Self, PaneError> {
        let mut store = Store::new(engine, HostState::new(bridge));
        let imports = link_imports(&mut store, module.imports(), &config.import_module);

        let instance = match Instance::new(&mut store, module.module(), &imports) {
            Ok(instance) => instance,
            Err(error) => return Err(match store.data_mut().take_fault() {
                Some(fault) => PaneError::Bridge(fault),
                None => PaneError::from_invalid_module(error)
            })
        };

        let Some(Extern::Memory(memory)) = instance.get_export(&mut store, "memory") else {
            return Err(PaneError::MissingExport("memory".to_string()))
        };
        store.data_mut().memory = Some(memory);

        let init = Self::export_func(&mut store, &instance, "init", &[ValueType::I32, ValueType::I32])?;
        let render = Self::export_func(&mut store, &instance, "render", &[])?;

        log::debug!("Instantiated module with {} bridge imports", module.imports().len());
        Ok(Self {
            store,
            init,
            render
        })
    }

    /// The bridge of this instance.
    pub fn bridge(&self) -> &BridgeContext<H::Graphics> {
        self.store.data().bridge()
    }

    /// Mutably gets the bridge of this instance.
    pub fn bridge_mut(&mut self) -> &mut BridgeContext<H::Graphics> {
        self.store.data_mut().bridge_mut()
    }

    /// Gets an exported function with no results and the given parameters.
    fn export_func(store: &mut Store<HostState<H::Graphics>, H::Engine>, instance: &Instance, name: &str, params: &[ValueType]) -> Result<Func, PaneError> {
        let Some(Extern::Func(func)) = instance.get_export(&mut *store, name) else {
            return Err(PaneError::MissingExport(name.to_string()))
        };

        let ty = func.ty(&mut *store);
        if ty.params() != params || !ty.results().is_empty() {
            return Err(PaneError::InvalidModule(format!("Export '{name}' has the wrong signature")));
        }

        Ok(func)
    }

    /// Calls an export, preferring the recorded bridge error over the trap
    /// it caused.
    fn call(store: &mut Store<HostState<H::Graphics>, H::Engine>, func: &Func, args: &[Value]) -> Result<(), PaneError> {
        let result = func.call(&mut *store, args, &mut []);
        match store.data_mut().take_fault() {
            Some(fault) => Err(PaneError::Bridge(fault)),
            None => result.map_err(PaneError::from_trap)
        }
    }
}

impl<H: Host> GuestModule for PaneInstance<H> {
    fn init(&mut self, width: u32, height: u32) -> Result<(), PaneError> {
        log::debug!("Initializing module with a {width}x{height} surface");
        Self::call(&mut self.store, &self.init, &[Value::I32(width as i32), Value::I32(height as i32)])
    }

    fn render(&mut self) -> Result<(), PaneError> {
        Self::call(&mut self.store, &self.render, &[])
    }
}

impl<H: Host> std::fmt::Debug for PaneInstance<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneInstance").field("live_objects", &self.bridge().table().len()).finish()
    }
}

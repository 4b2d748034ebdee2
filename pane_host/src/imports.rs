use crate::*;
use wasm_runtime_layer::*;

/// The prefix shared by the names of all bridge imports.
const IMPORT_PREFIX: &str = "platform_";

/// A function that modules may import from the bridge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BridgeImport {
    CreateGraphics,
    CreateShader,
    CreateProgram,
    CreateBuffer,
    DeleteBuffer,
    BindBuffer,
    SetBufferData,
    CreateInputLayout,
    UseInputLayout,
    SetViewport,
    ClearColor,
    UseProgram,
    GetUniformLocation,
    SetUniformFloat,
    SetUniformFloats,
    DrawArrays,
    LogInteger,
    ThrowError
}

impl BridgeImport {
    /// Every import the bridge provides.
    pub const ALL: [Self; 18] = [
        Self::CreateGraphics,
        Self::CreateShader,
        Self::CreateProgram,
        Self::CreateBuffer,
        Self::DeleteBuffer,
        Self::BindBuffer,
        Self::SetBufferData,
        Self::CreateInputLayout,
        Self::UseInputLayout,
        Self::SetViewport,
        Self::ClearColor,
        Self::UseProgram,
        Self::GetUniformLocation,
        Self::SetUniformFloat,
        Self::SetUniformFloats,
        Self::DrawArrays,
        Self::LogInteger,
        Self::ThrowError
    ];

    /// The name under which the import is offered.
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateGraphics => "platform_create_graphics",
            Self::CreateShader => "platform_create_shader",
            Self::CreateProgram => "platform_create_program",
            Self::CreateBuffer => "platform_create_buffer",
            Self::DeleteBuffer => "platform_delete_buffer",
            Self::BindBuffer => "platform_bind_buffer",
            Self::SetBufferData => "platform_set_buffer_data",
            Self::CreateInputLayout => "platform_create_input_layout",
            Self::UseInputLayout => "platform_use_input_layout",
            Self::SetViewport => "platform_set_viewport",
            Self::ClearColor => "platform_clear_color",
            Self::UseProgram => "platform_use_program",
            Self::GetUniformLocation => "platform_get_uniform_location",
            Self::SetUniformFloat => "platform_set_uniform_float",
            Self::SetUniformFloats => "platform_set_uniform_floats",
            Self::DrawArrays => "platform_draw_arrays",
            Self::LogInteger => "platform_log_integer",
            Self::ThrowError => "platform_throw_error"
        }
    }

    /// Looks up an import by name.
    pub fn from_name(name: &str) -> Option<Self> {
        if !name.starts_with(IMPORT_PREFIX) {
            return None;
        }

        Self::ALL.into_iter().find(|x| x.name() == name)
    }

    /// The parameter types of the import.
    pub fn params(self) -> &'static [ValueType] {
        use ValueType::*;

        match self {
            Self::CreateGraphics => &[],
            Self::CreateShader => &[I32, I32, I32],
            Self::CreateProgram => &[I32, I32, I32],
            Self::CreateBuffer => &[I32],
            Self::DeleteBuffer => &[I32, I32],
            Self::BindBuffer => &[I32, I32, I32],
            Self::SetBufferData => &[I32, I32, I32, I32, I32],
            Self::CreateInputLayout => &[I32, I32, I32, I32, I32, I32, I32],
            Self::UseInputLayout => &[I32, I32],
            Self::SetViewport => &[I32, I32, I32],
            Self::ClearColor => &[I32, F32, F32, F32, F32],
            Self::UseProgram => &[I32, I32],
            Self::GetUniformLocation => &[I32, I32, I32],
            Self::SetUniformFloat => &[I32, I32, F32],
            Self::SetUniformFloats => &[I32, I32, I32, I32],
            Self::DrawArrays => &[I32, I32, I32, I32],
            Self::LogInteger => &[I32],
            Self::ThrowError => &[I32]
        }
    }

    /// The result types of the import.
    pub fn results(self) -> &'static [ValueType] {
        match self {
            Self::CreateGraphics
            | Self::CreateShader
            | Self::CreateProgram
            | Self::CreateBuffer
            | Self::CreateInputLayout
            | Self::GetUniformLocation => &[ValueType::I32],
            _ => &[]
        }
    }

    /// The WASM signature of the import.
    pub fn func_type(self) -> FuncType {
        FuncType::new(self.params().iter().copied(), self.results().iter().copied())
    }

    /// Whether servicing the import reads strings or arrays from linear memory.
    pub fn reads_memory(self) -> bool {
        matches!(self, Self::CreateShader
            | Self::SetBufferData
            | Self::CreateInputLayout
            | Self::GetUniformLocation
            | Self::SetUniformFloats
            | Self::ThrowError)
    }
}

impl std::fmt::Display for BridgeImport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks that every import of the module is a bridge function with the
/// expected signature, returning the bridge functions in import order.
pub(crate) fn check_imports<E: backend::WasmEngine>(engine: &Engine<E>, module: &Module, namespace: &str) -> Result<Vec<BridgeImport>, PaneError> {
    let mut result = Vec::new();
    for import in module.imports(engine) {
        if import.module != namespace {
            return Err(PaneError::InvalidModule(format!("Module imported '{}' from unknown namespace '{}'", import.name, import.module)));
        }

        let bridge_import = BridgeImport::from_name(import.name)
            .ok_or_else(|| PaneError::InvalidModule(format!("Module imported unknown function '{}'", import.name)))?;

        let ExternType::Func(func_ty) = import.ty else {
            return Err(PaneError::InvalidModule(format!("Module imported '{}' as a non-function", import.name)))
        };

        if func_ty.params() != bridge_import.params() || func_ty.results() != bridge_import.results() {
            return Err(PaneError::InvalidModule(format!("Module imported '{}' with the wrong signature", import.name)));
        }

        result.push(bridge_import);
    }
    Ok(result)
}

/// Creates host functions for the given imports. Each function decodes its
/// arguments, services them through the bridge and, on failure, records the
/// error in the store before trapping.
pub(crate) fn link_imports<G: GraphicsApi, C: AsContextMut<UserState = HostState<G>>>(mut ctx: C, imports: &[BridgeImport], namespace: &str) -> Imports {
    let mut result = Imports::new();
    for &import in imports {
        let func = Func::new(&mut ctx, import.func_type(), move |mut ctx, args, results| invoke(import, &mut ctx, args, results));
        result.define(namespace, import.name(), Extern::Func(func));
    }
    result
}

fn invoke<G: GraphicsApi, E: backend::WasmEngine>(import: BridgeImport, ctx: &mut StoreContextMut<'_, HostState<G>, E>, args: &[Value], results: &mut [Value]) -> anyhow::Result<()> {
    match service(import, ctx, args) {
        Ok(handle) => {
            if let Some(result) = results.first_mut() {
                *result = Value::I32(handle.unwrap_or(Handle::NULL).into());
            }
            Ok(())
        },
        Err(error) => {
            let message = format!("{import}: {error}");
            ctx.data_mut().record_fault(error);
            Err(anyhow::Error::msg(message))
        }
    }
}

/// Decodes the call while borrowing linear memory, then dispatches it with
/// mutable access to the bridge.
fn service<G: GraphicsApi, E: backend::WasmEngine>(import: BridgeImport, ctx: &mut StoreContextMut<'_, HostState<G>, E>, args: &[Value]) -> Result<Option<Handle>, BridgeError> {
    let memory = ctx.data().memory().cloned();
    if import.reads_memory() && memory.is_none() {
        return Err(BridgeError::MissingMemory);
    }

    let call = decode_call(import, args, &MemoryView::new(LinearMemory::new(memory.as_ref(), ctx.as_context())))?;
    ctx.data_mut().bridge_mut().dispatch(call)
}

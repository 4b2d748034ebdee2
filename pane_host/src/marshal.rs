use crate::*;
use wasm_runtime_layer::*;

const WASM_PAGE_SIZE: usize = 65536;

/// Exposes the exported memory of a running instance as [`GuestMemory`].
/// The view borrows the store, so it cannot outlive the call that made it.
pub struct LinearMemory<'a, C: AsContext> {
    memory: Option<&'a Memory>,
    ctx: C
}

impl<'a, C: AsContext> LinearMemory<'a, C> {
    /// Creates a view of the given memory within the store.
    pub fn new(memory: Option<&'a Memory>, ctx: C) -> Self {
        Self {
            memory,
            ctx
        }
    }
}

impl<'a, C: AsContext> GuestMemory for LinearMemory<'a, C> {
    fn len(&self) -> usize {
        self.memory.map(|memory| memory.current_pages(self.ctx.as_context()) as usize * WASM_PAGE_SIZE).unwrap_or_default()
    }

    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), BridgeError> {
        let memory = self.memory.ok_or(BridgeError::MissingMemory)?;
        memory.read(self.ctx.as_context(), offset, buffer)
            .map_err(|_| BridgeError::OutOfBounds { offset, size: buffer.len(), len: self.len() })
    }
}

/// Reads typed values from the raw arguments of an import call. The
/// arguments have already been checked against the import's signature,
/// so a type mismatch here can only come from a misbehaving engine.
struct Arguments<'a> {
    values: &'a [Value]
}

impl<'a> Arguments<'a> {
    /// Gets an integer argument, reinterpreting its bits as unsigned.
    fn u32(&self, index: usize) -> Result<u32, BridgeError> {
        match self.values.get(index) {
            Some(Value::I32(x)) => Ok(*x as u32),
            _ => Err(BridgeError::invalid_argument(format!("Argument {index} is not an i32")))
        }
    }

    fn f32(&self, index: usize) -> Result<f32, BridgeError> {
        match self.values.get(index) {
            Some(Value::F32(x)) => Ok(*x),
            _ => Err(BridgeError::invalid_argument(format!("Argument {index} is not an f32")))
        }
    }

    fn handle(&self, index: usize) -> Result<Handle, BridgeError> {
        self.u32(index).map(Handle::from_raw)
    }

    fn offset(&self, index: usize) -> Result<usize, BridgeError> {
        self.u32(index).map(|x| x as usize)
    }
}

/// Decodes the raw arguments of an import call into a [`BridgeCall`],
/// copying every string and array it refers to out of linear memory.
pub fn decode_call<M: GuestMemory>(import: BridgeImport, args: &[Value], view: &MemoryView<M>) -> Result<BridgeCall, BridgeError> {
    let args = Arguments { values: args };

    Ok(match import {
        BridgeImport::CreateGraphics => BridgeCall::CreateGraphics,
        BridgeImport::CreateShader => BridgeCall::CreateShader {
            graphics: args.handle(0)?,
            stage: ShaderStage::try_from(args.u32(1)?)?,
            source: view.read_cstring(args.offset(2)?)?
        },
        BridgeImport::CreateProgram => BridgeCall::CreateProgram {
            graphics: args.handle(0)?,
            vertex: args.handle(1)?,
            fragment: args.handle(2)?
        },
        BridgeImport::CreateBuffer => BridgeCall::CreateBuffer { graphics: args.handle(0)? },
        BridgeImport::DeleteBuffer => BridgeCall::DeleteBuffer {
            graphics: args.handle(0)?,
            buffer: args.handle(1)?
        },
        BridgeImport::BindBuffer => BridgeCall::BindBuffer {
            graphics: args.handle(0)?,
            buffer: args.handle(1)?,
            target: BufferTarget::try_from(args.u32(2)?)?
        },
        BridgeImport::SetBufferData => BridgeCall::SetBufferData {
            graphics: args.handle(0)?,
            buffer: args.handle(1)?,
            data: view.read_bytes(args.offset(2)?, args.offset(3)?)?,
            target: BufferTarget::try_from(args.u32(4)?)?
        },
        BridgeImport::CreateInputLayout => {
            let count = args.offset(6)?;
            BridgeCall::CreateInputLayout {
                graphics: args.handle(0)?,
                program: args.handle(1)?,
                elements: read_input_elements(view, args.offset(2)?, args.offset(3)?, args.offset(4)?, count)?,
                stride: args.u32(5)?
            }
        },
        BridgeImport::UseInputLayout => BridgeCall::UseInputLayout {
            graphics: args.handle(0)?,
            layout: args.handle(1)?
        },
        BridgeImport::SetViewport => BridgeCall::SetViewport {
            graphics: args.handle(0)?,
            width: args.u32(1)?,
            height: args.u32(2)?
        },
        BridgeImport::ClearColor => BridgeCall::ClearColor {
            graphics: args.handle(0)?,
            color: [args.f32(1)?, args.f32(2)?, args.f32(3)?, args.f32(4)?]
        },
        BridgeImport::UseProgram => BridgeCall::UseProgram {
            graphics: args.handle(0)?,
            program: args.handle(1)?
        },
        BridgeImport::GetUniformLocation => BridgeCall::GetUniformLocation {
            graphics: args.handle(0)?,
            program: args.handle(1)?,
            name: view.read_cstring(args.offset(2)?)?
        },
        BridgeImport::SetUniformFloat => BridgeCall::SetUniform {
            graphics: args.handle(0)?,
            location: args.handle(1)?,
            value: UniformValue::Float(args.f32(2)?)
        },
        BridgeImport::SetUniformFloats => BridgeCall::SetUniform {
            graphics: args.handle(0)?,
            location: args.handle(1)?,
            value: UniformValue::from_slice(&view.read_array::<f32>(args.offset(2)?, args.offset(3)?)?)?
        },
        BridgeImport::DrawArrays => BridgeCall::DrawArrays {
            graphics: args.handle(0)?,
            primitive: PrimitiveType::try_from(args.u32(1)?)?,
            first: args.u32(2)?,
            count: args.u32(3)?
        },
        BridgeImport::LogInteger => BridgeCall::LogInteger(args.u32(0)?),
        BridgeImport::ThrowError => BridgeCall::ThrowError(view.read_cstring(args.offset(0)?)?)
    })
}

/// Assembles input elements from three parallel arrays of `count` entries:
/// name string offsets, byte offsets and component counts.
fn read_input_elements<M: GuestMemory>(view: &MemoryView<M>, names: usize, offsets: usize, formats: usize, count: usize) -> Result<Vec<InputElement>, BridgeError> {
    let name_offsets = view.read_array::<u32>(names, count)?;
    let offsets = view.read_array::<u32>(offsets, count)?;
    let formats = view.read_array::<u32>(formats, count)?;

    let mut result = Vec::with_capacity(count);
    for ((name, offset), components) in name_offsets.into_iter().zip(offsets).zip(formats) {
        let name = view.read_cstring(name as usize)?;
        if !(1..=4).contains(&components) {
            return Err(BridgeError::invalid_argument(format!("Attribute '{name}' has {components} components; expected 1 to 4")));
        }
        result.push(InputElement { name, offset, components });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a little linear memory image by appending values.
    #[derive(Default)]
    struct Image(Vec<u8>);

    impl Image {
        fn string(&mut self, text: &str) -> u32 {
            let offset = self.0.len() as u32;
            self.0.extend_from_slice(text.as_bytes());
            self.0.push(0);
            offset
        }

        fn words(&mut self, values: &[u32]) -> u32 {
            let offset = self.0.len() as u32;
            for value in values {
                self.0.extend_from_slice(&value.to_le_bytes());
            }
            offset
        }

        fn floats(&mut self, values: &[f32]) -> u32 {
            let offset = self.0.len() as u32;
            for value in values {
                self.0.extend_from_slice(&value.to_le_bytes());
            }
            offset
        }
    }

    fn i32s(values: &[u32]) -> Vec<Value> {
        values.iter().map(|&x| Value::I32(x as i32)).collect()
    }

    #[test]
    fn decodes_input_layout_arrays() {
        let mut image = Image::default();
        let position = image.string("a_position");
        let color = image.string("a_color");
        let names = image.words(&[position, color]);
        let offsets = image.words(&[0, 8]);
        let formats = image.words(&[2, 3]);

        let view = MemoryView::new(&image.0);
        let call = decode_call(BridgeImport::CreateInputLayout, &i32s(&[1, 4, names, offsets, formats, 20, 2]), &view).unwrap();
        assert_eq!(call, BridgeCall::CreateInputLayout {
            graphics: Handle::from_raw(1),
            program: Handle::from_raw(4),
            elements: vec![
                InputElement { name: "a_position".to_string(), offset: 0, components: 2 },
                InputElement { name: "a_color".to_string(), offset: 8, components: 3 }
            ],
            stride: 20
        });
    }

    #[test]
    fn rejects_bad_component_counts() {
        let mut image = Image::default();
        let name = image.string("a_weird");
        let names = image.words(&[name]);
        let offsets = image.words(&[0]);
        let formats = image.words(&[5]);

        let view = MemoryView::new(&image.0);
        let result = decode_call(BridgeImport::CreateInputLayout, &i32s(&[1, 2, names, offsets, formats, 20, 1]), &view);
        assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn buffer_data_is_copied_verbatim() {
        let mut image = Image::default();
        let data = image.floats(&[-0.5, 0.5, 1.0]);
        let view = MemoryView::new(&image.0);

        let call = decode_call(BridgeImport::SetBufferData, &i32s(&[1, 3, data, 12, 0x8892]), &view).unwrap();
        let BridgeCall::SetBufferData { data, target, .. } = call else { panic!("wrong call") };
        assert_eq!(target, BufferTarget::Array);
        assert_eq!(data, image.0);

        let result = decode_call(BridgeImport::SetBufferData, &i32s(&[1, 3, 4, 12, 0x8892]), &view);
        assert!(matches!(result, Err(BridgeError::OutOfBounds { offset: 4, size: 12, len: 12 })));
    }

    #[test]
    fn decodes_uniform_arrays() {
        let mut image = Image::default();
        let values = image.floats(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let view = MemoryView::new(&image.0);

        let call = decode_call(BridgeImport::SetUniformFloats, &i32s(&[1, 7, values, 9]), &view).unwrap();
        assert!(matches!(call, BridgeCall::SetUniform { value: UniformValue::Mat3(_), .. }));

        let result = decode_call(BridgeImport::SetUniformFloats, &i32s(&[1, 7, values, 5]), &view);
        assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn decodes_float_arguments() {
        let view = MemoryView::new(Vec::<u8>::new());
        let args = [Value::I32(1), Value::F32(0.1), Value::F32(0.2), Value::F32(0.3), Value::F32(1.0)];
        let call = decode_call(BridgeImport::ClearColor, &args, &view).unwrap();
        assert_eq!(call, BridgeCall::ClearColor { graphics: Handle::from_raw(1), color: [0.1, 0.2, 0.3, 1.0] });
    }

    #[test]
    fn unknown_enum_codes_are_rejected() {
        let view = MemoryView::new(Vec::<u8>::new());
        let result = decode_call(BridgeImport::DrawArrays, &i32s(&[1, 9, 0, 3]), &view);
        assert!(matches!(result, Err(BridgeError::InvalidEnum { value: 9, .. })));

        let result = decode_call(BridgeImport::BindBuffer, &i32s(&[1, 2, 0x1234]), &view);
        assert!(matches!(result, Err(BridgeError::InvalidEnum { .. })));
    }

    #[test]
    fn negative_integers_keep_their_bits() {
        let view = MemoryView::new(Vec::<u8>::new());
        let call = decode_call(BridgeImport::LogInteger, &[Value::I32(-1)], &view).unwrap();
        assert_eq!(call, BridgeCall::LogInteger(u32::MAX));
    }

    #[test]
    fn strings_are_read_from_memory() {
        let mut image = Image::default();
        image.string("padding");
        let message = image.string("shader failed");
        let view = MemoryView::new(&image.0);

        let call = decode_call(BridgeImport::ThrowError, &i32s(&[message]), &view).unwrap();
        assert_eq!(call, BridgeCall::ThrowError("shader failed".to_string()));

        let result = decode_call(BridgeImport::ThrowError, &i32s(&[1000]), &view);
        assert!(matches!(result, Err(BridgeError::InvalidOffset { offset: 1000, .. })));
    }
}

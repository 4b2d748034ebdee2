use crate::*;

/// The pipeline stage that a shader is compiled for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderStage {
    Fragment = 0x8B30,
    Vertex = 0x8B31
}

impl ShaderStage {
    /// The code a module passes for this stage.
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for ShaderStage {
    type Error = BridgeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x8B30 => Ok(Self::Fragment),
            0x8B31 => Ok(Self::Vertex),
            _ => Err(BridgeError::InvalidEnum { kind: "shader stage", value })
        }
    }
}

/// The binding point a buffer is attached to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BufferTarget {
    Array = 0x8892,
    ElementArray = 0x8893
}

impl BufferTarget {
    /// The code a module passes for this target.
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for BufferTarget {
    type Error = BridgeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x8892 => Ok(Self::Array),
            0x8893 => Ok(Self::ElementArray),
            _ => Err(BridgeError::InvalidEnum { kind: "buffer target", value })
        }
    }
}

/// How consecutive vertices are assembled into primitives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveType {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6
}

impl PrimitiveType {
    /// The code a module passes for this primitive type.
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for PrimitiveType {
    type Error = BridgeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Points),
            1 => Ok(Self::Lines),
            2 => Ok(Self::LineLoop),
            3 => Ok(Self::LineStrip),
            4 => Ok(Self::Triangles),
            5 => Ok(Self::TriangleStrip),
            6 => Ok(Self::TriangleFan),
            _ => Err(BridgeError::InvalidEnum { kind: "primitive type", value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_webgl() {
        assert_eq!(ShaderStage::try_from(0x8B31).unwrap(), ShaderStage::Vertex);
        assert_eq!(BufferTarget::Array.code(), 0x8892);
        assert_eq!(PrimitiveType::try_from(4).unwrap(), PrimitiveType::Triangles);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert!(matches!(ShaderStage::try_from(0), Err(BridgeError::InvalidEnum { kind: "shader stage", value: 0 })));
        assert!(matches!(BufferTarget::try_from(0x8B30), Err(BridgeError::InvalidEnum { .. })));
        assert!(matches!(PrimitiveType::try_from(7), Err(BridgeError::InvalidEnum { .. })));
    }
}

//! The small type lattice shared by the AST, the linear IR and the
//! backend. The only scalar value type is the 4-byte integer; `Bool` is
//! the 1-bit result of a comparison and never reaches memory.

/// Size in bytes of the supported scalar type.
pub const WORD_SIZE: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Void,
    Int,
    /// Comparison result (i1). Materialized to a canonical 0/1 integer by
    /// the lowering engine's bool-to-int primitive before it is used as a
    /// value.
    Bool,
    Array(ArrayType),
    /// A computed element address.
    Pointer,
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    /// Storage size in bytes.
    pub fn size(&self) -> i32 {
        match self {
            Type::Void => 0,
            Type::Int | Type::Bool | Type::Pointer => WORD_SIZE,
            Type::Array(array) => array.size(),
        }
    }
}

/// Element type plus ordered per-dimension extents, row-major. A zero
/// leading extent marks the elided first dimension of an array parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub element: Box<Type>,
    pub dims: Vec<i32>,
}

impl ArrayType {
    pub fn new(element: Type, dims: Vec<i32>) -> Self {
        Self {
            element: Box::new(element),
            dims,
        }
    }

    pub fn size(&self) -> i32 {
        self.dims.iter().product::<i32>() * self.element.size()
    }

    /// Whether this is a parameter array whose leading extent was elided.
    pub fn is_unsized(&self) -> bool {
        self.dims.first() == Some(&0)
    }
}

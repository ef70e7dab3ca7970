use half::{bf16, f16};

use crate::dtype::DType;
use crate::element::Element;
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Borrowed element buffer, tagged with its data type.
#[derive(Debug, Clone, Copy)]
pub enum TensorData<'a> {
    F32(&'a [f32]),
    F16(&'a [f16]),
    BF16(&'a [bf16]),
}

/// Mutably borrowed element buffer, tagged with its data type.
#[derive(Debug)]
pub enum TensorDataMut<'a> {
    F32(&'a mut [f32]),
    F16(&'a mut [f16]),
    BF16(&'a mut [bf16]),
}

impl TensorData<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F16(_) => DType::F16,
            TensorData::BF16(_) => DType::BF16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(s) => s.len(),
            TensorData::F16(s) => s.len(),
            TensorData::BF16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TensorDataMut<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            TensorDataMut::F32(_) => DType::F32,
            TensorDataMut::F16(_) => DType::F16,
            TensorDataMut::BF16(_) => DType::BF16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorDataMut::F32(s) => s.len(),
            TensorDataMut::F16(s) => s.len(),
            TensorDataMut::BF16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Conversion from a typed slice into the tagged buffer enums.
pub trait ViewElement: Element {
    fn wrap(slice: &[Self]) -> TensorData<'_>;
    fn wrap_mut(slice: &mut [Self]) -> TensorDataMut<'_>;
    fn extract<'a>(data: TensorData<'a>) -> Option<&'a [Self]>;
    fn extract_mut<'a, 'b>(data: &'b mut TensorDataMut<'a>) -> Option<&'b mut [Self]>;
}

macro_rules! impl_view_element {
    ($ty:ty, $variant:ident) => {
        impl ViewElement for $ty {
            fn wrap(slice: &[Self]) -> TensorData<'_> {
                TensorData::$variant(slice)
            }

            fn wrap_mut(slice: &mut [Self]) -> TensorDataMut<'_> {
                TensorDataMut::$variant(slice)
            }

            fn extract<'a>(data: TensorData<'a>) -> Option<&'a [Self]> {
                match data {
                    TensorData::$variant(s) => Some(s),
                    _ => None,
                }
            }

            fn extract_mut<'a, 'b>(data: &'b mut TensorDataMut<'a>) -> Option<&'b mut [Self]> {
                match data {
                    TensorDataMut::$variant(s) => Some(&mut **s),
                    _ => None,
                }
            }
        }
    };
}

impl_view_element!(f32, F32);
impl_view_element!(f16, F16);
impl_view_element!(bf16, BF16);

fn check_len(shape: &Shape, len: usize) -> Result<()> {
    if len != shape.numel() {
        return Err(TensorError::LengthMismatch {
            shape: shape.dims().to_vec(),
            expected: shape.numel(),
            got: len,
        });
    }
    Ok(())
}

fn dtype_mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

/// A read-only, non-owning tensor: a contiguous row-major buffer plus shape.
///
/// Kernels never allocate or free tensor storage; the caller owns the buffer
/// and the view only borrows it for the duration of a call.
#[derive(Debug, Clone)]
pub struct TensorView<'a> {
    data: TensorData<'a>,
    shape: Shape,
}

impl<'a> TensorView<'a> {
    /// Wraps `data` with `shape`, checking that the element counts agree.
    pub fn new<T: ViewElement>(data: &'a [T], shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        check_len(&shape, data.len())?;
        Ok(TensorView {
            data: T::wrap(data),
            shape,
        })
    }

    /// Wraps an already tagged buffer.
    pub fn from_data(data: TensorData<'a>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        check_len(&shape, data.len())?;
        Ok(TensorView { data, shape })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn data(&self) -> TensorData<'a> {
        self.data
    }

    /// Typed access to the buffer.
    pub fn as_slice<T: ViewElement>(&self) -> Result<&'a [T]> {
        T::extract(self.data).ok_or_else(|| dtype_mismatch(T::DTYPE, self.dtype()))
    }

    /// Same buffer under a different shape with the same element count.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<TensorView<'a>> {
        let shape = shape.into();
        if shape.numel() != self.shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: shape.dims().to_vec(),
            });
        }
        Ok(TensorView {
            data: self.data,
            shape,
        })
    }
}

/// A writable, non-owning tensor view.
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    data: TensorDataMut<'a>,
    shape: Shape,
}

impl<'a> TensorViewMut<'a> {
    /// Wraps `data` with `shape`, checking that the element counts agree.
    pub fn new<T: ViewElement>(data: &'a mut [T], shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        check_len(&shape, data.len())?;
        Ok(TensorViewMut {
            data: T::wrap_mut(data),
            shape,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn data_mut(&mut self) -> &mut TensorDataMut<'a> {
        &mut self.data
    }

    /// Typed mutable access to the buffer.
    pub fn as_mut_slice<T: ViewElement>(&mut self) -> Result<&mut [T]> {
        let got = self.data.dtype();
        T::extract_mut(&mut self.data).ok_or_else(|| dtype_mismatch(T::DTYPE, got))
    }
}

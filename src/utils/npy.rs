/// NumPy `.npy` reader and writer
///
/// Reads format versions 1.0, 2.0 and 3.0 holding a plain numeric or boolean
/// dtype and converts every element to f64. Fortran-ordered data is
/// transposed to row-major on load. Writing always produces a version 1.0
/// little-endian float64 file.
use crate::compare::value::{element_count, NdArray};
use crate::config::types::{GradeError, Result};
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Float,
    Signed,
    Unsigned,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dtype {
    kind: Kind,
    size: usize,
    endian: Endian,
}

#[derive(Debug)]
struct Header {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Read an `.npy` file into a row-major float64 array
pub fn read_npy(path: &Path) -> Result<NdArray> {
    let bytes = std::fs::read(path)?;
    decode_npy(&bytes).map_err(|e| match e {
        GradeError::Npy(msg) => GradeError::Npy(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Decode `.npy` bytes
pub fn decode_npy(bytes: &[u8]) -> Result<NdArray> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(GradeError::Npy("missing NUMPY magic".to_string()));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => {
            let raw = bytes
                .get(8..10)
                .ok_or_else(|| GradeError::Npy("truncated header length".to_string()))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = bytes
                .get(8..12)
                .ok_or_else(|| GradeError::Npy("truncated header length".to_string()))?;
            (
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                12,
            )
        }
        other => {
            return Err(GradeError::Npy(format!(
                "unsupported format version {}.{}",
                other, bytes[7]
            )))
        }
    };

    let header_end = header_start + header_len;
    let header_bytes = bytes
        .get(header_start..header_end)
        .ok_or_else(|| GradeError::Npy("truncated header".to_string()))?;
    // v1/v2 headers are latin-1, v3 is utf-8; the keys we read are ascii either way
    let header_text = String::from_utf8_lossy(header_bytes);
    let header = parse_header(&header_text)?;

    let count = element_count(&header.shape)?;
    let payload = &bytes[header_end..];
    let needed = count
        .checked_mul(header.dtype.size)
        .ok_or_else(|| GradeError::Npy("array too large".to_string()))?;
    if payload.len() != needed {
        return Err(GradeError::Npy(format!(
            "expected {} data bytes for shape {:?}, found {}",
            needed,
            header.shape,
            payload.len()
        )));
    }

    let values: Vec<f64> = payload
        .chunks_exact(header.dtype.size)
        .map(|chunk| decode_element(chunk, header.dtype))
        .collect();

    let data = if header.fortran_order && header.shape.len() > 1 {
        fortran_to_c(&values, &header.shape)
    } else {
        values
    };

    NdArray::new(header.shape, data)
}

/// Encode a float64 array as a version 1.0 `.npy` file
pub fn encode_npy(array: &NdArray) -> Vec<u8> {
    let shape = match array.shape() {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape
    );
    // pad so that magic + version + length + header is a multiple of 64
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(unpadded + padding + array.len() * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in array.data() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Write an array to an `.npy` file
pub fn write_npy(path: &Path, array: &NdArray) -> Result<()> {
    std::fs::write(path, encode_npy(array))?;
    Ok(())
}

fn parse_header(text: &str) -> Result<Header> {
    let descr = dict_value(text, "descr")?;
    let descr = descr
        .strip_prefix('\'')
        .and_then(|d| d.split('\'').next())
        .or_else(|| descr.strip_prefix('"').and_then(|d| d.split('"').next()))
        .ok_or_else(|| {
            GradeError::Npy(format!("unsupported dtype descriptor: {}", descr.trim()))
        })?;
    let dtype = parse_dtype(descr)?;

    let fortran = dict_value(text, "fortran_order")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err(GradeError::Npy("fortran_order is not a boolean".to_string()));
    };

    let shape_text = dict_value(text, "shape")?;
    let inner = shape_text
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| GradeError::Npy("shape is not a tuple".to_string()))?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| GradeError::Npy(format!("invalid shape dimension: {}", s)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Header {
        dtype,
        fortran_order,
        shape,
    })
}

/// Text following `'key':` in the header dict
fn dict_value<'a>(text: &'a str, key: &str) -> Result<&'a str> {
    for quote in ['\'', '"'] {
        let needle = format!("{q}{key}{q}", q = quote);
        if let Some(pos) = text.find(&needle) {
            let rest = &text[pos + needle.len()..];
            if let Some(value) = rest.trim_start().strip_prefix(':') {
                return Ok(value.trim_start());
            }
        }
    }
    Err(GradeError::Npy(format!("header has no '{}' entry", key)))
}

fn parse_dtype(descr: &str) -> Result<Dtype> {
    let unsupported = || GradeError::Npy(format!("unsupported dtype: {}", descr));
    let mut chars = descr.chars();
    let order = chars.next().ok_or_else(unsupported)?;
    let endian = match order {
        '<' | '|' => Endian::Little,
        '>' => Endian::Big,
        '=' if cfg!(target_endian = "big") => Endian::Big,
        '=' => Endian::Little,
        _ => return Err(unsupported()),
    };
    let kind = match chars.next() {
        Some('f') => Kind::Float,
        Some('i') => Kind::Signed,
        Some('u') => Kind::Unsigned,
        Some('b') => Kind::Bool,
        _ => return Err(unsupported()),
    };
    let size: usize = chars.as_str().parse().map_err(|_| unsupported())?;

    let supported = match kind {
        Kind::Float => matches!(size, 4 | 8),
        Kind::Signed | Kind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        Kind::Bool => size == 1,
    };
    if !supported {
        return Err(unsupported());
    }

    Ok(Dtype { kind, size, endian })
}

fn decode_element(chunk: &[u8], dtype: Dtype) -> f64 {
    let mut buf = [0u8; 8];
    buf[..chunk.len()].copy_from_slice(chunk);
    if dtype.endian == Endian::Big {
        buf[..chunk.len()].reverse();
    }
    // buf now holds the element little-endian in its low bytes
    match (dtype.kind, dtype.size) {
        (Kind::Float, 8) => f64::from_le_bytes(buf),
        (Kind::Float, _) => f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
        (Kind::Signed, 1) => buf[0] as i8 as f64,
        (Kind::Signed, 2) => i16::from_le_bytes([buf[0], buf[1]]) as f64,
        (Kind::Signed, 4) => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
        (Kind::Signed, _) => i64::from_le_bytes(buf) as f64,
        (Kind::Unsigned, _) => u64::from_le_bytes(buf) as f64,
        (Kind::Bool, _) => {
            if buf[0] != 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Reorder column-major values into row-major order
fn fortran_to_c(values: &[f64], shape: &[usize]) -> Vec<f64> {
    let mut f_strides = vec![1usize; shape.len()];
    for axis in 1..shape.len() {
        f_strides[axis] = f_strides[axis - 1] * shape[axis - 1];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut index = vec![0usize; shape.len()];
    for _ in 0..values.len() {
        let offset: usize = index.iter().zip(&f_strides).map(|(i, s)| i * s).sum();
        out.push(values[offset]);
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

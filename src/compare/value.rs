//! Numeric value comparison
//!
//! Element-wise absolute-tolerance equality over broadcast-compatible
//! float64 arrays.

use crate::config::types::{GradeError, Result};

/// Number of elements in an array of `shape`; errors instead of overflowing
pub fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| GradeError::Npy(format!("shape {:?} is too large", shape)))
}

/// Dense row-major float64 array
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    /// Build an array, checking that `data` fills `shape` exactly
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(GradeError::Npy(format!(
                "shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Zero-dimensional array
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result value as extracted from a submission
#[derive(Debug, Clone, PartialEq)]
pub enum StudentValue {
    Present(NdArray),
    /// The result name was never bound
    Missing,
    /// Bound, but not convertible to a numeric array
    Unconvertible(String),
}

/// Broadcast two shapes with numpy rules, or `None` if incompatible
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = dim_from_end(a, rank - 1 - i);
        let db = dim_from_end(b, rank - 1 - i);
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

// Dimension `back` places from the end, or 1 when the shape is shorter
fn dim_from_end(shape: &[usize], back: usize) -> usize {
    if back < shape.len() {
        shape[shape.len() - 1 - back]
    } else {
        1
    }
}

/// Row-major strides for `shape` as seen under broadcasting to `rank`
/// dimensions; broadcast dimensions get stride 0.
fn broadcast_strides(shape: &[usize], target: &[usize]) -> Vec<usize> {
    let rank = target.len();
    let mut strides = vec![0; rank];
    let mut stride = 1;
    for back in 0..rank {
        let axis = rank - 1 - back;
        let dim = dim_from_end(shape, back);
        strides[axis] = if dim == 1 && target[axis] != 1 { 0 } else { stride };
        stride *= dim;
    }
    strides
}

fn elements_close(a: f64, b: f64, tolerance: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= tolerance
}

/// True when every broadcast element pair differs by at most `tolerance`.
///
/// Incompatible shapes never match. Arrays that broadcast to zero elements
/// match vacuously.
pub fn arrays_match(student: &NdArray, reference: &NdArray, tolerance: f64) -> bool {
    let Some(shape) = broadcast_shape(&student.shape, &reference.shape) else {
        return false;
    };
    let Ok(total) = element_count(&shape) else {
        return false;
    };
    if total == 0 {
        return true;
    }

    let s_strides = broadcast_strides(&student.shape, &shape);
    let r_strides = broadcast_strides(&reference.shape, &shape);

    let mut index = vec![0usize; shape.len()];
    for _ in 0..total {
        let s_off: usize = index.iter().zip(&s_strides).map(|(i, s)| i * s).sum();
        let r_off: usize = index.iter().zip(&r_strides).map(|(i, s)| i * s).sum();
        if !elements_close(student.data[s_off], reference.data[r_off], tolerance) {
            return false;
        }

        // advance the row-major multi-index
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    true
}

/// Compare an extracted value against the reference result
pub fn values_match(student: &StudentValue, reference: &NdArray, tolerance: f64) -> bool {
    match student {
        StudentValue::Present(array) => arrays_match(array, reference, tolerance),
        StudentValue::Missing | StudentValue::Unconvertible(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_checks_element_count() {
        assert!(NdArray::new(vec![2, 3], vec![0.0; 6]).is_ok());
        assert!(NdArray::new(vec![2, 3], vec![0.0; 5]).is_err());
        assert_eq!(NdArray::new(vec![], vec![1.0]).unwrap(), NdArray::scalar(1.0));
    }

    #[test]
    fn test_overflowing_shape_is_an_error() {
        assert_eq!(element_count(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(element_count(&[]).unwrap(), 1);
        assert!(matches!(
            element_count(&[usize::MAX, 2]),
            Err(GradeError::Npy(_))
        ));
        assert!(NdArray::new(vec![usize::MAX, 2], vec![0.0]).is_err());
    }

    #[test]
    fn test_within_tolerance() {
        let reference = NdArray::from_vec(vec![1.0, 2.0, 3.0]);
        let student = StudentValue::Present(NdArray::from_vec(vec![1.00001, 2.0, 3.0]));
        assert!(values_match(&student, &reference, 1e-4));
    }

    #[test]
    fn test_outside_tolerance() {
        let reference = NdArray::from_vec(vec![1.0, 2.0, 3.0]);
        let student = StudentValue::Present(NdArray::from_vec(vec![1.001, 2.0, 3.0]));
        assert!(!values_match(&student, &reference, 1e-4));
    }

    #[test]
    fn test_missing_and_unconvertible_never_match() {
        let reference = NdArray::from_vec(vec![1.0]);
        assert!(!values_match(&StudentValue::Missing, &reference, 1.0));
        assert!(!values_match(
            &StudentValue::Unconvertible("str".to_string()),
            &reference,
            1.0
        ));
    }

    #[test]
    fn test_scalar_broadcasts_against_vector() {
        let reference = NdArray::from_vec(vec![2.0, 2.0, 2.0]);
        assert!(arrays_match(&NdArray::scalar(2.0), &reference, 0.0));
        assert!(!arrays_match(&NdArray::scalar(3.0), &reference, 0.0));
    }

    #[test]
    fn test_row_broadcasts_against_matrix() {
        let row = NdArray::new(vec![1, 3], vec![1.0, 2.0, 3.0]).unwrap();
        let matrix = NdArray::new(vec![2, 3], vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]).unwrap();
        assert!(arrays_match(&row, &matrix, 0.0));

        let column = NdArray::new(vec![2, 1], vec![1.0, 5.0]).unwrap();
        let expected = NdArray::new(vec![2, 2], vec![1.0, 1.0, 5.0, 5.0]).unwrap();
        assert!(arrays_match(&column, &expected, 0.0));
    }

    #[test]
    fn test_incompatible_shapes() {
        let a = NdArray::from_vec(vec![1.0, 2.0]);
        let b = NdArray::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(!arrays_match(&a, &b, 10.0));
        assert_eq!(broadcast_shape(&[2], &[3]), None);
        assert_eq!(broadcast_shape(&[4, 1], &[3]), Some(vec![4, 3]));
    }

    #[test]
    fn test_nan_and_infinity() {
        let nan = NdArray::scalar(f64::NAN);
        assert!(!arrays_match(&nan, &nan, 1.0));

        let inf = NdArray::scalar(f64::INFINITY);
        let neg = NdArray::scalar(f64::NEG_INFINITY);
        assert!(arrays_match(&inf, &inf, 0.0));
        assert!(!arrays_match(&inf, &neg, f64::MAX));
        assert!(!arrays_match(&inf, &NdArray::scalar(1e308), 1e308));
    }

    #[test]
    fn test_empty_arrays_match() {
        let empty = NdArray::from_vec(Vec::new());
        assert!(arrays_match(&empty, &empty, 0.0));
    }

    proptest! {
        #[test]
        fn prop_value_matches_itself(data in prop::collection::vec(-1e6f64..1e6, 0..32), tol in 0.0f64..1.0) {
            let a = NdArray::from_vec(data);
            prop_assert!(arrays_match(&a, &a, tol));
        }

        #[test]
        fn prop_shift_within_tolerance_matches(data in prop::collection::vec(-1e3f64..1e3, 1..16), shift in 0.0f64..1e-5) {
            let reference = NdArray::from_vec(data.clone());
            let student = NdArray::from_vec(data.iter().map(|x| x + shift).collect());
            prop_assert!(arrays_match(&student, &reference, 1e-4));
        }

        #[test]
        fn prop_one_element_beyond_tolerance_fails(
            data in prop::collection::vec(-1e3f64..1e3, 1..16),
            pick in any::<prop::sample::Index>(),
        ) {
            let reference = NdArray::from_vec(data.clone());
            let mut shifted = data;
            let i = pick.index(shifted.len());
            shifted[i] += 1e-2;
            prop_assert!(!arrays_match(&NdArray::from_vec(shifted), &reference, 1e-4));
        }
    }
}

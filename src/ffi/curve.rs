//! FFI functions for Curve manipulation.

use super::types::{CArrayView, StecaStatus};
use crate::data::Curve;

/// Opaque handle to a Curve.
pub type CurveHandle = *mut Curve;

/// Create a curve from x and y arrays.
///
/// # Safety
/// `xs` and `ys` must be valid for `len` elements. The handle written to
/// `out_handle` must be released with `steca_curve_free`.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_create(
    xs: *const f64,
    ys: *const f64,
    len: usize,
    out_handle: *mut CurveHandle,
) -> StecaStatus {
    if out_handle.is_null() || (len > 0 && (xs.is_null() || ys.is_null())) {
        return StecaStatus::NullPointer;
    }

    let (x, y) = if len == 0 {
        (Vec::new(), Vec::new())
    } else {
        (
            std::slice::from_raw_parts(xs, len).to_vec(),
            std::slice::from_raw_parts(ys, len).to_vec(),
        )
    };

    match Curve::from_xy(x, y) {
        Ok(curve) => {
            *out_handle = Box::into_raw(Box::new(curve));
            StecaStatus::Ok
        }
        Err(err) => StecaStatus::from(&err),
    }
}

/// Free a curve handle.
///
/// # Safety
/// Handle must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_free(handle: CurveHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Append one point.
///
/// # Safety
/// Handle must be valid. Views obtained before are invalidated.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_append(handle: CurveHandle, x: f64, y: f64) -> StecaStatus {
    if handle.is_null() {
        return StecaStatus::NullPointer;
    }
    (*handle).append(x, y);
    StecaStatus::Ok
}

/// Get the number of points.
///
/// # Safety
/// Handle must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_len(handle: CurveHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).len()
}

/// Get x values array view.
///
/// # Safety
/// Handle must be valid. Returned view is valid until curve is modified or freed.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_xs(handle: CurveHandle) -> CArrayView {
    if handle.is_null() {
        return CArrayView::empty();
    }
    CArrayView::from_slice((*handle).xs())
}

/// Get y values array view.
///
/// # Safety
/// Same as `steca_curve_xs`.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_ys(handle: CurveHandle) -> CArrayView {
    if handle.is_null() {
        return CArrayView::empty();
    }
    CArrayView::from_slice((*handle).ys())
}

/// Index of the first maximal y value.
///
/// # Safety
/// Handle and `out_index` must be valid.
#[no_mangle]
pub unsafe extern "C" fn steca_curve_idx_max(
    handle: CurveHandle,
    out_index: *mut usize,
) -> StecaStatus {
    if handle.is_null() || out_index.is_null() {
        return StecaStatus::NullPointer;
    }
    match (*handle).idx_max() {
        Some(i) => {
            *out_index = i;
            StecaStatus::Ok
        }
        None => StecaStatus::InvalidArgument,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_handle_lifecycle() {
        let xs = [1.0, 2.0, 3.0];
        let ys = [4.0, 9.0, 5.0];
        let mut handle: CurveHandle = std::ptr::null_mut();
        unsafe {
            assert_eq!(
                steca_curve_create(xs.as_ptr(), ys.as_ptr(), 3, &mut handle),
                StecaStatus::Ok
            );
            assert_eq!(steca_curve_append(handle, 4.0, 1.0), StecaStatus::Ok);
            assert_eq!(steca_curve_len(handle), 4);

            let view = steca_curve_ys(handle);
            assert_eq!(std::slice::from_raw_parts(view.data, view.len), &[4.0, 9.0, 5.0, 1.0]);

            let mut idx = 0;
            assert_eq!(steca_curve_idx_max(handle, &mut idx), StecaStatus::Ok);
            assert_eq!(idx, 1);
            steca_curve_free(handle);
        }
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            assert_eq!(steca_curve_len(std::ptr::null_mut()), 0);
            assert!(steca_curve_xs(std::ptr::null_mut()).data.is_null());
            assert_eq!(
                steca_curve_create(std::ptr::null(), std::ptr::null(), 2, std::ptr::null_mut()),
                StecaStatus::NullPointer
            );
        }
    }
}

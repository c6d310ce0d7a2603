//! FFI functions for fitting single curves.

use super::curve::CurveHandle;
use super::types::{CPeakFit, StecaStatus};
use crate::data::{Range, Ranges};
use crate::fit::{FunctionRegistry, PeakFunction, Polynomial};
use std::ffi::CStr;
use std::os::raw::c_char;

unsafe fn read_name<'a>(name: *const c_char) -> Result<&'a str, StecaStatus> {
    if name.is_null() {
        return Err(StecaStatus::NullPointer);
    }
    CStr::from_ptr(name)
        .to_str()
        .map_err(|_| StecaStatus::InvalidUtf8)
}

fn peak_result(f: &PeakFunction, iterations: usize, converged: bool) -> CPeakFit {
    let peak = f.fitted_peak();
    let error = f.peak_error();
    CPeakFit {
        center: peak.x,
        center_error: error.x,
        intensity: peak.y,
        intensity_error: error.y,
        fwhm: f.fitted_fwhm(),
        fwhm_error: f.fwhm_error(),
        iterations,
        converged,
    }
}

/// Fit the named peak function to the samples of a curve inside
/// `[range_min, range_max]`.
///
/// Known names are "Raw", "Gaussian", "Lorentzian", "PseudoVoigt1" and
/// "PseudoVoigt2".
///
/// # Safety
/// `curve` must be a valid handle, `name` a valid C string and `out` writable.
#[no_mangle]
pub unsafe extern "C" fn steca_fit_peak(
    curve: CurveHandle,
    name: *const c_char,
    range_min: f64,
    range_max: f64,
    out: *mut CPeakFit,
) -> StecaStatus {
    if curve.is_null() || out.is_null() {
        return StecaStatus::NullPointer;
    }
    let name = match read_name(name) {
        Ok(n) => n,
        Err(status) => return status,
    };
    if range_min.is_nan() || range_max.is_nan() {
        return StecaStatus::InvalidArgument;
    }

    let mut f = match FunctionRegistry::default().create(name) {
        Ok(f) => f,
        Err(err) => return StecaStatus::from(&err),
    };
    f.set_range(Range::safe_from(range_min, range_max));
    let report = f.fit(&*curve);

    let converged = if f.kind().is_raw() {
        f.raw_outcome().is_some_and(|r| r.center.is_finite())
    } else {
        report.converged()
    };
    *out = peak_result(&f, report.iterations, converged);
    StecaStatus::Ok
}

/// Fit a polynomial background of `degree` to the samples of a curve inside
/// the given ranges.
///
/// `ranges` holds `n_ranges` pairs `min, max`. The `degree + 1`
/// coefficients, lowest order first, are written to `out_coefficients`.
///
/// # Safety
/// `curve` must be valid, `ranges` valid for `2 * n_ranges` elements and
/// `out_coefficients` writable for `out_len` elements.
#[no_mangle]
pub unsafe extern "C" fn steca_fit_background(
    curve: CurveHandle,
    degree: usize,
    ranges: *const f64,
    n_ranges: usize,
    out_coefficients: *mut f64,
    out_len: usize,
) -> StecaStatus {
    if curve.is_null() || out_coefficients.is_null() || (n_ranges > 0 && ranges.is_null()) {
        return StecaStatus::NullPointer;
    }
    if out_len < degree + 1 {
        return StecaStatus::BufferTooSmall;
    }

    let bounds = if n_ranges == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(ranges, 2 * n_ranges)
    };
    if bounds.iter().any(|v| v.is_nan()) {
        return StecaStatus::InvalidArgument;
    }
    let ranges = Ranges::from_ranges(
        bounds
            .chunks_exact(2)
            .map(|pair| Range::safe_from(pair[0], pair[1])),
    );

    let (poly, _) = Polynomial::from_fit(degree, &*curve, &ranges);
    let out = std::slice::from_raw_parts_mut(out_coefficients, degree + 1);
    for (i, c) in out.iter_mut().enumerate() {
        *c = poly.coefficient(i);
    }
    StecaStatus::Ok
}

/// Check whether a peak function of this name exists.
///
/// # Safety
/// `name` must be a valid C string or null.
#[no_mangle]
pub unsafe extern "C" fn steca_peak_function_known(name: *const c_char) -> bool {
    match read_name(name) {
        Ok(n) => FunctionRegistry::default().contains(n),
        Err(_) => false,
    }
}

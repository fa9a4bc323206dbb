//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions when only one edge is requested.
///
/// The missing edge follows the source aspect ratio. When both edges are
/// given they are returned as-is (the caller crops to fill); when neither
/// is given the source dimensions are returned.
///
/// # Examples
/// ```
/// # use htmlimg::imaging::calculations::fit_to_edge;
/// assert_eq!(fit_to_edge((400, 300), Some(100), None), (100, 75));
/// assert_eq!(fit_to_edge((400, 300), None, Some(150)), (200, 150));
/// ```
pub fn fit_to_edge(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = source;
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let h = (w as f64 * src_h as f64 / src_w.max(1) as f64).round() as u32;
            (w, h.max(1))
        }
        (None, Some(h)) => {
            let w = (h as f64 * src_w as f64 / src_h.max(1) as f64).round() as u32;
            (w.max(1), h)
        }
        (None, None) => source,
    }
}

/// Round a byte count to whole kilobytes.
pub fn size_in_kb(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

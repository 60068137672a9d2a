//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the output dimensions of a responsive variant.
///
/// The width is pinned to `target_width` and the height follows the source
/// aspect ratio, so a cover fit into the result crops nothing. Sources
/// narrower than the target keep their own dimensions: variants are never
/// enlarged.
///
/// # Examples
/// ```
/// # use assetline::imaging::calculate_cover_dimensions;
/// // 4000x3000 landscape to 640 wide → 640x480
/// assert_eq!(calculate_cover_dimensions((4000, 3000), 640), (640, 480));
///
/// // 500x800 portrait is already narrower than 640 → unchanged
/// assert_eq!(calculate_cover_dimensions((500, 800), 640), (500, 800));
/// ```
pub fn calculate_cover_dimensions(original: (u32, u32), target_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || orig_h == 0 || orig_w <= target_width {
        return original;
    }
    let ratio = target_width as f64 / orig_w as f64;
    let height = ((orig_h as f64 * ratio).round() as u32).max(1);
    (target_width, height)
}

/// Percentage saved going from `before` to `after` bytes. Negative when the
/// output grew.
pub fn savings_percent(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (before as f64 - after as f64) / before as f64 * 100.0
}

/// Metres the `inside` sensor sits above the `outside` one, from the
/// barometric formula. Both pressures in hPa. Negative when inside is lower.
pub fn height_difference(inside: f64, outside: f64) -> f64 {
    44330.0 * (1.0 - (inside / outside).powf(0.1903))
}

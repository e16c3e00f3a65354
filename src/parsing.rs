use std::time::Duration;

/// Parse a Go-style duration such as `500ms`, `15s`, `5m` or `1h30m`.
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<f64>() {
        return nanos_to_duration(secs * 1e9);
    }

    // Order matters: "ms" must be tried before "m" and "s"
    const UNITS: &[(&str, f64)] = &[
        ("ns", 1.0),
        ("us", 1e3),
        ("µs", 1e3),
        ("ms", 1e6),
        ("s", 1e9),
        ("m", 60e9),
        ("h", 3600e9),
    ];

    let mut total = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let (unit, factor) = UNITS.iter().find(|(unit, _)| rest.starts_with(unit))?;
        total += value * factor;
        rest = &rest[unit.len()..];
    }
    nanos_to_duration(total)
}

fn nanos_to_duration(nanos: f64) -> Option<Duration> {
    (nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64)
        .then(|| Duration::from_nanos(nanos.round() as u64))
}

/// Parse one line of a downward-API annotations file (`prefix/key="value"`).
/// Lines without the prefix or without `=` yield `None`.
pub fn parse_annotation_line(line: &str, prefix: &str) -> Option<(String, String)> {
    let stripped = line.strip_prefix(prefix)?;
    let (key, value) = stripped.trim().split_once('=')?;
    Some((key.to_string(), value.trim_matches('"').to_string()))
}

/// Turn an annotation key into a valid Prometheus label name.
pub fn sanitize_label_name(key: &str) -> Option<String> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    // Names starting with "__" are reserved by Prometheus
    if name.starts_with("__") {
        name = name.trim_start_matches('_').to_string();
        if name.is_empty() {
            return None;
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert(0, '_');
        }
    }
    Some(name)
}

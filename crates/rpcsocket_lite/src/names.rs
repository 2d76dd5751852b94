//! Translation between gRPC routing identifiers and socket event names.
//!
//! Generated gRPC bindings disagree on whether method names start upper- or
//! lower-case, so every method is reachable under both spellings of its final
//! path segment. Invocation always goes through the lower-first form.

/// The event-name variants and canonical method id derived from one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKeys {
    /// The path with the method segment's first letter upper-cased.
    pub upper: String,
    /// The path with the method segment's first letter lower-cased.
    pub lower: String,
    /// The lower-first method segment on its own.
    pub name: String,
}

/// Derive the event names and canonical method id for a routing identifier.
///
/// Only the last `/`-delimited segment is rewritten. Callers filter out empty
/// paths before getting here.
pub fn route_keys(path: &str) -> RouteKeys {
    let (prefix, method) = match path.rsplit_once('/') {
        Some((prefix, method)) => (Some(prefix), method),
        None => (None, path),
    };

    let join = |segment: String| match prefix {
        Some(prefix) => format!("{prefix}/{segment}"),
        None => segment,
    };

    let name = lower_first(method);
    RouteKeys {
        upper: join(upper_first(method)),
        lower: join(name.clone()),
        name,
    }
}

/// Upper-case the first character of `s`.
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-case the first character of `s`.
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_keys_lower_input() {
        let keys = route_keys("/grpcbridge.EchoService/unaryCallOne");
        assert_eq!(keys.upper, "/grpcbridge.EchoService/UnaryCallOne");
        assert_eq!(keys.lower, "/grpcbridge.EchoService/unaryCallOne");
        assert_eq!(keys.name, "unaryCallOne");
    }

    #[test]
    fn test_route_keys_upper_input() {
        let keys = route_keys("/drone.DroneService/SendCommand");
        assert_eq!(keys.upper, "/drone.DroneService/SendCommand");
        assert_eq!(keys.lower, "/drone.DroneService/sendCommand");
        assert_eq!(keys.name, "sendCommand");
    }

    #[test]
    fn test_only_last_segment_rewritten() {
        // The service segment contains the method name; it must stay untouched.
        let keys = route_keys("/echo.Echo/Echo");
        assert_eq!(keys.upper, "/echo.Echo/Echo");
        assert_eq!(keys.lower, "/echo.Echo/echo");
        assert_eq!(keys.name, "echo");
    }

    #[test]
    fn test_variants_differ_only_in_first_char() {
        let keys = route_keys("/pkg.Service/getThing");
        assert_eq!(keys.upper.len(), keys.lower.len());
        let diffs = keys
            .upper
            .chars()
            .zip(keys.lower.chars())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(diffs, 1);
    }

    #[test]
    fn test_bare_segment() {
        let keys = route_keys("Ping");
        assert_eq!(keys.upper, "Ping");
        assert_eq!(keys.lower, "ping");
        assert_eq!(keys.name, "ping");
    }

    #[test]
    fn test_first_char_helpers() {
        assert_eq!(upper_first("échange"), "Échange");
        assert_eq!(lower_first("Échange"), "échange");
        assert_eq!(upper_first(""), "");
        assert_eq!(lower_first("1abc"), "1abc");
    }
}

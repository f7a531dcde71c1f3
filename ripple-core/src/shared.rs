//! Small string helpers used by components and the host layer.

/// Convert a kebab-case name to camelCase: `add-one` becomes `addOne`.
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' {
            match chars.peek() {
                Some(&next) if next.is_alphanumeric() || next == '_' => {
                    out.extend(next.to_uppercase());
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Uppercase the first character.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Prop name of the handler for an event: `addOne` becomes `onAddOne`.
///
/// An empty event name maps to an empty key.
pub fn to_handler_key(event: &str) -> String {
    if event.is_empty() {
        String::new()
    } else {
        format!("on{}", capitalize(event))
    }
}

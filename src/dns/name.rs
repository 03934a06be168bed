use crate::error::{Result, SolverError};

/// Marker for the zone apex.
pub const APEX: &str = "@";

fn normalize(name: &str) -> String {
    let name = name.to_lowercase();
    let name = name.strip_prefix('.').unwrap_or(&name);
    name.strip_suffix('.').unwrap_or(name).to_string()
}

/// Returns `fqdn` relative to `zone`, or [`APEX`] when both name the same node.
///
/// Both inputs are compared case-insensitively with one leading and one
/// trailing dot ignored. The match must fall on a label boundary, so
/// `notzone.com` is not inside `zone.com`.
///
/// ```
/// use allinkl_webhook::dns::relative_name;
///
/// assert_eq!(relative_name("_acme-challenge.sub.example.com.", ".example.com.").unwrap(), "_acme-challenge.sub");
/// assert_eq!(relative_name("example.com.", "example.com").unwrap(), "@");
/// ```
pub fn relative_name(fqdn: &str, zone: &str) -> Result<String> {
    let f = normalize(fqdn);
    let z = normalize(zone);

    if f == z {
        return Ok(APEX.to_string());
    }

    match f.strip_suffix(&format!(".{}", z)) {
        Some(rel) => Ok(rel.to_string()),
        None => Err(SolverError::NotWithinZone {
            fqdn: fqdn.to_string(),
            zone: zone.to_string(),
        }),
    }
}

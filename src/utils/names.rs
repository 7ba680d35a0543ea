//! Tool-name construction helpers.

/// Sanitize a name fragment for use in a tool name.
///
/// Lowercases, replaces `/`, `.`, `-` and whitespace with `_`, collapses
/// runs of underscores and trims leading/trailing ones. Idempotent.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        let mapped = match ch {
            '/' | '.' | '-' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

/// Build a tool name for an RPC method, keeping well under the 64-character
/// ceiling.
///
/// The candidate is `{svc}-{method}` lower-cased, where `svc` is the last
/// dot-delimited component of the service FQN. When the raw candidate
/// exceeds 50 characters it is cut to 40 and suffixed with a 4-hex-digit
/// FNV-1a digest of `{fqn}.{method}`; otherwise each side is bounded at 20
/// characters.
pub fn shorten_rpc_tool_name(service_fqn: &str, method: &str) -> String {
    let svc = service_fqn.rsplit('.').next().unwrap_or(service_fqn);
    let raw = format!("{}-{}", svc, method).to_lowercase();

    if raw.len() > 50 {
        let digest = fnv1a_32(format!("{}.{}", service_fqn, method).as_bytes()) & 0xFFFF;
        return format!("{}-{:x}", &raw[..40], digest);
    }

    let svc_part = truncate(svc, 20);
    let method_part = truncate(method, 20);
    format!("{}-{}", svc_part, method_part).to_lowercase()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() > max {
        &s[..max]
    } else {
        s
    }
}

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Remove duplicates while preserving first-seen order.
pub fn unique_strings(input: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(input.len());
    input.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_name("Store"), "store");
        assert_eq!(sanitize_name("My API v2.1"), "my_api_v2_1");
        assert_eq!(sanitize_name("a/b-c.d e"), "a_b_c_d_e");
        assert_eq!(sanitize_name("--leading/trailing--"), "leading_trailing");
    }

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(sanitize_name("a..b"), "a_b");
        assert_eq!(sanitize_name("a  -  b"), "a_b");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in ["Store API", "a/b.c-d", "  spaced out  ", "petstore"] {
            let once = sanitize_name(input);
            assert_eq!(sanitize_name(&once), once);
        }
    }

    #[test]
    fn test_short_rpc_name_passes_through() {
        assert_eq!(shorten_rpc_tool_name("pkg.Svc", "Say"), "svc-say");
        assert_eq!(
            shorten_rpc_tool_name("helloworld.Greeter", "SayHello"),
            "greeter-sayhello"
        );
    }

    #[test]
    fn test_shortening_branch_engages_over_50() {
        let fqn = "very.long.package.name.ThisIsAServiceWithAVeryLongName";
        let method = "DoSomethingExtraordinary";
        let raw = "thisisaservicewithaverylongname-dosomethingextraordinary";
        assert!(raw.len() > 50);

        let name = shorten_rpc_tool_name(fqn, method);
        assert!(name.starts_with(&raw[..40]));
        assert_eq!(name.as_bytes()[40], b'-');
        // 40 chars, a dash, and an at-most-4-hex-digit digest.
        assert!(name.len() <= 46, "{} is too long", name);
        let digest = &name[41..];
        assert!(!digest.is_empty() && digest.len() <= 4);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_shortening_branch_does_not_engage_at_50() {
        // 24 + 1 + 25 = 50 characters: just inside the limit.
        let name = shorten_rpc_tool_name("pkg.AbcdefghijklmnopqrstuvwX", "Ymnopqrstuvwxyzabcdefghij");
        // Each side is bounded at 20 when no digest is appended.
        assert_eq!(name, "abcdefghijklmnopqrst-ymnopqrstuvwxyzabcde");
    }

    #[test]
    fn test_fnv1a_32_known_vectors() {
        // Standard FNV-1a test vectors.
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_unique_strings() {
        let input = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(unique_strings(input), vec!["a".to_string(), "b".to_string()]);
    }
}

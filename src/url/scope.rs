/// Checks whether a hostname falls within a crawl's root-domain scope
///
/// A host is in scope when it equals the root, is a dot-suffixed subdomain
/// of the root, or the root is a dot-suffixed subdomain of the host. The
/// last case lets a crawl seeded at `blog.example.com` follow links up to
/// `example.com`.
///
/// Both arguments are expected in lowercase.
///
/// # Examples
///
/// ```
/// use spiderfrog::url::within_scope;
///
/// assert!(within_scope("example.com", "example.com"));
/// assert!(within_scope("example.com", "blog.example.com"));
/// assert!(within_scope("blog.example.com", "example.com"));
/// assert!(!within_scope("example.com", "badexample.com"));
/// ```
pub fn within_scope(root: &str, host: &str) -> bool {
    if root.is_empty() || host.is_empty() {
        return false;
    }

    host == root || is_subdomain_of(host, root) || is_subdomain_of(root, host)
}

fn is_subdomain_of(candidate: &str, base: &str) -> bool {
    candidate.len() > base.len()
        && candidate.ends_with(base)
        && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.'
}

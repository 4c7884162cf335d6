use std::fmt;

/// Identifies a namespaced resource.
///
/// Sites and all of their children share the same `ResourceId`, so this is
/// also the key for every child lookup.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The hostname-style key under which this site's address is published
    /// in every rewrite table of its namespace: `{name}.{namespace}`.
    pub fn rewrite_key(&self) -> String {
        format!("{}.{}", self.name, self.namespace)
    }

    /// Parses a rewrite key back into the site name, provided the key belongs
    /// to `namespace`.
    ///
    /// Names may contain dots but namespaces may not, so the namespace is the
    /// final segment.
    pub fn from_rewrite_key(key: &str, namespace: &str) -> Option<Self> {
        let name = key.strip_suffix(namespace)?.strip_suffix('.')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_key_uses_name_then_namespace() {
        let id = ResourceId::new("blog", "team-a");
        assert_eq!(id.rewrite_key(), "team-a.blog");
        assert_eq!(id.to_string(), "blog/team-a");
    }

    #[test]
    fn parses_rewrite_keys_scoped_to_namespace() {
        assert_eq!(
            ResourceId::from_rewrite_key("team-a.blog", "blog"),
            Some(ResourceId::new("blog", "team-a"))
        );
        assert_eq!(ResourceId::from_rewrite_key("team-a.shop", "blog"), None);
        assert_eq!(ResourceId::from_rewrite_key("team-a", "blog"), None);
        assert_eq!(ResourceId::from_rewrite_key(".blog", "blog"), None);
        assert_eq!(ResourceId::from_rewrite_key("team-ablog", "blog"), None);
    }

    #[test]
    fn parses_rewrite_keys_of_dotted_names() {
        let id = ResourceId::new("blog", "www.team-a");
        assert_eq!(ResourceId::from_rewrite_key(&id.rewrite_key(), "blog"), Some(id));
        assert_eq!(
            ResourceId::from_rewrite_key("www.team-a.blog.shop", "blog"),
            None
        );
    }
}

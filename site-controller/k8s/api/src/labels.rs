use std::collections::BTreeMap;

/// The label every child carries, naming the site that owns it.
pub const SITE_LABEL: &str = "site";

/// The labels stamped on a site's children; also used as their selector.
pub fn site_labels(name: &str) -> BTreeMap<String, String> {
    Some((SITE_LABEL.to_string(), name.to_string()))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn site_labels_name_the_site() {
        assert_eq!(
            site_labels("team-a"),
            btreemap! { "site".to_string() => "team-a".to_string() }
        );
    }
}

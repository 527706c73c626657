use std::fmt;

use k8_types::ObjectMeta;

const SEPARATOR: char = ':';
const WILDCARD: &str = "*";

/// annotation kcp puts on every object to name its logical cluster
pub const CLUSTER_ANNOTATION: &str = "kcp.dev/cluster";

/// Hierarchical name of a logical cluster, `root:org:team` for example.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalCluster(String);

impl LogicalCluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// addresses every logical cluster at once, only valid for list and watch
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_owned())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// logical cluster of a workspace named `name` living in this cluster
    pub fn join(&self, name: &str) -> Self {
        Self(format!("{}{}{}", self.0, SEPARATOR, name))
    }

    /// logical cluster an object was read from
    pub fn of(metadata: &ObjectMeta) -> Option<Self> {
        metadata
            .annotations
            .get(CLUSTER_ANNOTATION)
            .filter(|name| !name.is_empty())
            .map(|name| Self(name.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// path segment the api server routes on
    pub fn path(&self) -> String {
        format!("/clusters/{}", self.0)
    }
}

impl fmt::Display for LogicalCluster {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LogicalCluster {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LogicalCluster {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod test {

    use k8_types::ObjectMeta;

    use super::CLUSTER_ANNOTATION;
    use super::LogicalCluster;

    #[test]
    fn test_join() {
        let team = LogicalCluster::new("root").join("team-a");
        assert_eq!(team.as_str(), "root:team-a");
        assert_eq!(team.path(), "/clusters/root:team-a");
        assert!(LogicalCluster::wildcard().is_wildcard());
        assert_eq!(LogicalCluster::wildcard().path(), "/clusters/*");
    }

    #[test]
    fn test_cluster_of_object() {
        let mut metadata = ObjectMeta::default();
        assert_eq!(LogicalCluster::of(&metadata), None);

        metadata
            .annotations
            .insert(CLUSTER_ANNOTATION.to_owned(), "root:org".to_owned());
        assert_eq!(
            LogicalCluster::of(&metadata),
            Some(LogicalCluster::new("root:org"))
        );
    }
}

use commit_graph::HelperIdentity;
use serde::{Deserialize, Serialize};

/// Settings for the comparison-base resolver.
///
/// Every field has a default, so a partial TOML/JSON document is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Author and committer of helper commits. Keep `time` fixed so that helper commits
    /// for the same pair of parents get the same id on every recomputation.
    pub helper_identity: HelperIdentity,
    pub helper_message: String,
    /// Directory under `<git dir>/info/pullbase/` holding the on-disk comparison cache.
    pub cache_dir: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            helper_identity: HelperIdentity::default(),
            helper_message: "helper commit".to_string(),
            cache_dir: "comparison-cache".to_string(),
        }
    }
}

//! Store sanity checks: duplicate tag ids on one definition, and self-tag
//! dependency cycles.

use crate::definition::tag::TagUsage;
use crate::dependency::{DependencyMap, DependencyRef};
use crate::errors::CoreError;

pub struct StoreValidator;

impl StoreValidator {
    /// Tag ids on any one definition must be unique.
    ///
    /// # Errors
    /// Returns [`CoreError::DuplicateTag`] on the first repeated id.
    pub fn check_duplicate_tags(owner_id: &str, tags: &[TagUsage]) -> Result<(), CoreError> {
        let mut seen = std::collections::HashSet::new();
        for usage in tags {
            if !seen.insert(usage.tag_id().to_string()) {
                return Err(CoreError::DuplicateTag {
                    owner_id: owner_id.to_string(),
                    tag_id: usage.tag_id().to_string(),
                });
            }
        }
        Ok(())
    }

    /// A definition must not depend on a tag it carries itself.
    ///
    /// # Errors
    /// Returns [`CoreError::SelfTagDependency`] on the first violation.
    pub fn check_self_tag_dependency(
        owner_id: &str,
        tags: &[TagUsage],
        dependencies: &DependencyMap,
    ) -> Result<(), CoreError> {
        let carried: std::collections::HashSet<&str> = tags.iter().map(TagUsage::tag_id).collect();
        for dep in dependencies.values() {
            if let DependencyRef::Tag { id, .. } = dep {
                if carried.contains(id.as_str()) {
                    return Err(CoreError::SelfTagDependency {
                        owner_id: owner_id.to_string(),
                        tag_id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
